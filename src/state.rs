use std::process::Child;

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::cmdline::quote::argv_to_string;
use crate::cmdline::{application_command, FieldValues, LaunchSettings};
use crate::dmenu::{selector_lines, Dmenu};
use crate::executor::{self, Channel, ExecMode, Launch};
use crate::index::{AppIndex, ViewOptions};
use crate::matcher::NameView;
use crate::sources::history::History;
use crate::sources::search_path::SearchPath;
use crate::watch::{ChangeEvent, ChangeKind};

/// Resolved runtime settings (config file merged with the command line).
#[derive(Debug, Clone)]
pub struct Settings {
    pub dmenu: Dmenu,
    pub launch: LaunchSettings,
    pub view: ViewOptions,
    pub no_exec: bool,
    pub channel: Channel,
}

pub struct AppState {
    pub settings: Settings,
    pub index: AppIndex,
    pub search_path: SearchPath,
    pub history: Option<History>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        index: AppIndex,
        search_path: SearchPath,
        history: Option<History>,
    ) -> Self {
        Self {
            settings,
            index,
            search_path,
            history,
        }
    }

    /// Turn the selector's output into a command. Unknown queries are run as
    /// custom shell commands. Returns `None` if the selected application has
    /// an unusable `Exec` key.
    pub fn resolve(&self, view: &NameView<'_>, query: &str) -> Option<Launch> {
        let launch = &self.settings.launch;
        let Some(hit) = view.lookup(query) else {
            info!("A custom program {:?} has been selected", query);
            return Some(Launch {
                argv: launch.argv(query, true, false),
                history_name: None,
                working_dir: None,
            });
        };

        let app = hit.app;
        let entry = &app.entry;
        let fields = FieldValues {
            name: &entry.name,
            location: &app.path,
            icon: entry.icon.as_deref(),
        };
        let command =
            match application_command(&entry.exec, &fields, &hit.args, self.index.settings().quirks) {
                Ok(command) => command,
                Err(err) => {
                    error!("Couldn't assemble the command of {:?}: {}", app.path, err);
                    return None;
                }
            };
        info!(
            "A desktop program {:?} has been selected. Raw command {:?}, arguments {:?}",
            hit.name, command, hit.args
        );
        Some(Launch {
            argv: launch.argv(&command, false, entry.terminal),
            history_name: Some(hit.name.to_string()),
            working_dir: entry.working_dir.clone(),
        })
    }

    /// Run the selector over the current index. `None` means nothing should
    /// be launched.
    pub fn choose(&self) -> Result<Option<Launch>> {
        let view = self.index.view(&self.settings.view);
        if cfg!(debug_assertions) {
            self.index.check_view(&view)?;
        }
        if view.is_empty() {
            warn!("No applications to offer, only custom commands can be run");
        }
        let lines = selector_lines(&view, self.history.as_ref());
        let Some(query) = self.settings.dmenu.select(&lines)? else {
            debug!("Selection cancelled");
            return Ok(None);
        };
        Ok(self.resolve(&view, &query))
    }

    /// Record the selection and execute it, or only print it with `no_exec`.
    pub fn run(&mut self, launch: &Launch, mode: ExecMode) -> Result<Option<Child>> {
        if self.settings.no_exec {
            println!("{}", argv_to_string(&launch.argv));
            return Ok(None);
        }
        if let (Some(history), Some(name)) = (self.history.as_mut(), launch.history_name.as_deref()) {
            if let Err(err) = history.increment(name) {
                warn!("Couldn't update the usage log: {:#}", err);
            }
        }
        executor::execute(launch, &self.settings.channel, mode)
    }

    pub fn apply_change(&mut self, change: ChangeEvent) -> Result<()> {
        debug!("Applying {:?}", change);
        match change.kind {
            ChangeKind::Modified => match self.search_path.get(change.rank) {
                Some(dir) => {
                    let path = dir.join(&change.id);
                    // Failures are logged and drop the candidate.
                    let _ = self.index.refresh(&change.id, change.rank, &path);
                }
                None => warn!("Change below unknown search path rank {}", change.rank),
            },
            ChangeKind::Deleted => {
                if !self.index.remove(&change.id, change.rank) {
                    debug!("{} (rank {}) wasn't indexed", change.id, change.rank);
                }
            }
        }
        debug!(
            "{} now has {} candidates",
            change.id,
            self.index.candidates(&change.id).len()
        );
        if cfg!(debug_assertions) {
            self.index.check_inner_state()?;
        }
        Ok(())
    }
}
