use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use log::{debug, info, warn};
use regex::Regex;

use crate::cmdline::Quirks;
use crate::formatter::{Formatter, NameKind};
use crate::locale::LocaleSuffixes;
use crate::matcher::{CaseMode, NameView};
use crate::model::{Application, Rank};
use crate::sources::desktop::{read_desktop_file, EntryError};
use crate::sources::search_path::{DesktopFile, SearchPath};

/// Everything needed to turn a desktop file into a candidate and decide
/// whether it is visible.
#[derive(Debug, Clone, Default)]
pub struct IndexSettings {
    pub locales: LocaleSuffixes,
    pub quirks: Quirks,
    /// Current desktop environments (`$XDG_CURRENT_DESKTOP`).
    pub desktop_envs: Vec<String>,
}

/// How [`AppIndex::view`] builds display names.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub formatter: Formatter,
    pub case: CaseMode,
    /// Offer generic names as additional display names.
    pub generic: bool,
    /// Display names matching any of these are left out.
    pub exclude: Vec<Regex>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub files: usize,
    pub failures: Vec<(PathBuf, EntryError)>,
}

impl LoadReport {
    pub fn summary(&self, apps: usize) -> String {
        format!("Read {} .desktop files, found {} apps.", self.files, apps)
    }

    /// One line per file that couldn't be loaded.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(path, err)| format!("{}: {}", path.display(), err))
            .collect()
    }
}

/// Desktop entries of the whole search path keyed by id.
///
/// Every id maps to its candidates sorted by rank; the first candidate is the
/// active one. Override is purely rank based: a hidden candidate still
/// shadows visible candidates of the same id in lower priority directories.
#[derive(Debug, Default)]
pub struct AppIndex {
    settings: IndexSettings,
    apps: BTreeMap<String, Vec<Application>>,
}

impl AppIndex {
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings,
            apps: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Parse and insert every desktop file of `search_path`. Broken files are
    /// reported and skipped.
    pub fn load(&mut self, search_path: &SearchPath) -> LoadReport {
        let files = search_path.collect_files();
        self.load_files(files)
    }

    pub fn load_files(&mut self, files: Vec<DesktopFile>) -> LoadReport {
        let mut report = LoadReport {
            files: files.len(),
            failures: Vec::new(),
        };
        for file in files {
            if let Err(err) = self.refresh(&file.id, file.rank, &file.path) {
                report.failures.push((file.path, err));
            }
        }
        info!(
            "AppIndex: loaded {} files, {} ids, {} visible",
            report.files,
            self.apps.len(),
            self.count()
        );
        report
    }

    /// Re-read the file backing `(id, rank)`. A file that no longer parses
    /// drops out of the index.
    pub fn refresh(&mut self, id: &str, rank: Rank, path: &Path) -> Result<(), EntryError> {
        let settings = &self.settings;
        match read_desktop_file(path, &settings.locales, settings.quirks) {
            Ok(entry) => {
                self.upsert(Application {
                    id: id.to_string(),
                    rank,
                    path: path.to_path_buf(),
                    entry,
                });
                Ok(())
            }
            Err(err) => {
                warn!("Couldn't load {:?}: {}", path, err);
                self.remove(id, rank);
                Err(err)
            }
        }
    }

    /// Insert or replace the candidate `(app.id, app.rank)`.
    pub fn upsert(&mut self, app: Application) {
        debug!("AppIndex: upsert {} (rank {})", app.id, app.rank);
        let candidates = self.apps.entry(app.id.clone()).or_default();
        match candidates.binary_search_by_key(&app.rank, |candidate| candidate.rank) {
            Ok(pos) => candidates[pos] = app,
            Err(pos) => candidates.insert(pos, app),
        }
    }

    /// Remove the candidate `(id, rank)`. The id disappears once its last
    /// candidate is gone. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str, rank: Rank) -> bool {
        let Some(candidates) = self.apps.get_mut(id) else {
            return false;
        };
        let Some(pos) = candidates.iter().position(|candidate| candidate.rank == rank) else {
            return false;
        };
        debug!("AppIndex: remove {} (rank {})", id, rank);
        candidates.remove(pos);
        if candidates.is_empty() {
            self.apps.remove(id);
        }
        true
    }

    /// The lowest rank candidate of `id`.
    pub fn active(&self, id: &str) -> Option<&Application> {
        self.apps.get(id).and_then(|candidates| candidates.first())
    }

    pub fn candidates(&self, id: &str) -> &[Application] {
        self.apps.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Active entries that pass visibility filtering, in id order.
    pub fn visible(&self) -> impl Iterator<Item = &Application> + '_ {
        let desktop_envs = &self.settings.desktop_envs;
        self.apps
            .values()
            .filter_map(|candidates| candidates.first())
            .filter(move |app| app.entry.is_visible(desktop_envs))
    }

    pub fn count(&self) -> usize {
        self.visible().count()
    }

    /// Display names of all visible applications.
    pub fn view(&self, options: &ViewOptions) -> NameView<'_> {
        let mut view = NameView::new(options.case);
        for app in self.visible() {
            let mut kinds = vec![NameKind::Name];
            if options.generic && app.entry.generic_name.is_some() {
                kinds.push(NameKind::GenericName);
            }
            for kind in kinds {
                let name = options.formatter.format(kind, app, self.settings.quirks);
                if options.exclude.iter().any(|re| re.is_match(&name)) {
                    debug!("Excluding {:?} ({})", name, app.id);
                    continue;
                }
                if !view.insert(name, app) {
                    debug!("Display name of {} is already taken", app.id);
                }
            }
        }
        view
    }

    /// Walk all invariants. Meant for debug builds.
    pub fn check_inner_state(&self) -> Result<()> {
        for (id, candidates) in &self.apps {
            ensure!(!candidates.is_empty(), "{id} has no candidates");
            for candidate in candidates {
                ensure!(
                    &candidate.id == id,
                    "candidate {} is filed under {}",
                    candidate.id,
                    id
                );
            }
            for pair in candidates.windows(2) {
                ensure!(
                    pair[0].rank < pair[1].rank,
                    "candidates of {id} are not strictly ordered by rank ({} >= {})",
                    pair[0].rank,
                    pair[1].rank
                );
            }
        }
        Ok(())
    }

    /// Check that `view` only refers to active, visible applications.
    pub fn check_view(&self, view: &NameView<'_>) -> Result<()> {
        for (name, app) in view.entries() {
            let active = self.active(&app.id);
            ensure!(
                active.is_some_and(|active| std::ptr::eq(active, app)),
                "{name:?} refers to an inactive candidate of {}",
                app.id
            );
            ensure!(
                app.entry.is_visible(&self.settings.desktop_envs),
                "{name:?} refers to the invisible application {}",
                app.id
            );
        }
        Ok(())
    }
}
