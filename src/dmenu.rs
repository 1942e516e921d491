use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use log::debug;

use crate::matcher::NameView;
use crate::sources::history::History;

/// The external line selector.
#[derive(Debug, Clone)]
pub struct Dmenu {
    command: String,
    shell: String,
}

impl Dmenu {
    pub fn new(command: &str, shell: &str) -> Self {
        Self {
            command: command.to_string(),
            shell: shell.to_string(),
        }
    }

    /// Offer `lines` and return the chosen line, `None` if the user cancelled.
    pub fn select<S: AsRef<str>>(&self, lines: &[S]) -> Result<Option<String>> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("couldn't start {:?}", self.command))?;

        let mut input = String::new();
        for line in lines {
            input.push_str(line.as_ref());
            input.push('\n');
        }
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input.as_bytes()),
            None => Err(io::Error::other("selector has no stdin")),
        };
        if let Err(err) = written {
            if let Err(wait_err) = child.wait() {
                debug!("Couldn't wait for the selector: {}", wait_err);
            }
            return Err(err)
                .with_context(|| format!("couldn't write to {:?}. Is dmenu installed?", self.command));
        }

        let mut output = String::new();
        child
            .stdout
            .take()
            .context("selector has no stdout")?
            .read_to_string(&mut output)
            .context("couldn't read the selector's choice")?;
        match child.wait() {
            Ok(status) => debug!("Selector exited with {}", status),
            Err(err) => debug!("Couldn't wait for the selector: {}", err),
        }

        let choice = output.lines().next().unwrap_or_default();
        if choice.is_empty() {
            Ok(None)
        } else {
            Ok(Some(choice.to_string()))
        }
    }
}

/// Lines handed to the selector: names from the history first (most used
/// first), then every other name. History names without an application are
/// skipped; no name is listed twice.
pub fn selector_lines<'v>(view: &'v NameView<'_>, history: Option<&History>) -> Vec<&'v str> {
    let Some(history) = history else {
        return view.names().collect();
    };

    let mut lines = Vec::with_capacity(view.len());
    let mut listed = HashSet::new();
    for (name, _) in history.view() {
        match view.display_name(name) {
            Some(display) => {
                if listed.insert(display) {
                    lines.push(display);
                }
            }
            None => debug!("Name {:?} in history will be ignored", name),
        }
    }
    lines.extend(view.names().filter(|name| !listed.contains(name)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::CaseMode;
    use crate::model::{Application, DesktopEntry};
    use std::fs;
    use std::path::PathBuf;

    fn app() -> Application {
        Application {
            id: "x.desktop".to_string(),
            rank: 0,
            path: PathBuf::from("x.desktop"),
            entry: DesktopEntry::default(),
        }
    }

    #[test]
    fn select_returns_first_line() {
        let dmenu = Dmenu::new("grep Fire", "/bin/sh");
        assert_eq!(
            dmenu.select(&["Editor", "Firefox", "Terminal"]).unwrap(),
            Some("Firefox".to_string())
        );
    }

    #[test]
    fn empty_output_means_cancelled() {
        let dmenu = Dmenu::new("cat > /dev/null", "/bin/sh");
        assert_eq!(dmenu.select(&["Editor"]).unwrap(), None);
    }

    #[test]
    fn selector_sees_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seen");
        let dmenu = Dmenu::new(&format!("cat > '{}'", out.display()), "/bin/sh");
        dmenu.select(&["a b", "c"]).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "a b\nc\n");
    }

    #[test]
    fn selector_exiting_early_is_reaped() {
        let dmenu = Dmenu::new("exec 0<&-; exit 3", "/bin/sh");
        let lines: Vec<String> = (0..100_000).map(|i| format!("line {i}")).collect();
        assert!(dmenu.select(&lines).is_err());
    }

    #[test]
    fn history_names_come_first() {
        let app = app();
        let mut view = NameView::new(CaseMode::Insensitive);
        for name in ["Editor", "Firefox", "Terminal"] {
            view.insert(name.to_string(), &app);
        }

        let dir = tempfile::tempdir().unwrap();
        let mut history = History::load(&dir.path().join("history.json"));
        history.increment("terminal").unwrap();
        history.increment("terminal").unwrap();
        history.increment("Removed App").unwrap();
        history.increment("Firefox").unwrap();

        assert_eq!(
            selector_lines(&view, Some(&history)),
            vec!["Terminal", "Firefox", "Editor"]
        );
        assert_eq!(
            selector_lines(&view, None),
            vec!["Editor", "Firefox", "Terminal"]
        );
    }
}
