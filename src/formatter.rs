use serde::Deserialize;

use crate::cmdline::exec_key::{split_exec, Quirks};
use crate::model::Application;

/// Which key of an application a display name is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Name,
    GenericName,
}

/// How display names are shown in the selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Formatter {
    #[default]
    #[serde(rename = "none")]
    Plain,
    /// Append the executable of the `Exec` key.
    #[serde(rename = "full")]
    WithBinary,
    /// Append the basename of the executable.
    #[serde(rename = "base")]
    WithBinaryBase,
}

/// First token of an `Exec` template. `None` if the template doesn't parse.
fn binary_name(exec: &str, quirks: Quirks) -> Option<String> {
    split_exec(exec, quirks)
        .ok()?
        .into_iter()
        .next()
        .filter(|word| !word.is_empty())
}

impl Formatter {
    pub fn format(self, kind: NameKind, app: &Application, quirks: Quirks) -> String {
        let entry = &app.entry;
        let base = match (kind, &entry.generic_name) {
            (NameKind::GenericName, Some(generic)) => format!("{} ({})", generic, entry.name),
            _ => entry.name.clone(),
        };
        let binary = match self {
            Formatter::Plain => None,
            Formatter::WithBinary => binary_name(&entry.exec, quirks),
            Formatter::WithBinaryBase => binary_name(&entry.exec, quirks)
                .map(|bin| bin.rsplit('/').next().unwrap_or(&bin).to_string()),
        };
        match binary {
            Some(binary) => format!("{base} ({binary})"),
            None => base,
        }
    }
}
