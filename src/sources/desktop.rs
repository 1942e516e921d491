use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::cmdline::{validate_exec_key, ExecError, Quirks};
use crate::locale::LocaleSuffixes;
use crate::model::{DesktopEntry, Localized};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("missing mandatory key {0}")]
    MissingKey(&'static str),
    #[error("malformed boolean {value:?} in key {key}")]
    InvalidBool { key: String, value: String },
    #[error("malformed list {value:?} in key {key}")]
    InvalidList { key: String, value: String },
    #[error("invalid Exec key: {0}")]
    InvalidExec(#[from] ExecError),
    #[error("couldn't read file: {0}")]
    Io(#[from] io::Error),
}

/// Split `Name[de_DE]` into `("Name", Some("de_DE"))`.
fn split_locale(key: &str) -> (&str, Option<&str>) {
    match key.strip_suffix(']').and_then(|k| k.split_once('[')) {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (key, None),
    }
}

fn push_escape(out: &mut String, escaped: char) {
    match escaped {
        's' => out.push(' '),
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        '\\' => out.push('\\'),
        // Unknown escapes are kept for later stages (Exec quoting relies on this).
        other => {
            out.push('\\');
            out.push(other);
        }
    }
}

/// Apply the string escapes `\s \n \t \r \\`.
fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some(escaped) => push_escape(&mut result, escaped),
            None => result.push('\\'),
        }
    }
    result
}

fn parse_bool(key: &str, value: &str) -> Result<bool, EntryError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(EntryError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Split a `;` separated list. `\;` is a literal semicolon, empty items are
/// dropped.
fn parse_list(key: &str, value: &str) -> Result<Vec<String>, EntryError> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ';' => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            '\\' => match chars.next() {
                Some(';') => current.push(';'),
                Some(escaped) => push_escape(&mut current, escaped),
                None => {
                    return Err(EntryError::InvalidList {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            },
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    Ok(items)
}

fn store_localized(target: &mut Localized, suffix: &str, value: &str, locales: &LocaleSuffixes) {
    if locales.priority(suffix).is_some() {
        target.insert(suffix, unescape(value));
    }
}

/// Parse the `[Desktop Entry]` group of a desktop file.
///
/// Desktop environment lists are stored as they are; they are evaluated
/// against the current desktops when visibility is computed.
pub fn parse_desktop_entry(
    content: &str,
    locales: &LocaleSuffixes,
    quirks: Quirks,
) -> Result<DesktopEntry, EntryError> {
    let mut entry = DesktopEntry::default();
    let mut in_entry_group = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_entry_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry_group {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match split_locale(key) {
            ("Name", suffix) => {
                store_localized(&mut entry.names, suffix.unwrap_or(""), value, locales)
            }
            ("GenericName", suffix) => {
                store_localized(&mut entry.generic_names, suffix.unwrap_or(""), value, locales)
            }
            (_, Some(_)) => {}
            ("Exec", None) => entry.exec = unescape(value),
            ("Icon", None) => entry.icon = Some(unescape(value)),
            ("Path", None) => entry.working_dir = Some(PathBuf::from(unescape(value))),
            ("TryExec", None) => entry.try_exec = Some(unescape(value)),
            ("Terminal", None) => entry.terminal = parse_bool(key, value)?,
            ("Hidden", None) => entry.hidden = parse_bool(key, value)?,
            ("NoDisplay", None) => entry.no_display = parse_bool(key, value)?,
            ("OnlyShowIn", None) => entry.only_show_in = parse_list(key, value)?,
            ("NotShowIn", None) => entry.not_show_in = parse_list(key, value)?,
            _ => {}
        }
    }

    entry.generic_name = entry
        .generic_names
        .resolve(locales)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let name = entry.names.resolve(locales).map(str::to_string);

    // A hidden file only exists to claim its id; nothing else is required.
    if entry.hidden {
        entry.name = name.unwrap_or_default();
        return Ok(entry);
    }

    entry.name = name
        .filter(|name| !name.is_empty())
        .ok_or(EntryError::MissingKey("Name"))?;
    if entry.exec.is_empty() {
        return Err(EntryError::MissingKey("Exec"));
    }
    validate_exec_key(&entry.exec, quirks)?;
    Ok(entry)
}

pub fn read_desktop_file(
    path: &Path,
    locales: &LocaleSuffixes,
    quirks: Quirks,
) -> Result<DesktopEntry, EntryError> {
    debug!("Parsing {:?}", path);
    let content = fs::read_to_string(path)?;
    parse_desktop_entry(&content, locales, quirks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "\
[Desktop Entry]
Version=1.0
Name=Firefox
Name[de]=Feuerfuchs
Name[fr_FR]=Renard de feu
GenericName=Web Browser
GenericName[de]=Webbrowser
Comment=Browse the web
Exec=firefox %u
Icon=firefox
Terminal=false
Type=Application
OnlyShowIn=GNOME;KDE;
NotShowIn=XFCE

[Desktop Action new-window]
Name=New Window
Exec=firefox --new-window
";

    fn parse(content: &str) -> Result<DesktopEntry, EntryError> {
        parse_desktop_entry(content, &LocaleSuffixes::new("en_US"), Quirks::default())
    }

    #[test]
    fn parses_basic_entry() {
        let entry = parse(FIREFOX).unwrap();
        assert_eq!(entry.name, "Firefox");
        assert_eq!(entry.generic_name.as_deref(), Some("Web Browser"));
        assert_eq!(entry.exec, "firefox %u");
        assert_eq!(entry.icon.as_deref(), Some("firefox"));
        assert!(!entry.terminal);
        assert_eq!(entry.only_show_in, vec!["GNOME", "KDE"]);
        assert_eq!(entry.not_show_in, vec!["XFCE"]);
    }

    #[test]
    fn picks_most_specific_locale() {
        let entry =
            parse_desktop_entry(FIREFOX, &LocaleSuffixes::new("de_AT.UTF-8"), Quirks::default())
                .unwrap();
        assert_eq!(entry.name, "Feuerfuchs");
        assert_eq!(entry.generic_name.as_deref(), Some("Webbrowser"));
        // Suffixes outside the preference list are not kept.
        assert_eq!(entry.names.get("fr_FR"), None);

        let entry =
            parse_desktop_entry(FIREFOX, &LocaleSuffixes::new("fr_FR"), Quirks::default())
                .unwrap();
        assert_eq!(entry.name, "Renard de feu");
        assert_eq!(entry.generic_name.as_deref(), Some("Web Browser"));
    }

    #[test]
    fn other_groups_are_ignored() {
        let entry = parse(FIREFOX).unwrap();
        assert_ne!(entry.exec, "firefox --new-window");
    }

    #[test]
    fn missing_name() {
        let err = parse("[Desktop Entry]\nExec=true\n").unwrap_err();
        assert!(matches!(err, EntryError::MissingKey("Name")));
        let err = parse("[Desktop Entry]\nName=Only a name\n").unwrap_err();
        assert!(matches!(err, EntryError::MissingKey("Exec")));
    }

    #[test]
    fn hidden_entry_needs_nothing_else() {
        let entry = parse("[Desktop Entry]\nHidden=true\n").unwrap();
        assert!(entry.hidden);
        assert!(entry.name.is_empty());
    }

    #[test]
    fn malformed_boolean() {
        let err = parse("[Desktop Entry]\nName=a\nExec=a\nTerminal=yes\n").unwrap_err();
        assert!(matches!(err, EntryError::InvalidBool { ref key, .. } if key == "Terminal"));
    }

    #[test]
    fn malformed_list() {
        let err = parse("[Desktop Entry]\nName=a\nExec=a\nOnlyShowIn=GNOME;\\\n").unwrap_err();
        assert!(matches!(err, EntryError::InvalidList { .. }));
    }

    #[test]
    fn list_escapes() {
        assert_eq!(
            parse_list("K", r"a\;b;;c\sd;").unwrap(),
            vec!["a;b", "c d"]
        );
    }

    #[test]
    fn string_escapes_apply_before_exec_parsing() {
        let entry = parse("[Desktop Entry]\nName=a\\sb\nExec=sh -c \"echo \\\\$HOME\"\n").unwrap();
        assert_eq!(entry.name, "a b");
        assert_eq!(entry.exec, r#"sh -c "echo \$HOME""#);
    }

    #[test]
    fn invalid_exec_rejects_entry() {
        let err = parse("[Desktop Entry]\nName=a\nExec=wine C:\\\\\\\\x\n").unwrap_err();
        assert!(matches!(err, EntryError::InvalidExec(ExecError::UnquotedEscape { offset: 8 })));

        let wine = Quirks {
            wine_escaping: true,
            multiple_spaces: false,
        };
        let entry = parse_desktop_entry(
            "[Desktop Entry]\nName=a\nExec=wine C:\\\\\\\\x\n",
            &LocaleSuffixes::default(),
            wine,
        )
        .unwrap();
        assert_eq!(entry.exec, r"wine C:\\x");
    }

    #[test]
    fn reports_unreadable_file() {
        let err = read_desktop_file(
            Path::new("/nonexistent/dir/app.desktop"),
            &LocaleSuffixes::default(),
            Quirks::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EntryError::Io(_)));
    }
}
