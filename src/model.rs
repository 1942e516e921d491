use std::collections::BTreeMap;
use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::locale::LocaleSuffixes;

/// Position of a directory in the search path. Lower wins.
pub type Rank = usize;

/// Values of a localizable key, keyed by locale suffix ("" for the plain key).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localized {
    values: BTreeMap<String, String>,
}

impl Localized {
    pub fn insert(&mut self, suffix: &str, value: String) {
        self.values.insert(suffix.to_string(), value);
    }

    pub fn get(&self, suffix: &str) -> Option<&str> {
        self.values.get(suffix).map(String::as_str)
    }

    /// Value for the most specific acceptable suffix.
    pub fn resolve(&self, locales: &LocaleSuffixes) -> Option<&str> {
        locales.suffixes().iter().find_map(|suffix| self.get(suffix))
    }
}

/// One parsed desktop file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    pub names: Localized,
    pub generic_names: Localized,
    /// `names` resolved for the active locale. Empty for hidden entries
    /// without a name.
    pub name: String,
    pub generic_name: Option<String>,
    /// Raw `Exec` template (string escapes already applied).
    pub exec: String,
    pub icon: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub terminal: bool,
    pub hidden: bool,
    pub no_display: bool,
    pub only_show_in: Vec<String>,
    pub not_show_in: Vec<String>,
    pub try_exec: Option<String>,
}

impl DesktopEntry {
    /// Whether this entry should be offered to the user.
    pub fn is_visible(&self, desktop_envs: &[String]) -> bool {
        if self.hidden || self.no_display {
            return false;
        }
        if !self.only_show_in.is_empty()
            && !desktop_envs.iter().any(|de| self.only_show_in.contains(de))
        {
            return false;
        }
        if desktop_envs.iter().any(|de| self.not_show_in.contains(de)) {
            return false;
        }
        match &self.try_exec {
            Some(program) => executable_exists(program),
            None => true,
        }
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// `TryExec` semantics: absolute paths are checked directly, bare names are
/// looked up in `$PATH`.
pub fn executable_exists(program: &str) -> bool {
    if program.contains('/') {
        return is_executable(Path::new(program));
    }
    env::var_os("PATH")
        .map(|path| env::split_paths(&path).any(|dir| is_executable(&dir.join(program))))
        .unwrap_or(false)
}

/// A desktop entry as found in one directory of the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Path relative to the search path directory, e.g. `kde/konsole.desktop`.
    pub id: String,
    pub rank: Rank,
    pub path: PathBuf,
    pub entry: DesktopEntry,
}
