use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::model::Rank;

/// A desktop file found while walking the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopFile {
    pub id: String,
    pub rank: Rank,
    pub path: PathBuf,
}

/// Ordered `applications/` directories; the index of a directory is its rank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `$XDG_DATA_HOME` followed by `$XDG_DATA_DIRS`, each with
    /// `applications/` appended.
    pub fn from_env() -> Self {
        let data_home = env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(".local/share")));
        let data_dirs = env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
        Self::from_parts(data_home, &data_dirs)
    }

    fn from_parts(data_home: Option<PathBuf>, data_dirs: &str) -> Self {
        let mut dirs: Vec<PathBuf> = data_home.into_iter().collect();
        for dir in data_dirs.split(':') {
            let dir = Path::new(dir);
            if dir.is_absolute() {
                dirs.push(dir.to_path_buf());
            } else if !dir.as_os_str().is_empty() {
                debug!("Ignoring relative directory {:?} in $XDG_DATA_DIRS", dir);
            }
        }
        Self::new(dirs.into_iter().map(|dir| dir.join("applications")).collect())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn get(&self, rank: Rank) -> Option<&Path> {
        self.dirs.get(rank).map(PathBuf::as_path)
    }

    pub fn warn_about_duplicates(&self) {
        let unique: HashSet<&PathBuf> = self.dirs.iter().collect();
        if unique.len() != self.dirs.len() {
            warn!("Search path contains duplicate directories!");
        }
    }

    /// Every `*.desktop` file below the search path, directory by directory.
    pub fn collect_files(&self) -> Vec<DesktopFile> {
        let mut files = Vec::new();
        for (rank, dir) in self.dirs.iter().enumerate() {
            let before = files.len();
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        debug!("Skipping unreadable path below {:?}: {}", dir, err);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let Some(id) = desktop_file_id(dir, path) else {
                    continue;
                };
                files.push(DesktopFile {
                    id,
                    rank,
                    path: path.to_path_buf(),
                });
            }
            debug!("Found {} desktop files in {:?}", files.len() - before, dir);
        }
        info!("SearchPath: found {} desktop files", files.len());
        files
    }
}

/// Id of `path` relative to the search path directory `dir`, if `path` is a
/// desktop file below it.
pub fn desktop_file_id(dir: &Path, path: &Path) -> Option<String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("desktop") {
        return None;
    }
    let relative = path.strip_prefix(dir).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builds_from_xdg_variables() {
        let path = SearchPath::from_parts(
            Some(PathBuf::from("/home/u/.local/share")),
            "/usr/local/share:relative::/usr/share",
        );
        assert_eq!(
            path.dirs(),
            &[
                PathBuf::from("/home/u/.local/share/applications"),
                PathBuf::from("/usr/local/share/applications"),
                PathBuf::from("/usr/share/applications"),
            ]
        );
        assert_eq!(path.get(2), Some(Path::new("/usr/share/applications")));
        assert_eq!(path.get(3), None);
    }

    #[test]
    fn ids_are_relative() {
        let dir = Path::new("/usr/share/applications");
        assert_eq!(
            desktop_file_id(dir, Path::new("/usr/share/applications/kde/konsole.desktop")),
            Some("kde/konsole.desktop".to_string())
        );
        assert_eq!(
            desktop_file_id(dir, Path::new("/usr/share/applications/readme.txt")),
            None
        );
        assert_eq!(desktop_file_id(dir, Path::new("/opt/other/x.desktop")), None);
    }

    #[test]
    fn collects_recursively_with_ranks() {
        let high = tempfile::tempdir().unwrap();
        let low = tempfile::tempdir().unwrap();
        fs::create_dir(high.path().join("sub")).unwrap();
        fs::write(high.path().join("a.desktop"), "").unwrap();
        fs::write(high.path().join("sub/b.desktop"), "").unwrap();
        fs::write(high.path().join("notes.txt"), "").unwrap();
        fs::write(low.path().join("a.desktop"), "").unwrap();

        let path = SearchPath::new(vec![
            high.path().to_path_buf(),
            low.path().to_path_buf(),
            PathBuf::from("/nonexistent/applications"),
        ]);
        let found: Vec<(String, Rank)> = path
            .collect_files()
            .into_iter()
            .map(|file| (file.id, file.rank))
            .collect();
        assert_eq!(
            found,
            vec![
                ("a.desktop".to_string(), 0),
                ("sub/b.desktop".to_string(), 0),
                ("a.desktop".to_string(), 1),
            ]
        );
    }
}
