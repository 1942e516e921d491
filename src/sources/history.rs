use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Usage counts of selected display names, used to order the selector.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct History {
    pub usage_counts: HashMap<String, u32>,
    #[serde(skip)]
    path: PathBuf,
}

impl History {
    /// Load the history file. A missing or corrupt file gives an empty
    /// history.
    pub fn load(path: &Path) -> History {
        let mut history = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!("Ignoring corrupt usage log {:?}: {}", path, err);
                History::default()
            }),
            Err(err) => {
                debug!("Usage log {:?} not readable ({}), starting empty", path, err);
                History::default()
            }
        };
        history.path = path.to_path_buf();
        history
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("couldn't create directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)
            .with_context(|| format!("couldn't write usage log {:?}", self.path))?;
        Ok(())
    }

    pub fn increment(&mut self, name: &str) -> Result<()> {
        *self.usage_counts.entry(name.to_string()).or_insert(0) += 1;
        self.save()
    }

    /// Names ordered by usage, most used first; ties sorted by name.
    pub fn view(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self
            .usage_counts
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}
