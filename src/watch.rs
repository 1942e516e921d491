use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use calloop::channel::{channel, Channel, Sender};
use log::{debug, warn};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;

use crate::model::Rank;
use crate::sources::search_path::{desktop_file_id, SearchPath};

/// How changes below the search path are noticed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// inotify, kqueue, ... depending on the platform.
    #[default]
    Native,
    /// Periodic rescans.
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Deleted,
}

/// A desktop file that changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub id: String,
    pub rank: Rank,
    pub kind: ChangeKind,
}

/// Translate a raw notification into changes of desktop files. A path
/// below several search path directories yields one change per directory.
/// The kind is taken from the file system, not from the notification.
pub fn translate(event: &Event, dirs: &[PathBuf]) -> Vec<ChangeEvent> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    let mut changes = Vec::new();
    for path in &event.paths {
        let kind = if path.is_file() {
            ChangeKind::Modified
        } else {
            ChangeKind::Deleted
        };
        for (rank, dir) in dirs.iter().enumerate() {
            if let Some(id) = desktop_file_id(dir, path) {
                changes.push(ChangeEvent { id, rank, kind });
            }
        }
    }
    changes
}

/// Watches every existing search path directory and forwards changes into a
/// calloop channel. Watching stops when this is dropped.
pub struct DirWatcher {
    _watcher: Box<dyn Watcher>,
}

impl DirWatcher {
    pub fn new(
        search_path: &SearchPath,
        backend: Backend,
        poll_interval: Duration,
    ) -> Result<(Self, Channel<ChangeEvent>)> {
        let (tx, rx) = channel();
        let dirs = search_path.dirs().to_vec();
        let handler = move |res: notify::Result<Event>| forward(res, &dirs, &tx);

        let mut watcher: Box<dyn Watcher> = match backend {
            Backend::Native => Box::new(
                RecommendedWatcher::new(handler, Config::default())
                    .context("couldn't set up the file watcher")?,
            ),
            Backend::Poll => Box::new(
                PollWatcher::new(handler, Config::default().with_poll_interval(poll_interval))
                    .context("couldn't set up the polling file watcher")?,
            ),
        };

        for dir in search_path.dirs() {
            if !dir.is_dir() {
                debug!("Not watching missing directory {:?}", dir);
                continue;
            }
            if let Err(err) = watcher.watch(dir, RecursiveMode::Recursive) {
                warn!("Couldn't watch {:?}: {}", dir, err);
            }
        }
        Ok((Self { _watcher: watcher }, rx))
    }
}

fn forward(res: notify::Result<Event>, dirs: &[PathBuf], tx: &Sender<ChangeEvent>) {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            warn!("File watcher error: {}", err);
            return;
        }
    };
    for change in translate(&event, dirs) {
        debug!("Watcher: {:?}", change);
        if tx.send(change).is_err() {
            return;
        }
    }
}
