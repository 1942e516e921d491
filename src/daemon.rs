//! `--wait-on` mode: stay resident, keep the index current and open the
//! selector whenever something is written to a FIFO.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::process::Child;

use anyhow::{Context, Result};
use calloop::channel::Event as ChannelEvent;
use calloop::generic::Generic;
use calloop::signals::{Signal, Signals};
use calloop::{EventLoop, Interest, Mode, PostAction};
use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::sys::stat;
use nix::unistd::mkfifo;

use crate::config::WatchConfig;
use crate::executor::ExecMode;
use crate::state::AppState;
use crate::watch::DirWatcher;

struct Daemon {
    state: AppState,
    children: Vec<Child>,
    should_exit: bool,
}

/// Create the FIFO at `path` unless something already exists there, and open
/// it for reading and writing so it never reports end of file.
pub fn open_fifo(path: &Path) -> Result<File> {
    match mkfifo(path, stat::Mode::S_IRUSR | stat::Mode::S_IWUSR) {
        Ok(()) => debug!("Created FIFO {:?}", path),
        Err(Errno::EEXIST) => debug!("Reusing {:?}", path),
        Err(err) => return Err(err).with_context(|| format!("couldn't create FIFO {:?}", path)),
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("couldn't open FIFO {:?}", path))
}

/// Collect the exit status of every finished child.
fn reap_children(children: &mut Vec<Child>) {
    children.retain_mut(|child| match child.try_wait() {
        Ok(Some(status)) => {
            debug!("Child {} exited with {}", child.id(), status);
            false
        }
        Ok(None) => true,
        Err(err) => {
            warn!("Couldn't check on child {}: {}", child.id(), err);
            false
        }
    });
}

fn handle_request(daemon: &mut Daemon, byte: u8) {
    if byte == b'q' {
        info!("Received quit request");
        daemon.should_exit = true;
        return;
    }

    let launch = match daemon.state.choose() {
        Ok(Some(launch)) => launch,
        Ok(None) => return,
        Err(err) => {
            error!("Selection failed: {:#}", err);
            return;
        }
    };
    match daemon.state.run(&launch, ExecMode::Detach) {
        Ok(Some(child)) => daemon.children.push(child),
        Ok(None) => {}
        Err(err) => error!("{:#}", err),
    }
}

pub fn run(state: AppState, fifo_path: &Path, watch: &WatchConfig) -> Result<()> {
    let fifo = open_fifo(fifo_path)?;

    let mut event_loop: EventLoop<Daemon> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    // SIGCHLD must be blocked before any helper thread is started.
    let signals = Signals::new(&[Signal::SIGCHLD])?;
    handle
        .insert_source(signals, |_, _, daemon: &mut Daemon| {
            reap_children(&mut daemon.children)
        })
        .map_err(|err| err.error)?;

    let _watcher = match DirWatcher::new(&state.search_path, watch.backend, watch.poll_interval()) {
        Ok((watcher, changes)) => {
            handle
                .insert_source(changes, |event, _, daemon: &mut Daemon| {
                    if let ChannelEvent::Msg(change) = event {
                        if let Err(err) = daemon.state.apply_change(change) {
                            error!("Index is inconsistent: {:#}", err);
                        }
                    }
                })
                .map_err(|err| err.error)?;
            Some(watcher)
        }
        Err(err) => {
            warn!("Desktop files won't be reloaded: {:#}", err);
            None
        }
    };

    handle
        .insert_source(
            Generic::new(fifo, Interest::READ, Mode::Level),
            |_, fifo, daemon: &mut Daemon| {
                let mut reader: &File = fifo.as_ref();
                let mut byte = [0u8; 1];
                if reader.read(&mut byte)? == 1 {
                    handle_request(daemon, byte[0]);
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| err.error)?;

    info!("Waiting for requests on {:?}", fifo_path);
    let mut daemon = Daemon {
        state,
        children: Vec::new(),
        should_exit: false,
    };
    while !daemon.should_exit {
        match event_loop.dispatch(None, &mut daemon) {
            Ok(()) => {}
            Err(calloop::Error::IoError(err)) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err).context("event loop failed"),
        }
    }
    Ok(())
}
