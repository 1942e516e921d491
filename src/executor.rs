use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, info};
use nix::unistd::setsid;

use crate::cmdline::quote::argv_to_string;
use crate::i3;

/// Where the final command goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Execute the argument vector directly.
    Direct,
    /// Hand the command to i3 over the IPC socket at this path.
    I3(PathBuf),
}

/// Whether the launcher itself is replaced or the program runs as a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Replace,
    Detach,
}

/// A fully assembled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub argv: Vec<String>,
    /// Display name to record in the usage log; `None` for custom commands.
    pub history_name: Option<String>,
    pub working_dir: Option<PathBuf>,
}

fn build_command(launch: &Launch) -> Result<Command> {
    let (program, args) = launch.argv.split_first().context("tried to execute an empty command")?;
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = launch.working_dir.as_ref().filter(|dir| dir.is_dir()) {
        command.current_dir(dir);
    }
    Ok(command)
}

/// Start the program in its own session so it outlives the launcher. The
/// returned child must be reaped by the caller.
pub fn spawn_detached(launch: &Launch) -> Result<Child> {
    let mut command = build_command(launch)?;
    command.stdin(Stdio::null());
    // SAFETY: setsid is async-signal-safe and doesn't touch the parent's memory.
    unsafe {
        command.pre_exec(|| setsid().map(drop).map_err(io::Error::from));
    }
    command
        .spawn()
        .with_context(|| format!("couldn't execute {}", argv_to_string(&launch.argv)))
}

/// Replace the current process. Only returns on failure.
pub fn exec_replace(launch: &Launch) -> Result<()> {
    let err = build_command(launch)?.exec();
    Err(err).with_context(|| format!("couldn't execute {}", argv_to_string(&launch.argv)))
}

pub fn execute(launch: &Launch, channel: &Channel, mode: ExecMode) -> Result<Option<Child>> {
    let rendered = argv_to_string(&launch.argv);
    info!("Command: {}", rendered);
    match (channel, mode) {
        (Channel::I3(socket), _) => {
            if launch.working_dir.is_some() {
                debug!("Working directory is not supported through i3 IPC");
            }
            i3::exec(socket, &rendered)?;
            Ok(None)
        }
        (Channel::Direct, ExecMode::Replace) => {
            exec_replace(launch)?;
            Ok(None)
        }
        (Channel::Direct, ExecMode::Detach) => spawn_detached(launch).map(Some),
    }
}
