//! Minimal client for i3's IPC interface, used to run commands through the
//! window manager instead of executing them directly.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, ensure, Context, Result};
use log::debug;
use serde::Deserialize;

const MAGIC: &[u8] = b"i3-ipc";
const RUN_COMMAND: u32 = 0;
const HEADER_LEN: usize = MAGIC.len() + 8;

#[derive(Debug, Deserialize)]
struct CommandReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Socket from `$I3SOCK`, falling back to `i3 --get-socketpath`.
pub fn socket_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("I3SOCK").filter(|path| !path.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let output = Command::new("i3")
        .arg("--get-socketpath")
        .output()
        .context("couldn't run i3 --get-socketpath. Is i3 running?")?;
    ensure!(output.status.success(), "i3 --get-socketpath failed");
    let path = String::from_utf8(output.stdout)?.trim().to_string();
    ensure!(!path.is_empty(), "i3 --get-socketpath returned nothing");
    Ok(PathBuf::from(path))
}

fn encode(message_type: u32, payload: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_LEN + payload.len());
    message.extend_from_slice(MAGIC);
    message.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    message.extend_from_slice(&message_type.to_ne_bytes());
    message.extend_from_slice(payload.as_bytes());
    message
}

/// i3 `exec` command running `command` through `/bin/sh`.
fn exec_command(command: &str) -> String {
    let escaped = command.replace('\\', "\\\\").replace('"', "\\\"");
    format!("exec \"{escaped}\"")
}

/// Ask i3 to execute `command`.
pub fn exec(socket: &Path, command: &str) -> Result<()> {
    let payload = exec_command(command);
    debug!("Sending {:?} to i3 at {:?}", payload, socket);

    let mut stream = UnixStream::connect(socket)
        .with_context(|| format!("couldn't connect to i3 at {:?}", socket))?;
    stream.write_all(&encode(RUN_COMMAND, &payload))?;

    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header)?;
    ensure!(&header[..MAGIC.len()] == MAGIC, "i3 sent a malformed reply");
    let length = u32::from_ne_bytes(header[MAGIC.len()..MAGIC.len() + 4].try_into()?) as usize;
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body)?;

    let replies: Vec<CommandReply> = serde_json::from_slice(&body)?;
    for reply in replies {
        if !reply.success {
            bail!(
                "i3 refused to run the command: {}",
                reply.error.unwrap_or_default()
            );
        }
    }
    Ok(())
}
