use std::path::Path;

use log::debug;

use super::exec_key::{ExecError, ExecParser, Quirks};
use super::quote::sq_quote;

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Script used by [`wrap_in_wrapper`]. `$wrap` is left unquoted so a
/// wrapper like `systemd-run --user` is split into words.
const WRAPPER_SCRIPT: &str = "wrap=\"$1\"; shift; $wrap \"$@\"";

/// Values substituted for `%c`, `%k` and `%i`.
#[derive(Debug, Clone, Copy)]
pub struct FieldValues<'a> {
    pub name: &'a str,
    pub location: &'a Path,
    pub icon: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Arg(String),
    /// Where the user-supplied arguments go (`%f`, `%F`, `%u`, `%U`).
    UserArgs,
}

fn expand_arg(arg: &str, fields: &FieldValues<'_>, out: &mut Vec<Piece>) {
    match arg {
        "%f" | "%F" | "%u" | "%U" => {
            out.push(Piece::UserArgs);
            return;
        }
        // Deprecated codes.
        "%d" | "%D" | "%n" | "%N" | "%v" | "%m" => return,
        "%i" => {
            if let Some(icon) = fields.icon.filter(|icon| !icon.is_empty()) {
                out.push(Piece::Arg("--icon".to_string()));
                out.push(Piece::Arg(icon.to_string()));
            }
            return;
        }
        _ => {}
    }

    let mut result = String::with_capacity(arg.len());
    let mut chars = arg.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => result.push('%'),
            Some('c') => result.push_str(fields.name),
            Some('k') => result.push_str(&fields.location.to_string_lossy()),
            // Embedded file/url/icon codes and deprecated codes expand to nothing.
            Some(_) => {}
            None => result.push('%'),
        }
    }
    out.push(Piece::Arg(result));
}

/// Build the shell command for a desktop entry's `Exec` template.
///
/// Arguments of the template are quoted. `user_args` are inserted unquoted
/// (the shell splits them) at the first file/url field code, or appended
/// when the template has none.
pub fn application_command(
    exec: &str,
    fields: &FieldValues<'_>,
    user_args: &str,
    quirks: Quirks,
) -> Result<String, ExecError> {
    let mut parser = ExecParser::new(quirks);
    let args = parser.split(exec)?;
    if !parser.advisories().is_empty() {
        debug!("Quirks {:?} were needed for {:?}", parser.advisories(), exec);
    }

    let mut pieces = Vec::with_capacity(args.len());
    for arg in &args {
        expand_arg(arg, fields, &mut pieces);
    }

    let user_args = user_args.trim();
    let mut inserted = user_args.is_empty();
    let mut rendered: Vec<String> = Vec::with_capacity(pieces.len() + 1);
    for piece in pieces {
        match piece {
            Piece::Arg(arg) => rendered.push(sq_quote(&arg)),
            Piece::UserArgs if !inserted => {
                rendered.push(user_args.to_string());
                inserted = true;
            }
            Piece::UserArgs => {}
        }
    }
    if !inserted {
        rendered.push(user_args.to_string());
    }
    Ok(rendered.join(" "))
}

/// `true` becomes `["/bin/sh", "-c", "true"]`.
pub fn wrap_in_shell(shell: &str, command: &str) -> Vec<String> {
    vec![shell.to_string(), "-c".to_string(), command.to_string()]
}

/// Run `command` through `shell` inside a terminal emulator.
pub fn wrap_in_terminal(terminal: &str, shell: &str, command: &str) -> Vec<String> {
    vec![
        terminal.to_string(),
        "-e".to_string(),
        shell.to_string(),
        "-c".to_string(),
        command.to_string(),
    ]
}

/// Pass `command` to `wrapper` without re-quoting any of its arguments.
///
/// The outer shell gets the wrapper and the original argv as positional
/// parameters, shifts the wrapper off and runs it with `"$@"`.
pub fn wrap_in_wrapper(command: &[String], wrapper: &str) -> Vec<String> {
    let mut result = vec![
        DEFAULT_SHELL.to_string(),
        "-c".to_string(),
        WRAPPER_SCRIPT.to_string(),
        DEFAULT_SHELL.to_string(),
        wrapper.to_string(),
    ];
    result.extend(command.iter().cloned());
    result
}

/// How a rendered command gets turned into a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub shell: String,
    pub terminal: String,
    pub wrapper: Option<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            terminal: "i3-sensible-terminal".to_string(),
            wrapper: None,
        }
    }
}

impl LaunchSettings {
    /// Final argument vector for `command`.
    ///
    /// Commands coming from desktop entries are a single command and get
    /// `exec` prepended so the shell is replaced. Custom commands typed by the
    /// user may be arbitrary shell code and are left alone.
    pub fn argv(&self, command: &str, custom: bool, terminal: bool) -> Vec<String> {
        let command = if custom {
            command.to_string()
        } else {
            format!("exec {command}")
        };
        let argv = if terminal {
            wrap_in_terminal(&self.terminal, &self.shell, &command)
        } else {
            wrap_in_shell(&self.shell, &command)
        };
        match &self.wrapper {
            Some(wrapper) => wrap_in_wrapper(&argv, wrapper),
            None => argv,
        }
    }
}
