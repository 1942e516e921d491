mod cmdline;
mod config;
mod daemon;
mod dmenu;
mod executor;
mod formatter;
mod i3;
mod index;
mod locale;
mod matcher;
mod model;
mod sources;
mod state;
mod watch;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use log::{info, warn, LevelFilter};
use regex::Regex;

use crate::cmdline::assemble::DEFAULT_SHELL;
use crate::cmdline::{LaunchSettings, Quirks};
use crate::config::{load_config, Config};
use crate::dmenu::Dmenu;
use crate::executor::{Channel, ExecMode};
use crate::formatter::Formatter;
use crate::index::{AppIndex, IndexSettings, ViewOptions};
use crate::locale::LocaleSuffixes;
use crate::matcher::CaseMode;
use crate::sources::history::History;
use crate::sources::search_path::SearchPath;
use crate::state::{AppState, Settings};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    #[value(name = "ERROR")]
    Error,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "INFO")]
    Info,
    #[value(name = "DEBUG")]
    Debug,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum QuirkArg {
    /// Accept the backslash escapes Wine writes into Exec keys.
    Wine,
    /// Treat runs of spaces in Exec keys as one separator.
    MultipleSpaces,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Selector command, run through the shell
    #[arg(short, long)]
    dmenu: Option<String>,

    /// Terminal emulator used for Terminal=true applications
    #[arg(short, long)]
    term: Option<String>,

    /// Honor OnlyShowIn/NotShowIn using $XDG_CURRENT_DESKTOP
    #[arg(short = 'x', long)]
    use_xdg_de: bool,

    /// Append the executable to every name
    #[arg(short = 'b', long, conflicts_with = "display_binary_base")]
    display_binary: bool,

    /// Append the basename of the executable to every name
    #[arg(short = 'f', long)]
    display_binary_base: bool,

    /// Don't offer generic names
    #[arg(long)]
    no_generic: bool,

    /// Keep usage counts in this file and list frequent choices first
    #[arg(long)]
    usage_log: Option<PathBuf>,

    /// Stay resident and open the selector whenever this FIFO is written to
    #[arg(long)]
    wait_on: Option<PathBuf>,

    /// Print the command instead of running it
    #[arg(long)]
    no_exec: bool,

    /// Program the final command is passed to (e.g. "systemd-run --user")
    #[arg(long)]
    wrapper: Option<String>,

    /// Match names case-insensitively
    #[arg(short = 'i', long)]
    case_insensitive: bool,

    /// Run commands through i3's IPC interface
    #[arg(short = 'I', long)]
    i3_ipc: bool,

    /// Allow wrappers that look like i3-msg
    #[arg(long)]
    skip_i3_exec_check: bool,

    /// Workarounds for broken Exec keys
    #[arg(long, value_enum, value_delimiter = ',')]
    desktop_file_quirks: Vec<QuirkArg>,

    /// More output (-v info, -vv debug)
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,

    /// Log level, overrides -v
    #[arg(long, value_enum, ignore_case = true)]
    log_level: Option<LogLevel>,

    /// Config file to use instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging(args: &Args) {
    let level = match (args.log_level, args.verbose) {
        (Some(LogLevel::Error), _) => LevelFilter::Error,
        (Some(LogLevel::Warning), _) => LevelFilter::Warn,
        (Some(LogLevel::Info), _) => LevelFilter::Info,
        (Some(LogLevel::Debug), _) => LevelFilter::Debug,
        (None, 0) => LevelFilter::Warn,
        (None, 1) => LevelFilter::Info,
        (None, _) => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn quirks(args: &Args, config: &Config) -> Quirks {
    let mut quirks = Quirks {
        wine_escaping: config.quirks.wine_escaping,
        multiple_spaces: config.quirks.multiple_spaces,
    };
    for quirk in &args.desktop_file_quirks {
        match quirk {
            QuirkArg::Wine => quirks.wine_escaping = true,
            QuirkArg::MultipleSpaces => quirks.multiple_spaces = true,
        }
    }
    quirks
}

fn desktop_envs(enabled: bool) -> Vec<String> {
    if !enabled {
        info!("Desktop environment detection is turned off (-x hasn't been specified).");
        return Vec::new();
    }
    let envs: Vec<String> = env::var("XDG_CURRENT_DESKTOP")
        .unwrap_or_default()
        .split(':')
        .filter(|de| !de.is_empty())
        .map(str::to_string)
        .collect();
    info!("Found {} desktop environments in $XDG_CURRENT_DESKTOP: {:?}", envs.len(), envs);
    envs
}

fn view_options(args: &Args, config: &Config) -> Result<ViewOptions> {
    let formatter = if args.display_binary {
        Formatter::WithBinary
    } else if args.display_binary_base {
        Formatter::WithBinaryBase
    } else {
        config.general.display_binary
    };
    let case = if args.case_insensitive || config.general.case_insensitive {
        CaseMode::Insensitive
    } else {
        CaseMode::Sensitive
    };
    let exclude = config
        .filter
        .exclude
        .iter()
        .map(|pattern| {
            Regex::new(pattern).with_context(|| format!("invalid exclude pattern {:?}", pattern))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ViewOptions {
        formatter,
        case,
        generic: !(args.no_generic || config.general.no_generic),
        exclude,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_config(args.config.as_deref())?;

    let wrapper = args.wrapper.clone().or_else(|| config.general.wrapper.clone());
    if !args.skip_i3_exec_check && wrapper.as_deref().is_some_and(|w| w.contains("i3")) {
        bail!(
            "Usage of an i3 wrapper has been detected! Please use the -I flag instead. \
             (--skip-i3-exec-check disables this check.)"
        );
    }
    let channel = if args.i3_ipc {
        Channel::I3(i3::socket_path()?)
    } else {
        Channel::Direct
    };

    let shell = env::var("SHELL")
        .ok()
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string());
    let dmenu_command = args.dmenu.clone().unwrap_or_else(|| config.general.dmenu.clone());

    let settings = Settings {
        dmenu: Dmenu::new(&dmenu_command, &shell),
        launch: LaunchSettings {
            shell,
            terminal: args.term.clone().unwrap_or_else(|| config.general.terminal.clone()),
            wrapper,
        },
        view: view_options(&args, &config)?,
        no_exec: args.no_exec,
        channel,
    };

    let search_path = SearchPath::from_env();
    info!("Found {} directories in search path: {:?}", search_path.dirs().len(), search_path.dirs());
    search_path.warn_about_duplicates();

    let mut index = AppIndex::new(IndexSettings {
        locales: LocaleSuffixes::from_env(),
        quirks: quirks(&args, &config),
        desktop_envs: desktop_envs(args.use_xdg_de || config.general.use_xdg_de),
    });
    let report = index.load(&search_path);
    if cfg!(debug_assertions) {
        index.check_inner_state()?;
    }
    let summary = report.summary(index.count());
    eprintln!("{summary}");
    info!("{summary}");
    let failures = report.failure_lines();
    if !failures.is_empty() {
        warn!("Skipped {} broken desktop files:\n  {}", failures.len(), failures.join("\n  "));
    }

    let history = args
        .usage_log
        .clone()
        .or_else(|| config.general.usage_log.clone())
        .map(|path| History::load(&path));

    let mut state = AppState::new(settings, index, search_path, history);

    if let Some(fifo) = &args.wait_on {
        return daemon::run(state, fifo, &config.watch);
    }

    let Some(launch) = state.choose()? else {
        info!("No application has been selected, exiting...");
        return Ok(());
    };
    state.run(&launch, ExecMode::Replace)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quirk_list_is_comma_separated() {
        let args = Args::parse_from(["dmenu-runner", "--desktop-file-quirks", "wine,multiple-spaces"]);
        let quirks = quirks(&args, &Config::default());
        assert!(quirks.wine_escaping);
        assert!(quirks.multiple_spaces);
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.general.display_binary = Formatter::WithBinary;
        config.filter.exclude = vec!["^Wine".to_string()];

        let args = Args::parse_from(["dmenu-runner", "-f", "-i", "--no-generic"]);
        let options = view_options(&args, &config).unwrap();
        assert_eq!(options.formatter, Formatter::WithBinaryBase);
        assert_eq!(options.case, CaseMode::Insensitive);
        assert!(!options.generic);
        assert_eq!(options.exclude.len(), 1);

        let options = view_options(&Args::parse_from(["dmenu-runner"]), &config).unwrap();
        assert_eq!(options.formatter, Formatter::WithBinary);
        assert!(options.generic);
    }

    #[test]
    fn bad_exclude_pattern_is_an_error() {
        let mut config = Config::default();
        config.filter.exclude = vec!["(".to_string()];
        assert!(view_options(&Args::parse_from(["dmenu-runner"]), &config).is_err());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let args = Args::parse_from(["dmenu-runner", "--log-level", "debug", "-vv"]);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(args.verbose, 2);
        assert!(Args::try_parse_from(["dmenu-runner", "--log-level", "LOUD"]).is_err());
    }
}
