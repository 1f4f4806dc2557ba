// ── winprobe ──────────────────────────────────────────────────────────────────
//
// Prints what the winhandle wrappers see on this machine as JSON.  Logs go
// to stderr so stdout stays machine-readable.
#![deny(unsafe_code)]

mod config;
mod report;

#[cfg(windows)]
mod commands;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use report::Result;

#[derive(Debug, Parser)]
#[command(name = "winprobe", version, about = "Inspect Win32 state as JSON")]
struct Cli {
    /// Config file to use instead of %APPDATA%\winprobe\config.json.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print JSON on a single line.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Display monitors with their work areas.
    Monitors,
    /// Every running process.
    Processes,
    /// Modules loaded in a process.
    Modules { pid: u32 },
    /// Known shell folders of the current user.
    Folders,
    /// Icons stored in a file.
    Icon { file: PathBuf },
    /// Open a file, folder or URL with its associated application.
    Open { target: String },
    /// Create a shortcut and print what was stored.
    Shortcut {
        lnk: PathBuf,
        target: PathBuf,
        #[arg(long = "args", value_name = "ARGS", allow_hyphen_values = true)]
        arguments: Option<String>,
    },
    /// One environment variable.
    Env { name: String },
    /// Machine name, processors, memory and uptime.
    System,
    /// The effective configuration.
    Config {
        /// Also write it to the config file.
        #[arg(long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (cfg, problem) = config::load(cli.config.as_deref());
    init_logging(&cfg.log_level);
    config::load_reporting(problem);

    let compact = cli.compact || cfg.compact;
    match run(&cli, &cfg, compact) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// `WINPROBE_LOG` wins over the configured level.
fn init_logging(configured: &str) {
    let filter = EnvFilter::try_from_env("WINPROBE_LOG")
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, cfg: &config::Config, compact: bool) -> Result<String> {
    if let Command::Config { write } = cli.command {
        if write {
            let path = cli
                .config
                .clone()
                .or_else(config::config_path)
                .ok_or(winhandle::Error::Unsupported("APPDATA is not set"))?;
            config::save(cfg, &path).map_err(winhandle::Error::from)?;
        }
        return report::render(cfg, compact);
    }
    dispatch(&cli.command, compact)
}

#[cfg(windows)]
fn dispatch(command: &Command, compact: bool) -> Result<String> {
    commands::run(command, compact)
}

#[cfg(not(windows))]
fn dispatch(_command: &Command, _compact: bool) -> Result<String> {
    Err(winhandle::Error::Unsupported("winprobe commands need Windows").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_precede_the_command() {
        let cli = Cli::try_parse_from(["winprobe", "--compact", "modules", "42"]).unwrap();
        assert!(cli.compact);
        assert!(matches!(cli.command, Command::Modules { pid: 42 }));
    }

    #[test]
    fn shortcut_arguments_may_start_with_a_dash() {
        let cli = Cli::try_parse_from([
            "winprobe", "shortcut", "a.lnk", "C:\\x.exe", "--args", "-v --fast",
        ])
        .unwrap();
        match cli.command {
            Command::Shortcut { arguments, .. } => assert_eq!(arguments.as_deref(), Some("-v --fast")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn modules_needs_a_numeric_pid() {
        assert!(Cli::try_parse_from(["winprobe", "modules", "abc"]).is_err());
    }

    #[test]
    fn config_command_prints_the_effective_config() {
        let cli = Cli::try_parse_from(["winprobe", "config"]).unwrap();
        let text = run(&cli, &config::Config::default(), true).unwrap();
        assert!(text.contains(r#""log_level":"warn""#), "{text}");
    }

    #[test]
    fn config_write_uses_the_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cli = Cli::try_parse_from([
            "winprobe",
            "--config",
            path.to_str().unwrap(),
            "config",
            "--write",
        ])
        .unwrap();
        run(&cli, &config::Config::default(), false).unwrap();
        let (loaded, problem) = config::load(Some(&path));
        assert!(problem.is_none());
        assert_eq!(loaded, config::Config::default());
    }
}
