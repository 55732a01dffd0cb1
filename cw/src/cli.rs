//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Clearway - emergency-vehicle traffic clearance coordinator
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Drive the clearway coordination engine from scripted scenarios",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scenario tick by tick and print the final state
    Simulate {
        /// Scenario file (YAML)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Ticks to run; defaults to one past the last scheduled action
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Space ticks by the configured tick interval in wall time
        #[arg(short, long)]
        realtime: bool,

        /// Append every engine event to this file as JSON lines
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Seed a scenario's signals and units and let the ticker drive them
    Run {
        /// Scenario file (YAML); only signals and units are used
        #[arg(short, long)]
        scenario: PathBuf,

        /// Stop after this many seconds; runs until Ctrl-C when absent
        #[arg(short, long)]
        duration: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Output format for simulate/run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("PLAIN".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_simulate_args() {
        let cli = Cli::try_parse_from([
            "cw",
            "-l",
            "debug",
            "simulate",
            "--scenario",
            "downtown.yml",
            "--ticks",
            "30",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Simulate {
            scenario,
            ticks,
            realtime,
            events,
            format,
        } = cli.command
        else {
            panic!("expected simulate");
        };
        assert_eq!(scenario, PathBuf::from("downtown.yml"));
        assert_eq!(ticks, Some(30));
        assert!(!realtime);
        assert!(events.is_none());
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["cw"]).is_err());
    }
}
