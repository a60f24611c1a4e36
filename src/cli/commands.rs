use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for the pairstat application
#[derive(Parser)]
#[command(author = "Kaipo Chen")]
#[command(version)]
#[command(about = "Analyze per-pair bandwidth and counter logs from network experiments")]
#[command(long_about = "pairstat reads the logs left behind by a multi-pair network experiment: \
one iperf-style bandwidth log per flow and one periodic counter log with interface byte counters \
and CPU jiffies. It extracts interval series, aligns them across flows and reports per-window \
totals and variance.\n\n\
Settings are read from pairstat.toml (or the file named by PAIRSTAT_CONFIG), then from \
PAIRSTAT_* environment variables, then from command-line flags.")]
pub struct Cli {
    /// Settings file to load instead of ./pairstat.toml
    #[arg(short, long, global = true, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Extract the interval series and summary from one bandwidth log
    #[command(about = "Show the interval series of one flow")]
    #[command(long_about = "Parses one bandwidth log and prints every interval report whose window \
matches the sampling interval, followed by the whole-run average.\n\n\
Examples:\n  \
pairstat flow h1.out                        # Use configured interval and duration\n  \
pairstat flow h1.out --interval 1 -d 30     # 1s samples over a 30s run\n  \
pairstat flow h1.out --json                 # Machine-readable output")]
    Flow {
        /// Bandwidth log to parse
        file: PathBuf,

        /// Flow id, defaults to the file stem
        #[arg(long, help = "Flow id (defaults to the file name without extension)")]
        id: Option<String>,

        #[arg(short, long, help = "Sampling interval in seconds")]
        interval: Option<f64>,

        #[arg(short, long, help = "Test duration in seconds")]
        duration: Option<f64>,

        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },

    /// Extract interface rates and CPU shares from one counter log
    #[command(about = "Show interface rates and CPU usage from a counter log")]
    #[command(long_about = "Parses a counter log made of timestamp markers, interface counter \
lines and aggregate CPU lines. Consecutive samples are differenced into per-interface rates \
and per-window CPU shares.\n\n\
Examples:\n  \
pairstat counters packetcount.out                      # Timestamps as logged\n  \
pairstat counters packetcount.out --start-time 1700000000.25")]
    Counters {
        /// Counter log to parse
        file: PathBuf,

        #[arg(short, long, help = "Subtract this value from every timestamp")]
        start_time: Option<f64>,

        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },

    /// Align several bandwidth logs and aggregate them per window
    #[command(about = "Aggregate several flows window by window")]
    #[command(long_about = "Parses every bandwidth log given, aligns the interval series by window \
and prints the total and population variance of each window. Flow ids are taken from the file \
names. The command fails if the flows did not all report the same windows.\n\n\
Examples:\n  \
pairstat aggregate h1.out h2.out h3.out\n  \
pairstat aggregate logs/*.out --interval 1 --duration 60 --json")]
    Aggregate {
        /// Bandwidth logs, one per flow
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        #[arg(short, long, help = "Sampling interval in seconds")]
        interval: Option<f64>,

        #[arg(short, long, help = "Test duration in seconds")]
        duration: Option<f64>,

        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },

    /// Build the full report of one run
    #[command(about = "Report on a complete run: flows, counters and CPU")]
    #[command(long_about = "Combines every flow's bandwidth log with the run's counter log. \
Each --destination maps a flow to the interface whose receive counter measures it, which \
adds a receive-side series per flow and a receive total per window.\n\n\
Examples:\n  \
pairstat run --pairs 2 --flow h1=h1.out --flow h2=h2.out --counters packetcount.out\n  \
pairstat run --pairs 2 --flow h1=h1.out --flow h2=h2.out --counters packetcount.out \\\n    \
--destination h1=s1-eth3 --destination h2=s1-eth4 --json")]
    Run {
        #[arg(short, long, help = "Number of concurrent flows in the run")]
        pairs: usize,

        #[arg(
            short,
            long = "flow",
            required = true,
            value_parser = parse_assignment,
            help = "Flow log as ID=FILE, repeatable"
        )]
        flows: Vec<(String, String)>,

        #[arg(long, help = "Counter log of the run")]
        counters: PathBuf,

        #[arg(
            long = "destination",
            value_parser = parse_assignment,
            help = "Receiving interface of a flow as ID=INTERFACE, repeatable"
        )]
        destinations: Vec<(String, String)>,

        #[arg(short, long, help = "Sampling interval in seconds")]
        interval: Option<f64>,

        #[arg(short, long, help = "Test duration in seconds")]
        duration: Option<f64>,

        #[arg(short, long, help = "Subtract this value from every counter timestamp")]
        start_time: Option<f64>,

        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },
}

/// Parses `KEY=VALUE`, both sides non-empty
pub fn parse_assignment(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() && !val.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("expected ID=VALUE, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("h1=logs/h1.out"),
            Ok(("h1".to_string(), "logs/h1.out".to_string()))
        );
        assert_eq!(
            parse_assignment("h1=a=b"),
            Ok(("h1".to_string(), "a=b".to_string()))
        );
        assert!(parse_assignment("h1").is_err());
        assert!(parse_assignment("=file").is_err());
        assert!(parse_assignment("h1=").is_err());
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "pairstat",
            "run",
            "--pairs",
            "2",
            "--flow",
            "h1=h1.out",
            "--flow",
            "h2=h2.out",
            "--counters",
            "packetcount.out",
            "--destination",
            "h1=s1-eth3",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                pairs,
                flows,
                destinations,
                json,
                ..
            } => {
                assert_eq!(pairs, 2);
                assert_eq!(flows.len(), 2);
                assert_eq!(destinations, vec![("h1".to_string(), "s1-eth3".to_string())]);
                assert!(json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["pairstat", "flow", "h1.out", "--config", "exp.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("exp.toml")));
    }

    #[test]
    fn test_aggregate_requires_files() {
        assert!(Cli::try_parse_from(["pairstat", "aggregate"]).is_err());
    }
}
