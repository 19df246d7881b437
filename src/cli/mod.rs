pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sdn-node-metrics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Samples OVS flows, ARP cache headroom and pod IPs on an SDN node", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to a YAML sampler config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sample node state on a fixed interval until interrupted")]
    Run {
        #[arg(short, long, help = "Sampling interval in seconds (overrides config)")]
        interval: Option<u64>,

        #[arg(long, help = "Run a single pass and exit")]
        once: bool,
    },
    #[command(about = "Run one sampling pass and print the resulting metrics")]
    Sample {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    #[command(about = "List the metrics this node exposes")]
    Catalog {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_interval() {
        let cli = Cli::try_parse_from(["sdn-node-metrics", "-v", "run", "--interval", "30"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Run { interval, once }) => {
                assert_eq!(interval, Some(30));
                assert!(!once);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_sample_json() {
        let cli =
            Cli::try_parse_from(["sdn-node-metrics", "sample", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Sample {
                format: OutputFormat::Json
            })
        ));
    }
}
