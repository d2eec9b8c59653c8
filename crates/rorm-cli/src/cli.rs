use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rorm",
    about = "Typed records over hash key-value stores",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect engine configuration
    Config(ConfigArgs),
    /// Run create, find, scan, update and association against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Parse and validate a TOML configuration file
    Check { path: PathBuf },
    /// Print the default configuration
    Default,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Number of user records to seed
    #[arg(short = 'n', long, default_value = "3")]
    pub records: usize,
    /// Engine configuration applied to the demo
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_check() {
        let cli = Cli::try_parse_from(["rorm", "config", "check", "rorm.toml"]).unwrap();
        match cli.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Check { path },
            }) => assert_eq!(path, PathBuf::from("rorm.toml")),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn parse_config_default() {
        let cli = Cli::try_parse_from(["rorm", "config", "default"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigArgs {
                action: ConfigAction::Default
            })
        ));
    }

    #[test]
    fn parse_demo_defaults() {
        let cli = Cli::try_parse_from(["rorm", "demo"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.records, 3);
            assert!(args.config.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_demo_records() {
        let cli = Cli::try_parse_from(["rorm", "demo", "--records", "7"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.records, 7);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["rorm", "--verbose", "demo"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["rorm", "--format", "json", "config", "default"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn config_requires_action() {
        assert!(Cli::try_parse_from(["rorm", "config"]).is_err());
    }
}
