use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use colored::Colorize;
use rorm::{Context, InMemoryHashStore, Orm, OrmConfig};

use crate::cli::{Cli, Command, ConfigAction, ConfigArgs, DemoArgs, OutputFormat};
use crate::demo::{self, Step};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Config(args) => cmd_config(args, cli.format),
        Command::Demo(args) => cmd_demo(args, cli.format).await,
    }
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        ConfigAction::Check { path } => {
            let config = load_config(&path)?;
            if format == OutputFormat::Text {
                println!("{} {} is valid", "✓".green().bold(), path.display().to_string().bold());
            }
            print_config(&config, format)
        }
        ConfigAction::Default => print_config(&OrmConfig::default(), format),
    }
}

fn load_config(path: &Path) -> anyhow::Result<OrmConfig> {
    OrmConfig::load(path).with_context(|| format!("invalid configuration {}", path.display()))
}

fn print_config(config: &OrmConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

async fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => OrmConfig::default(),
    };
    tracing::debug!(records = args.records, ?config, "starting demo");
    let store = Arc::new(InMemoryHashStore::new());
    let orm = Orm::with_config(store.clone(), config);
    let ctx = Context::from_config(orm.config());

    let steps = demo::run(&orm, &ctx, args.records)
        .await
        .context("demo failed")?;

    match format {
        OutputFormat::Text => {
            for step in &steps {
                print_step(step);
            }
            println!(
                "{} {} keys in store",
                "✓".green().bold(),
                store.len().to_string().bold()
            );
        }
        OutputFormat::Json => {
            let rows: Vec<_> = steps
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "action": s.action,
                        "key": s.key,
                        "detail": s.detail,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

fn print_step(step: &Step) {
    println!(
        "{:>10} {}  {}",
        step.action.cyan().bold(),
        step.key.yellow(),
        step.detail
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_config_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan_count = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn load_config_accepts_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan_count = 50").unwrap();
        assert_eq!(load_config(file.path()).unwrap().scan_count, 50);
    }
}
