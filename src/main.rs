//! Pine Script to Python strategy converter.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pine2py_lib::commands;
use pine2py_lib::models::config::ConverterConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "pine2py")]
#[command(about = "Convert Pine Script strategies to Python", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a script to a Python strategy class
    Convert {
        /// Script file (reads stdin when omitted)
        script: Option<PathBuf>,

        /// Write strategy.py into this directory instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Converter config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the recognised strategy natively over a candle CSV
    Backtest {
        /// Script file
        script: PathBuf,

        /// Candle CSV with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// Starting cash (overrides the config value)
        #[arg(long)]
        capital: Option<f64>,

        /// Also write the trade ledger to this CSV
        #[arg(short, long)]
        trades: Option<PathBuf>,

        /// Also write the report to this JSON file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Converter config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the sample RSI + EMA script
    Sample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pine2py_lib::init_tracing(&cli.log_level);

    match cli.command {
        Commands::Convert { script, out, config } => {
            let config = load_config(config.as_deref())?;
            let source = read_script(script.as_deref())?;
            let output = commands::convert_script(&source, &config);

            match out {
                Some(dir) => {
                    let payload = commands::download_payload(&output.code, &config);
                    let path = commands::save_download(&payload, &dir)?;
                    info!("Saved {}", path.display());
                    println!("{}", path.display());
                }
                None => print!("{}", output.code),
            }
        }

        Commands::Backtest {
            script,
            data,
            capital,
            trades,
            report: report_path,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(capital) = capital {
                config.initial_capital = capital;
                config.validate()?;
            }
            let source = read_script(Some(&script))?;
            let report = commands::preview_backtest(&source, &data, &config)?;

            commands::save_backtest_outputs(&report, trades.as_deref(), report_path.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Sample => println!("{}", commands::default_script()),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    match path {
        Some(path) => ConverterConfig::from_json_path(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ConverterConfig::default()),
    }
}

fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("reading script from stdin")?;
            Ok(source)
        }
    }
}
