pub mod commands;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "reviva",
    about = "Reviva operator CLI",
    long_about = "Operate the Reviva repair engine: migrations, catalog seeding, config inspection, and one-off quotes.",
    after_help = "Examples:\n  reviva migrate\n  reviva seed\n  reviva quote --device macbook-air-m3 --repair screen-repair --urgency urgent"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the reference repair catalog (devices, repair types, pricing rules)")]
    Seed {
        #[arg(long, help = "Drop the reference catalog rows first, discarding local edits to them")]
        reset: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Price a repair against the stored catalog without opening a ticket")]
    Quote {
        #[arg(long, help = "Device model id, e.g. macbook-air-m3")]
        device: String,
        #[arg(long, help = "Repair type id, e.g. screen-repair")]
        repair: String,
        #[arg(long, default_value = "standard", help = "standard|high|urgent|emergency")]
        urgency: String,
        #[arg(long, help = "Market demand multiplier applied to labor")]
        market_demand: Option<Decimal>,
        #[arg(long, help = "Seasonal multiplier applied to labor")]
        seasonal: Option<Decimal>,
        #[arg(long, help = "Complexity multiplier applied to labor")]
        complexity: Option<Decimal>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { reset } => commands::seed::run(reset),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Quote { device, repair, urgency, market_demand, seasonal, complexity } => {
            commands::quote::run(commands::quote::QuoteArgs {
                device_id: device,
                repair_type_id: repair,
                urgency,
                market_demand,
                seasonal,
                complexity,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
