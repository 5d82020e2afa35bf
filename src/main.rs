use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sourcewise::config::{Config, ConfigOverrides};
use sourcewise::market::Catalog;
use sourcewise::negotiation::Orchestrator;
use sourcewise::output::json::render_json;
use sourcewise::output::table::{render_candidates_table, render_report, render_solution_table};
use sourcewise::server::{build_session, run_server};
use sourcewise::solver::{solve, Pins};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "sourcewise",
    about = "Budget-constrained procurement planning and negotiation"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Catalog JSON with required items and market offers; the built-in
    /// sample is used when omitted.
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[arg(short, long, default_value_t = 6000.0)]
    budget: f64,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(long = "price-weight")]
    price_weight: Option<f64>,
    #[arg(long = "delivery-weight")]
    delivery_weight: Option<f64>,
    #[arg(long = "quality-weight")]
    quality_weight: Option<f64>,
    #[arg(long = "partner-url")]
    partner_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find the best plan within the budget.
    Plan {
        /// Lock a category to an exact offer, e.g. --pin "Desk=Rapid Desk".
        /// Repeatable; the solver re-balances only the unpinned categories.
        #[arg(long = "pin", value_parser = parse_pin)]
        pins: Vec<(String, String)>,
    },
    /// Find a plan, show every candidate with the chosen ones flagged.
    Search,
    /// Run the full process: plan, negotiate prices, re-plan, report.
    Negotiate,
    /// Run the REST API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

fn parse_pin(raw: &str) -> Result<(String, String), String> {
    let Some((category, offer)) = raw.split_once('=') else {
        return Err("expected CATEGORY=OFFER".to_string());
    };
    if category.trim().is_empty() || offer.trim().is_empty() {
        return Err("expected CATEGORY=OFFER".to_string());
    }
    Ok((category.trim().to_string(), offer.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        price_weight: cli.price_weight,
        delivery_weight: cli.delivery_weight,
        quality_weight: cli.quality_weight,
        partner_url: cli.partner_url.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        if *init {
            Config::write_template(&config_path)?;
            println!("Wrote config template to {}", config_path.display());
        }
        if *show || !*init {
            println!("{}", render_json(&config)?);
        }
        return Ok(());
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::sample(),
    };
    let weights = config.preference_weights()?;

    match &cli.command {
        Commands::Plan { pins } => {
            let pins: Pins = pins.iter().cloned().collect();
            let solution = solve(
                &catalog.items,
                &catalog.offers,
                &weights,
                cli.budget,
                if pins.is_empty() { None } else { Some(&pins) },
            )?;
            match solution {
                Some(solution) => match cli.output {
                    OutputFormat::Table => {
                        println!("{}", render_solution_table(&catalog.items, &solution));
                    }
                    OutputFormat::Json => println!("{}", render_json(&solution)?),
                },
                None => println!("No procurement plan fits the budget of ${:.2}.", cli.budget),
            }
        }
        Commands::Search => {
            let found =
                Orchestrator::search(&catalog.items, &catalog.offers, &weights, cli.budget)?;
            match found {
                Some((solution, offers)) => match cli.output {
                    OutputFormat::Table => {
                        println!("{}", render_candidates_table(&offers));
                        println!("{}", render_solution_table(&catalog.items, &solution));
                    }
                    OutputFormat::Json => println!("{}", render_json(&(solution, offers))?),
                },
                None => println!("No procurement plan fits the budget of ${:.2}.", cli.budget),
            }
        }
        Commands::Negotiate => {
            let orchestrator = Orchestrator::new(build_session(&config), config.negotiation_policy());
            let report = orchestrator
                .run_full_process(&catalog.items, &catalog.offers, &weights, cli.budget)
                .await?;
            match report {
                Some(report) => match cli.output {
                    OutputFormat::Table => println!("{}", render_report(&catalog.items, &report)),
                    OutputFormat::Json => println!("{}", render_json(&report)?),
                },
                None => println!("No procurement plan fits the budget of ${:.2}.", cli.budget),
            }
        }
        Commands::Config { .. } | Commands::Serve { .. } => unreachable!("handled before dispatch"),
    }

    Ok(())
}
