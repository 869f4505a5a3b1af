//! Vanguard CLI
//!
//! Command-line interface for the Vanguard telemetry simulator.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use vanguard::config::LoggingConfig;
use vanguard::datadog::{AlertType, DatadogClient, EventPayload};
use vanguard::environment::{self, EnvironmentFeed};
use vanguard::models::{MonitorDefinition, EMITTED_METRICS};
use vanguard::simulator::Simulator;
use vanguard::sink::{self, Transport};
use vanguard::Config;

/// Vanguard - Synthetic Raspberry Pi telemetry for Datadog
#[derive(Parser)]
#[command(name = "vanguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "VANGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit simulated telemetry forever
    Run {
        /// Pause between iterations (e.g. "15s", "1m")
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,

        /// Where to send gauges
        #[arg(long, value_enum)]
        transport: Option<Transport>,

        /// Fixed RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Emit a single iteration and exit
    Once {
        /// Where to send gauges
        #[arg(long, value_enum)]
        transport: Option<Transport>,
    },

    /// Poll flood, weather and seismic sources once and emit their gauges
    Environment {
        /// Where to send gauges
        #[arg(long, value_enum)]
        transport: Option<Transport>,

        /// Latitude for the weather lookup
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<f64>,

        /// Longitude for the weather lookup
        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<f64>,
    },

    /// Validate the configured Datadog API key
    Check,

    /// Post an event to the Datadog event stream
    Event {
        /// Event title
        #[arg(long)]
        title: String,

        /// Event body
        #[arg(long)]
        text: String,

        /// Event severity
        #[arg(long, value_enum, default_value = "info")]
        alert_type: AlertType,
    },

    /// Inspect and import monitor definitions
    Monitor {
        #[command(subcommand)]
        command: MonitorCommands,
    },
}

#[derive(Subcommand)]
enum MonitorCommands {
    /// Print a monitor definition
    Show {
        /// Monitor JSON file (the built-in connectivity monitor if omitted)
        path: Option<PathBuf>,
    },

    /// Check a monitor definition against the emitted metrics
    Validate {
        /// Monitor JSON file (the built-in connectivity monitor if omitted)
        path: Option<PathBuf>,
    },

    /// Create the monitor in Datadog
    Import {
        /// Monitor JSON file (the built-in connectivity monitor if omitted)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Run {
            interval,
            transport,
            seed,
        } => run_simulator(config, interval, transport, seed).await,
        Commands::Once { transport } => run_once(config, transport).await,
        Commands::Environment {
            transport,
            latitude,
            longitude,
        } => run_environment(config, transport, latitude, longitude).await,
        Commands::Check => run_check(&config).await,
        Commands::Event {
            title,
            text,
            alert_type,
        } => run_event(&config, title, text, alert_type).await,
        Commands::Monitor { command } => run_monitor(&config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_simulator(
    mut config: Config,
    interval: Option<Duration>,
    transport: Option<Transport>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(interval) = interval {
        config.simulator.interval = interval;
    }
    if let Some(transport) = transport {
        config.simulator.transport = transport;
    }
    if seed.is_some() {
        config.simulator.seed = seed;
    }
    config.validate()?;

    let sink = sink::connect(config.simulator.transport, &config).await?;
    let mut simulator = Simulator::new(sink, &config.simulator);

    tokio::select! {
        result = simulator.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down...");
        }
    }

    Ok(())
}

async fn run_once(mut config: Config, transport: Option<Transport>) -> anyhow::Result<()> {
    if let Some(transport) = transport {
        config.simulator.transport = transport;
    }

    let sink = sink::connect(config.simulator.transport, &config).await?;
    let mut simulator = Simulator::new(sink, &config.simulator);
    simulator.tick().await?;

    Ok(())
}

async fn run_environment(
    mut config: Config,
    transport: Option<Transport>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(transport) = transport {
        config.simulator.transport = transport;
    }
    if let Some(latitude) = latitude {
        config.environment.latitude = latitude;
    }
    if let Some(longitude) = longitude {
        config.environment.longitude = longitude;
    }
    config.validate()?;

    let feed = EnvironmentFeed::new(&config.environment)?;
    let sink = sink::connect(config.simulator.transport, &config).await?;
    let events = if config.datadog.api_key.is_some() {
        Some(DatadogClient::new(&config.datadog)?)
    } else {
        warn!("No Datadog API key; alerts will only be logged");
        None
    };

    let data = feed.fetch().await;
    environment::report(&data, sink.as_ref(), events.as_ref()).await?;
    println!("{}", data.status_line());

    Ok(())
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let client = DatadogClient::new(&config.datadog)?;
    info!(base_url = client.base_url(), "Validating API key");

    if client.validate().await? {
        println!("API key is valid ({})", client.base_url());
        Ok(())
    } else {
        bail!("Datadog rejected the API key")
    }
}

async fn run_event(
    config: &Config,
    title: String,
    text: String,
    alert_type: AlertType,
) -> anyhow::Result<()> {
    let client = DatadogClient::new(&config.datadog)?;
    client
        .post_event(&EventPayload::new(title, text, alert_type))
        .await?;

    println!("Event posted");
    Ok(())
}

async fn run_monitor(config: &Config, command: MonitorCommands) -> anyhow::Result<()> {
    match command {
        MonitorCommands::Show { path } => {
            let monitor = load_monitor(path.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&monitor)?);
        }
        MonitorCommands::Validate { path } => {
            let monitor = load_monitor(path.as_deref())?;
            let query = monitor.validate_emitted(&EMITTED_METRICS)?;

            println!("Monitor:   {}", monitor.name);
            println!("Metric:    {}", query.metric);
            println!(
                "Condition: {}({}) {} {}",
                query.time_aggregator, query.window, query.comparator, query.threshold
            );
            println!("No data:   {}", monitor.options.notify_no_data);
            println!("OK");
        }
        MonitorCommands::Import { path } => {
            let monitor = load_monitor(path.as_deref())?;
            monitor.validate()?;

            if monitor.id.is_some() {
                warn!("Ignoring exported monitor id; Datadog assigns a new one");
            }

            let client = DatadogClient::new(&config.datadog)?;
            let id = client.create_monitor(&monitor).await?;
            println!("Created monitor {id}: {}", monitor.name);
        }
    }

    Ok(())
}

fn load_monitor(path: Option<&Path>) -> anyhow::Result<MonitorDefinition> {
    let Some(path) = path else {
        return Ok(MonitorDefinition::connectivity_lost()?);
    };

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading monitor file {}", path.display()))?;
    Ok(MonitorDefinition::from_json(&json)?)
}
