use anyhow::Result;
use clap::{Parser, Subcommand};
use geotweets::app::run_composer;
use geotweets::config::FeedSource;
use geotweets::gesture::{ChannelSensor, KeyboardShakeSensor};
use geotweets::{GeoTweetsApp, GeoTweetsConfig, ResolvedAddress};
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "geotweets")]
#[command(about = "Location-keyed live post feed with geo search and shake to refresh")]
#[command(version)]
#[command(long_about = "Watch and write posts for a location through a real-time store, \
search public posts near a coordinate, or run a local relay that speaks the store's \
REST and event-stream protocol.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "geotweets.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the live feed of a location; lines typed on stdin are posted
    Watch {
        #[arg(long)]
        address_line: String,
        /// State, province or other administrative area naming the partition
        #[arg(long)]
        admin_area: Option<String>,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Search public posts near a coordinate
    Search {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long)]
        address_line: Option<String>,
    },
    /// Run the local relay server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting GeoTweets v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match GeoTweetsConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let exit_code = match args.command {
        Some(Command::Watch {
            address_line,
            admin_area,
            lat,
            lon,
        }) => {
            let mut address = ResolvedAddress::new(address_line, admin_area);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                address = address.with_coordinates(lat, lon);
            }
            run_watch(config, address).await?
        }
        Some(Command::Search {
            lat,
            lon,
            address_line,
        }) => {
            let label = address_line.unwrap_or_else(|| format!("{:.4}, {:.4}", lat, lon));
            let address = ResolvedAddress::new(label, None).with_coordinates(lat, lon);
            run_search(config, address).await?
        }
        Some(Command::Serve) => run_relay(config).await?,
        None => {
            eprintln!("No command given; see --help");
            2
        }
    };

    info!("GeoTweets exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

async fn run_watch(mut config: GeoTweetsConfig, address: ResolvedAddress) -> Result<i32> {
    config.feed.source = FeedSource::Realtime;

    let mut app = start_app(config).await?;

    // Shakes typed as `/shake` arrive through this sensor
    let sensor = ChannelSensor::new(16);
    app.arm_gesture(&sensor).await;
    app.open(address).await;

    let handle = app.handle();
    tokio::spawn(async move {
        run_composer(BufReader::new(tokio::io::stdin()), handle, Some(sensor)).await;
    });

    Ok(app.run().await?)
}

async fn run_search(mut config: GeoTweetsConfig, address: ResolvedAddress) -> Result<i32> {
    config.feed.source = FeedSource::Search;
    let keyboard = config.gesture.keyboard_sensor;

    let mut app = start_app(config).await?;

    if keyboard {
        let sensor = KeyboardShakeSensor::new(Some(app.event_bus()));
        app.arm_gesture(&sensor).await;
    } else {
        let handle = app.handle();
        tokio::spawn(async move {
            run_composer(BufReader::new(tokio::io::stdin()), handle, None).await;
        });
    }
    app.open(address).await;

    Ok(app.run().await?)
}

async fn start_app(config: GeoTweetsConfig) -> Result<GeoTweetsApp> {
    let mut app = GeoTweetsApp::new(config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;
    app.set_echo(true);

    app.initialize().await?;
    app.start().await.map_err(|e| {
        error!("Failed to start application: {}", e);
        e
    })?;
    Ok(app)
}

#[cfg(feature = "relay")]
async fn run_relay(config: GeoTweetsConfig) -> Result<i32> {
    use geotweets::{MemoryFeedStore, RelayServer};
    use tokio_util::sync::CancellationToken;

    let store = MemoryFeedStore::new(config.system.event_bus_capacity);
    let server = RelayServer::new(config.relay.clone(), store);
    let token = CancellationToken::new();

    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            signal_token.cancel();
        }
    });

    server.start(token).await.map_err(|e| {
        error!("Relay server error: {}", e);
        e
    })?;
    Ok(0)
}

#[cfg(not(feature = "relay"))]
async fn run_relay(_config: GeoTweetsConfig) -> Result<i32> {
    error!("This build does not include the relay server (feature 'relay')");
    Ok(1)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("geotweets={}", log_level)));

    // Logs go to stderr; stdout carries the feed view
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# GeoTweets Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&GeoTweetsConfig::default())?);
    Ok(())
}
