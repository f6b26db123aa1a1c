use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use framescan::{
    EventFilter, EventReceiver, ScanConfig, ScanEvent, ScanSession, SyntheticFrameSource,
};

#[derive(Parser, Debug)]
#[command(name = "framescan")]
#[command(about = "Camera-frame barcode scanning pipeline")]
#[command(version)]
#[command(long_about = "Continuously decodes barcodes and QR codes from a stream of camera \
preview frames. This binary replays a still image through the full pipeline (frame slot, \
luminance extraction, multi-format decode, result post-processing) and prints the first \
result.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "framescan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Image to replay through the pipeline
    #[arg(short, long, value_name = "PATH", help = "Image file replayed as the frame stream")]
    image: Option<String>,

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
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting framescan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ScanConfig::load_from_file(&args.config) {
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
    config.validate()?;

    let image = args.image.ok_or_else(|| {
        anyhow::anyhow!("an --image to replay is required (no camera device support)")
    })?;
    let source = Box::new(SyntheticFrameSource::from_image_path(
        &image,
        config.synthetic.fps,
    ));

    let mut session = ScanSession::new(config, source);
    let mut events = EventReceiver::new(
        session.event_bus().subscribe(),
        EventFilter::EventTypes(vec!["decode_succeeded", "shutdown_requested"]),
        "main".to_string(),
    );

    println!("{}", session.prompt_message());
    session.start().await?;

    let exit_code = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break 0;
            }
            event = events.recv() => match event {
                Some(ScanEvent::DecodeSucceeded { model, .. }) => {
                    println!("Format:  {}", model.format);
                    println!("Kind:    {:?}", model.kind);
                    println!("Content: {}", model.content);
                    for line in &model.metadata_lines {
                        println!("  {}", line);
                    }
                    break 0;
                }
                Some(ScanEvent::ShutdownRequested { reason }) => {
                    println!("No result: {}", reason);
                    break 1;
                }
                _ => break 1,
            }
        }
    };

    session.teardown().await;
    info!("framescan exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

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
        .unwrap_or_else(|_| EnvFilter::new(format!("framescan={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
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
    println!("# Framescan Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", ScanConfig::default().to_toml()?);
    Ok(())
}
