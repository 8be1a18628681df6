//! FizzBuzz server
//!
//! This is the main entry point for the FizzBuzz HTTP service.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::{ArgAction, Parser};
use fizzbuzz_server::config::{Config, LogFormat};
use fizzbuzz_server::server::Server;
use tracing::{error, info, warn};

/// FizzBuzz HTTP service with request statistics
///
/// Every option can also be set through the environment variable shown.
#[derive(Parser, Debug)]
#[command(name = "fizzbuzz-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short = 'p', long = "port", value_name = "PORT", env = "PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short = 'b', long = "bind", alias = "host", value_name = "ADDR", env = "BIND")]
    bind: Option<String>,

    /// Log level: debug, info, warn, error
    #[arg(
        short = 'l',
        long = "log-level",
        alias = "loglevel",
        value_name = "LEVEL",
        env = "LOG_LEVEL"
    )]
    log_level: Option<String>,

    /// Log format: json, pretty
    #[arg(long = "log-format", value_name = "FORMAT", env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Largest accepted `limit` in a FizzBuzz request
    #[arg(long = "max-limit", value_name = "N", env = "MAX_LIMIT")]
    max_limit: Option<String>,

    /// Timeout in seconds for one background statistics update
    #[arg(long = "stats-timeout", value_name = "SECS", env = "STATS_TIMEOUT_SECS")]
    stats_timeout_secs: Option<u64>,

    /// Seconds open connections may drain after a shutdown signal
    #[arg(
        long = "shutdown-timeout",
        value_name = "SECS",
        env = "SHUTDOWN_TIMEOUT_SECS"
    )]
    shutdown_timeout_secs: Option<u64>,

    /// Seconds a client may take to send a request head
    #[arg(
        long = "header-read-timeout",
        value_name = "SECS",
        env = "HEADER_READ_TIMEOUT_SECS"
    )]
    header_read_timeout_secs: Option<u64>,

    /// Seconds an idle keep-alive connection is kept open
    #[arg(long = "idle-timeout", value_name = "SECS", env = "IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Maximum request body size in bytes
    #[arg(long = "max-body-size", value_name = "BYTES", env = "MAX_BODY_SIZE")]
    max_body_size: Option<usize>,

    /// Test configuration and exit without starting server
    #[arg(long = "test-config", action = ArgAction::SetTrue)]
    test_config: bool,

    /// Dump effective configuration to stdout and exit
    #[arg(long = "dump-config", action = ArgAction::SetTrue)]
    dump_config: bool,
}

impl Cli {
    /// Apply CLI argument overrides to the configuration.
    ///
    /// Unusable log levels and limits fall back to their defaults; the
    /// returned messages describe each fallback.
    fn apply_to_config(&self, config: &mut Config) -> Result<Vec<String>, String> {
        let mut fallbacks = Vec::new();

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(ref level) = self.log_level {
            if !config.logging.apply_level(level) {
                fallbacks.push(format!(
                    "Unknown log level {:?}, using {}",
                    level, config.logging.level
                ));
            }
        }
        if let Some(ref format) = self.log_format {
            config.logging.format = format.parse::<LogFormat>().map_err(|e| e.to_string())?;
        }
        if let Some(ref max_limit) = self.max_limit {
            if !config.fizzbuzz.apply_max_limit(max_limit) {
                fallbacks.push(format!(
                    "Invalid max limit {:?}, using {}",
                    max_limit, config.fizzbuzz.max_limit
                ));
            }
        }
        if let Some(secs) = self.stats_timeout_secs {
            config.stats.report_timeout_secs = secs;
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.server.shutdown_timeout_secs = secs;
        }
        if let Some(secs) = self.header_read_timeout_secs {
            config.server.header_read_timeout_secs = secs;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.server.idle_timeout_secs = secs;
        }
        if let Some(size) = self.max_body_size {
            config.server.max_body_size = size;
        }
        Ok(fallbacks)
    }
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

/// Route panic reports through the log with a captured backtrace.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        error!(panic = %info, backtrace = %backtrace, "panic");
    }));
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    info!("Starting fizzbuzz-server v{}", version);
    info!("  Listening on: {}", config.server.address());
    info!("  Max limit: {}", config.fizzbuzz.max_limit);
    info!(
        "  Statistics timeout: {:?}",
        config.stats.report_timeout()
    );
}

async fn cmd_run(cli: &Cli) -> ExitCode {
    let mut config = Config::default();

    // Apply CLI argument overrides (includes environment variables via clap)
    let fallbacks = match cli.apply_to_config(&mut config) {
        Ok(fallbacks) => fallbacks,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    // Dump effective configuration and exit
    if cli.dump_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize configuration: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if cli.test_config {
        for message in &fallbacks {
            println!("Warning: {message}");
        }
        println!("Configuration OK");
        println!("  Bind: {}", config.server.address());
        println!("  Log level: {}", config.logging.level);
        println!("  Max limit: {}", config.fizzbuzz.max_limit);
        return ExitCode::SUCCESS;
    }

    init_logging(&config);
    install_panic_hook();
    for message in &fallbacks {
        warn!("{}", message);
    }
    print_banner(&config);

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => {
            info!("fizzbuzz-server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments using clap (handles --help and --version automatically)
    let cli = Cli::parse();
    cmd_run(&cli).await
}
