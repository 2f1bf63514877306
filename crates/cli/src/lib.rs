pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shelfbot_core::config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

use crate::commands::GlobalOptions;

#[derive(Debug, Parser)]
#[command(
    name = "shelfbot",
    about = "Shelfbot product-resolution CLI",
    long_about = "Resolve customer queries against a product catalog, run the acceptance conversations, and inspect catalog and configuration readiness.",
    after_help = "Examples:\n  shelfbot resolve --catalog products.json \"tienen mochila?\" \"y el precio?\"\n  shelfbot chat --session store-1 < queries.txt\n  shelfbot scenario\n  shelfbot doctor --json"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to shelfbot.toml (default: ./shelfbot.toml or ./config/shelfbot.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level override (trace, debug, info, warn, error)")]
    log_level: Option<String>,
    #[arg(
        long,
        global = true,
        value_parser = parse_log_format,
        help = "Log format override (compact, pretty, json)"
    )]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, help = "Override matching.max_candidates")]
    max_candidates: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Resolve one or more queries in sequence within one session")]
    Resolve {
        #[arg(long, help = "JSON catalog file (default: configured path, else demo catalog)")]
        catalog: Option<PathBuf>,
        #[arg(long, help = "Session id shared by all queries of this run")]
        session: Option<String>,
        #[arg(required = true, num_args = 1.., help = "Queries, resolved in order")]
        queries: Vec<String>,
    },
    #[command(about = "Resolve queries read line by line from stdin, refreshing the catalog")]
    Chat {
        #[arg(long, help = "JSON catalog file (default: configured path, else demo catalog)")]
        catalog: Option<PathBuf>,
        #[arg(long, help = "Session id shared by every line of input")]
        session: Option<String>,
    },
    #[command(about = "Run the built-in acceptance conversations and report pass/fail")]
    Scenario {
        #[arg(long, help = "JSON catalog file (default: configured path, else demo catalog)")]
        catalog: Option<PathBuf>,
    },
    #[command(about = "Show index statistics and build diagnostics for a catalog")]
    Catalog {
        #[arg(long, help = "JSON catalog file (default: configured path, else demo catalog)")]
        catalog: Option<PathBuf>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate configuration and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse().map_err(|error: ConfigError| error.to_string())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // a second init (tests, embedding) keeps the first subscriber
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = GlobalOptions {
        config_path: cli.config,
        log_level: cli.log_level,
        log_format: cli.log_format,
        max_candidates: cli.max_candidates,
    };

    let logging = AppConfig::load(global.load_options(None))
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    init_logging(&logging);

    let result = match cli.command {
        Command::Resolve { catalog, session, queries } => {
            commands::resolve::run(&global, catalog.as_deref(), session.as_deref(), &queries)
        }
        Command::Chat { catalog, session } => {
            commands::chat::run(&global, catalog.as_deref(), session.as_deref())
        }
        Command::Scenario { catalog } => commands::scenario::run(&global, catalog.as_deref()),
        Command::Catalog { catalog } => commands::catalog::run(&global, catalog.as_deref()),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&global) }
        }
        Command::Doctor { json } => {
            let doctor = commands::doctor::run(&global, json);
            commands::CommandResult { exit_code: u8::from(!doctor.healthy), output: doctor.output }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
