use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repoprobe::cli::commands::investigate::InvestigateOptions;
use repoprobe::types::ReasoningMode;

/// Parse reasoning mode from string
fn parse_reasoning_mode(s: &str) -> Result<ReasoningMode, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "repoprobe")]
#[command(
    version,
    about = "Repository investigation pipeline: clone, analyze with an LLM, persist findings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Use this config file instead of the merged chain")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate one or more repositories end-to-end
    Investigate {
        #[arg(required = true, help = "Clone targets: URLs or local paths")]
        targets: Vec<String>,

        #[arg(
            long,
            short,
            value_delimiter = ',',
            help = "Stage ids to run (default: every stage in the prompt manifest)"
        )]
        stages: Vec<String>,

        #[arg(long, value_parser = parse_reasoning_mode, help = "Reasoning transport: api, cli")]
        mode: Option<ReasoningMode>,

        #[arg(long, help = "Model identifier override")]
        model: Option<String>,

        #[arg(long, help = "Acquisition byte budget override")]
        max_bytes: Option<u64>,

        #[arg(long, help = "Acquisition timeout override in seconds")]
        timeout: Option<u64>,

        #[arg(long, short = 'j', default_value = "2", help = "Concurrent investigations")]
        concurrency: usize,
    },

    /// Show stored investigations
    Status {
        #[arg(help = "Execution id for a detailed view")]
        id: Option<String>,

        #[arg(long, short, default_value = "20", help = "How many recent executions to list")]
        limit: u32,

        #[arg(long, help = "JSON output")]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize project configuration
    Init,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mrepoprobe encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Investigate {
            targets,
            stages,
            mode,
            model,
            max_bytes,
            timeout,
            concurrency,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(repoprobe::cli::commands::investigate::run(
                targets,
                InvestigateOptions {
                    config_file: cli.config,
                    stages,
                    mode,
                    model,
                    max_bytes,
                    timeout_secs: timeout,
                    concurrency,
                },
            ))?;
        }
        Commands::Status { id, limit, json } => {
            repoprobe::cli::commands::status::run(id, limit, json)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                repoprobe::cli::commands::config::show(json)?;
            }
            ConfigAction::Path => {
                repoprobe::cli::commands::config::path()?;
            }
            ConfigAction::Init => {
                repoprobe::cli::commands::config::init()?;
            }
        },
    }

    Ok(())
}
