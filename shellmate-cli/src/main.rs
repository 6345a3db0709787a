//! # shellmate CLI
//!
//! A terminal assistant that proposes shell commands and runs them only
//! after you say yes.
//!
//! Usage:
//!   shellmate [chat]
//!   shellmate suggest
//!   shellmate tokens <TEXT>...
//!   shellmate tokens --file <PATH>
//!
//! Examples:
//!   shellmate
//!   shellmate --provider openai --model gpt-4o-mini
//!   shellmate --provider local --base-url http://localhost:11434/v1 suggest
//!   shellmate tokens --file notes.md

mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use repl::{describe_tokens, Mode, ReplSession};
use shellmate_agent::{AgentConfig, Mediator};
use shellmate_core::{
    estimate_tokens, heuristic_tokens, Error, ErrorKind, HostedProvider, ProviderConfig,
    ProviderType, Result, TokenSource,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "shellmate")]
#[command(author, version, about = "shellmate - a terminal assistant that asks before it runs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Generation service: gemini, openai or local
    #[arg(short, long, global = true, env = "SHELLMATE_PROVIDER", default_value = "gemini")]
    provider: ProviderType,

    /// Model name (defaults to the provider's)
    #[arg(short, long, global = true, env = "SHELLMATE_MODEL")]
    model: Option<String>,

    /// Base URL of the service API
    #[arg(long, global = true, env = "SHELLMATE_BASE_URL")]
    base_url: Option<String>,

    /// HTTP timeout in seconds (no timeout when unset)
    #[arg(long, global = true, env = "SHELLMATE_TIMEOUT")]
    timeout: Option<u64>,

    /// Stop a turn after this many commands (at least 1)
    #[arg(long, global = true, env = "SHELLMATE_MAX_EXCHANGES")]
    max_exchanges: Option<NonZeroUsize>,

    /// Log level or filter directive (overrides RUST_LOG)
    #[arg(long, global = true, env = "SHELLMATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Show per-turn statistics and usage on exit
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Chat with the assistant (default)
    Chat,
    /// Describe a task, get a single command back
    Suggest,
    /// Estimate the token count of some text
    Tokens {
        /// Text to measure
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,

        /// Read the text from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

/// Logs go to stderr. Priority: --log-level > RUST_LOG > warn.
fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let filter = match cli_log_level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| {
            Error::config_invalid(format!("invalid log level '{}': {}", level, e))
                .with_operation("setup_logging")
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    Ok(())
}

impl Cli {
    fn provider_config(&self) -> Result<ProviderConfig> {
        let mut config = ProviderConfig::from_env(self.provider)?;
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(secs);
        }
        Ok(config)
    }

    fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            max_exchanges: self.max_exchanges,
            verbose: self.verbose,
            ..Default::default()
        }
    }
}

async fn run_repl(cli: &Cli, mode: Mode) -> Result<()> {
    let provider = HostedProvider::from_config(cli.provider_config()?)?;
    let cwd = std::env::current_dir().map_err(|e| Error::from(e).with_operation("run_repl"))?;
    info!(cwd = %cwd.display(), ?mode, "starting session");

    let mediator = Mediator::chat_in(provider, cwd, cli.agent_config());
    let mut repl = ReplSession::new(mediator, mode, cli.verbose)?;
    repl.run().await?;

    if cli.verbose {
        repl.print_usage();
    }
    Ok(())
}

async fn run_tokens(cli: &Cli, text: &[String], file: Option<&PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("run_tokens")
                .with_context("path", path.display().to_string())
        })?,
        None if text.is_empty() => {
            return Err(Error::invalid_argument("nothing to count: pass TEXT or --file").with_operation("run_tokens"));
        }
        None => text.join(" "),
    };

    let (tokens, source) = match cli.provider_config().and_then(HostedProvider::from_config) {
        Ok(provider) => {
            let estimate = estimate_tokens(&provider, &text).await;
            (estimate.tokens, estimate.source)
        }
        // counting works offline too
        Err(e) if e.kind() == ErrorKind::CredentialsMissing => {
            warn!(error = %e, "no credentials, using character heuristic");
            (heuristic_tokens(&text), TokenSource::Heuristic)
        }
        Err(e) => return Err(e),
    };

    println!("{}", describe_tokens(tokens, source));
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        None | Some(Commands::Chat) => run_repl(&cli, Mode::Chat).await,
        Some(Commands::Suggest) => run_repl(&cli, Mode::Suggest).await,
        Some(Commands::Tokens { text, file }) => run_tokens(&cli, text, file.as_ref()).await,
    }
}

fn report(err: &Error) {
    match err.kind() {
        // one line, no context noise
        ErrorKind::CredentialsMissing => eprintln!("{} {}", "Error:".red(), err.message()),
        _ => eprintln!("{} {}", "Error:".red(), err),
    }
    debug!(error = ?err, "exiting with error");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // before parsing, so .env values can feed the env fallbacks
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.log_level.as_deref()) {
        report(&e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(1);
    }
}
