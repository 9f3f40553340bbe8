//! kos CLI - command-line client for the kos rental API
//!
//! This is the main entry point for the kos CLI, providing commands for
//! sending requests through the kos-http pipeline, logging in and checking
//! profile status.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::{Config, StoredSession};
use error::Result;
use handlers::Verb;
use kos_http::{SessionAccessor, SessionContext};
use logging::{timing::Timer, LoggingConfig};
use output::{OutputWriter, TerminalNotifier};
use std::process;
use std::sync::Arc;
use tracing::instrument;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Set up colored output
    control::set_override(cli.use_color());

    // Initialize logging
    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    // Run the application
    let result = run(cli).await;

    // Handle the result
    match result {
        Ok(()) => {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip(cli), fields(command = ?cli.command))]
async fn run(cli: Cli) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    if let Commands::Completions(args) = &cli.command {
        return handlers::handle_completions(args);
    }

    // Load configuration
    let config = {
        let _config_timer = Timer::new("config_loading");
        tracing::info!("Loading configuration");
        Config::load_with_file(cli.config.as_deref())?
    };

    let mut client_config = config.client_config(|key| std::env::var(key).ok())?;
    if let Some(base_url) = &cli.base_url {
        client_config = client_config.with_base_url(base_url);
    }
    if cli.debug {
        client_config = client_config.with_debug(true);
    }

    let session = Arc::new(StoredSession::open(StoredSession::default_path())?);
    if cli.token.is_some() {
        session.override_token(cli.token.clone());
    } else if session.token().is_none() {
        session.override_token(config.token.clone());
    }

    let use_color = cli.use_color() && config.output.color;
    let notifier = TerminalNotifier::new(use_color, cli.quiet);
    let context = SessionContext::new(client_config, session.clone())?.with_notifier(Arc::new(notifier));

    // Create output writer
    let mut output = OutputWriter::new(cli.output, use_color, cli.quiet, config.output.progress);

    tracing::info!(
        command = ?cli.command,
        verbosity = cli.verbosity_level(),
        base_url = %context.config().base_url,
        "Executing command"
    );

    // Handle the subcommand
    match cli.command {
        Commands::Get(args) => {
            let spec = handlers::request::get_spec(&args);
            handlers::handle_request(Verb::Get, spec, &context, &session, &mut output).await
        }
        Commands::Post(args) => {
            let spec = handlers::request::body_spec(&args)?;
            handlers::handle_request(Verb::Post, spec, &context, &session, &mut output).await
        }
        Commands::Put(args) => {
            let spec = handlers::request::body_spec(&args)?;
            handlers::handle_request(Verb::Put, spec, &context, &session, &mut output).await
        }
        Commands::Patch(args) => {
            let spec = handlers::request::body_spec(&args)?;
            handlers::handle_request(Verb::Patch, spec, &context, &session, &mut output).await
        }
        Commands::Delete(args) => {
            let spec = handlers::request::delete_spec(&args);
            handlers::handle_request(Verb::Delete, spec, &context, &session, &mut output).await
        }
        Commands::Login(args) => handlers::handle_login(args, &context, &session, &mut output).await,
        Commands::Profile => handlers::handle_profile(&context, &session, &mut output).await,
        Commands::Logout => handlers::handle_logout(&session, &mut output),
        Commands::Completions(_) => Ok(()),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    // Create logging configuration from CLI args and environment
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());

    // Apply environment overrides
    logging_config.merge_with_env(|key| std::env::var(key).ok());

    // If quiet mode, only log errors
    if cli.quiet {
        logging_config.level = "error".to_string();
    }
    logging_config.ansi = cli.use_color();

    // Initialize the logging system
    logging::init_logging(logging_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["kos", "get", "/kos"]);
        assert_eq!(cli.verbosity_level(), 0);

        // Test verbose flag
        let cli = Cli::parse_from(["kos", "-vv", "profile"]);
        assert_eq!(cli.verbosity_level(), 2);

        // Test quiet flag
        let cli = Cli::parse_from(["kos", "--quiet", "logout"]);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kos", "delete", "/sewa/3", "--debug", "--base-url", "http://localhost:9000"]);
        assert!(cli.debug);
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:9000"));
        assert!(matches!(cli.command, Commands::Delete(_)));
    }
}
