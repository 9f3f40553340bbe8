//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API,
//! providing a type-safe and well-documented command interface.

use clap::{Args, Parser, Subcommand, ValueEnum};
use kos_http::ErrorDisplayMode;
use serde_json::Value;
use std::io::IsTerminal;
use std::path::PathBuf;

/// kos - command-line client for the kos rental API
///
/// Issues requests through the same pipeline the mobile client uses:
/// bearer authentication, platform metadata, error classification and
/// user-facing notifications.
#[derive(Parser, Debug)]
#[command(
    name = "kos",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "KOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token; overrides the stored session
    #[arg(long, global = true, env = "KOS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Trace requests and responses
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format for response bodies
    #[arg(short, long, value_enum, global = true, default_value = "json-pretty")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a GET request
    Get(GetArgs),

    /// Send a POST request
    Post(BodyArgs),

    /// Send a PUT request
    Put(BodyArgs),

    /// Send a PATCH request
    Patch(BodyArgs),

    /// Send a DELETE request
    Delete(DeleteArgs),

    /// Log in and store the session token
    Login(LoginArgs),

    /// Check whether the logged-in user has completed their profile
    Profile,

    /// Forget the stored session
    Logout,

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Flags shared by every verb
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Request path, relative to the base URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Query parameter
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Extra request header
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// How failures are shown
    #[arg(long, value_enum, default_value = "toast")]
    pub error_mode: ErrorMode,

    /// Show the success notification even for GET
    #[arg(long, conflicts_with = "no_notify")]
    pub notify: bool,

    /// Never show the success notification
    #[arg(long)]
    pub no_notify: bool,

    /// Request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,
}

impl CallArgs {
    /// Success notification override; `None` keeps the verb default
    pub fn notification(&self) -> Option<bool> {
        if self.notify {
            Some(true)
        } else if self.no_notify {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for GET
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// Add a `_t` timestamp parameter
    #[arg(long)]
    pub cache_buster: bool,
}

/// Arguments for DELETE
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// JSON request body
    #[arg(long, value_name = "JSON", value_parser = parse_json)]
    pub body: Option<Value>,
}

/// Arguments for POST, PUT and PATCH
#[derive(Args, Debug)]
pub struct BodyArgs {
    #[command(flatten)]
    pub call: CallArgs,

    /// JSON request body
    #[arg(long, value_name = "JSON", value_parser = parse_json, conflicts_with = "fields")]
    pub body: Option<Value>,

    /// Multipart field; `key=@path` uploads a file
    #[arg(short = 'F', long = "field", value_name = "KEY=VALUE", value_parser = parse_form_field)]
    pub fields: Vec<FormField>,
}

/// Arguments for login
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "KOS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Arguments for generating shell completions
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// One `-F` multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text { key: String, value: String },
    File { key: String, path: PathBuf },
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// YAML
    Yaml,
}

/// Error display mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ErrorMode {
    Toast,
    Modal,
    Silent,
}

impl From<ErrorMode> for ErrorDisplayMode {
    fn from(mode: ErrorMode) -> Self {
        match mode {
            ErrorMode::Toast => ErrorDisplayMode::Toast,
            ErrorMode::Modal => ErrorDisplayMode::Modal,
            ErrorMode::Silent => ErrorDisplayMode::Silent,
        }
    }
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stderr().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    if name.trim().is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON body: {}", e))
}

fn parse_form_field(raw: &str) -> Result<FormField, String> {
    let (key, value) = parse_key_value(raw)?;
    match value.strip_prefix('@') {
        Some(path) if !path.is_empty() => Ok(FormField::File {
            key,
            path: PathBuf::from(path),
        }),
        _ => Ok(FormField::Text { key, value }),
    }
}
