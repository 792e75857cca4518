//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod endpoints;
pub mod render;
pub mod say;
pub mod setup;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::chat::run_chat;
use crate::cli::endpoints::list_endpoints;
use crate::cli::say::run_say;
use crate::cli::setup::{http_client, Overrides, Settings};
use crate::core::config::{Config, ConfigOrchestrator};
use crate::core::models::Model;
use crate::core::upload::upload_file;

#[derive(Parser)]
#[command(name = "sherpa")]
#[command(version)]
#[command(about = "A terminal chat client that lets the model call a local code-execution plugin")]
#[command(
    long_about = "Sherpa streams answers from a chat endpoint and, when the model asks for it, \
calls the plugin server described by an OpenAPI document and feeds the result back.\n\n\
Configuration:\n\
  Use 'sherpa set <key> <value>' to persist settings. Flags override them.\n\n\
Environment Variables:\n\
  SHERPA_LOG        Diagnostics filter (e.g. 'sherpa=debug'), defaults to 'warn'\n\n\
Commands inside chat:\n\
  /upload <path>    Upload a file and attach its URL to your next message\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume\n\
  Ctrl+C            Cancel the streaming response"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model label to use (e.g. "GPT-4 Code Interpreter")
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Chat endpoint URL
    #[arg(long, global = true, value_name = "URL")]
    pub chat_url: Option<String>,

    /// Plugin OpenAPI document (path or URL)
    #[arg(short = 'p', long, global = true, value_name = "DOCUMENT")]
    pub plugin: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub debug_log: Option<PathBuf>,

    /// Use this config file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send a single message and print the answer
    Say {
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the plugin operations the model may call
    Endpoints,
    /// List the available models
    Models,
    /// Upload a file to the plugin server and print its URL
    Upload {
        path: PathBuf,
    },
    /// Set configuration values, or print them when no value is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words for default-model)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            chat_url: self.chat_url.clone(),
            plugin: self.plugin.clone(),
        }
    }

    fn config_orchestrator(&self) -> Result<ConfigOrchestrator, Box<dyn Error>> {
        Ok(match &self.config {
            Some(path) => ConfigOrchestrator::new(path.clone()),
            None => ConfigOrchestrator::for_default_path()?,
        })
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.debug_log.as_deref())?;
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let orchestrator = args.config_orchestrator()?;
    let command = args.command.clone().unwrap_or(Commands::Chat);

    match command {
        Commands::Set { key, value } => {
            let value = value.join(" ");
            match key {
                Some(key) if !value.is_empty() => {
                    let key = orchestrator.mutate(|config| config.set_value(&key, &value))?;
                    println!("✅ Set {} to: {value}", key.name());
                }
                _ => {
                    orchestrator.load()?.print_all();
                    println!("Config file: {}", orchestrator.path().display());
                }
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let key = orchestrator.mutate(|config| config.unset_value(&key))?;
            println!("✅ Unset {}", key.name());
            Ok(())
        }
        Commands::Models => {
            let config: Config = orchestrator.load()?;
            let current = Settings::resolve(&config, &args.overrides())?.model;
            for model in Model::ALL {
                let marker = if model == current { "*" } else { " " };
                println!("{marker} {:<24} {}", model.label(), model.api_name());
            }
            Ok(())
        }
        Commands::Chat => {
            let settings = Settings::resolve(&orchestrator.load()?, &args.overrides())?;
            run_chat(settings, args.log.clone()).await
        }
        Commands::Say { prompt } => {
            let settings = Settings::resolve(&orchestrator.load()?, &args.overrides())?;
            run_say(prompt, settings, args.log.clone()).await
        }
        Commands::Endpoints => {
            let settings = Settings::resolve(&orchestrator.load()?, &args.overrides())?;
            list_endpoints(settings).await
        }
        Commands::Upload { path } => {
            let settings = Settings::resolve(&orchestrator.load()?, &args.overrides())?;
            let url = upload_file(
                &http_client()?,
                &settings.upload_url,
                &path,
                settings.request_timeout,
            )
            .await?;
            println!("{url}");
            Ok(())
        }
    }
}
