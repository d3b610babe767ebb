//! Configuration resolution for songforge-wo
//!
//! Priority per setting: CLI argument → environment variable (via clap
//! `env`) → TOML file → compiled default. The root folder uses the shared
//! [`RootFolderResolver`] so every Songforge service agrees on it.

use clap::Parser;
use songforge_common::config::{
    config_file_path, load_or_default, AutomationConfig, CompiledDefaults, ReviewConfig,
    RootFolderResolver, TomlConfig, WorkflowConfig,
};
use songforge_common::time::secs_to_duration;
use songforge_common::Result;
use std::path::PathBuf;

use crate::services::WorkflowSettings;

/// Module name used for the config file and logs
pub const MODULE_NAME: &str = "songforge-wo";

/// Command-line arguments for songforge-wo
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "songforge-wo")]
#[command(about = "Song workflow orchestrator microservice")]
#[command(version)]
pub struct Args {
    /// TOML config file (defaults to the platform config dir)
    #[arg(short, long, env = "SONGFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Artifact root folder
    #[arg(short, long)]
    pub root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(short, long, env = "SONGFORGE_WO_BIND")]
    pub bind: Option<String>,

    /// Base URL of the browser-automation sidecar
    #[arg(long, env = "SONGFORGE_AUTOMATION_URL")]
    pub automation_url: Option<String>,

    /// Base URL of the review service
    #[arg(long, env = "SONGFORGE_REVIEW_URL")]
    pub review_url: Option<String>,

    /// Seconds to wait between generation and download
    #[arg(long, env = "SONGFORGE_GENERATION_WAIT_SECS")]
    pub generation_wait_secs: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "SONGFORGE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub workflow: WorkflowConfig,
    pub automation: AutomationConfig,
    pub review: ReviewConfig,
    /// Config file that was consulted, if any
    pub config_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load the TOML file named by `args` (or the default location) and
    /// merge the arguments over it
    pub fn load(args: &Args) -> Result<Self> {
        let config_file = args.config.clone().or_else(|| config_file_path(MODULE_NAME));
        let toml_config = load_or_default(config_file.as_deref())?;
        let mut config = Self::resolve(args, toml_config);
        config.config_file = config_file;
        Ok(config)
    }

    pub fn resolve(args: &Args, toml_config: TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(args.root_folder.clone())
            .with_toml(&toml_config)
            .resolve();

        let bind_address = args
            .bind
            .clone()
            .or(toml_config.server.bind_address)
            .unwrap_or(defaults.bind_address);

        let log_level = args
            .log_level
            .clone()
            .unwrap_or(toml_config.logging.level);

        let mut workflow = toml_config.workflow;
        if let Some(secs) = args.generation_wait_secs {
            workflow.generation_wait_secs = secs;
        }

        let mut automation = toml_config.automation;
        if let Some(url) = &args.automation_url {
            automation.base_url = url.clone();
        }

        let mut review = toml_config.review;
        if let Some(url) = &args.review_url {
            review.base_url = url.clone();
        }

        Self {
            root_folder,
            bind_address,
            log_level,
            workflow,
            automation,
            review,
            config_file: None,
        }
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            generation_wait: secs_to_duration(self.workflow.generation_wait_secs),
        }
    }
}
