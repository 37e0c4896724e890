//! Command-line surface for resource definitions
//!
//! A program declaring its resources hands them to a [`CliBuilder`] and calls
//! [`CliBuilder::run`]; the resulting binary understands `create`, `update`,
//! `read` and `delete`, applying the command to every resource in order.
//!
//! ```no_run
//! use signalform::charts::Chart;
//! use signalform::cli::CliBuilder;
//!
//! fn main() -> anyhow::Result<()> {
//!     let chart = Chart::text().with_name("Readme")?.with_markdown("# Ops")?;
//!     CliBuilder::new().with_resource(chart).run()
//! }
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::{ClientConfig, ENV_API_TOKEN};
use crate::resources::{ActionFlags, Client, Overrides, Syncable};

/// Global options and the command to run.
#[derive(Debug, Parser)]
#[command(name = "signalform")]
#[command(about = "Reconcile SignalFx charts, dashboards and detectors", long_about = None)]
pub struct Cli {
    /// SignalFx API token
    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    pub api_key: Option<String>,

    /// API root, e.g. https://api.eu0.signalfx.com/v2
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Lifecycle commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create each resource
    Create {
        /// Create even when a resource with the same name exists
        #[arg(short, long)]
        force: bool,

        /// Ask before creating over an existing resource
        #[arg(short, long)]
        interactive: bool,

        /// Print payloads without calling the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Update each resource, creating missing ones
    Update {
        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Print payloads without calling the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the remote state of each resource
    Read {
        /// Skip the API call
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete each resource
    Delete {
        /// Skip the API call
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Defaults, then the config file, then environment, then flags.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let base = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        let mut config = base.with_env_overrides();
        if let Some(key) = &self.api_key {
            config.api_token = Some(key.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = Some(secs);
        }
        Ok(config)
    }
}

/// Collects resources and exposes them through [`Cli`].
#[derive(Default)]
pub struct CliBuilder {
    resources: Vec<Box<dyn Syncable>>,
}

impl CliBuilder {
    /// Builder with no resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Commands visit resources in insertion order.
    pub fn with_resource(mut self, resource: impl Syncable + 'static) -> Self {
        self.resources.push(Box::new(resource));
        self
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Run `command` against every resource, stopping at the first failure.
    pub fn execute(&self, command: &Command, client: &Client) -> Result<Vec<Value>> {
        let mut responses = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            let item: &dyn Syncable = resource.as_ref();
            let label = describe(item);
            let response = match command {
                Command::Create {
                    force,
                    interactive,
                    dry_run,
                } => client.create(
                    item,
                    ActionFlags {
                        dry_run: *dry_run,
                        force: *force,
                        interactive: *interactive,
                    },
                ),
                Command::Update {
                    name,
                    description,
                    dry_run,
                } => client.update(
                    item,
                    &Overrides {
                        name: name.clone(),
                        description: description.clone(),
                    },
                    ActionFlags {
                        dry_run: *dry_run,
                        ..ActionFlags::default()
                    },
                ),
                Command::Read { dry_run } => client.read(
                    item,
                    ActionFlags {
                        dry_run: *dry_run,
                        ..ActionFlags::default()
                    },
                ),
                Command::Delete { dry_run } => client.delete(
                    item,
                    ActionFlags {
                        dry_run: *dry_run,
                        ..ActionFlags::default()
                    },
                ),
            }
            .with_context(|| format!("{} failed for {label}", command_name(command)))?;
            responses.push(response);
        }
        Ok(responses)
    }

    /// Parse the process arguments and run.
    pub fn run(self) -> Result<()> {
        self.run_from(std::env::args_os())
    }

    /// Parse `args` and run, printing one pretty JSON document per resource.
    pub fn run_from<I, T>(self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into()),
            )
            .try_init();

        let cli = Cli::try_parse_from(args)?;
        let config = cli.client_config()?;
        let client = Client::from_config(&config).context("Failed to build API client")?;

        for response in self.execute(&cli.command, &client)? {
            let text =
                serde_json::to_string_pretty(&response).context("Failed to render response")?;
            println!("{text}");
        }
        Ok(())
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Create { .. } => "create",
        Command::Update { .. } => "update",
        Command::Read { .. } => "read",
        Command::Delete { .. } => "delete",
    }
}

fn describe(item: &dyn Syncable) -> String {
    let resource = item.resource();
    match resource.name() {
        Some(name) => format!("{} \"{name}\"", resource.endpoint()),
        None => resource.endpoint().to_string(),
    }
}
