//! Pitwall CLI
//!
//! Command-line interface for Pitwall - local-first team management.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use pitwall_core::Role;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "pitwall")]
#[command(about = "Pitwall - Local-first racing team management")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync participant until interrupted
    Run {
        /// Protocol role for this context
        #[arg(long, value_enum, default_value_t = RoleArg::Member)]
        role: RoleArg,
    },
    /// Show local snapshot status
    Status,
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Push the local snapshot to the cloud relay
    Push,
    /// Pull the cloud relay snapshot and apply it if newer
    Pull,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    /// Act as the Hub (broadcasts state)
    Manager,
    /// Follow the Hub as a Node
    Member,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Manager => Role::Manager,
            RoleArg::Member => Role::Member,
        }
    }
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a new task
    #[command(alias = "add")]
    Create {
        /// Task title
        title: String,
        /// Bounty in points
        #[arg(short, long)]
        bounty: Option<u32>,
    },
    /// List all tasks
    #[command(alias = "ls")]
    List,
    /// Claim a task's bounty
    Claim {
        /// Task ID (full UUID or prefix)
        id: String,
        /// Display name of the claimer
        #[arg(long)]
        by: String,
    },
    /// Mark a task done
    Done {
        /// Task ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, relay_url, relay_enabled, relay_poll_secs)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Run { role } => commands::run::run(role.into(), &output).await,
        Commands::Status => commands::status::show(&output),
        Commands::Task { command } => handle_task_command(command, &output).await,
        Commands::Push => commands::relay::push(&output).await,
        Commands::Pull => commands::relay::pull(&output).await,
        Commands::Config { command } => handle_config_command(command, &output),
    }
}

async fn handle_task_command(command: TaskCommands, output: &Output) -> Result<()> {
    match command {
        TaskCommands::Create { title, bounty } => {
            commands::task::create(title, bounty, output).await
        }
        TaskCommands::List => commands::task::list(output),
        TaskCommands::Claim { id, by } => commands::task::claim(id, by, output).await,
        TaskCommands::Done { id } => commands::task::done(id, output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
        Some(ConfigCommands::Path) => commands::config::path(),
    }
}
