//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the persona engine.

use clap::{Args, Parser, Subcommand};

/// Persona Engine - scheduled synthetic participants for a community forum
///
/// Seeds threads and replies on behalf of personas, keeping participation
/// fair and conversations from turning into persona-only echo chains.
#[derive(Parser, Debug)]
#[command(name = "persona-engine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PERSONA_ENGINE_CONFIG", global = true)]
    pub config: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the batch cycle on a schedule until Ctrl+C
    Run {
        /// Also serve the HTTP triggers
        #[arg(long)]
        serve: bool,
    },

    /// Run a single batch cycle and print its summary
    Cycle,

    /// Seed one thread now
    SeedThread {
        /// Persona id or slug (default: drawn from the least recently active)
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// Post one reply to a thread now
    Reply {
        /// Thread id
        thread_id: String,

        /// Persona id or slug (default: best-ranked persona not yet in the thread)
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// Seed a thread for one persona and ask another persona to answer it
    RunPersona {
        /// Persona id or slug
        persona: String,
    },

    /// Run every active persona whose workflow is enabled
    RunAll,

    /// Seed threads for several personas
    BatchThreads(BatchThreadsArgs),

    /// Reply once on each listed thread
    BatchReplies {
        /// Thread ids
        #[arg(required = true, num_args = 1..)]
        thread_ids: Vec<String>,
    },

    /// Serve the HTTP triggers
    Serve {
        /// Listen address (overrides [server] bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Import personas and topic seeds from a JSON file
    Seed {
        /// JSON file in snapshot format
        file: String,
    },

    /// Persona administration
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },

    /// Topic seed administration
    Topic {
        #[command(subcommand)]
        subcommand: TopicSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct BatchThreadsArgs {
    /// Persona ids or slugs
    #[arg(required = true, num_args = 1..)]
    pub personas: Vec<String>,

    /// Threads per persona (capped by [batch] max_threads_per_persona)
    #[arg(short = 'n', long, default_value = "1")]
    pub count: u32,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List personas
    List {
        /// Include inactive personas
        #[arg(short, long)]
        all: bool,
    },

    /// Let a persona take part again
    Activate {
        /// Persona id or slug
        persona: String,
    },

    /// Stop selecting a persona
    Deactivate {
        /// Persona id or slug
        persona: String,
    },

    /// Set or clear a persona's workflow configuration
    Workflow(WorkflowArgs),

    /// Workflow overview with recent activity
    Overview,

    /// Threads and replies recently posted by personas, newest first
    Activity {
        /// Number of entries
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

/// Topic seed subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum TopicSubcommand {
    /// Add a topic seed to the rotation
    Add {
        /// Topic text
        topic: String,

        /// Forum group the topic belongs to
        #[arg(short, long, alias = "category")]
        group: Option<String>,

        /// Extra guidance passed to the generator
        #[arg(long)]
        hint: Option<String>,

        /// Tie-break priority among equally used topics (default: 5)
        #[arg(short, long)]
        priority: Option<i32>,
    },

    /// List topic seeds in rotation order
    List,
}

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// Persona id or slug
    pub persona: String,

    /// Remove the workflow configuration entirely
    #[arg(
        long,
        conflicts_with_all = ["disable", "threads_per_run", "reply_after_seed", "schedule"]
    )]
    pub clear: bool,

    /// Keep the configuration but skip the persona in run-all
    #[arg(long)]
    pub disable: bool,

    /// Threads seeded per workflow run
    #[arg(long)]
    pub threads_per_run: Option<u32>,

    /// Ask another persona to reply after seeding
    #[arg(long)]
    pub reply_after_seed: bool,

    /// Free-form schedule hint
    #[arg(long)]
    pub schedule: Option<String>,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}
