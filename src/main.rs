//! Persona Engine - command-line entry point
//!
//! Loads configuration, opens the snapshot-backed store and dispatches the
//! subcommand. Long-running modes (`run`, `serve`) flush the store to its
//! snapshot periodically and once more on shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use persona_engine::cli::{
    Cli, Commands, ConfigSubcommand, PersonaSubcommand, TopicSubcommand, WorkflowArgs,
};
use persona_engine::clock::SystemClock;
use persona_engine::config::{self, EngineConfig};
use persona_engine::generation::{build_generator, truncate_chars};
use persona_engine::random::StdRandom;
use persona_engine::server::{self, AppState};
use persona_engine::store::{ForumStore, MemoryStore, Snapshot};
use persona_engine::types::{NewTopicSeed, WorkflowConfig};
use persona_engine::{logging, version, Error, Orchestrator};

/// How often long-running modes write the store snapshot.
const SNAPSHOT_FLUSH_SECS: u64 = 60;

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        report(err);
    }
}

/// Print the failure and exit with the error's code.
fn report(err: anyhow::Error) -> ! {
    if let Some(e) = err.downcast_ref::<Error>() {
        let outer = err.to_string();
        if outer != e.to_string() {
            eprintln!("{}", outer);
        }
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
    eprintln!("\x1b[31mError\x1b[0m: {:#}", err);
    std::process::exit(1);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't need the store or full logging
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(cli.config.as_deref(), subcommand.clone());
        }
        _ => {}
    }

    let config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        generator = %config.generator.provider,
        "Starting persona engine"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("persona-engine")
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(async_main(cli.command, config))
}

// ─────────────────────────────────────────────────────────────────
// Application
// ─────────────────────────────────────────────────────────────────

struct App {
    config: EngineConfig,
    store: Arc<MemoryStore>,
    orchestrator: Arc<Orchestrator>,
    snapshot_path: PathBuf,
}

impl App {
    fn open(config: EngineConfig) -> anyhow::Result<Self> {
        let snapshot_path = config.snapshot_path();
        let store = Arc::new(
            MemoryStore::open(&snapshot_path)
                .with_context(|| format!("Failed to open store {}", snapshot_path.display()))?,
        );
        let generator = build_generator(&config.generator)?;
        let orchestrator = Orchestrator::new(
            &config,
            store.clone(),
            generator,
            Arc::new(StdRandom::new(config.engine.rng_seed)),
            Arc::new(SystemClock),
        )?;

        Ok(Self {
            config,
            store,
            orchestrator: Arc::new(orchestrator),
            snapshot_path,
        })
    }

    fn persist(&self) -> persona_engine::Result<()> {
        self.store.save(&self.snapshot_path)
    }

    fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.scheduler.cycle_timeout_secs)
    }

    /// Resolve an id or slug to the persona id.
    async fn persona_id(&self, id_or_slug: &str) -> persona_engine::Result<String> {
        Ok(self.orchestrator.registry().find(id_or_slug).await?.id)
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn async_main(command: Commands, config: EngineConfig) -> anyhow::Result<()> {
    let app = App::open(config)?;
    let orchestrator = app.orchestrator.clone();

    match command {
        Commands::Run { serve } => {
            let bind = serve.then(|| app.config.server.bind.clone());
            run_service(&app, true, bind).await?;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| app.config.server.bind.clone());
            run_service(&app, false, Some(bind)).await?;
        }
        Commands::Cycle => {
            let summary = orchestrator.run_cycle_within(app.cycle_timeout()).await;
            app.persist()?;
            print_json(&summary)?;
        }
        Commands::SeedThread { persona } => {
            let persona_id = match persona {
                Some(p) => Some(app.persona_id(&p).await?),
                None => None,
            };
            let outcome = orchestrator.seed_thread(persona_id.as_deref()).await;
            app.persist()?;
            print_json(&outcome?)?;
        }
        Commands::Reply { thread_id, persona } => {
            let persona_id = match persona {
                Some(p) => Some(app.persona_id(&p).await?),
                None => None,
            };
            let outcome = orchestrator.reply(&thread_id, persona_id.as_deref()).await;
            app.persist()?;
            print_json(&outcome?)?;
        }
        Commands::RunPersona { persona } => {
            let persona_id = app.persona_id(&persona).await?;
            let report = orchestrator.run_persona(&persona_id).await;
            app.persist()?;
            print_json(&report?)?;
        }
        Commands::RunAll => {
            let report = orchestrator.run_all().await;
            app.persist()?;
            print_json(&report?)?;
        }
        Commands::BatchThreads(args) => {
            let mut ids = Vec::with_capacity(args.personas.len());
            for p in &args.personas {
                ids.push(app.persona_id(p).await.unwrap_or_else(|_| p.clone()));
            }
            let report = orchestrator.batch_threads(&ids, args.count).await;
            app.persist()?;
            print_json(&report?)?;
        }
        Commands::BatchReplies { thread_ids } => {
            let report = orchestrator.batch_replies(&thread_ids).await;
            app.persist()?;
            print_json(&report?)?;
        }
        Commands::Seed { file } => {
            let report = import_seed(&app, Path::new(&file)).await?;
            app.persist()?;
            print_json(&report)?;
        }
        Commands::Persona { subcommand } => handle_persona_command(&app, subcommand).await?,
        Commands::Topic { subcommand } => handle_topic_command(&app, subcommand).await?,
        Commands::Version | Commands::Config { .. } => {
            // Already handled above
            unreachable!();
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Long-running modes
// ─────────────────────────────────────────────────────────────────

/// Scheduled cycles and/or the HTTP triggers until Ctrl+C.
async fn run_service(app: &App, scheduler: bool, bind: Option<String>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server: Option<JoinHandle<persona_engine::Result<()>>> = bind.map(|bind| {
        let state = AppState::new(app.orchestrator.clone(), &app.config);
        tokio::spawn(async move {
            server::serve(&bind, state, async move {
                let _ = shutdown_rx.await;
            })
            .await
        })
    });

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let interval_secs = app.config.scheduler.interval_secs.max(1);
    let mut cycle_timer = tokio::time::interval(Duration::from_secs(interval_secs));
    cycle_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !app.config.scheduler.run_on_start {
        // The first tick completes immediately
        cycle_timer.tick().await;
    }

    let mut flush_timer = tokio::time::interval(Duration::from_secs(SNAPSHOT_FLUSH_SECS));
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    flush_timer.tick().await;

    if scheduler {
        info!(interval_secs, "Scheduler started. Press Ctrl+C to stop.");
    }

    let mut outcome = Ok(());
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Received shutdown signal");
                break;
            }

            joined = async {
                match server.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            } => {
                server = None;
                outcome = match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(anyhow::Error::new(e)),
                    Err(e) => Err(anyhow::anyhow!("Server task failed: {}", e)),
                };
                break;
            }

            _ = cycle_timer.tick(), if scheduler => {
                let summary = app.orchestrator.run_cycle_within(app.cycle_timeout()).await;
                info!(
                    summary = %summary.headline(),
                    errors = summary.errors.len(),
                    "Scheduled cycle complete"
                );
                for e in &summary.errors {
                    warn!(error = %e, "Cycle unit failed");
                }
                if let Err(e) = app.persist() {
                    error!(error = %e, "Failed to save snapshot");
                }
            }

            _ = flush_timer.tick() => {
                if let Err(e) = app.persist() {
                    warn!(error = %e, "Failed to save snapshot");
                }
            }
        }
    }

    if let Some(handle) = server {
        let _ = shutdown_tx.send(());
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Server stopped with error"),
            Err(e) => error!(error = %e, "Server task failed"),
        }
    }

    app.persist()
        .with_context(|| format!("Failed to save snapshot {}", app.snapshot_path.display()))?;
    info!("Persona engine stopped");
    outcome
}

// ─────────────────────────────────────────────────────────────────
// Seed import
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeedReport {
    personas_imported: usize,
    personas_skipped: usize,
    topics_imported: usize,
    topics_skipped: usize,
}

/// Import personas (with their profiles) and topic seeds. Records that
/// already exist are skipped.
async fn import_seed(app: &App, path: &Path) -> anyhow::Result<SeedReport> {
    let seed = Snapshot::read(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    if !seed.threads.is_empty() || !seed.posts.is_empty() || !seed.profiles.is_empty() {
        warn!(
            "Seed file contains profiles, threads or posts; \
             only personas and topic seeds are imported"
        );
    }

    let mut report = SeedReport::default();
    let registry = app.orchestrator.registry();

    for persona in seed.personas {
        let slug = persona.slug.clone();
        match registry.create_persona(persona).await {
            Ok(_) => report.personas_imported += 1,
            Err(e) => {
                warn!(persona = %slug, error = %e, "Persona skipped");
                report.personas_skipped += 1;
            }
        }
    }

    for topic in seed.topic_seeds {
        if app.store.get_topic_seed(&topic.id).await?.is_some() {
            report.topics_skipped += 1;
            continue;
        }
        app.store.insert_topic_seed(topic).await?;
        report.topics_imported += 1;
    }

    info!(
        personas = report.personas_imported,
        topics = report.topics_imported,
        "Seed imported"
    );
    Ok(report)
}

// ─────────────────────────────────────────────────────────────────
// Persona administration
// ─────────────────────────────────────────────────────────────────

async fn handle_persona_command(app: &App, subcommand: PersonaSubcommand) -> anyhow::Result<()> {
    let registry = app.orchestrator.registry();

    match subcommand {
        PersonaSubcommand::List { all } => {
            let personas = registry.list(!all).await?;
            if personas.is_empty() {
                println!("No personas.");
                return Ok(());
            }
            println!(
                "{:<20} {:<24} {:<9} {:<7} {:>7} {:>7}  LAST ACTIVE",
                "SLUG", "NAME", "ACTIVITY", "ACTIVE", "THREADS", "REPLIES"
            );
            for p in personas {
                println!(
                    "{:<20} {:<24} {:<9} {:<7} {:>7} {:>7}  {}",
                    p.slug,
                    p.name,
                    p.activity_level.as_str(),
                    if p.is_active { "yes" } else { "no" },
                    p.thread_count,
                    p.reply_count,
                    p.last_active_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
        PersonaSubcommand::Activate { persona } => {
            let found = registry.find(&persona).await?;
            let updated = registry.set_active(&found.id, true).await?;
            app.persist()?;
            println!("Persona '{}' activated.", updated.slug);
        }
        PersonaSubcommand::Deactivate { persona } => {
            let found = registry.find(&persona).await?;
            let updated = registry.set_active(&found.id, false).await?;
            app.persist()?;
            println!("Persona '{}' deactivated.", updated.slug);
        }
        PersonaSubcommand::Workflow(args) => {
            let found = registry.find(&args.persona).await?;
            let updated = registry
                .update_workflow_config(&found.id, workflow_from_args(&args))
                .await?;
            app.persist()?;
            match updated.workflow_config {
                Some(cfg) => print_json(&cfg)?,
                None => println!("Workflow config cleared for '{}'.", updated.slug),
            }
        }
        PersonaSubcommand::Overview => {
            print_json(&registry.workflow_overview().await?)?;
        }
        PersonaSubcommand::Activity { limit } => {
            let records = app.orchestrator.recent_activity(limit).await?;
            if records.is_empty() {
                println!("No persona activity.");
                return Ok(());
            }
            for r in records {
                println!(
                    "{}  {:<20} {:<14} {}",
                    r.created_at.format("%Y-%m-%d %H:%M"),
                    r.persona_name,
                    r.action.to_string(),
                    truncate_chars(&r.content_preview, 60),
                );
            }
        }
    }

    Ok(())
}

async fn handle_topic_command(app: &App, subcommand: TopicSubcommand) -> anyhow::Result<()> {
    let topics = app.orchestrator.topics();

    match subcommand {
        TopicSubcommand::Add {
            topic,
            group,
            hint,
            priority,
        } => {
            let seed = topics
                .add_topic_seed(NewTopicSeed {
                    topic,
                    group,
                    prompt_hint: hint,
                    priority,
                })
                .await?;
            app.persist()?;
            print_json(&seed)?;
        }
        TopicSubcommand::List => {
            let seeds = topics.list().await?;
            if seeds.is_empty() {
                println!("No topic seeds.");
                return Ok(());
            }
            println!("{:>4} {:>8} {:<16} TOPIC", "USED", "PRIORITY", "GROUP");
            for seed in seeds {
                println!(
                    "{:>4} {:>8} {:<16} {}",
                    seed.used_count,
                    seed.priority,
                    seed.group.as_deref().unwrap_or("-"),
                    seed.topic,
                );
            }
        }
    }

    Ok(())
}

/// `--clear` removes the config; otherwise the flags replace it.
fn workflow_from_args(args: &WorkflowArgs) -> Option<WorkflowConfig> {
    if args.clear {
        return None;
    }
    Some(WorkflowConfig {
        enabled: !args.disable,
        threads_per_run: args.threads_per_run.unwrap_or(1).max(1),
        reply_after_seed: args.reply_after_seed,
        schedule: args.schedule.clone(),
    })
}

// ─────────────────────────────────────────────────────────────────
// Configuration commands
// ─────────────────────────────────────────────────────────────────

fn handle_config_command(
    config_path: Option<&str>,
    subcommand: ConfigSubcommand,
) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = EngineConfig::load(config_path)?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate => match EngineConfig::load(config_path) {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => {
                eprint!("{}", e.format_for_terminal());
                std::process::exit(e.exit_code());
            }
        },
    }

    Ok(())
}
