//! plan-graph command line.
//!
//! Each subcommand loads a plan from the configured store, applies one
//! operation and saves the plan back.

use anyhow::{Context, Result, bail};
use clap::Parser;
use plan_graph::cli::export::ExportArgs;
use plan_graph::cli::import::ImportArgs;
use plan_graph::cli::{AddArgs, Cli, Command};
use plan_graph::config::{Config, ConfigLoader, StoreBackend};
use plan_graph::db::{Store, open_store};
use plan_graph::export::Snapshot;
use plan_graph::format::{OutputFormat, format_task_markdown, format_tasks_markdown};
use plan_graph::logging::{self, LogTarget};
use plan_graph::plan::Plan;
use plan_graph::task::Task;
use plan_graph::types::TaskStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target: LogTarget = cli.log.parse()?;
    logging::init(&target, cli.verbose)?;

    // SAFETY: This is safe at program startup before any other threads read the environment
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("PLAN_GRAPH_CONFIG_PATH", config_path);
        }
    }
    let loader = ConfigLoader::load()?;
    if let Some(path) = loader.config_path() {
        debug!(path = %path.display(), "configuration loaded");
    }
    let mut config = loader.into_config();
    apply_cli_overrides(&mut config, &cli);

    if config.store.backend == StoreBackend::Memory {
        warn!("memory store selected, nothing will persist after this command");
    }
    config.ensure_store_dir()?;
    let store = open_store(&config.store)?;

    match cli.command {
        Command::New { goal, description } => run_new(&config, store, goal, description).await,
        Command::List => run_list(&config, store).await,
        Command::Add(args) => run_add(&config, store, args, None).await,
        Command::Subtask { add, parent } => run_add(&config, store, add, Some(parent)).await,
        Command::Link {
            plan,
            task,
            predecessor,
        } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            plan.add_predecessor(&task, &predecessor).await?;
            plan.db_save().await?;
            println!("{} now waits on {}", task, predecessor);
            Ok(())
        }
        Command::Show { plan, task, depth } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            match task {
                Some(task_id) => show_task(&mut plan, &task_id, cli.format).await,
                None => show_plan(&mut plan, depth, cli.format).await,
            }
        }
        Command::Next { plan, after } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            let next = plan.get_next_task(after.as_deref()).await?.map(|t| t.task_id.clone());
            // A promotion inside get_next_task is a state change worth keeping.
            plan.db_save().await?;
            match next {
                Some(task_id) => show_task(&mut plan, &task_id, cli.format).await,
                None if plan.is_complete() => {
                    println!("Plan {} is complete", plan.plan_id);
                    Ok(())
                }
                None => bail!("No actionable task in plan {}", plan.plan_id),
            }
        }
        Command::Start { plan, task } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            plan.set_task_state(&task, TaskStatus::InProgress).await?;
            plan.db_save().await?;
            println!("{}", plan.get_task(&task).await?.debug_formatted_str(true));
            Ok(())
        }
        Command::Close { plan, task, output } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            run_close(&mut plan, &task, output).await
        }
        Command::Retry { plan, task } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            let clone_id = plan.retry(&task).await?;
            plan.db_save().await?;
            println!("{}", clone_id);
            Ok(())
        }
        Command::Prioritize { plan, task } => {
            let mut plan = open_plan(&config, store, &plan).await?;
            plan.set_as_priority(&task).await?;
            plan.db_save().await?;
            println!("{}", plan.get_ready_tasks_ids().join(" "));
            Ok(())
        }
        Command::Export(args) => run_export(&config, store, args).await,
        Command::Import(args) => run_import(store, args).await,
    }
}

/// CLI flags win over every config tier.
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(store) = cli.store {
        config.store.backend = store.into();
    }
    if let Some(ref data_dir) = cli.data_dir {
        config.store.json_file_path = PathBuf::from(data_dir);
    }
    if let Some(ref db_path) = cli.database {
        config.store.db_path = PathBuf::from(db_path);
    }
    if let Some(ref agent) = cli.agent {
        config.plan.agent_id = agent.clone();
    }
}

async fn open_plan(config: &Config, store: Arc<dyn Store>, plan_id: &str) -> Result<Plan> {
    let plan = Plan::load(plan_id, &config.plan.agent_id, store)
        .await
        .with_context(|| format!("Failed to load plan {} for agent {}", plan_id, config.plan.agent_id))?;
    Ok(plan.with_task_id_prefix(config.plan.task_id_prefix.clone()))
}

async fn run_new(
    config: &Config,
    store: Arc<dyn Store>,
    goal: String,
    description: Option<String>,
) -> Result<()> {
    let mut plan = Plan::from_config(&config.plan, goal, store);
    if let Some(description) = description {
        plan = plan.with_description(description);
    }
    plan.db_create().await?;
    println!("{}", plan.plan_id);
    Ok(())
}

async fn run_list(config: &Config, store: Arc<dyn Store>) -> Result<()> {
    let ids = Plan::list_plan_ids(store.as_ref(), &config.plan.agent_id).await?;
    if ids.is_empty() {
        eprintln!("No plans for agent {}", config.plan.agent_id);
    }
    for plan_id in ids {
        let plan = Plan::load(&plan_id, &config.plan.agent_id, Arc::clone(&store)).await?;
        let state = if plan.is_complete() { "done" } else { "open" };
        println!(
            "{}\t{}\t{}/{}\t{}",
            plan.plan_id,
            state,
            plan.get_all_done_tasks_ids().len(),
            plan.get_all_tasks_ids().len(),
            plan.task_goal
        );
    }
    Ok(())
}

async fn run_add(
    config: &Config,
    store: Arc<dyn Store>,
    args: AddArgs,
    parent: Option<String>,
) -> Result<()> {
    let mut plan = open_plan(config, store, &args.plan).await?;
    let description = args.description.unwrap_or_default();
    let task = match args.id {
        Some(id) => Task::with_id(id, args.goal, description),
        None => plan.create_task(args.goal, description),
    };

    // Register in BACKLOG, wire predecessors, then ask for READY so the
    // readiness check sees the predecessors.
    let task_id = match parent {
        Some(ref parent_id) => plan.add_subtask(parent_id, task, TaskStatus::Backlog).await?,
        None => plan.add_task(task, TaskStatus::Backlog).await?,
    };
    for predecessor in &args.after {
        plan.add_predecessor(&task_id, predecessor).await?;
    }
    if args.ready && !plan.promote_if_ready(&task_id).await? {
        warn!(task_id = %task_id, "predecessors not done, task left in BACKLOG");
    }

    plan.db_save().await?;
    info!(plan_id = %plan.plan_id, task_id = %task_id, "task added");
    println!("{}", task_id);
    Ok(())
}

async fn run_close(plan: &mut Plan, task_id: &str, output: Option<String>) -> Result<()> {
    if let Some(output) = output {
        plan.set_task_output(task_id, output).await?;
    }
    let mut closed = plan.close_task(task_id).await?;
    while let Some(parent_id) = closed {
        println!("Closed parent {}", parent_id);
        closed = plan.propagate_subtask_completion(&parent_id).await?;
    }
    plan.db_save().await?;

    let ready = plan.get_ready_tasks_ids();
    if ready.is_empty() {
        println!("Closed {}", task_id);
    } else {
        println!("Closed {}; ready: {}", task_id, ready.join(" "));
    }
    Ok(())
}

async fn show_task(plan: &mut Plan, task_id: &str, format: OutputFormat) -> Result<()> {
    let predecessors: Vec<String> = plan.get_task(task_id).await?.predecessors().get_all_task_ids();
    let mut waiting_on = Vec::new();
    for predecessor in predecessors {
        if !plan.get_task(&predecessor).await?.state().is_done() {
            waiting_on.push(predecessor);
        }
    }

    let path = plan.get_formatted_task_path(task_id).await?;
    let task = plan.get_task(task_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(task)?),
        OutputFormat::Markdown => {
            print!("{}", format_task_markdown(task, &waiting_on));
            print!("\n### Path\n{}", path);
        }
    }
    Ok(())
}

async fn show_plan(plan: &mut Plan, depth: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let snapshot = Snapshot::from_plan(plan).await?;
            println!("{}", snapshot.to_json_pretty()?);
        }
        OutputFormat::Markdown => {
            print!("{}", plan.debug_dump_str(depth).await?);
            let ids = plan.get_all_tasks_ids().to_vec();
            let tasks = plan.resolve(&ids).await?;
            print!("\n{}", format_tasks_markdown(&tasks));
        }
    }
    Ok(())
}

async fn run_export(config: &Config, store: Arc<dyn Store>, args: ExportArgs) -> Result<()> {
    let mut plan = open_plan(config, store, &args.plan).await?;
    let snapshot = Snapshot::from_plan(&mut plan).await?;
    let should_compress = args.should_compress();

    match args.output {
        Some(ref path) => {
            snapshot.write_to_file(path, should_compress)?;
            if should_compress {
                eprintln!("Exported to {} (gzipped)", path.display());
            } else {
                eprintln!("Exported to {}", path.display());
            }
        }
        None if should_compress => {
            snapshot.write_to(std::io::stdout().lock(), true)?;
        }
        None => println!("{}", snapshot.to_json_pretty()?),
    }
    Ok(())
}

async fn run_import(store: Arc<dyn Store>, args: ImportArgs) -> Result<()> {
    let mut snapshot = Snapshot::from_file(&args.file)?;
    if let Some(ref agent) = args.as_agent {
        snapshot.reassign_agent(agent);
    }
    snapshot.validate()?;

    if args.dry_run {
        println!("Dry run results:");
        println!("  Plan: {} ({})", snapshot.plan.plan_id, snapshot.plan.task_goal);
        println!("  Agent: {}", snapshot.plan.agent_id);
        println!("  Tasks: {}", snapshot.tasks.len());
        println!("  Exported by: {} at {}", snapshot.exported_by, snapshot.exported_at);
        return Ok(());
    }

    let plan_id = snapshot.import_into(store.as_ref()).await?;
    eprintln!(
        "Imported plan {} with {} tasks for agent {}",
        plan_id,
        snapshot.tasks.len(),
        snapshot.plan.agent_id
    );
    Ok(())
}
