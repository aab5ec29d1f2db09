//! TaskWing CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use taskwing::adapters::{UnconfiguredAuditService, UnconfiguredClarifier, UnconfiguredPlanner};
use taskwing::domain::models::Config;
use taskwing::domain::ports::KnowledgeRepository;
use taskwing::infrastructure::config::ConfigLoader;
use taskwing::infrastructure::database::{
    ClarifyRepositoryImpl, DatabaseConnection, KnowledgeRepositoryImpl, PlanRepositoryImpl,
    TaskRepositoryImpl,
};
use taskwing::infrastructure::git::GitDriver;
use taskwing::infrastructure::logging::Logging;
use taskwing::infrastructure::rpc::{self, AppState};
use taskwing::services::{
    KnowledgeService, PlanCoordinator, PolicyEngine, TaskCoordinator, TaskEnricher,
};

#[derive(Parser)]
#[command(name = "taskwing", about = "AI-assisted development workflow engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stdio JSON-RPC daemon
    Serve,
    /// Create the .taskwing directory layout and a starter config
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => handle_init(force),
        Commands::Config => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Commands::Serve => serve().await,
    }
}

fn handle_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(".taskwing/config.yaml");
    if config_path.exists() && !force {
        anyhow::bail!(".taskwing/config.yaml already exists (use --force to overwrite)");
    }

    std::fs::create_dir_all(".taskwing/memory")?;
    std::fs::create_dir_all(".taskwing/policies")?;
    std::fs::create_dir_all(".taskwing/logs")?;
    std::fs::write(&config_path, serde_yaml::to_string(&Config::default())?)?;

    println!("initialised .taskwing/");
    Ok(())
}

async fn serve() -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _logging = Logging::init(&config.logging).context("Failed to initialise logging")?;

    // The store lives inside the repository the daemon governs.
    if let Some(parent) = PathBuf::from(&config.database.path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&database_url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run database migrations")?;

    let plans = Arc::new(PlanRepositoryImpl::new(db.pool().clone()));
    let tasks = Arc::new(TaskRepositoryImpl::new(db.pool().clone()));
    let sessions = Arc::new(ClarifyRepositoryImpl::new(db.pool().clone()));
    let knowledge_repo: Arc<dyn KnowledgeRepository> =
        Arc::new(KnowledgeRepositoryImpl::new(db.pool().clone()));

    let knowledge = Arc::new(KnowledgeService::new(
        knowledge_repo.clone(),
        config.knowledge.clone(),
    ));
    let enricher = Arc::new(TaskEnricher::new(config.scope.clone()));

    let policies = Arc::new(
        PolicyEngine::from_dir(".taskwing/policies")
            .context("Failed to load policy rules")?,
    );
    info!(policies = policies.policy_count(), "policy rules loaded");

    let repo_root = std::env::current_dir().context("Failed to resolve working directory")?;
    let git = Arc::new(GitDriver::new(&repo_root, config.git.remote.clone()));

    let plan_coordinator = Arc::new(PlanCoordinator::new(
        plans.clone(),
        tasks.clone(),
        sessions,
        knowledge.clone(),
        enricher,
        Arc::new(UnconfiguredClarifier),
        Arc::new(UnconfiguredPlanner),
        Arc::new(UnconfiguredAuditService),
        config.clarify.clone(),
    ));

    let task_coordinator = Arc::new(TaskCoordinator::new(
        plans,
        tasks,
        knowledge.clone(),
        policies,
        git,
        plan_coordinator.clone(),
        Some(repo_root),
        config.git.clone(),
    ));

    rpc::serve(AppState {
        plan_coordinator,
        task_coordinator,
        knowledge,
        knowledge_repo,
    })
    .await
}
