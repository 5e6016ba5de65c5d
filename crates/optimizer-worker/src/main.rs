//! Optimizer worker binary entrypoint.

use anyhow::Context;
use campaign_core::api::{HttpTipsClient, TipsGenerator};
use campaign_core::config::AppConfig;
use campaign_core::db::{self, PgCampaignStore};
use campaign_core::CampaignStore;
use clap::{Parser, Subcommand};
use optimizer::{
    BatchRunner, CampaignLease, CampaignOrchestrator, JobPayload, JobReason, MemoryLease,
    OptimizerConfig, RedisLease,
};
use optimizer_worker::{AppState, JobRunner, UnavailableTips, WorkerConfig, WorkerServer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Campaign performance control loop worker
#[derive(Parser)]
#[command(name = "optimizer-worker")]
#[command(version)]
struct Cli {
    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger surface and run the scheduled sweep (default)
    Serve,
    /// Run one manual job and print the result as JSON
    RunOnce {
        /// Evaluate only this campaign
        #[arg(long)]
        campaign_id: Option<Uuid>,
        /// Limit the sweep to one owner's campaigns
        #[arg(long)]
        owner_id: Option<Uuid>,
        /// Override the metrics lookback window
        #[arg(long)]
        lookback_hours: Option<i64>,
        /// Base creative for mutations
        #[arg(long)]
        creative_id: Option<Uuid>,
        /// Plan actions without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "optimizer_worker=info,optimizer=info,campaign_core=info".into());
    if cli.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let app_config = AppConfig::load().context("Failed to load configuration")?;
    let worker_config = WorkerConfig::from_env();
    let mut optimizer_config = OptimizerConfig::from_env();
    optimizer_config.lease_ttl_secs = worker_config.lease_ttl_secs(optimizer_config.lease_ttl_secs);

    let pool = db::create_pool(&app_config.database)
        .await
        .context("Failed to connect to database")?;

    let command = cli.command.unwrap_or(Command::Serve);
    if matches!(command, Command::Serve) && worker_config.run_migrations {
        info!("Running database migrations...");
        db::run_migrations(&pool).await?;
    }

    let store: Arc<dyn CampaignStore> = Arc::new(PgCampaignStore::new(pool.clone()));

    let lease: Arc<dyn CampaignLease> = match app_config.redis.url.as_deref() {
        Some(url) => Arc::new(
            RedisLease::connect(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("REDIS_URL not set, campaign leases only guard this process");
            Arc::new(MemoryLease::new())
        }
    };

    let tips: Arc<dyn TipsGenerator> = match HttpTipsClient::new(&app_config.tips) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Tips service not configured, mutations will be recorded as failed");
            Arc::new(UnavailableTips::new(e.to_string()))
        }
    };

    let orchestrator = CampaignOrchestrator::new(store.clone(), lease, tips, optimizer_config);
    let runner = Arc::new(JobRunner::new(
        BatchRunner::new(Arc::new(orchestrator)),
        &worker_config,
    ));

    match command {
        Command::Serve => {
            let state = AppState {
                runner,
                store,
                pool: Some(pool),
            };
            WorkerServer::new(worker_config, state).run().await
        }
        Command::RunOnce {
            campaign_id,
            owner_id,
            lookback_hours,
            creative_id,
            dry_run,
        } => {
            let payload = JobPayload {
                campaign_id,
                owner_id,
                lookback_hours,
                creative_id,
                dry_run,
                reason: JobReason::Manual,
            };
            let result = runner.execute(&payload).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
