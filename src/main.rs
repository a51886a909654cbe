use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use pollkeep::{
    config::PollkeepConfig,
    db::DbPool,
    lifecycle::{Lifecycle, LifecycleState, RetentionPolicy},
    observability,
    retention::{CleanupSweep, SweepOptions, start_cleanup_worker},
    services::{BulkActionReport, Services},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// CLI arguments for pollkeep
#[derive(Parser, Debug)]
#[command(version, about = "Poll lifecycle and retention engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults are used when the file does not exist)
    #[arg(short, long, global = true, default_value = "pollkeep.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run one cleanup sweep: soft-delete expired polls, purge polls past
    /// their grace period
    Cleanup {
        /// Report what would change without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Purge newly expired polls immediately instead of soft-deleting them
        #[arg(long)]
        force_expired: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a lifecycle action to a set of polls
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
        /// Print the per-poll results as JSON
        #[arg(long, global = true)]
        json: bool,
    },
    /// Show poll counts per lifecycle state and polls expiring soon
    Stats {
        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run database migrations and exit
    Migrate,
    /// Run the cleanup sweep on the configured interval until interrupted
    Worker,
    /// Write a configuration file with every default spelled out
    Init {
        /// Path to create the config file (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum AdminCommand {
    /// Soft-delete polls (restorable for 30 days)
    SoftDelete {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Restore soft-deleted polls
    Restore {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Extend poll expiry by 90 days
    Extend {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Command::Init { output, force } => {
            run_init(output.unwrap_or(args.config), force);
        }
        Command::Schema { output } => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Command::Cleanup {
            dry_run,
            force_expired,
            json,
        } => {
            run_cleanup(&args.config, dry_run, force_expired, json).await;
        }
        Command::Admin { action, json } => {
            run_admin(&args.config, action, json).await;
        }
        Command::Stats { json } => {
            run_stats(&args.config, json).await;
        }
        Command::Migrate => {
            run_migrate(&args.config).await;
        }
        Command::Worker => {
            run_worker(&args.config).await;
        }
    }
}

/// Load configuration and initialize logging, exiting on failure.
fn load_config(path: &Path) -> PollkeepConfig {
    let config = match PollkeepConfig::load_or_default(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Warning: {}", e);
    }

    config
}

/// Connect to the configured database, exiting on failure.
async fn open_store(config: &PollkeepConfig) -> (Arc<DbPool>, Lifecycle) {
    let lifecycle = Lifecycle::system(RetentionPolicy::from(&config.retention));

    match DbPool::from_config(&config.database, lifecycle.clone()).await {
        Ok(db) => (Arc::new(db), lifecycle),
        Err(e) => {
            tracing::error!(error = %e, path = %config.database.path, "Failed to open database");
            eprintln!("Error: Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_cleanup(config_path: &Path, dry_run: bool, force_expired: bool, json: bool) {
    let config = load_config(config_path);
    let (db, lifecycle) = open_store(&config).await;
    let sweep = CleanupSweep::new(db.polls(), lifecycle);

    let mut options = SweepOptions::from_safety(&config.retention.safety);
    options.dry_run |= dry_run;
    options.force_expired = force_expired;

    tracing::info!(
        dry_run = options.dry_run,
        force_expired = options.force_expired,
        max_transitions = options.max_transitions,
        "Running cleanup sweep"
    );

    let result = sweep.run(&options).await;
    db.close().await;

    match result {
        Ok(report) => {
            if json {
                print_json(&report);
            } else {
                print!("{}", report);
            }
        }
        Err(e) => {
            if json {
                print_json(&e.partial);
            } else {
                print!("{}", e.partial);
            }
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_admin(config_path: &Path, action: AdminCommand, json: bool) {
    let config = load_config(config_path);
    let (db, _) = open_store(&config).await;
    let services = Services::new(db.clone());
    let admin = &services.lifecycle_admin;

    let report: BulkActionReport = match action {
        AdminCommand::SoftDelete { ids } => admin.soft_delete_many(&ids).await,
        AdminCommand::Restore { ids } => admin.restore_many(&ids).await,
        AdminCommand::Extend { ids } => admin.extend_many(&ids).await,
    };
    db.close().await;

    if json {
        print_json(&report);
    } else {
        println!("{}", report);
    }

    if report.has_failures() {
        std::process::exit(1);
    }
}

async fn run_stats(config_path: &Path, json: bool) {
    let config = load_config(config_path);
    let (db, lifecycle) = open_store(&config).await;
    let sweep = CleanupSweep::new(db.polls(), lifecycle);

    let totals = db.polls().count_by_state().await;
    let expiring = sweep.expiring_soon().await;
    db.close().await;

    let (totals, expiring) = match (totals, expiring) {
        (Ok(t), Ok(e)) => (t, e),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: Failed to read polls: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&serde_json::json!({
            "state_totals": totals,
            "expiring_soon": expiring,
        }));
        return;
    }

    for state in LifecycleState::ALL {
        println!("{:<16}{}", state.as_str(), totals.get(state));
    }
    println!(
        "Expiring within {} days: {}",
        config.retention.warning_threshold_days,
        expiring.len()
    );
    for poll in &expiring {
        println!(
            "  {}  {} ({}d)  {}",
            poll.id, poll.expires_at, poll.days_remaining, poll.question
        );
    }
}

async fn run_migrate(config_path: &Path) {
    let mut config = load_config(config_path);
    // Migrations run explicitly below.
    config.database.run_migrations = false;

    tracing::info!(
        config_file = %config_path.display(),
        database = %config.database.path,
        "Running database migrations"
    );

    let (db, _) = open_store(&config).await;
    match db.run_migrations().await {
        Ok(()) => {
            tracing::info!("Database migrations completed successfully");
            db.close().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Database migrations failed");
            eprintln!("Error: Database migrations failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_worker(config_path: &Path) {
    let config = load_config(config_path);
    if !config.retention.enabled {
        eprintln!("Error: The cleanup worker is disabled. Set retention.enabled = true to run it.");
        std::process::exit(1);
    }

    let (db, lifecycle) = open_store(&config).await;
    let sweep = CleanupSweep::new(db.polls(), lifecycle);
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    start_cleanup_worker(sweep, config.retention.clone(), cancel).await;
    db.close().await;
}

/// Write the default configuration file.
fn run_init(output_path: PathBuf, force: bool) {
    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    let body = match PollkeepConfig::default_toml() {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let contents = format!("# pollkeep configuration\n\n{}", body);

    if let Err(e) = std::fs::write(&output_path, contents) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let schema = match PollkeepConfig::json_schema_string() {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Failed to serialize schema: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &schema) {
                eprintln!("Failed to write schema to {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Config schema written to {}", path);
        }
        None => println!("{}", schema),
    }
}
