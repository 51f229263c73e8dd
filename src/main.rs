use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use lostfound::models::{ClaimantInfo, FinderInfo, Id, ItemType, NewItemReport};
use lostfound::repo::http::HttpRepo;
#[cfg(feature = "inmem-store")]
use lostfound::repo::inmem::InMemRepo;
use lostfound::repo::Repo;
use lostfound::validate::format_student_id;
use lostfound::{Config, LifecycleManager, Role};

#[derive(Parser)]
#[command(name = "lostfound", about = "Lost & Found item lifecycle tool")]
struct Cli {
    /// Acting role
    #[arg(long, value_enum, default_value_t = RoleArg::Staff)]
    role: RoleArg,
    /// Use the local snapshot store (LOSTFOUND_DATA_DIR) instead of the backend
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Reporter,
    Staff,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Reporter => Role::Reporter,
            RoleArg::Staff => Role::Staff,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    Active,
    Lost,
    Found,
    Claimed,
    Archived,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Lost,
    Found,
}

#[derive(Subcommand)]
enum Command {
    /// List items in a view
    List {
        #[arg(value_enum, default_value_t = View::Active)]
        view: View,
    },
    /// Show an item's change log
    History { id: Id },
    /// File a new lost/found report
    Report {
        #[arg(long, value_enum, default_value_t = KindArg::Lost)]
        kind: KindArg,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        reporter: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        contact: String,
    },
    /// Mark a lost item as found
    Found {
        id: Id,
        #[arg(long)]
        finder: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        contact: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        time: String,
    },
    Approve { id: Id },
    Reject { id: Id },
    /// Hand an item over to its claimant
    Claim {
        id: Id,
        #[arg(long)]
        claimant: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        contact: Option<String>,
    },
    Archive { id: Id },
    Restore { id: Id },
    /// Permanently delete an item (admin only)
    Delete { id: Id },
    /// Archive items idle longer than LOSTFOUND_ARCHIVE_AFTER_DAYS
    Sweep,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("invalid time '{raw}', expected HH:MM"))
}

fn build_repo(cfg: &Config, offline: bool) -> anyhow::Result<Arc<dyn Repo>> {
    if offline {
        #[cfg(feature = "inmem-store")]
        {
            let dir = cfg.data_dir.clone().unwrap_or_else(|| "data".into());
            info!(dir = %dir.display(), "Using offline snapshot store");
            return Ok(Arc::new(InMemRepo::with_snapshot(&dir)));
        }
        #[cfg(not(feature = "inmem-store"))]
        anyhow::bail!("offline mode requires the inmem-store feature");
    }
    info!(base = %cfg.api_base, "Using backend API");
    Ok(Arc::new(HttpRepo::new(cfg.api_base.clone(), cfg.timeout)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();
    let repo = build_repo(&cfg, cli.offline)?;
    let manager = LifecycleManager::with_config(repo, cli.role.into(), &cfg);

    run(&manager, cli.command).await
}

async fn run(m: &LifecycleManager, command: Command) -> anyhow::Result<()> {
    // reports need no prior state; everything else acts on the loaded collection
    if !matches!(command, Command::Report { .. } | Command::History { .. } | Command::Sweep) {
        m.refresh().await?;
    }
    match command {
        Command::List { view } => {
            let v = m.views();
            let items: Vec<_> = match view {
                View::Active => v.active().cloned().collect(),
                View::Lost => v.active_lost,
                View::Found => v.active_found,
                View::Claimed => v.claimed,
                View::Archived => v.archived,
            };
            print_json(&items)
        }
        Command::History { id } => print_json(&m.history(id).await?),
        Command::Report { kind, name, description, location, category, reporter, student_id, contact } => {
            let report = NewItemReport {
                item_type: match kind {
                    KindArg::Lost => ItemType::Lost,
                    KindArg::Found => ItemType::Found,
                },
                item_name: name,
                description,
                location,
                category,
                image: None,
                reporter_name: reporter,
                student_id: format_student_id(&student_id),
                contact_info: contact,
            };
            print_json(&m.submit_report(report).await?)
        }
        Command::Found { id, finder, student_id, contact, date, time } => {
            let finder = FinderInfo {
                finder_name: finder,
                finder_student_id: format_student_id(&student_id),
                finder_contact: contact,
                found_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{date}', expected YYYY-MM-DD"))?,
                found_time: parse_time(&time)?,
            };
            print_json(&m.mark_found(id, finder).await?)
        }
        Command::Approve { id } => print_json(&m.approve(id).await?),
        Command::Reject { id } => print_json(&m.reject(id).await?),
        Command::Claim { id, claimant, student_id, contact } => {
            let claimant = ClaimantInfo {
                claimant_name: claimant,
                claimant_student_id: format_student_id(&student_id),
                claimant_contact: contact,
            };
            print_json(&m.claim(id, claimant).await?)
        }
        Command::Archive { id } => print_json(&m.archive(id).await?),
        Command::Restore { id } => print_json(&m.restore(id).await?),
        Command::Delete { id } => {
            m.delete(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        Command::Sweep => print_json(&serde_json::json!({ "archived": m.run_archive_sweep().await? })),
    }
}
