use anyhow::{anyhow, Result};
use attendcal::{
    app::App,
    calendar::MonthKey,
    config::{self, AppConfig},
    db::Database,
    render,
    sync::{api::SchoolApiClient, worker::{SyncEvent, SyncWorker}},
};
use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // ── attendcal sync [YYYY-MM] ──────────────────────────────────────────────
    if args.get(1).map(|s| s.as_str()) == Some("sync") {
        return cmd_sync(month_arg(args.get(2))?).await;
    }

    // ── attendcal show [YYYY-MM] ──────────────────────────────────────────────
    if args.get(1).map(|s| s.as_str()) == Some("show") {
        return cmd_show(month_arg(args.get(2))?).await;
    }

    // ── attendcal (TUI) ───────────────────────────────────────────────────────
    run_tui().await
}

fn month_arg(arg: Option<&String>) -> Result<MonthKey> {
    match arg {
        Some(s) => s.parse().map_err(|e| anyhow!("{e} (usage: attendcal sync|show [YYYY-MM])")),
        None    => Ok(MonthKey::from_date(Local::now().date_naive())),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    // Logging to stderr so it doesn't interfere with terminal output
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ─── Manual sync command ──────────────────────────────────────────────────────

async fn cmd_sync(key: MonthKey) -> Result<()> {
    init_stderr_logging();

    let cfg = AppConfig::load()?;
    let api = cfg.api.ok_or_else(|| {
        anyhow!(
            "No [api] section found in {}\n\
             Add base_url and student_id for the school backend.",
            config::config_path().display()
        )
    })?;

    let db = Database::connect().await?;
    db.migrate().await?;
    let worker = SyncWorker::spawn(db, SchoolApiClient::new(api)?, None);
    worker.fetch_profile().await;
    worker.fetch_month(key).await;

    // One profile result plus one month result
    let mut outstanding = 2;
    let mut failed      = false;
    while outstanding > 0 {
        match worker.next_event().await {
            Some(SyncEvent::SyncStarted(_))  => {}
            Some(SyncEvent::ProfileReady(name)) => { println!("Student: {name}"); outstanding -= 1; }
            Some(SyncEvent::MonthReady { key, marks, holidays }) => {
                println!("{key}: {marks} attendance marks, {holidays} holidays cached.");
                outstanding -= 1;
            }
            Some(SyncEvent::SyncError(msg)) => { eprintln!("Sync failed: {msg}"); failed = true; outstanding -= 1; }
            None => break,
        }
    }
    worker.shutdown().await;

    if failed { Err(anyhow!("sync incomplete")) } else { Ok(()) }
}

// ─── Print a month ────────────────────────────────────────────────────────────

async fn cmd_show(key: MonthKey) -> Result<()> {
    init_stderr_logging();

    let cfg = AppConfig::load()?;
    let db  = Database::connect().await?;
    db.migrate().await?;

    let record = match &cfg.api {
        Some(api) => db.attendance_for_month(&api.student_id, key).await?,
        None      => Default::default(),
    };
    let holidays = db.holidays_for_month(key).await?;
    print!("{}", render::month_text(key, &record, &holidays)?);
    Ok(())
}

// ─── TUI ─────────────────────────────────────────────────────────────────────

async fn run_tui() -> Result<()> {
    let log_dir = attendcal::db::data_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "attendcal.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    tracing::info!("Starting attendcal");

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("config: {e}; continuing with defaults");
        AppConfig::default()
    });
    let db = Database::connect().await?;
    db.migrate().await?;

    let refresh    = cfg.refresh_interval();
    let student_id = cfg.api.as_ref().map(|a| a.student_id.clone());
    let mut app    = App::new(db.clone(), student_id).await?;
    if let Some(api) = cfg.api {
        app.attach_sync_worker(SyncWorker::spawn(db, SchoolApiClient::new(api)?, refresh));
    }

    app.run().await?;
    Ok(())
}
