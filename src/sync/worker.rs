//! Background sync worker: a Tokio task that pulls a month from the backend
//! into the local cache.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use crate::calendar::MonthKey;
use crate::db::Database;
use crate::sync::api::SchoolApiClient;

// ─── Channel types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SyncCommand {
    FetchMonth(MonthKey),
    FetchProfile,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    SyncStarted(MonthKey),
    MonthReady { key: MonthKey, marks: usize, holidays: usize },
    ProfileReady(String),
    SyncError(String),
}

// ─── Worker handle ────────────────────────────────────────────────────────────

pub struct SyncWorker {
    pub cmd_tx:   mpsc::Sender<SyncCommand>,
    pub event_rx: Arc<Mutex<mpsc::Receiver<SyncEvent>>>,
}

impl SyncWorker {
    /// Spawn the background worker. With `refresh` set, the last requested
    /// month is fetched again on that period.
    pub fn spawn(db: Database, client: SchoolApiClient, refresh: Option<Duration>) -> Self {
        let (cmd_tx,   mut cmd_rx)   = mpsc::channel::<SyncCommand>(32);
        let (event_tx,     event_rx) = mpsc::channel::<SyncEvent>(64);

        tokio::spawn(async move {
            // Ticks are ignored when refresh is off.
            let period       = refresh.unwrap_or(Duration::from_secs(86_400));
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // discard first immediate tick

            let mut last: Option<MonthKey> = None;

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(SyncCommand::Shutdown) | None => break,

                        Some(SyncCommand::FetchMonth(key)) => {
                            last = Some(key);
                            sync_month(&client, &db, key, &event_tx).await;
                        }

                        Some(SyncCommand::FetchProfile) => {
                            sync_profile(&client, &db, &event_tx).await;
                        }
                    },
                    _ = interval.tick() => {
                        if refresh.is_none() { continue; }
                        if let Some(key) = last {
                            sync_month(&client, &db, key, &event_tx).await;
                        }
                    }
                }
            }

            tracing::info!("Sync worker stopped");
        });

        SyncWorker { cmd_tx, event_rx: Arc::new(Mutex::new(event_rx)) }
    }

    pub async fn fetch_month(&self, key: MonthKey) {
        let _ = self.cmd_tx.send(SyncCommand::FetchMonth(key)).await;
    }
    pub async fn fetch_profile(&self) { let _ = self.cmd_tx.send(SyncCommand::FetchProfile).await; }
    pub async fn shutdown(&self)      { let _ = self.cmd_tx.send(SyncCommand::Shutdown).await; }

    /// Wait for the next event, for one-shot callers that have no UI loop.
    pub async fn next_event(&self) -> Option<SyncEvent> {
        self.event_rx.lock().await.recv().await
    }
}

// ─── Month sync ───────────────────────────────────────────────────────────────

async fn sync_month(
    client: &SchoolApiClient,
    db:     &Database,
    key:    MonthKey,
    tx:     &mpsc::Sender<SyncEvent>,
) {
    let _ = tx.send(SyncEvent::SyncStarted(key)).await;
    tracing::info!("Month sync started for {key}");

    // Both fetches must succeed before the cache is touched.
    let fetched = async {
        let record   = client.fetch_attendance(key).await?;
        let holidays = client.fetch_holidays(key).await?;
        anyhow::Ok((record, holidays))
    }.await;

    let (record, holidays) = match fetched {
        Ok(v)  => v,
        Err(e) => {
            tracing::warn!("fetch {key}: {e}");
            let _ = tx.send(SyncEvent::SyncError(e.to_string())).await;
            return;
        }
    };

    let student = client.config.student_id.as_str();
    match db.replace_month(student, key, &record, &holidays).await {
        Ok((marks, holidays)) => {
            tracing::info!("Month sync done for {key}: marks={marks} holidays={holidays}");
            let _ = tx.send(SyncEvent::MonthReady { key, marks, holidays }).await;
        }
        Err(e) => {
            tracing::error!("store {key}: {e}");
            let _ = tx.send(SyncEvent::SyncError(e.to_string())).await;
        }
    }
}

// ─── Profile sync ─────────────────────────────────────────────────────────────

async fn sync_profile(client: &SchoolApiClient, db: &Database, tx: &mpsc::Sender<SyncEvent>) {
    let result = async {
        let profile = client.fetch_profile().await?;
        db.save_profile(&profile).await?;
        anyhow::Ok(profile)
    }.await;

    match result {
        Ok(p) => {
            tracing::info!("Profile refreshed for {}", p.student_id);
            let _ = tx.send(SyncEvent::ProfileReady(p.display_name())).await;
        }
        Err(e) => {
            tracing::warn!("fetch profile: {e}");
            let _ = tx.send(SyncEvent::SyncError(format!("Profile: {e}"))).await;
        }
    }
}
