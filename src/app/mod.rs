use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

use crate::{
    calendar::{self, AttendanceRecord, AttendanceStatus, CalendarMatrix, MonthKey, MonthSummary},
    db::Database,
    holidays::Holiday,
    sync::worker::{SyncEvent, SyncWorker},
    ui::draw,
};

// ─── Focus model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Attendance,
    Holidays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Main,
    /// Per-day attendance popup.
    Detail,
    Help,
}

// ─── App state ────────────────────────────────────────────────────────────────

pub struct App {
    pub db:           Database,
    pub student_id:   Option<String>,
    pub sync:         Option<SyncWorker>,
    pub view:         MonthKey,
    pub selected_day: u32,
    pub today:        NaiveDate,
    pub tab:          Tab,
    pub panel:        Panel,
    // Derived from `view` + cache on every month change
    pub matrix:       CalendarMatrix,
    pub record:       AttendanceRecord,
    pub summary:      MonthSummary,
    pub holidays:     Vec<Holiday>,
    pub profile_name: Option<String>,
    pub sync_status:  String,
    pub running:      bool,
}

impl App {
    pub async fn new(db: Database, student_id: Option<String>) -> Result<Self> {
        Self::open_at(db, student_id, Local::now().date_naive()).await
    }

    /// Start on the month of `today` with `today` selected.
    pub async fn open_at(db: Database, student_id: Option<String>, today: NaiveDate) -> Result<Self> {
        let view = MonthKey::from_date(today);
        let profile_name = match &student_id {
            Some(id) => db.get_profile(id).await?.map(|p| p.display_name()),
            None     => None,
        };

        let mut app = Self {
            matrix: calendar::build_matrix(view)?,
            summary: calendar::summarize(view, &AttendanceRecord::new())?,
            record: AttendanceRecord::new(),
            holidays: Vec::new(),
            db, student_id, sync: None,
            view,
            selected_day: today.day(),
            today,
            tab:   Tab::Attendance,
            panel: Panel::Main,
            profile_name,
            sync_status: String::new(),
            running: true,
        };
        app.reload_month().await?;
        Ok(app)
    }

    pub fn attach_sync_worker(&mut self, w: SyncWorker) { self.sync = Some(w); }

    // ── TUI loop ──────────────────────────────────────────────────────────────

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend  = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;

        let result = self.event_loop(&mut term).await;

        disable_raw_mode()?;
        execute!(term.backend_mut(), LeaveAlternateScreen)?;
        term.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        term: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        if let Some(ref w) = self.sync {
            w.fetch_profile().await;
            w.fetch_month(self.view).await;
        }

        let tick = std::time::Duration::from_millis(50);
        while self.running {
            term.draw(|f| draw(f, self))?;

            let pending: Vec<SyncEvent> = if let Some(ref w) = self.sync {
                if let Ok(mut rx) = w.event_rx.try_lock() {
                    let mut buf = Vec::new();
                    while let Ok(ev) = rx.try_recv() { buf.push(ev); }
                    buf
                } else { vec![] }
            } else { vec![] };
            for ev in pending { self.on_sync_event(ev).await?; }

            if event::poll(tick)? {
                if let Event::Key(key) = event::read()? {
                    self.on_key(key).await?;
                }
            }
        }

        if let Some(ref w) = self.sync { w.shutdown().await; }
        Ok(())
    }

    pub async fn on_sync_event(&mut self, ev: SyncEvent) -> Result<()> {
        match ev {
            SyncEvent::SyncStarted(key) => self.sync_status = format!("⟳ Fetching {key}…"),
            SyncEvent::MonthReady { key, marks, holidays } => {
                self.sync_status = format!("✓ {key}: {marks} marks, {holidays} holidays");
                if key == self.view { self.reload_month().await?; }
            }
            SyncEvent::ProfileReady(name) => self.profile_name = Some(name),
            SyncEvent::SyncError(msg)     => self.sync_status = format!("✗ {msg}  (r: retry)"),
        }
        Ok(())
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    pub async fn on_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.panel {
            Panel::Detail | Panel::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?')) {
                    self.panel = Panel::Main;
                }
                return Ok(());
            }
            Panel::Main => {}
        }

        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('?') => self.panel = Panel::Help,
            KeyCode::Tab       => {
                self.tab = match self.tab { Tab::Attendance => Tab::Holidays, Tab::Holidays => Tab::Attendance };
            }
            KeyCode::Char(']') => self.go_to_month(self.view.next(), self.selected_day).await?,
            KeyCode::Char('[') => self.go_to_month(self.view.prev(), self.selected_day).await?,
            KeyCode::Char('t') => {
                let t = self.today;
                self.go_to_month(MonthKey::from_date(t), t.day()).await?;
            }
            KeyCode::Char('r') => self.request_month().await,
            _ => match self.tab {
                Tab::Attendance => self.key_attendance(key).await?,
                Tab::Holidays   => self.key_holidays(key).await?,
            },
        }
        Ok(())
    }

    async fn key_attendance(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Right | KeyCode::Char('l') => self.shift_day(1).await?,
            KeyCode::Left  | KeyCode::Char('h') => self.shift_day(-1).await?,
            KeyCode::Down  | KeyCode::Char('j') => self.shift_day(7).await?,
            KeyCode::Up    | KeyCode::Char('k') => self.shift_day(-7).await?,
            KeyCode::Enter => self.panel = Panel::Detail,
            _ => {}
        }
        Ok(())
    }

    async fn key_holidays(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Right | KeyCode::Char('l') => self.go_to_month(self.view.next(), self.selected_day).await?,
            KeyCode::Left  | KeyCode::Char('h') => self.go_to_month(self.view.prev(), self.selected_day).await?,
            _ => {}
        }
        Ok(())
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    pub fn selected_date_key(&self) -> String {
        self.view.date_key(self.selected_day)
    }

    pub fn selected_status(&self) -> Option<&AttendanceStatus> {
        self.record.status_on(self.view, self.selected_day)
    }

    /// "PRESENT", "ABSENT", the raw status upper-cased, or "N/A".
    pub fn selected_status_label(&self) -> String {
        match self.selected_status() {
            Some(s) if !s.as_str().is_empty() => s.as_str().to_uppercase(),
            _ => "N/A".into(),
        }
    }

    pub fn holidays_on(&self, day: u32) -> impl Iterator<Item = &Holiday> {
        self.holidays.iter().filter(move |h| h.day() == Some(day))
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    async fn shift_day(&mut self, d: i64) -> Result<()> {
        let current = self.view.first_day()? + Duration::days(i64::from(self.selected_day) - 1);
        let Some(date) = current.checked_add_signed(Duration::days(d)) else { return Ok(()) };
        let key     = MonthKey::from_date(date);
        if key == self.view {
            self.selected_day = date.day();
            Ok(())
        } else {
            self.go_to_month(key, date.day()).await
        }
    }

    /// Switch month, keeping `day` selected when the month has it.
    async fn go_to_month(&mut self, key: MonthKey, day: u32) -> Result<()> {
        let days = match calendar::days_in_month(key) {
            Ok(n)  => n,
            Err(e) => { self.sync_status = format!("✗ {e}"); return Ok(()); }
        };
        self.view         = key;
        self.selected_day = day.clamp(1, days);
        self.reload_month().await?;
        self.request_month().await;
        Ok(())
    }

    async fn request_month(&mut self) {
        if let Some(ref w) = self.sync { w.fetch_month(self.view).await; }
    }

    /// Re-read the cache for `view` and recompute grid and summary.
    pub async fn reload_month(&mut self) -> Result<()> {
        self.record = match &self.student_id {
            Some(id) => self.db.attendance_for_month(id, self.view).await?,
            None     => AttendanceRecord::new(),
        };
        self.holidays = self.db.holidays_for_month(self.view).await?;
        self.matrix   = calendar::build_matrix(self.view)?;
        self.summary  = calendar::summarize(self.view, &self.record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent { KeyEvent::new(code, KeyModifiers::NONE) }

    async fn app() -> App {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let rec = AttendanceRecord::from_iter([
            ("2025-05-01", "present"),
            ("2025-05-02", "absent"),
            ("2025-05-03", "present"),
            ("2025-04-10", "absent"),
        ]);
        db.replace_month_attendance("S1", MonthKey::new(2025, 5).unwrap(), &rec).await.unwrap();
        db.replace_month_attendance("S1", MonthKey::new(2025, 4).unwrap(), &rec).await.unwrap();
        db.replace_month_holidays(
            MonthKey::new(2025, 5).unwrap(),
            &[Holiday::new("2025-05-05", "Labour Day")],
        ).await.unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        App::open_at(db, Some("S1".into()), today).await.unwrap()
    }

    #[tokio::test]
    async fn opens_on_todays_month_with_summary() {
        let app = app().await;
        assert_eq!(app.view, MonthKey { year: 2025, month: 5 });
        assert_eq!(app.summary, MonthSummary { present_count: 2, absent_count: 1, working_days: 27 });
        assert_eq!(app.selected_status_label(), "ABSENT");
        assert_eq!(app.holidays_on(5).count(), 1);
    }

    #[tokio::test]
    async fn month_navigation_recomputes() {
        let mut app = app().await;
        app.on_key(key(KeyCode::Char('['))).await.unwrap();
        assert_eq!(app.view, MonthKey { year: 2025, month: 4 });
        assert_eq!(app.summary.absent_count, 1);
        assert_eq!(app.summary.present_count, 0);
        assert_eq!(app.summary.working_days, 26);
        assert!(app.holidays.is_empty());

        app.on_key(key(KeyCode::Char(']'))).await.unwrap();
        app.on_key(key(KeyCode::Char(']'))).await.unwrap();
        assert_eq!(app.view, MonthKey { year: 2025, month: 6 });
        assert_eq!(app.summary.present_count + app.summary.absent_count, 0);

        app.on_key(key(KeyCode::Char('t'))).await.unwrap();
        assert_eq!((app.view.month, app.selected_day), (5, 2));
    }

    #[tokio::test]
    async fn day_moves_cross_month_edges() {
        let mut app = app().await;
        app.on_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!((app.view.month, app.selected_day), (4, 25));
        app.on_key(key(KeyCode::Down)).await.unwrap();
        app.on_key(key(KeyCode::Right)).await.unwrap();
        assert_eq!(app.selected_date_key(), "2025-05-03");
    }

    #[tokio::test]
    async fn selection_clamps_to_shorter_month() {
        let mut app = app().await;
        app.selected_day = 31;
        app.view = MonthKey { year: 2025, month: 1 };
        app.on_key(key(KeyCode::Char(']'))).await.unwrap();
        assert_eq!((app.view.month, app.selected_day), (2, 28));
    }

    #[tokio::test]
    async fn detail_popup_and_tabs() {
        let mut app = app().await;
        app.on_key(key(KeyCode::Right)).await.unwrap();
        app.on_key(key(KeyCode::Right)).await.unwrap();
        assert_eq!(app.selected_day, 4);
        app.on_key(key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.panel, Panel::Detail);
        assert_eq!(app.selected_status_label(), "N/A");
        // keys other than close are swallowed by the popup
        app.on_key(key(KeyCode::Char(']'))).await.unwrap();
        assert_eq!(app.view.month, 5);
        app.on_key(key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.panel, Panel::Main);

        app.on_key(key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.tab, Tab::Holidays);
        app.on_key(key(KeyCode::Left)).await.unwrap();
        assert_eq!(app.view.month, 4);
        app.on_key(key(KeyCode::Char('q'))).await.unwrap();
        assert!(!app.running);
    }

    #[tokio::test]
    async fn sync_events_update_status_and_reload() {
        let mut app = app().await;
        let may = MonthKey::new(2025, 5).unwrap();
        app.db.upsert_attendance("S1", "2025-05-06", &AttendanceStatus::Present).await.unwrap();
        app.on_sync_event(SyncEvent::MonthReady { key: may, marks: 4, holidays: 1 }).await.unwrap();
        assert_eq!(app.summary.present_count, 3);
        app.on_sync_event(SyncEvent::SyncError("timeout".into())).await.unwrap();
        assert!(app.sync_status.contains("timeout"));
        app.on_sync_event(SyncEvent::ProfileReady("Asha Rao".into())).await.unwrap();
        assert_eq!(app.profile_name.as_deref(), Some("Asha Rao"));
    }
}
