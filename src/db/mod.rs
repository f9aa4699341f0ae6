use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions}, Row};
use std::path::PathBuf;

use crate::calendar::{AttendanceRecord, AttendanceStatus, MonthKey};
use crate::holidays::Holiday;

// ─── Domain models ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id:  String,
    pub studentname: String,
    pub school_name: Option<String>,
    pub rollno:      Option<String>,
    pub updated_at:  DateTime<Utc>,
}

impl StudentProfile {
    /// "Asha Rao · Green Valley School"
    pub fn display_name(&self) -> String {
        match &self.school_name {
            Some(school) if !school.is_empty() => format!("{} · {school}", self.studentname),
            _ => self.studentname.clone(),
        }
    }
}

// ─── Database ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect() -> Result<Self> {
        let dir = data_dir();
        std::fs::create_dir_all(&dir)?;
        let url = format!("sqlite://{}?mode=rwc", dir.join("attendcal.db").display());
        Ok(Self { pool: SqlitePool::connect(&url).await? })
    }

    /// Single-connection in-memory database; every connection to `:memory:`
    /// is its own database, so the pool must not open a second one.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:").await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS attendance (
                student_id TEXT NOT NULL, date TEXT NOT NULL, status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (student_id, date)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS holidays (
                date TEXT NOT NULL, title TEXT NOT NULL,
                PRIMARY KEY (date, title)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS profiles (
                student_id TEXT PRIMARY KEY, studentname TEXT NOT NULL,
                school_name TEXT, rollno TEXT, updated_at TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        tracing::info!("DB migrations complete");
        Ok(())
    }

    // ── Attendance ────────────────────────────────────────────────────────────

    pub async fn upsert_attendance(
        &self, student_id: &str, date: &str, status: &AttendanceStatus,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO attendance (student_id,date,status,updated_at) VALUES (?,?,?,?)
             ON CONFLICT(student_id,date) DO UPDATE SET
                status=excluded.status, updated_at=excluded.updated_at"
        )
        .bind(student_id).bind(date).bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool).await?;
        Ok(())
    }

    /// Replace everything cached for the student's month with `record`.
    /// Entries of `record` that are not real days of the month are dropped.
    pub async fn replace_month_attendance(
        &self, student_id: &str, key: MonthKey, record: &AttendanceRecord,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let stored = write_month_attendance(&mut tx, student_id, key, record).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Attendance and holidays for the month in one transaction: either both
    /// are replaced or the cache is left as it was.
    pub async fn replace_month(
        &self, student_id: &str, key: MonthKey, record: &AttendanceRecord, holidays: &[Holiday],
    ) -> Result<(usize, usize)> {
        let mut tx = self.pool.begin().await?;
        let marks  = write_month_attendance(&mut tx, student_id, key, record).await?;
        let hols   = write_month_holidays(&mut tx, key, holidays).await?;
        tx.commit().await?;
        Ok((marks, hols))
    }

    pub async fn attendance_for_month(&self, student_id: &str, key: MonthKey) -> Result<AttendanceRecord> {
        let rows = sqlx::query(
            "SELECT date, status FROM attendance WHERE student_id=? AND date LIKE ? ORDER BY date"
        )
        .bind(student_id).bind(month_pattern(key))
        .fetch_all(&self.pool).await?;

        Ok(rows.iter()
            .map(|r| (r.get::<String, _>("date"), r.get::<String, _>("status")))
            .collect())
    }

    // ── Holidays ──────────────────────────────────────────────────────────────

    pub async fn replace_month_holidays(&self, key: MonthKey, holidays: &[Holiday]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let stored = write_month_holidays(&mut tx, key, holidays).await?;
        tx.commit().await?;
        Ok(stored)
    }

    pub async fn holidays_for_month(&self, key: MonthKey) -> Result<Vec<Holiday>> {
        let rows = sqlx::query("SELECT date, title FROM holidays WHERE date LIKE ? ORDER BY date, title")
            .bind(month_pattern(key))
            .fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| Holiday::new(r.get::<String, _>("date"), r.get::<String, _>("title"))).collect())
    }

    // ── Profiles ──────────────────────────────────────────────────────────────

    pub async fn save_profile(&self, p: &StudentProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (student_id,studentname,school_name,rollno,updated_at)
             VALUES (?,?,?,?,?)
             ON CONFLICT(student_id) DO UPDATE SET
                studentname=excluded.studentname, school_name=excluded.school_name,
                rollno=excluded.rollno, updated_at=excluded.updated_at"
        )
        .bind(&p.student_id).bind(&p.studentname)
        .bind(&p.school_name).bind(&p.rollno)
        .bind(p.updated_at.to_rfc3339())
        .execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE student_id=?")
            .bind(student_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_profile).transpose()
    }
}

// ─── Month writes ────────────────────────────────────────────────────────────

async fn write_month_attendance(
    conn: &mut SqliteConnection, student_id: &str, key: MonthKey, record: &AttendanceRecord,
) -> Result<usize> {
    let now = Utc::now().to_rfc3339();

    sqlx::query("DELETE FROM attendance WHERE student_id=? AND date LIKE ?")
        .bind(student_id).bind(month_pattern(key))
        .execute(&mut *conn).await?;

    let mut stored = 0usize;
    for (date, status) in record.for_month(key) {
        let done = sqlx::query("INSERT INTO attendance (student_id,date,status,updated_at) VALUES (?,?,?,?)")
            .bind(student_id).bind(date).bind(status.as_str()).bind(&now)
            .execute(&mut *conn).await?;
        stored += done.rows_affected() as usize;
    }
    Ok(stored)
}

/// Ignored duplicates are not counted.
async fn write_month_holidays(conn: &mut SqliteConnection, key: MonthKey, holidays: &[Holiday]) -> Result<usize> {
    let prefix = key.prefix();

    sqlx::query("DELETE FROM holidays WHERE date LIKE ?")
        .bind(month_pattern(key))
        .execute(&mut *conn).await?;

    let mut stored = 0usize;
    for h in holidays.iter().filter(|h| h.date.starts_with(&prefix)) {
        let done = sqlx::query("INSERT OR IGNORE INTO holidays (date,title) VALUES (?,?)")
            .bind(&h.date).bind(&h.title)
            .execute(&mut *conn).await?;
        stored += done.rows_affected() as usize;
    }
    Ok(stored)
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<StudentProfile> {
    Ok(StudentProfile {
        student_id:  row.get("student_id"),
        studentname: row.get("studentname"),
        school_name: row.get("school_name"),
        rollno:      row.get("rollno"),
        updated_at:  parse_dt(row.get("updated_at"))?,
    })
}

fn parse_dt(s: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc))
}

/// LIKE pattern matching the same `YYYY-MM` prefix `summarize` filters on.
fn month_pattern(key: MonthKey) -> String {
    format!("{}%", key.prefix())
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("attendcal")
}
