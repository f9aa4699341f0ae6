//! REST client for the school backend.
//!
//! Three calls back the attendance screen:
//!   POST {base}/login        {"student_id": ..}     → student_parent_details
//!   GET  {base}/attendance   ?student_id=&month=    → {"attendance": {date: status}}
//!   GET  {base}/holidays     ?month=                → {"holidays": [{date, title}]}
//!
//! Parsing is kept apart from transport so payload handling can be tested
//! without a server.

use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::calendar::{AttendanceRecord, MonthKey};
use crate::db::StudentProfile;
use crate::holidays::Holiday;

// ─── Config ───────────────────────────────────────────────────────────────────

fn default_base_url() -> String { "https://api.stpl.cloud".to_owned() }

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url:   String,
    pub student_id: String,
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LoginResponse {
    student_parent_details: Option<StudentDetails>,
}

#[derive(Debug, Deserialize)]
struct StudentDetails {
    studentname: Option<String>,
    school_name: Option<String>,
    #[serde(default)]
    rollno:      Value,
    #[serde(default)]
    student_id:  Value,
}

#[derive(Debug, Deserialize)]
struct AttendanceResponse {
    #[serde(default)]
    attendance: AttendanceRecord,
}

#[derive(Debug, Deserialize)]
struct HolidaysResponse {
    #[serde(default)]
    holidays: Vec<Holiday>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct SchoolApiClient {
    http:       Client,
    pub config: ApiConfig,
}

impl SchoolApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent("attendcal/0.1")
                .build()?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub async fn fetch_profile(&self) -> Result<StudentProfile> {
        let body = self.http.post(self.url("login"))
            .json(&serde_json::json!({ "student_id": self.config.student_id }))
            .send().await?.error_for_status()?.text().await?;
        parse_profile(&body, &self.config.student_id)
    }

    pub async fn fetch_attendance(&self, key: MonthKey) -> Result<AttendanceRecord> {
        let body = self.http.get(self.url("attendance"))
            .query(&[("student_id", self.config.student_id.as_str()), ("month", key.prefix().as_str())])
            .send().await?.error_for_status()?.text().await?;
        parse_attendance(&body)
    }

    pub async fn fetch_holidays(&self, key: MonthKey) -> Result<Vec<Holiday>> {
        let body = self.http.get(self.url("holidays"))
            .query(&[("month", key.prefix())])
            .send().await?.error_for_status()?.text().await?;
        parse_holidays(&body)
    }
}

// ─── Payload parsing ──────────────────────────────────────────────────────────

pub fn parse_profile(body: &str, requested_id: &str) -> Result<StudentProfile> {
    let resp: LoginResponse = serde_json::from_str(body)?;
    let d = resp.student_parent_details
        .ok_or_else(|| anyhow!("login response carries no student_parent_details"))?;
    Ok(StudentProfile {
        student_id:  scalar_string(&d.student_id).unwrap_or_else(|| requested_id.to_owned()),
        studentname: d.studentname.unwrap_or_else(|| "(unnamed student)".into()),
        school_name: d.school_name,
        rollno:      scalar_string(&d.rollno),
        updated_at:  Utc::now(),
    })
}

pub fn parse_attendance(body: &str) -> Result<AttendanceRecord> {
    Ok(serde_json::from_str::<AttendanceResponse>(body)?.attendance)
}

pub fn parse_holidays(body: &str) -> Result<Vec<Holiday>> {
    Ok(serde_json::from_str::<HolidaysResponse>(body)?.holidays)
}

/// The backend sends ids as either strings or numbers.
fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n)                  => Some(n.to_string()),
        _                                 => None,
    }
}
