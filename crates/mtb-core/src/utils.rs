use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::Result;

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/audit).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64, username: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            username: Some(username.to_string()),
            command: None,
            authorized: None,
            error: None,
            retry_after: None,
        }
    }

    pub fn command(user_id: i64, username: &str, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::base("command", user_id, username)
        }
    }

    pub fn auth(user_id: i64, username: &str, authorized: bool) -> Self {
        Self {
            authorized: Some(authorized),
            ..Self::base("auth", user_id, username)
        }
    }

    pub fn rate_limit(user_id: i64, username: &str, retry_after: f64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", user_id, username)
        }
    }

    pub fn error(user_id: i64, username: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base("error", user_id, username)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        // Truncate potentially large user-supplied payloads.
        if let Some(s) = &event.command {
            event.command = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        if let Some(obj) = value.as_object() {
            for (k, v) in obj {
                out.push('\n');
                out.push_str(k);
                out.push_str(": ");
                match v {
                    serde_json::Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
