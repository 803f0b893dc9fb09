use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the local wall-clock time stamped onto rows, folders and logs.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Host clock in the process time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AuditStatus::Success => "Éxito",
            AuditStatus::Error => "Error",
        }
    }
}

/// One line in the logs table, written once per submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub recorded_at: NaiveDateTime,
    pub status: AuditStatus,
    pub error: Option<String>,
    pub payload: Value,
}

impl AuditLogEntry {
    pub fn success(recorded_at: NaiveDateTime, payload: Value) -> Self {
        Self {
            recorded_at,
            status: AuditStatus::Success,
            error: None,
            payload,
        }
    }

    pub fn failure(recorded_at: NaiveDateTime, error: impl Into<String>, payload: Value) -> Self {
        Self {
            recorded_at,
            status: AuditStatus::Error,
            error: Some(error.into()),
            payload,
        }
    }

    /// Cells for the logs table: timestamp, status, error, raw payload JSON.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.recorded_at.format(TIMESTAMP_FORMAT).to_string(),
            self.status.label().to_string(),
            self.error.clone().unwrap_or_default(),
            self.payload.to_string(),
        ]
    }
}
