use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Opaque keyset cursor over (created_at desc, id desc). Wire format is
/// `<timestamp_micros>,<uuid>`; clients echo it back unmodified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn encode(&self) -> String {
        format!("{},{}", self.created_at.timestamp_micros(), self.id)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (ts, id) = raw.split_once(',')?;
        let micros = ts.parse::<i64>().ok()?;
        let created_at = Utc.timestamp_micros(micros).single()?;
        let id = Uuid::parse_str(id.trim()).ok()?;
        Some(Cursor { created_at, id })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub limit: Option<u64>,
    pub cursor: Option<String>,
    pub status: Option<String>,
    pub terminal_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl OrderListQuery {
    pub fn page_size(&self) -> u64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}
