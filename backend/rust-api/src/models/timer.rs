use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted on the per-session countdown stream
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CountdownEvent {
    CountdownTick(CountdownTick),
    CountdownExpired(CountdownExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CountdownTick {
    pub session_id: String,
    pub remaining_seconds: i64,
    pub deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CountdownExpired {
    pub session_id: String,
    pub deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl CountdownEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            CountdownEvent::CountdownTick(_) => "countdown-tick",
            CountdownEvent::CountdownExpired(_) => "countdown-expired",
        }
    }
}
