use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// PIN authority state persisted across restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    pub active_pin: String,
    #[serde(default)]
    pub used_pins: HashSet<String>,
}

impl PinRecord {
    // Fresh record with the given PIN and no redemption history.
    pub fn new(active_pin: impl Into<String>) -> Self {
        Self {
            active_pin: active_pin.into(),
            used_pins: HashSet::new(),
        }
    }
}

// Time-bounded access grant. Lives only in session-scoped storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub started: bool,
    pub expires_at: Option<u64>,
}

impl SessionGrant {
    // The cleared state: no flag, no expiry.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => self.started && now_ms < expires_at,
            None => false,
        }
    }
}

// Opaque content record shown once access is granted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub created_at: u64,
    pub payload: Value,
}

// Current export envelope version.
pub const CONTENT_EXPORT_VERSION: u32 = 1;

// Portable snapshot of the content store, in store order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentExport {
    pub version: u32,
    pub exported_at: u64,
    pub records: Vec<ContentRecord>,
}
