use serde::{Deserialize, Serialize};

/// Claim state of a serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerialStatus {
    Available,
    Registered,
}

impl SerialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerialStatus::Available => "AVAILABLE",
            SerialStatus::Registered => "REGISTERED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(SerialStatus::Available),
            "REGISTERED" => Some(SerialStatus::Registered),
            _ => None,
        }
    }
}

impl Default for SerialStatus {
    fn default() -> Self {
        Self::Available
    }
}

/// SerialRecord — one physical unit's registration state in the ledger.
///
/// The record is AVAILABLE with no owner until a customer claims it, and
/// REGISTERED with owner, timestamp and evidence reference afterwards; a
/// disassociation puts it back to AVAILABLE and clears all three fields
/// together. `serial` is globally unique (uppercased at ingestion) and
/// `product_id` never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerialRecord {
    /// UUID primary key, assigned at creation.
    pub id: String,

    /// Normalized (uppercase) serial number — globally unique.
    pub serial: String,

    /// Owning product. Immutable.
    pub product_id: String,

    /// Claiming user; None while AVAILABLE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Claim state.
    #[serde(default)]
    pub status: SerialStatus,

    /// Set exactly when the record transitions to REGISTERED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<String>,

    /// Stored bill-file key attached at claim time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}

/// Longest serial number accepted at ingestion.
pub const MAX_SERIAL_LEN: usize = 64;

/// Normalize a raw serial string: trim surrounding whitespace, uppercase.
///
/// Returns None for strings that are empty after trimming or too long —
/// those are rejected before any storage access.
pub fn normalize_serial(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || s.len() > MAX_SERIAL_LEN {
        return None;
    }
    Some(s.to_uppercase())
}
