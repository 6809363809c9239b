use serde::{Deserialize, Serialize};

/// A portal account. The password hash and bearer token never leave the
/// service layer; this is the wire-safe shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Login identifier, unique.
    pub mobile: String,
    pub company: String,
    /// GST registration number, unique when present.
    pub gst: Option<String>,
    pub role: String,
    pub active: bool,
    pub create_at: Option<String>,
    pub update_at: Option<String>,
}

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub mobile: String,
    pub password: String,
    pub company: String,
    pub gst: Option<String>,
}

/// Mobile numbers are digits only, 10 to 15 of them.
pub fn normalize_mobile(raw: &str) -> Option<String> {
    let trimmed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = trimmed.strip_prefix('+').unwrap_or(&trimmed);
    if digits.len() < 10 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_mobile_accepts_plain_and_prefixed() {
        assert_eq!(normalize_mobile("9876543210").as_deref(), Some("9876543210"));
        assert_eq!(
            normalize_mobile("+919876543210").as_deref(),
            Some("919876543210")
        );
        assert_eq!(normalize_mobile(" 98765 43210 ").as_deref(), Some("9876543210"));
    }

    #[test]
    fn normalize_mobile_rejects_garbage() {
        assert!(normalize_mobile("").is_none());
        assert!(normalize_mobile("12345").is_none());
        assert!(normalize_mobile("98765abc10").is_none());
        assert!(normalize_mobile("1234567890123456").is_none());
    }
}
