//! Ban and approval records
//!
//! Both record kinds are keyed by client address. The JSON field names match
//! the documents written by earlier revisions of the portal (`ip`, `time`,
//! `userAgent`), so existing `ban.json` files load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two record kinds an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Address is denied on every route
    Ban,
    /// Address has authenticated successfully at least once
    Approval,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ban => write!(f, "ban"),
            Self::Approval => write!(f, "approval"),
        }
    }
}

/// An address that crossed the failure threshold or failed identity matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Client address
    #[serde(rename = "ip", alias = "address")]
    pub address: String,

    /// When the ban was recorded
    pub time: DateTime<Utc>,

    /// Client signature (user agent) at ban time
    #[serde(
        rename = "userAgent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_signature: Option<String>,
}

impl BanRecord {
    /// Create a ban record stamped with the current time
    pub fn new(address: impl Into<String>, client_signature: Option<String>) -> Self {
        Self {
            address: address.into(),
            time: Utc::now(),
            client_signature,
        }
    }
}

/// An address that authenticated successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Client address
    #[serde(rename = "ip", alias = "address")]
    pub address: String,

    /// When the first successful login from this address happened
    pub time: DateTime<Utc>,

    /// Client signature (user agent) at approval time
    #[serde(
        rename = "userAgent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_signature: Option<String>,

    /// Authenticated identity, when the login method provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl ApprovalRecord {
    /// Create an approval record stamped with the current time
    pub fn new(
        address: impl Into<String>,
        client_signature: Option<String>,
        identity: Option<String>,
    ) -> Self {
        Self {
            address: address.into(),
            time: Utc::now(),
            client_signature,
            identity,
        }
    }
}

/// Either record kind, for operations that treat them uniformly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessRecord {
    /// A ban
    Ban(BanRecord),
    /// An approval
    Approval(ApprovalRecord),
}

impl AccessRecord {
    /// Address the record is keyed by
    pub fn address(&self) -> &str {
        match self {
            Self::Ban(record) => &record.address,
            Self::Approval(record) => &record.address,
        }
    }

    /// Kind of the record
    pub fn kind(&self) -> AccessKind {
        match self {
            Self::Ban(_) => AccessKind::Ban,
            Self::Approval(_) => AccessKind::Approval,
        }
    }

    /// When the record was created
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Ban(record) => record.time,
            Self::Approval(record) => record.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_record_reads_legacy_document() {
        let json = r#"[{"ip":"10.0.0.5","time":"2025-01-02T03:04:05.000Z","userAgent":"curl/8.0"}]"#;
        let records: Vec<BanRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "10.0.0.5");
        assert_eq!(records[0].client_signature.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_ban_record_without_user_agent() {
        let json = r#"{"ip":"::1","time":"2025-01-02T03:04:05Z"}"#;
        let record: BanRecord = serde_json::from_str(json).unwrap();
        assert!(record.client_signature.is_none());

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["ip"], "::1");
        assert!(out.get("userAgent").is_none());
    }

    #[test]
    fn test_access_record_accessors() {
        let record = AccessRecord::Approval(ApprovalRecord::new(
            "192.168.1.4",
            None,
            Some("octocat".to_string()),
        ));
        assert_eq!(record.address(), "192.168.1.4");
        assert_eq!(record.kind(), AccessKind::Approval);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "approval");
        assert_eq!(json["identity"], "octocat");
    }
}
