//! Action-type vocabulary and ledger entry types.
//!
//! An action is one of the external integrations a user can trigger against a
//! product from the actions panel. Every invocation is recorded as an
//! [`ActionHistoryEntry`] in the ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The fixed set of actions the panel can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CopyInfo,
    CopyLink,
    GenerateCopy,
    Whatsapp,
    Schedule,
    Instagram,
    Tiktok,
    Youtube,
    SellerBot,
    Crm,
    Email,
    Export,
}

impl ActionType {
    /// Every action type, in declaration order.
    pub const ALL: [ActionType; 12] = [
        ActionType::CopyInfo,
        ActionType::CopyLink,
        ActionType::GenerateCopy,
        ActionType::Whatsapp,
        ActionType::Schedule,
        ActionType::Instagram,
        ActionType::Tiktok,
        ActionType::Youtube,
        ActionType::SellerBot,
        ActionType::Crm,
        ActionType::Email,
        ActionType::Export,
    ];

    /// Wire identifier, e.g. `seller_bot`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CopyInfo => "copy_info",
            ActionType::CopyLink => "copy_link",
            ActionType::GenerateCopy => "generate_copy",
            ActionType::Whatsapp => "whatsapp",
            ActionType::Schedule => "schedule",
            ActionType::Instagram => "instagram",
            ActionType::Tiktok => "tiktok",
            ActionType::Youtube => "youtube",
            ActionType::SellerBot => "seller_bot",
            ActionType::Crm => "crm",
            ActionType::Email => "email",
            ActionType::Export => "export",
        }
    }

    /// Human-readable name shown on quick-action shortcuts.
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::CopyInfo => "Copy Info",
            ActionType::CopyLink => "Copy Link",
            ActionType::GenerateCopy => "Generate Copy",
            ActionType::Whatsapp => "WhatsApp",
            ActionType::Schedule => "Schedule Post",
            ActionType::Instagram => "Instagram",
            ActionType::Tiktok => "TikTok",
            ActionType::Youtube => "YouTube",
            ActionType::SellerBot => "Seller Bot",
            ActionType::Crm => "CRM",
            ActionType::Email => "Email",
            ActionType::Export => "Export",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown action type: '{0}'")]
pub struct ParseActionTypeError(pub String);

impl FromStr for ActionType {
    type Err = ParseActionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseActionTypeError(s.to_string()))
    }
}

/// Free-form per-action payload (platform, campaign name, recipient, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The caller-supplied part of a ledger entry. The ledger assigns `id` and
/// `timestamp` on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActionEntry {
    pub product_id: String,
    pub product_title: String,
    pub action_type: ActionType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewActionEntry {
    /// A successful invocation.
    pub fn success(
        product_id: impl Into<String>,
        product_title: impl Into<String>,
        action_type: ActionType,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_title: product_title.into(),
            action_type,
            success: true,
            error_message: None,
            metadata: Metadata::new(),
        }
    }

    /// A failed invocation with the error the integration reported.
    pub fn failure(
        product_id: impl Into<String>,
        product_title: impl Into<String>,
        action_type: ActionType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(error.into()),
            ..Self::success(product_id, product_title, action_type)
        }
    }

    /// Builder-style setter for a single metadata key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn normalized(mut self) -> Self {
        self.error_message = outcome_error(self.success, self.error_message.take());
        self
    }
}

/// Drop an error message on a success and fill in a placeholder on a failure,
/// so a stored record always has `error_message.is_some() == !success`.
fn outcome_error(success: bool, error_message: Option<String>) -> Option<String> {
    if success {
        None
    } else {
        error_message.or_else(|| Some("unknown error".to_string()))
    }
}

/// An immutable record of one action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredEntry")]
pub struct ActionHistoryEntry {
    id: String,
    product_id: String,
    product_title: String,
    action_type: ActionType,
    timestamp: DateTime<Utc>,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// Persisted form of [`ActionHistoryEntry`]. Decoding goes through this so
/// rows written by older builds or edited by hand get the same outcome
/// normalization as fresh entries.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    id: String,
    product_id: String,
    product_title: String,
    action_type: ActionType,
    timestamp: DateTime<Utc>,
    success: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

impl From<StoredEntry> for ActionHistoryEntry {
    fn from(raw: StoredEntry) -> Self {
        Self {
            error_message: outcome_error(raw.success, raw.error_message),
            id: raw.id,
            product_id: raw.product_id,
            product_title: raw.product_title,
            action_type: raw.action_type,
            timestamp: raw.timestamp,
            success: raw.success,
            metadata: raw.metadata,
        }
    }
}

impl ActionHistoryEntry {
    /// Stamp a new entry with a fresh id and the current time.
    pub(crate) fn stamp(new: NewActionEntry) -> Self {
        let new = new.normalized();
        Self {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id,
            product_title: new.product_title,
            action_type: new.action_type,
            timestamp: Utc::now(),
            success: new.success,
            error_message: new.error_message,
            metadata: new.metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_title(&self) -> &str {
        &self.product_title
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Present only when the action failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
