//! Operation attribution.
//!
//! Uploads carry a record of who performed them: either a system identity
//! (an unattended job) or a user identity, plus a timestamp.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::Config;
use crate::error::{Error, Result};

/// The kind of caller an operation is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformerKind {
    System,
    User,
}

/// Attribution record attached to mutating operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerformedBy {
    #[serde(rename = "type")]
    pub kind: PerformerKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl PerformedBy {
    /// Resolve the performer from configuration, timestamped now.
    ///
    /// A configured system identity wins over a user identity; having neither
    /// is a configuration error.
    pub fn resolve(config: &Config) -> Result<Self> {
        let timestamp = OffsetDateTime::now_utc();
        if let Some(id) = &config.system_id {
            return Ok(Self {
                kind: PerformerKind::System,
                id: id.clone(),
                name: None,
                timestamp,
            });
        }
        if let Some(id) = &config.user_id {
            return Ok(Self {
                kind: PerformerKind::User,
                id: id.clone(),
                name: config.user_name.clone(),
                timestamp,
            });
        }
        Err(Error::Config(
            "missing user or system id: set system_id or user_id".to_string(),
        ))
    }
}
