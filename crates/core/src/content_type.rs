//! Content type tags for the four storage partitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed label distinguishing the four storage partitions.
///
/// The tag is used both as a protocol field and as a storage partition key:
/// identical data keys under different content types do not collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "application/octet-stream")]
    Binary,
    #[serde(rename = "text/plain")]
    Text,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "vnd.apache.arrow.file")]
    Table,
}

impl ContentType {
    /// The fixed wire tag for this content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Binary => "application/octet-stream",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Table => "vnd.apache.arrow.file",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
