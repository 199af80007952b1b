//! Structural shape metadata for table uploads.

use serde::{Deserialize, Serialize};

/// A named, typed column in a table's shape summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub dtype: String,
}

/// Descriptive structural metadata attached to table uploads.
///
/// Purely informational; it is never round-tripped back into the value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentShape {
    pub number_of_rows: u64,
    pub number_of_properties: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Property>>,
}
