//! Client for the stowage blob storage service.
//!
//! Values are serialized locally, spooled to memory or disk, and transferred
//! through signed URLs granted by the control plane. The [`Storage`] facade
//! exposes one typed store per content type: binary, text, JSON, and columnar
//! tables.
//!
//! Domain types (keys, checksums, serializers, the [`Table`] value type) live
//! in `stowage-core` and are re-exported here for convenience.

mod api;
mod auth;
mod config;
mod error;
mod performer;
mod retry;
mod store;
mod transfer;

pub use api::StoredObject;
pub use auth::TokenManager;
pub use config::Config;
pub use error::{Error, Result};
pub use performer::{PerformedBy, PerformerKind};
pub use retry::RetryPolicy;
pub use store::{
    BinaryStore, JsonStore, PutTableOptions, Storage, Store, TableStore, TextStore,
};

pub use stowage_core::{ContentShape, ContentType, Md5Checksum, Property, Table};
