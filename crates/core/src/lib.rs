//! Core domain types and serialization logic for the stowage storage client.
//!
//! This crate defines everything the network client builds on:
//! - Data key validation
//! - Content type tags and content shape metadata
//! - MD5 checksums in the wire encoding
//! - The spooled transfer buffer (memory below a limit, temp file above)
//! - The serializer abstraction and its four variants
//! - The columnar `Table` value type

pub mod buffer;
pub mod checksum;
pub mod content_type;
pub mod error;
pub mod key;
pub mod serialize;
pub mod shape;
pub mod table;

pub use buffer::{SpoolBuffer, SpoolPart, SpoolReader};
pub use checksum::{Md5Checksum, Md5Hasher};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use key::{data_key_is_valid, validate_data_key};
pub use serialize::{
    BinarySerializer, JsonSerializer, Serializer, TableSerializer, TextSerializer,
};
pub use shape::{ContentShape, Property};
pub use table::Table;

/// Chunk size for streaming transfer and hashing: 4 MiB
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default memory ceiling for spool buffers before spilling to disk: 8 MiB
pub const DEFAULT_SPOOL_MEMORY_LIMIT: usize = 8 * 1024 * 1024;
