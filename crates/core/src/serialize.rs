//! Serializer abstraction and its four variants.
//!
//! A serializer encodes a typed value into a spool buffer and reconstructs it
//! from one, and carries the fixed content type tag of its storage partition.
//! Serializers are stateless; one instance per store, shared across calls.

use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use std::io::Read;

use crate::buffer::SpoolBuffer;
use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::shape::ContentShape;
use crate::table::Table;

/// Encodes and decodes one value type to and from a spool buffer.
pub trait Serializer {
    /// The value type this serializer handles.
    type Value;

    /// The fixed content type tag of this variant.
    fn content_type(&self) -> ContentType;

    /// Structural metadata for the value. Only the table variant reports one.
    fn shape_of(&self, _value: &Self::Value) -> Option<ContentShape> {
        None
    }

    /// Write the value's byte representation into the sink.
    fn encode_into(&self, value: &Self::Value, sink: &mut SpoolBuffer) -> Result<()>;

    /// Reconstruct the value from a source positioned at offset 0.
    fn decode_from(&self, source: &mut SpoolBuffer) -> Result<Self::Value>;
}

/// Raw bytes, stored as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    type Value = Bytes;

    fn content_type(&self) -> ContentType {
        ContentType::Binary
    }

    fn encode_into(&self, value: &Bytes, sink: &mut SpoolBuffer) -> Result<()> {
        use std::io::Write;
        sink.write_all(value)?;
        Ok(())
    }

    fn decode_from(&self, source: &mut SpoolBuffer) -> Result<Bytes> {
        let mut out = Vec::new();
        source.read_to_end(&mut out)?;
        Ok(Bytes::from(out))
    }
}

/// UTF-8 text; decoding is strict.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextSerializer;

impl Serializer for TextSerializer {
    type Value = String;

    fn content_type(&self) -> ContentType {
        ContentType::Text
    }

    fn encode_into(&self, value: &String, sink: &mut SpoolBuffer) -> Result<()> {
        use std::io::Write;
        sink.write_all(value.as_bytes())?;
        Ok(())
    }

    fn decode_from(&self, source: &mut SpoolBuffer) -> Result<String> {
        let mut out = Vec::new();
        source.read_to_end(&mut out)?;
        String::from_utf8(out).map_err(|e| Error::Decode(format!("invalid UTF-8 text: {e}")))
    }
}

/// A JSON document, typically an object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    type Value = serde_json::Value;

    fn content_type(&self) -> ContentType {
        ContentType::Json
    }

    fn encode_into(&self, value: &serde_json::Value, sink: &mut SpoolBuffer) -> Result<()> {
        serde_json::to_writer(&mut *sink, value)
            .map_err(|e| Error::Decode(format!("json encode failed: {e}")))
    }

    fn decode_from(&self, source: &mut SpoolBuffer) -> Result<serde_json::Value> {
        serde_json::from_reader(&mut *source)
            .map_err(|e| Error::Decode(format!("json decode failed: {e}")))
    }
}

/// Columnar tables in the Arrow IPC file format.
///
/// Encoding and decoding work batch-at-a-time, so memory stays bounded by the
/// batch size plus the spool limit even for payloads far beyond it.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableSerializer;

impl Serializer for TableSerializer {
    type Value = Table;

    fn content_type(&self) -> ContentType {
        ContentType::Table
    }

    fn shape_of(&self, value: &Table) -> Option<ContentShape> {
        Some(value.shape())
    }

    fn encode_into(&self, value: &Table, sink: &mut SpoolBuffer) -> Result<()> {
        let mut writer = FileWriter::try_new(&mut *sink, value.schema())?;
        for batch in value.batches() {
            writer.write(batch)?;
        }
        writer.finish()?;
        Ok(())
    }

    fn decode_from(&self, source: &mut SpoolBuffer) -> Result<Table> {
        let reader = FileReader::try_new(&mut *source, None)
            .map_err(|e| Error::Decode(format!("not an arrow file: {e}")))?;
        let schema = reader.schema();
        let mut batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Decode(format!("arrow decode failed: {e}")))?;
        if batches.is_empty() {
            // Preserve the schema of zero-row tables.
            batches.push(RecordBatch::new_empty(schema));
        }
        Table::from_batches(batches)
    }
}
