//! Upload and download pipelines.
//!
//! Uploads announce metadata (size, checksum, shape) to the control plane,
//! then PUT the serialized bytes to the granted session URL. Downloads resolve
//! a signed URL, stream the body into a spool buffer while hashing and
//! counting, and verify size and checksum before handing the buffer back for
//! decoding.

use futures::StreamExt;
use reqwest::StatusCode;
use std::io::{Read, Write};
use stowage_core::{ContentShape, ContentType, Md5Checksum, SpoolBuffer, SpoolPart, CHUNK_SIZE};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::api::{classify_status, ApiClient, DownloadLocation, PrepareUploadRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::performer::PerformedBy;
use crate::retry::RetryPolicy;

/// Shared state behind every store.
pub(crate) struct Context {
    pub config: Config,
    pub api: ApiClient,
    /// Data-plane client for signed URL transfers; carries no auth headers.
    pub data: reqwest::Client,
    pub retry: RetryPolicy,
}

/// Hash and count the spooled bytes in a second pass over the buffer.
fn measure(spool: &mut SpoolBuffer) -> Result<(u64, Md5Checksum)> {
    spool.rewind()?;
    let mut hasher = Md5Checksum::hasher();
    let mut size = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = spool.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, hasher.finalize()))
}

/// Build a request body replaying the spool contents from the start.
///
/// Resident contents become a cheap `Bytes` body; spilled contents stream
/// from the temp file so large blobs never load fully into memory.
fn body_from_spool(spool: &SpoolBuffer) -> Result<reqwest::Body> {
    match spool.reader()?.into_part() {
        SpoolPart::Memory(bytes) => Ok(reqwest::Body::from(bytes)),
        SpoolPart::File(file) => {
            let file = tokio::fs::File::from_std(file);
            Ok(reqwest::Body::wrap_stream(ReaderStream::with_capacity(
                file, CHUNK_SIZE,
            )))
        }
    }
}

/// Upload spooled bytes under `key`.
#[instrument(skip_all, fields(key = %key, content_type = %content_type))]
pub(crate) async fn upload(
    ctx: &Context,
    key: &str,
    content_type: ContentType,
    spool: &mut SpoolBuffer,
    shape: Option<ContentShape>,
) -> Result<()> {
    let (size, checksum) = measure(spool)?;
    let checksum = checksum.to_base64();

    // One attribution per logical operation; retries reuse it.
    let performer = PerformedBy::resolve(&ctx.config)?;
    let prepared = ctx
        .api
        .prepare_upload(&PrepareUploadRequest {
            uploaded_by: &performer,
            data_key: key,
            content_type,
            content_length: size,
            content_md5_checksum: &checksum,
            content_shape: shape.as_ref(),
        })
        .await?;

    tracing::debug!(size, blob_key = %prepared.blob_key, "upload session granted");

    let spool = &*spool;
    let session_url = prepared.session_url.as_str();
    ctx.retry
        .run(move || async move {
            let response = ctx
                .data
                .put(session_url)
                .header(reqwest::header::CONTENT_LENGTH, size)
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(body_from_spool(spool)?)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::OK {
                Ok(())
            } else {
                Err(classify_status("blob upload", key, status))
            }
        })
        .await
}

/// Download the blob stored under `key` into a spool buffer, verified and
/// rewound ready for decoding.
#[instrument(skip_all, fields(key = %key, content_type = %content_type))]
pub(crate) async fn download(
    ctx: &Context,
    key: &str,
    content_type: ContentType,
) -> Result<SpoolBuffer> {
    let location = ctx.api.get_download_url(key, content_type).await?;
    let location = &location;
    ctx.retry.run(move || fetch_blob(ctx, key, location)).await
}

async fn fetch_blob(
    ctx: &Context,
    key: &str,
    location: &DownloadLocation,
) -> Result<SpoolBuffer> {
    let response = ctx.data.get(&location.signed_url).send().await?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(key.to_string()));
    }
    if status != StatusCode::OK {
        return Err(classify_status("blob download", key, status));
    }

    let mut spool = SpoolBuffer::new(ctx.config.spool_memory_limit);
    let mut hasher = Md5Checksum::hasher();
    let mut size = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        spool.write_all(&chunk)?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }

    if size != location.size {
        return Err(Error::SizeMismatch {
            expected: location.size,
            actual: size,
        });
    }
    let checksum = hasher.finalize().to_base64();
    if checksum != location.md5 {
        return Err(Error::ChecksumMismatch {
            expected: location.md5.clone(),
            actual: checksum,
        });
    }

    spool.rewind()?;
    Ok(spool)
}
