//! Control-plane API client.
//!
//! Small JSON-over-POST surface that brokers access to blob storage: prepare
//! an upload session, resolve a signed download URL, list stored objects, and
//! delete one. Every call carries a bearer token from the token manager.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::{ContentShape, ContentType};
use tracing::instrument;

use crate::auth::TokenManager;
use crate::error::{Error, Result};
use crate::performer::PerformedBy;
use crate::retry::RetryPolicy;

/// Metadata announced to the service before uploading a blob.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrepareUploadRequest<'a> {
    pub uploaded_by: &'a PerformedBy,
    pub data_key: &'a str,
    pub content_type: ContentType,
    pub content_length: u64,
    pub content_md5_checksum: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_shape: Option<&'a ContentShape>,
}

/// Upload session granted by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrepareUploadResponse {
    pub session_url: String,
    /// Service-side blob identifier, used in error reporting only.
    pub blob_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyedRequest<'a> {
    data_key: &'a str,
    content_type: ContentType,
}

/// Signed download location with expected content identity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadLocation {
    pub signed_url: String,
    /// Base64 MD5 checksum the downloaded bytes must hash to.
    pub md5: String,
    /// Exact size in bytes the download must have.
    pub size: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest {
    content_type: ContentType,
}

#[derive(Deserialize)]
struct ListResponse {
    items: Vec<StoredObject>,
}

/// One stored object in a listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StoredObject {
    /// The data key the object was stored under.
    pub name: String,
    /// Serialized size in bytes.
    pub size: u64,
}

/// Map a non-success status to a fatal error.
///
/// 401/403 are auth failures; everything else, rate limiting and server
/// errors included, is a service error carrying the status code. Responses
/// the service actually produced are never retried; only transport failures
/// are. 404 is handled per operation since its meaning differs between them.
pub(crate) fn classify_status(
    operation: &'static str,
    subject: &str,
    status: StatusCode,
) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Auth(format!(
            "{operation} for {subject:?} rejected, status_code={}",
            status.as_u16()
        ))
    } else {
        Error::Service {
            operation,
            subject: subject.to_string(),
            status: status.as_u16(),
        }
    }
}

/// How an operation reports a 404 from the control plane.
#[derive(Clone, Copy)]
enum OnNotFound {
    /// The requested key does not exist; maps to [`Error::NotFound`].
    MissingKey,
    /// 404 has no special meaning; classified like any other failure.
    Fatal,
}

/// Client for the control-plane endpoints under `{api_url}/storage/`.
pub(crate) struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<TokenManager>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        auth: Arc<TokenManager>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            retry,
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let bearer = self.auth.bearer().await?;
        let response = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn post_for_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
        subject: &str,
        body: &B,
        on_not_found: OnNotFound,
    ) -> Result<T> {
        let response = self.post(path, body).await?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response.json().await?);
        }
        if status == StatusCode::NOT_FOUND {
            if let OnNotFound::MissingKey = on_not_found {
                return Err(Error::NotFound(subject.to_string()));
            }
        }
        Err(classify_status(operation, subject, status))
    }

    /// Announce an upload and obtain a session URL to PUT the bytes to.
    #[instrument(skip(self, request), fields(key = %request.data_key))]
    pub async fn prepare_upload(
        &self,
        request: &PrepareUploadRequest<'_>,
    ) -> Result<PrepareUploadResponse> {
        self.retry
            .run(move || {
                self.post_for_json(
                    "storage/prepare",
                    "upload preparation",
                    request.data_key,
                    request,
                    OnNotFound::MissingKey,
                )
            })
            .await
    }

    /// Resolve a signed download URL plus expected size and checksum.
    #[instrument(skip(self), fields(key = %data_key))]
    pub async fn get_download_url(
        &self,
        data_key: &str,
        content_type: ContentType,
    ) -> Result<DownloadLocation> {
        let request = KeyedRequest {
            data_key,
            content_type,
        };
        let request = &request;
        self.retry
            .run(move || {
                self.post_for_json(
                    "storage/geturl",
                    "download preparation",
                    data_key,
                    request,
                    OnNotFound::MissingKey,
                )
            })
            .await
    }

    /// List stored objects of one content type, sorted by name.
    #[instrument(skip(self), fields(content_type = %content_type))]
    pub async fn list_files(&self, content_type: ContentType) -> Result<Vec<StoredObject>> {
        let request = ListRequest { content_type };
        let request = &request;
        let mut response: ListResponse = self
            .retry
            .run(move || {
                self.post_for_json(
                    "storage/list",
                    "file list",
                    content_type.as_str(),
                    request,
                    OnNotFound::Fatal,
                )
            })
            .await?;
        response.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(response.items)
    }

    /// Delete a stored object. Deleting an absent key is not an error.
    #[instrument(skip(self), fields(key = %data_key))]
    pub async fn delete_file(&self, data_key: &str, content_type: ContentType) -> Result<()> {
        let request = KeyedRequest {
            data_key,
            content_type,
        };
        let request = &request;
        self.retry
            .run(move || self.try_delete(data_key, request))
            .await
    }

    async fn try_delete(&self, data_key: &str, request: &KeyedRequest<'_>) -> Result<()> {
        let response = self.post("storage/delete", request).await?;
        let status = response.status();
        // Deletion is idempotent; a missing key is silently ignored.
        if status == StatusCode::OK || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(classify_status("file delete", data_key, status))
    }
}
