use bytes::Bytes;
use httpmock::Method::{GET, POST, PUT};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;

use stowage_client::{Config, Error, RetryPolicy, Storage, StoredObject};
use stowage_core::serialize::{Serializer, TableSerializer};
use stowage_core::{Md5Checksum, SpoolBuffer, Table, CHUNK_SIZE};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn mock_token_endpoint(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/token")
            .body_contains("grant_type=refresh_token")
            .body_contains("refresh_token=test-refresh-token");
        then.status(200)
            .json_body(json!({ "id_token": "test-access-token" }));
    });
}

fn storage_for(server: &MockServer) -> Storage {
    Storage::with_retry_policy(
        Config::for_testing(&server.base_url()),
        RetryPolicy::no_retries(),
    )
    .unwrap()
}

fn md5_b64(data: &[u8]) -> String {
    Md5Checksum::compute(data).to_base64()
}

/// Serialize a table to the bytes a download of it would return.
fn arrow_bytes(table: &Table) -> Vec<u8> {
    use std::io::Read;
    let mut spool = SpoolBuffer::with_default_limit();
    TableSerializer.encode_into(table, &mut spool).unwrap();
    spool.rewind().unwrap();
    let mut bytes = Vec::new();
    spool.read_to_end(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn text_put_and_get_roundtrip() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    let value = "hello world";

    let prepare = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/prepare")
            .header("authorization", "Bearer test-access-token")
            .header_exists("x-stowage-client-version")
            .json_body_partial(format!(
                r#"{{
                    "dataKey": "greeting",
                    "contentType": "text/plain",
                    "contentLength": {},
                    "contentMd5Checksum": "{}",
                    "uploadedBy": {{ "type": "system", "id": "test-job" }}
                }}"#,
                value.len(),
                md5_b64(value.as_bytes())
            ));
        then.status(200).json_body(json!({
            "sessionUrl": server.url("/blob/greeting"),
            "blobKey": "blob-1"
        }));
    });

    let upload = server.mock(|when, then| {
        when.method(PUT)
            .path("/blob/greeting")
            .header("content-length", value.len().to_string())
            .body(value);
        then.status(200);
    });

    server.mock(|when, then| {
        when.method(POST)
            .path("/storage/geturl")
            .header("authorization", "Bearer test-access-token")
            .json_body(json!({
                "dataKey": "greeting",
                "contentType": "text/plain"
            }));
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/greeting"),
            "md5": md5_b64(value.as_bytes()),
            "size": value.len()
        }));
    });

    server.mock(|when, then| {
        when.method(GET).path("/blob/greeting");
        then.status(200).body(value);
    });

    let storage = storage_for(&server);
    storage
        .text()
        .put("greeting", &value.to_string())
        .await
        .unwrap();
    prepare.assert();
    upload.assert();

    let fetched = storage.text().get("greeting").await.unwrap();
    assert_eq!(fetched, value);
}

#[tokio::test]
async fn binary_get_verifies_and_returns_bytes() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    let payload: Vec<u8> = (0..=255u8).collect();

    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl").json_body(json!({
            "dataKey": "blob",
            "contentType": "application/octet-stream"
        }));
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/blob"),
            "md5": md5_b64(&payload),
            "size": payload.len()
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blob/blob");
        then.status(200).body(payload.clone());
    });

    let storage = storage_for(&server);
    let fetched = storage.binary().get("blob").await.unwrap();
    assert_eq!(fetched, Bytes::from(payload));
}

#[tokio::test]
async fn get_missing_key_is_not_found_and_get_or_falls_back() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl");
        then.status(404);
    });

    let storage = storage_for(&server);
    let err = storage.json().get("absent").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(key) if key == "absent"));

    let fallback = storage
        .json()
        .get_or("absent", json!({ "fresh": true }))
        .await
        .unwrap();
    assert_eq!(fallback, json!({ "fresh": true }));
}

#[tokio::test]
async fn download_rejects_checksum_mismatch() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl");
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/corrupt"),
            "md5": md5_b64(b"hello"),
            "size": 5
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blob/corrupt");
        then.status(200).body("hellX");
    });

    let storage = storage_for(&server);
    let err = storage.text().get("corrupt").await.unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
}

#[tokio::test]
async fn download_rejects_size_mismatch() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl");
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/truncated"),
            "md5": md5_b64(b"hello"),
            "size": 99
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blob/truncated");
        then.status(200).body("hello");
    });

    let storage = storage_for(&server);
    let err = storage.text().get("truncated").await.unwrap_err();
    assert!(matches!(
        err,
        Error::SizeMismatch {
            expected: 99,
            actual: 5
        }
    ));
}

#[tokio::test]
async fn invalid_key_fails_before_any_request() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    let storage = storage_for(&server);

    let err = storage
        .text()
        .put("bad key!", &"value".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(stowage_core::Error::InvalidKey(_))
    ));

    let err = storage.text().get("also/bad").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Core(stowage_core::Error::InvalidKey(_))
    ));
}

#[tokio::test]
async fn delete_treats_missing_key_as_success() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    let delete = server.mock(|when, then| {
        when.method(POST).path("/storage/delete").json_body(json!({
            "dataKey": "gone",
            "contentType": "application/json"
        }));
        then.status(404);
    });

    let storage = storage_for(&server);
    storage.json().delete("gone").await.unwrap();
    delete.assert();
}

#[tokio::test]
async fn list_returns_stored_objects() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    server.mock(|when, then| {
        when.method(POST).path("/storage/list").json_body(json!({
            "contentType": "text/plain"
        }));
        then.status(200).json_body(json!({
            "items": [
                { "name": "beta", "size": 5 },
                { "name": "alpha", "size": 3 }
            ]
        }));
    });

    let storage = storage_for(&server);
    // Service order is not guaranteed; the client sorts by name.
    let items = storage.text().list().await.unwrap();
    assert_eq!(
        items,
        vec![
            StoredObject {
                name: "alpha".to_string(),
                size: 3
            },
            StoredObject {
                name: "beta".to_string(),
                size: 5
            }
        ]
    );
}

#[tokio::test]
async fn server_error_is_fatal_on_first_attempt() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    let geturl = server.mock(|when, then| {
        when.method(POST).path("/storage/geturl");
        then.status(500);
    });

    // Retries enabled: a failed status must still surface on the first hit.
    let storage = Storage::with_retry_policy(
        Config::for_testing(&server.base_url()),
        RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
        },
    )
    .unwrap();
    let err = storage.text().get("somekey").await.unwrap_err();
    assert!(matches!(err, Error::Service { status: 500, .. }));
    assert!(!err.is_transient());
    geturl.assert_hits(1);
}

#[tokio::test]
async fn list_404_is_a_service_error() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    server.mock(|when, then| {
        when.method(POST).path("/storage/list");
        then.status(404);
    });

    // Listing has no missing-key semantics; the status passes through.
    let storage = storage_for(&server);
    let err = storage.text().list().await.unwrap_err();
    assert!(matches!(err, Error::Service { status: 404, .. }));
}

#[tokio::test]
async fn table_get_decodes_arrow_payload() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);

    let table = Table::from_rows(&[
        json!({ "name": "ada", "age": 36 }),
        json!({ "name": "grace", "age": 45 }),
    ])
    .unwrap();
    let payload = arrow_bytes(&table);

    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl").json_body(json!({
            "dataKey": "people",
            "contentType": "vnd.apache.arrow.file"
        }));
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/people"),
            "md5": md5_b64(&payload),
            "size": payload.len()
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blob/people");
        then.status(200).body(payload.clone());
    });

    let storage = storage_for(&server);
    let fetched = storage.table().get("people").await.unwrap();
    assert_eq!(fetched, table);
}

#[tokio::test]
async fn table_put_drops_index_column_and_reports_shape() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);

    // Two data columns plus a conventional row-index column.
    let table = Table::from_rows(&[
        json!({ "index": 0, "name": "ada", "age": 36 }),
        json!({ "index": 1, "name": "grace", "age": 45 }),
    ])
    .unwrap();

    let prepare = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/prepare")
            .json_body_partial(
                r#"{
                    "dataKey": "people",
                    "contentType": "vnd.apache.arrow.file",
                    "contentShape": { "numberOfRows": 2, "numberOfProperties": 2 }
                }"#,
            );
        then.status(200).json_body(json!({
            "sessionUrl": server.url("/blob/people"),
            "blobKey": "blob-people"
        }));
    });
    let upload = server.mock(|when, then| {
        when.method(PUT).path("/blob/people");
        then.status(200);
    });

    let storage = storage_for(&server);
    storage.table().put("people", &table).await.unwrap();
    prepare.assert();
    upload.assert();
}

#[tokio::test]
async fn table_concat_on_missing_key_stores_other() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);

    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(POST).path("/storage/prepare");
        then.status(200).json_body(json!({
            "sessionUrl": server.url("/blob/log"),
            "blobKey": "blob-log"
        }));
    });
    let upload = server.mock(|when, then| {
        when.method(PUT).path("/blob/log");
        then.status(200);
    });

    let other = Table::from_rows(&[json!({ "event": "started" })]).unwrap();
    let storage = storage_for(&server);
    let combined = storage.table().concat("log", &other).await.unwrap();
    assert_eq!(combined, other);
    upload.assert();
}

#[tokio::test]
async fn multi_chunk_binary_roundtrip_spills_to_disk() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start();
    mock_token_endpoint(&server);
    // Larger than one transfer chunk, so hashing and streaming span chunks.
    let payload: Vec<u8> = (0..CHUNK_SIZE + 4096).map(|i| (i % 251) as u8).collect();

    let prepare = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/prepare")
            .json_body_partial(format!(
                r#"{{
                    "dataKey": "big",
                    "contentLength": {},
                    "contentMd5Checksum": "{}"
                }}"#,
                payload.len(),
                md5_b64(&payload)
            ));
        then.status(200).json_body(json!({
            "sessionUrl": server.url("/blob/big"),
            "blobKey": "blob-big"
        }));
    });
    let upload = server.mock(|when, then| {
        when.method(PUT)
            .path("/blob/big")
            .header("content-length", payload.len().to_string());
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/storage/geturl").json_body(json!({
            "dataKey": "big",
            "contentType": "application/octet-stream"
        }));
        then.status(200).json_body(json!({
            "signedUrl": server.url("/blob/big"),
            "md5": md5_b64(&payload),
            "size": payload.len()
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blob/big");
        then.status(200).body(payload.clone());
    });

    // A small memory ceiling forces both directions through the temp file.
    let mut config = Config::for_testing(&server.base_url());
    config.spool_memory_limit = 64 * 1024;
    let storage = Storage::with_retry_policy(config, RetryPolicy::no_retries()).unwrap();

    storage
        .binary()
        .put("big", &Bytes::from(payload.clone()))
        .await
        .unwrap();
    prepare.assert();
    upload.assert();

    let fetched = storage.binary().get("big").await.unwrap();
    assert_eq!(fetched, Bytes::from(payload));
}
