//! Typed storage facade.
//!
//! [`Storage`] is the entry point. It exposes four stores, one per content
//! type, all sharing one HTTP stack, token manager, and retry policy:
//!
//! ```no_run
//! # async fn example() -> stowage_client::Result<()> {
//! let storage = stowage_client::Storage::new(stowage_client::Config::load()?)?;
//! storage.text().put("greeting", &"hello".to_string()).await?;
//! let greeting = storage.text().get("greeting").await?;
//! # Ok(())
//! # }
//! ```

use reqwest::header::{HeaderMap, HeaderValue};
use std::sync::Arc;
use stowage_core::serialize::{
    BinarySerializer, JsonSerializer, Serializer, TableSerializer, TextSerializer,
};
use stowage_core::{validate_data_key, SpoolBuffer, Table};

use crate::api::{ApiClient, StoredObject};
use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::transfer::{self, Context};

/// Header announcing the client version to the control plane.
const CLIENT_VERSION_HEADER: &str = "x-stowage-client-version";

/// A store for one content type, parameterized over its serializer.
pub struct Store<S: Serializer> {
    ctx: Arc<Context>,
    serializer: S,
}

impl<S: Serializer> Store<S> {
    fn new(ctx: Arc<Context>, serializer: S) -> Self {
        Self { ctx, serializer }
    }

    /// Store a value under `key`, replacing any previous version.
    pub async fn put(&self, key: &str, value: &S::Value) -> Result<()> {
        validate_data_key(key)?;
        let mut spool = SpoolBuffer::new(self.ctx.config.spool_memory_limit);
        self.serializer.encode_into(value, &mut spool)?;
        transfer::upload(
            &self.ctx,
            key,
            self.serializer.content_type(),
            &mut spool,
            self.serializer.shape_of(value),
        )
        .await
    }

    /// Get the value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<S::Value> {
        validate_data_key(key)?;
        let mut spool = transfer::download(&self.ctx, key, self.serializer.content_type()).await?;
        Ok(self.serializer.decode_from(&mut spool)?)
    }

    /// Get the value stored under `key`, or `default` if it does not exist.
    pub async fn get_or(&self, key: &str, default: S::Value) -> Result<S::Value> {
        self.get_or_else(key, || default).await
    }

    /// Get the value stored under `key`, or compute a default if it does not
    /// exist. Other errors still propagate.
    pub async fn get_or_else<F>(&self, key: &str, default: F) -> Result<S::Value>
    where
        F: FnOnce() -> S::Value,
    {
        match self.get(key).await {
            Ok(value) => Ok(value),
            Err(Error::NotFound(_)) => Ok(default()),
            Err(err) => Err(err),
        }
    }

    /// Delete the value stored under `key`. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_data_key(key)?;
        self.ctx
            .api
            .delete_file(key, self.serializer.content_type())
            .await
    }

    /// List all objects stored with this content type.
    pub async fn list(&self) -> Result<Vec<StoredObject>> {
        self.ctx.api.list_files(self.serializer.content_type()).await
    }
}

/// Store for raw binary values.
pub type BinaryStore = Store<BinarySerializer>;
/// Store for UTF-8 text values.
pub type TextStore = Store<TextSerializer>;
/// Store for JSON documents.
pub type JsonStore = Store<JsonSerializer>;

/// Options for storing a table.
#[derive(Clone, Copy, Debug, Default)]
pub struct PutTableOptions {
    /// Keep a column named [`Table::INDEX_COLUMN`] instead of dropping it.
    pub persist_index: bool,
}

/// Store for columnar tables, with append helpers on top of put/get.
pub struct TableStore {
    inner: Store<TableSerializer>,
}

impl TableStore {
    fn new(ctx: Arc<Context>) -> Self {
        Self {
            inner: Store::new(ctx, TableSerializer),
        }
    }

    /// Store a table under `key`. A column named [`Table::INDEX_COLUMN`] is
    /// dropped; use [`TableStore::put_opts`] to keep it.
    pub async fn put(&self, key: &str, table: &Table) -> Result<()> {
        self.put_opts(key, table, PutTableOptions::default()).await
    }

    /// Store a table under `key` with explicit options.
    pub async fn put_opts(
        &self,
        key: &str,
        table: &Table,
        options: PutTableOptions,
    ) -> Result<()> {
        if options.persist_index {
            self.inner.put(key, table).await
        } else {
            let table = table.drop_column(Table::INDEX_COLUMN)?;
            self.inner.put(key, &table).await
        }
    }

    /// Get the table stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Table> {
        self.inner.get(key).await
    }

    /// Get the table stored under `key`, or `default` if it does not exist.
    pub async fn get_or(&self, key: &str, default: Table) -> Result<Table> {
        self.inner.get_or(key, default).await
    }

    /// Get the table stored under `key`, or an empty table if it does not
    /// exist.
    pub async fn get_or_empty(&self, key: &str) -> Result<Table> {
        self.inner.get_or_else(key, Table::empty).await
    }

    /// Append the rows of `other` to the table stored under `key`, store the
    /// combined table, and return it. A missing key behaves as empty.
    pub async fn concat(&self, key: &str, other: &Table) -> Result<Table> {
        let existing = self.get_or_empty(key).await?;
        let combined = existing.concat(other)?;
        self.put(key, &combined).await?;
        Ok(combined)
    }

    /// Append a single JSON object row to the table stored under `key`.
    pub async fn add(&self, key: &str, row: &serde_json::Value) -> Result<Table> {
        let table = Table::from_rows(std::slice::from_ref(row))?;
        self.concat(key, &table).await
    }

    /// Replace the table stored under `key` with an empty one.
    pub async fn clear(&self, key: &str) -> Result<()> {
        self.put(key, &Table::empty()).await
    }

    /// Delete the table stored under `key`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    /// List all stored tables.
    pub async fn list(&self) -> Result<Vec<StoredObject>> {
        self.inner.list().await
    }
}

/// Entry point for blob storage, with one typed store per content type.
pub struct Storage {
    binary: BinaryStore,
    text: TextStore,
    json: JsonStore,
    table: TableStore,
}

impl Storage {
    /// Build a storage client from configuration, using the default retry
    /// policy.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_retry_policy(config, RetryPolicy::default())
    }

    /// Build a storage client with an explicit retry policy.
    pub fn with_retry_policy(config: Config, retry: RetryPolicy) -> Result<Self> {
        config.validate()?;

        let identity_url = reqwest::Url::parse(&config.identity_url)
            .map_err(|e| Error::Config(format!("invalid identity_url: {e}")))?;
        reqwest::Url::parse(&config.api_url)
            .map_err(|e| Error::Config(format!("invalid api_url: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_VERSION_HEADER,
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        let control = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;
        let data = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;

        let auth = Arc::new(TokenManager::new(
            data.clone(),
            identity_url,
            config.refresh_token.clone(),
        ));
        let api = ApiClient::new(control, &config.api_url, auth, retry);

        let ctx = Arc::new(Context {
            config,
            api,
            data,
            retry,
        });

        Ok(Self {
            binary: Store::new(ctx.clone(), BinarySerializer),
            text: Store::new(ctx.clone(), TextSerializer),
            json: Store::new(ctx.clone(), JsonSerializer),
            table: TableStore::new(ctx),
        })
    }

    /// Store for raw bytes.
    pub fn binary(&self) -> &BinaryStore {
        &self.binary
    }

    /// Store for UTF-8 text.
    pub fn text(&self) -> &TextStore {
        &self.text
    }

    /// Store for JSON documents.
    pub fn json(&self) -> &JsonStore {
        &self.json
    }

    /// Store for columnar tables.
    pub fn table(&self) -> &TableStore {
        &self.table
    }
}
