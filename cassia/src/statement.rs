//! The prepared-statement registry: caches `PREPARE` results by
//! `(keyspace, query text)` and coalesces concurrent prepares of the same
//! statement into a single request.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex as SyncMutex},
};

use bytes::{Bytes, BytesMut};
use tokio::sync::{Mutex, OnceCell};

use crate::{
    connection::Connection,
    error::ErrorKind,
    message::{request::Prepare, OpCode},
    result::{self, QueryResult},
    Result,
};

type Key = (Option<String>, String);

/// A `PREPARE` result paired with the query text that produced it, so the
/// statement can be silently re-prepared after a server `UNPREPARED` error.
#[derive(Debug)]
pub struct PreparedStatement {
    pub id: Bytes,
    pub query: String,
    pub keyspace: Option<String>,
    pub descriptor: result::Prepared,
    /// The `result_metadata_id` to send on the next `EXECUTE` (v5 only).
    /// Starts as `descriptor.result_metadata_id` and is replaced whenever a
    /// `Rows` result reports `METADATA_CHANGED`.
    result_metadata_id: SyncMutex<Option<Bytes>>,
}

impl PreparedStatement {
    pub fn result_metadata_id(&self) -> Option<Bytes> {
        self.result_metadata_id.lock().unwrap().clone()
    }

    pub(crate) fn update_result_metadata_id(&self, new_id: Bytes) {
        *self.result_metadata_id.lock().unwrap() = Some(new_id);
    }
}

#[derive(Default)]
pub struct StatementCache {
    entries: Mutex<HashMap<Key, Arc<OnceCell<Arc<PreparedStatement>>>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached statement for `(keyspace, query)`, preparing it on
    /// the first call and coalescing any calls that race it.
    pub async fn prepare(&self, connection: &Connection, keyspace: Option<&str>, query: &str) -> Result<Arc<PreparedStatement>> {
        let key: Key = (keyspace.map(str::to_owned), query.to_owned());
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        // A failed initializer leaves the cell uninitialized, so a later
        // caller retries PREPARE instead of inheriting this error forever.
        let statement = cell.get_or_try_init(|| async { prepare_uncached(connection, keyspace, query).await }).await?;
        Ok(statement.clone())
    }

    /// Drops the cached entry for `(keyspace, query)`, forcing the next
    /// `prepare` call to re-`PREPARE`. Used after a server `UNPREPARED` error.
    pub async fn invalidate(&self, keyspace: Option<&str>, query: &str) {
        let key: Key = (keyspace.map(str::to_owned), query.to_owned());
        self.entries.lock().await.remove(&key);
    }
}

async fn prepare_uncached(connection: &Connection, keyspace: Option<&str>, query: &str) -> Result<Arc<PreparedStatement>> {
    let mut body = BytesMut::new();
    Prepare::new(query).encode(&mut body)?;
    match connection.request_result(OpCode::Prepare, body).await? {
        QueryResult::Prepared(descriptor) => Ok(Arc::new(PreparedStatement {
            id: descriptor.id.clone(),
            query: query.to_owned(),
            keyspace: keyspace.map(str::to_owned),
            result_metadata_id: SyncMutex::new(descriptor.result_metadata_id.clone()),
            descriptor,
        })),
        other => Err(ErrorKind::ProtocolViolation(format!("PREPARE returned unexpected result kind: {other:?}")).into()),
    }
}
