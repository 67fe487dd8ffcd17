//! The public query surface: a [`Session`] wraps one [`Connection`] and its
//! [`StatementCache`], exposing `query`/`prepare`/`execute`/`batch` plus
//! event subscription and graceful shutdown.
use std::{sync::Arc, time::Duration};

use bytes::BytesMut;

use crate::{
    auth::AuthProvider,
    connection::Connection,
    error::ErrorKind,
    frame::FrameCompressor,
    message::{
        request::{self, BatchEntry, BatchType, EventType, NamedValue, QueryParams},
        response::Event,
        OpCode,
    },
    options::ConnectOptions,
    result::QueryResult,
    statement::{PreparedStatement, StatementCache},
    value::BoundValue,
    Result,
};

/// Parameters for a single `QUERY`/`EXECUTE`. Distinct from
/// [`QueryParams`] (the wire struct): this is the caller-facing builder.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub consistency: crate::protocol::Consistency,
    pub values: Vec<NamedValue>,
    pub page_size: Option<i32>,
    pub paging_state: Option<bytes::Bytes>,
    pub serial_consistency: Option<crate::protocol::Consistency>,
    pub timestamp: Option<i64>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<crate::value::Value>) -> Self {
        self.values.push(NamedValue { name: None, value: BoundValue::Value(value.into()) });
        self
    }

    pub fn with_named_value(mut self, name: impl Into<String>, value: impl Into<crate::value::Value>) -> Self {
        self.values.push(NamedValue { name: Some(name.into()), value: BoundValue::Value(value.into()) });
        self
    }

    pub fn page_size(mut self, size: i32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn paging_state(mut self, state: bytes::Bytes) -> Self {
        self.paging_state = Some(state);
        self
    }

    fn into_wire(self, skip_metadata: bool) -> QueryParams {
        QueryParams {
            consistency: self.consistency,
            values: self.values,
            skip_metadata,
            page_size: self.page_size,
            paging_state: self.paging_state,
            serial_consistency: self.serial_consistency,
            timestamp: self.timestamp,
        }
    }
}

/// A connected session against one Cassandra node.
pub struct Session {
    connection: Connection,
    statements: StatementCache,
    keyspace: Option<String>,
}

impl Session {
    pub async fn connect(options: ConnectOptions) -> Result<Self> {
        Self::connect_with(options, None, None).await
    }

    pub async fn connect_with(options: ConnectOptions, auth_provider: Option<Arc<dyn AuthProvider>>, compressor: Option<Arc<dyn FrameCompressor>>) -> Result<Self> {
        let keyspace = options.keyspace.clone();
        let connection = Connection::connect_with_compressor(options, auth_provider, compressor).await?;
        Ok(Self { connection, statements: StatementCache::new(), keyspace })
    }

    /// Runs `query` directly, without preparing it.
    pub async fn query(&self, query: impl Into<String>, params: Params) -> Result<QueryResult> {
        let query = request::Query::new(query, params.into_wire(false));
        let mut body = BytesMut::new();
        query.encode(&mut body)?;
        self.connection.request_result(OpCode::Query, body).await
    }

    /// Prepares `query` (or returns the already-cached statement) and
    /// returns a handle to `EXECUTE` it.
    pub async fn prepare(&self, query: impl Into<String>) -> Result<Arc<PreparedStatement>> {
        let query = query.into();
        self.statements.prepare(&self.connection, self.keyspace.as_deref(), &query).await
    }

    /// Executes a prepared statement. If the server has forgotten the
    /// statement (`UNPREPARED`), this re-`PREPARE`s it and retries exactly once.
    pub async fn execute(&self, statement: &Arc<PreparedStatement>, params: Params) -> Result<QueryResult> {
        match self.execute_once(statement, params.clone()).await {
            Err(err) => match err.kind() {
                ErrorKind::Server(server_err) if server_err.is_unprepared() => {
                    self.statements.invalidate(statement.keyspace.as_deref(), &statement.query).await;
                    let reprepared = self.statements.prepare(&self.connection, statement.keyspace.as_deref(), &statement.query).await?;
                    self.execute_once(&reprepared, params).await
                }
                _ => Err(err),
            },
            ok => ok,
        }
    }

    async fn execute_once(&self, statement: &Arc<PreparedStatement>, params: Params) -> Result<QueryResult> {
        let result_metadata_id = if self.connection.protocol_version() >= 5 { statement.result_metadata_id() } else { None };
        let execute = request::Execute::new(statement.id.clone(), result_metadata_id, params.into_wire(true));
        let mut body = BytesMut::new();
        execute.encode(&mut body)?;
        let result = self.connection.request_result(OpCode::Execute, body).await?;

        // The schema backing this prepared statement changed since it was
        // prepared; cache the id the server now wants to see so subsequent
        // EXECUTEs stay in sync instead of repeating METADATA_CHANGED forever.
        if let QueryResult::Rows(rows) = &result {
            if let Some(new_id) = &rows.metadata.new_metadata_id {
                statement.update_result_metadata_id(new_id.clone());
            }
        }
        Ok(result)
    }

    /// Runs a batch of statements. Unlike `execute`, a statement-level
    /// `UNPREPARED` inside a batch is surfaced to the caller rather than
    /// retried: re-preparing mid-batch would change what the batch means.
    pub async fn batch(&self, kind: BatchType, statements: Vec<BatchEntry>, consistency: crate::protocol::Consistency) -> Result<QueryResult> {
        let batch = request::Batch { kind, statements, consistency, serial_consistency: None, timestamp: None };
        let mut body = BytesMut::new();
        batch.encode(&mut body)?;
        self.connection.request_result(OpCode::Batch, body).await
    }

    /// Subscribes to the given event categories, returning a receiver for
    /// every matching `EVENT` frame this connection receives from then on.
    pub async fn subscribe(&self, event_types: Vec<EventType>) -> Result<tokio::sync::broadcast::Receiver<Event>> {
        let register = request::Register { event_types };
        let mut body = BytesMut::new();
        register.encode(&mut body)?;
        self.connection.request(OpCode::Register, body).await?;
        Ok(self.connection.subscribe())
    }

    /// Ends an event subscription. The protocol has no `UNREGISTER`;
    /// dropping the receiver (which this consumes) is the only thing a
    /// client can do locally to stop reading a given subscription.
    pub fn unsubscribe(&self, receiver: tokio::sync::broadcast::Receiver<Event>) {
        drop(receiver);
    }

    pub fn state(&self) -> crate::connection::State {
        self.connection.state()
    }

    pub async fn close(self, grace: Duration) {
        self.connection.close(grace).await;
    }
}
