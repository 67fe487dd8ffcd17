//! `PREPARE`: registers a query string with the server, returning a
//! `[prepared]` result the client can later `EXECUTE` by id.
use bytes::BufMut;

use crate::{protocol::CqlWrite, Result};

#[derive(Debug, Clone)]
pub struct Prepare {
    pub query: String,
}

impl Prepare {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into() }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_cql_long_string(&self.query)
    }
}
