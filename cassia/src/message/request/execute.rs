//! `EXECUTE`: runs a previously `PREPARE`d statement, identified by its id.
use bytes::{BufMut, Bytes};

use super::params::QueryParams;
use crate::{protocol::CqlWrite, Result};

#[derive(Debug, Clone)]
pub struct Execute {
    pub id: Bytes,
    /// v5 only: the `result_metadata_id` the caller has cached from
    /// `PREPARE` (or a prior `METADATA_CHANGED` response), telling the
    /// server which result metadata this client believes is current.
    pub result_metadata_id: Option<Bytes>,
    pub params: QueryParams,
}

impl Execute {
    pub fn new(id: Bytes, result_metadata_id: Option<Bytes>, params: QueryParams) -> Self {
        Self { id, result_metadata_id, params }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_cql_short_bytes(&self.id)?;
        if let Some(result_metadata_id) = &self.result_metadata_id {
            buf.put_cql_short_bytes(result_metadata_id)?;
        }
        self.params.encode(buf)
    }
}
