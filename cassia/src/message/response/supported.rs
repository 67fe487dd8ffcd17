//! `SUPPORTED`: the server's reply to `OPTIONS`, listing negotiable options.
use std::collections::HashMap;

use bytes::Buf;

use crate::{protocol::CqlRead, Result};

#[derive(Debug, Clone)]
pub struct Supported {
    pub options: HashMap<String, Vec<String>>,
}

impl Supported {
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self { options: buf.get_cql_string_multimap()? })
    }

    pub fn cql_versions(&self) -> &[String] {
        self.options.get("CQL_VERSION").map(Vec::as_slice).unwrap_or_default()
    }

    pub fn compression_algorithms(&self) -> &[String] {
        self.options.get("COMPRESSION").map(Vec::as_slice).unwrap_or_default()
    }
}
