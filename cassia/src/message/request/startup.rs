//! `STARTUP`: the first message sent on every connection, negotiating the
//! CQL version and (optionally) frame compression.
use std::collections::HashMap;

use bytes::BufMut;

use crate::{protocol::CqlWrite, Result};

#[derive(Debug, Clone)]
pub struct Startup {
    pub cql_version: String,
    pub compression: Option<String>,
}

impl Default for Startup {
    fn default() -> Self {
        Self { cql_version: "3.0.0".into(), compression: None }
    }
}

impl Startup {
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        let mut options = HashMap::with_capacity(2);
        options.insert("CQL_VERSION".to_string(), self.cql_version.clone());
        if let Some(compression) = &self.compression {
            options.insert("COMPRESSION".to_string(), compression.clone());
        }
        buf.put_cql_string_map(&options)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encodes_cql_version() {
        let mut buf = BytesMut::new();
        Startup::default().encode(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }
}
