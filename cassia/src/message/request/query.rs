//! `QUERY`: a plain CQL statement plus its bind/paging parameters.
use bytes::BufMut;

use super::params::QueryParams;
use crate::{protocol::CqlWrite, Result};

#[derive(Debug, Clone)]
pub struct Query {
    pub query: String,
    pub params: QueryParams,
}

impl Query {
    pub fn new(query: impl Into<String>, params: QueryParams) -> Self {
        Self { query: query.into(), params }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_cql_long_string(&self.query)?;
        self.params.encode(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encodes_query_text_as_long_string() {
        let mut buf = BytesMut::new();
        Query::new("SELECT * FROM t", QueryParams::default()).encode(&mut buf).unwrap();
        let len = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, "SELECT * FROM t".len());
    }
}
