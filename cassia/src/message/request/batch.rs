//! `BATCH`: a sequence of `QUERY`/`EXECUTE`-shaped statements applied together.
use bytes::{BufMut, Bytes};

use crate::{
    error::ErrorKind,
    protocol::{Consistency, CqlWrite},
    value::{write_bound, BoundValue},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchType {
    Logged = 0,
    Unlogged = 1,
    Counter = 2,
}

#[derive(Debug, Clone)]
pub enum BatchStatement {
    Query(String),
    Prepared(Bytes),
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub statement: BatchStatement,
    pub values: Vec<(Option<String>, BoundValue)>,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub kind: BatchType,
    pub statements: Vec<BatchEntry>,
    pub consistency: Consistency,
    pub serial_consistency: Option<Consistency>,
    pub timestamp: Option<i64>,
}

impl Batch {
    const FLAG_WITH_SERIAL_CONSISTENCY: u8 = 0x10;
    const FLAG_WITH_DEFAULT_TIMESTAMP: u8 = 0x20;
    const FLAG_WITH_NAMES_FOR_VALUES: u8 = 0x40;

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.serial_consistency.is_some() {
            flags |= Self::FLAG_WITH_SERIAL_CONSISTENCY;
        }
        if self.timestamp.is_some() {
            flags |= Self::FLAG_WITH_DEFAULT_TIMESTAMP;
        }
        if self.statements.iter().any(|s| s.values.iter().any(|(name, _)| name.is_some())) {
            flags |= Self::FLAG_WITH_NAMES_FOR_VALUES;
        }
        flags
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_u8(self.kind as u8);
        let n: u16 = self.statements.len().try_into().map_err(|_| ErrorKind::Encode("batch statement count"))?;
        buf.put_cql_short(n);
        let named = self.flags() & Self::FLAG_WITH_NAMES_FOR_VALUES != 0;
        for entry in &self.statements {
            match &entry.statement {
                BatchStatement::Query(q) => {
                    buf.put_u8(0);
                    buf.put_cql_long_string(q)?;
                }
                BatchStatement::Prepared(id) => {
                    buf.put_u8(1);
                    buf.put_cql_short_bytes(id)?;
                }
            }
            let count: u16 = entry.values.len().try_into().map_err(|_| ErrorKind::Encode("batch statement values"))?;
            buf.put_cql_short(count);
            for (name, value) in &entry.values {
                if named {
                    buf.put_cql_string(name.as_deref().unwrap_or_default())?;
                }
                write_bound(buf, value)?;
            }
        }
        buf.put_cql_consistency(self.consistency);
        buf.put_u8(self.flags());
        if let Some(serial) = self.serial_consistency {
            buf.put_cql_consistency(serial);
        }
        if let Some(ts) = self.timestamp {
            buf.put_cql_long(ts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;
    use crate::value::Value;

    #[test]
    fn encodes_mixed_statement_kinds() {
        let batch = Batch {
            kind: BatchType::Logged,
            statements: vec![
                BatchEntry { statement: BatchStatement::Query("INSERT INTO t (a) VALUES (?)".into()), values: vec![(None, BoundValue::Value(Value::Int(1)))] },
                BatchEntry { statement: BatchStatement::Prepared(Bytes::from_static(b"\x00\x01")), values: vec![(None, BoundValue::Unset)] },
            ],
            consistency: Consistency::Quorum,
            serial_consistency: None,
            timestamp: None,
        };
        let mut buf = BytesMut::new();
        batch.encode(&mut buf).unwrap();
        assert_eq!(buf[0], BatchType::Logged as u8);
    }
}
