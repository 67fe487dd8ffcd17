//! The `[query parameters]` structure shared by `QUERY`, `EXECUTE` and each
//! statement within a `BATCH`.
use bytes::BufMut;

use crate::{
    error::ErrorKind,
    protocol::{Consistency, CqlWrite},
    value::{write_bound, BoundValue},
    Result,
};

#[derive(Debug, Clone, Copy, Default)]
struct Flags(u8);

impl Flags {
    const VALUES: u8 = 0x01;
    const SKIP_METADATA: u8 = 0x02;
    const PAGE_SIZE: u8 = 0x04;
    const WITH_PAGING_STATE: u8 = 0x08;
    const WITH_SERIAL_CONSISTENCY: u8 = 0x10;
    const WITH_DEFAULT_TIMESTAMP: u8 = 0x20;
    const WITH_NAMES_FOR_VALUES: u8 = 0x40;
}

/// A bound query value, optionally named for `WITH_NAMES_FOR_VALUES` binding
/// (used by CQL's named-parameter markers, `:name`).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: BoundValue,
}

impl From<BoundValue> for NamedValue {
    fn from(value: BoundValue) -> Self {
        Self { name: None, value }
    }
}

/// The parameters that follow a query/prepared-statement id in `QUERY` and
/// `EXECUTE`, and that accompany each statement in a `BATCH`.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub consistency: Consistency,
    pub values: Vec<NamedValue>,
    pub skip_metadata: bool,
    pub page_size: Option<i32>,
    pub paging_state: Option<bytes::Bytes>,
    pub serial_consistency: Option<Consistency>,
    pub timestamp: Option<i64>,
}

impl QueryParams {
    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if !self.values.is_empty() {
            flags |= Flags::VALUES;
            if self.values.iter().any(|v| v.name.is_some()) {
                flags |= Flags::WITH_NAMES_FOR_VALUES;
            }
        }
        if self.skip_metadata {
            flags |= Flags::SKIP_METADATA;
        }
        if self.page_size.is_some() {
            flags |= Flags::PAGE_SIZE;
        }
        if self.paging_state.is_some() {
            flags |= Flags::WITH_PAGING_STATE;
        }
        if self.serial_consistency.is_some() {
            flags |= Flags::WITH_SERIAL_CONSISTENCY;
        }
        if self.timestamp.is_some() {
            flags |= Flags::WITH_DEFAULT_TIMESTAMP;
        }
        flags
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_cql_consistency(self.consistency);
        buf.put_u8(self.flags());
        if !self.values.is_empty() {
            let named = self.values.iter().any(|v| v.name.is_some());
            let count: u16 = self.values.len().try_into().map_err(|_| ErrorKind::Encode("query values"))?;
            buf.put_cql_short(count);
            for v in &self.values {
                if named {
                    buf.put_cql_string(v.name.as_deref().unwrap_or_default())?;
                }
                write_bound(buf, &v.value)?;
            }
        }
        if let Some(page_size) = self.page_size {
            buf.put_cql_int(page_size);
        }
        if let Some(paging_state) = &self.paging_state {
            buf.put_cql_bytes(Some(paging_state))?;
        }
        if let Some(serial) = self.serial_consistency {
            buf.put_cql_consistency(serial);
        }
        if let Some(ts) = self.timestamp {
            buf.put_cql_long(ts);
        }
        Ok(())
    }
}
