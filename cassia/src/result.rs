//! `RESULT`: the response to `QUERY`, `PREPARE`, `EXECUTE` and `BATCH`.
use bytes::{Buf, Bytes};

use crate::{
    error::ErrorKind,
    protocol::CqlRead,
    value::{self, CqlType, Value},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum ResultKind {
    Void = 0x0001,
    Rows = 0x0002,
    SetKeyspace = 0x0003,
    Prepared = 0x0004,
    SchemaChange = 0x0005,
}

impl TryFrom<i32> for ResultKind {
    type Error = crate::Error;

    fn try_from(raw: i32) -> std::result::Result<Self, Self::Error> {
        Ok(match raw {
            0x0001 => ResultKind::Void,
            0x0002 => ResultKind::Rows,
            0x0003 => ResultKind::SetKeyspace,
            0x0004 => ResultKind::Prepared,
            0x0005 => ResultKind::SchemaChange,
            other => return Err(ErrorKind::ProtocolViolation(format!("unknown result kind {other:#06x}")).into()),
        })
    }
}

/// A single column's name and type, as reported in `[metadata]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub column_type: CqlType,
}

/// An opaque pagination cursor returned in `[metadata]` when more rows follow
/// and accepted back in a subsequent `QUERY`/`EXECUTE`'s `[query parameters]`.
pub type PagingState = Bytes;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub columns: Vec<ColumnSpec>,
    pub paging_state: Option<PagingState>,
    pub has_more_pages: bool,
    pub no_metadata: bool,
    /// v5 only: set when the server sends a fresh `result_metadata_id` to
    /// replace a [`Prepared::result_metadata_id`] the caller should have
    /// cached from the original `PREPARE` (the schema underneath the
    /// prepared statement changed). `None` on v4 connections and whenever
    /// the cached metadata is still current.
    pub new_metadata_id: Option<Bytes>,
}

impl Metadata {
    const GLOBAL_TABLES_SPEC: i32 = 0x0001;
    const HAS_MORE_PAGES: i32 = 0x0002;
    const NO_METADATA: i32 = 0x0004;
    const METADATA_CHANGED: i32 = 0x0008;

    fn decode(buf: &mut impl Buf) -> Result<Self> {
        let flags = buf.get_cql_int()?;
        let column_count = buf.get_cql_int()?;
        let paging_state = if flags & Self::HAS_MORE_PAGES != 0 { buf.get_cql_bytes()? } else { None };
        let new_metadata_id = if flags & Self::METADATA_CHANGED != 0 { Some(buf.get_cql_short_bytes()?) } else { None };
        let no_metadata = flags & Self::NO_METADATA != 0;

        let mut columns = Vec::new();
        if !no_metadata {
            let global = flags & Self::GLOBAL_TABLES_SPEC != 0;
            let global_spec = if global { Some((buf.get_cql_string()?, buf.get_cql_string()?)) } else { None };

            for _ in 0..column_count {
                let (keyspace, table) = match &global_spec {
                    Some((ks, table)) => (ks.clone(), table.clone()),
                    None => (buf.get_cql_string()?, buf.get_cql_string()?),
                };
                let name = buf.get_cql_string()?;
                let column_type = CqlType::decode(buf)?;
                columns.push(ColumnSpec { keyspace, table, name, column_type });
            }
        }

        Ok(Self { columns, paging_state, has_more_pages: flags & Self::HAS_MORE_PAGES != 0, no_metadata, new_metadata_id })
    }
}

/// One decoded row, column values in the order declared by [`Metadata::columns`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<Option<Value>>,
}

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).and_then(|v| v.as_ref())
    }

    pub fn by_name<'a>(&'a self, metadata: &Metadata, name: &str) -> Option<&'a Value> {
        let index = metadata.columns.iter().position(|c| c.name == name)?;
        self.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub metadata: Metadata,
    pub rows: Vec<Row>,
}

impl Rows {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let metadata = Metadata::decode(buf)?;
        let row_count = buf.get_cql_int()?;
        let column_types: Vec<&CqlType> = metadata.columns.iter().map(|c| &c.column_type).collect();
        let mut rows = Vec::with_capacity(row_count.max(0) as usize);
        for _ in 0..row_count {
            let mut columns = Vec::with_capacity(column_types.len());
            for ty in &column_types {
                columns.push(value::decode_prefixed(buf, ty)?);
            }
            rows.push(Row { columns });
        }
        Ok(Self { metadata, rows })
    }
}

/// A prepared statement descriptor returned by `PREPARE` (and echoed by
/// every subsequent `EXECUTE` against it).
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub id: Bytes,
    /// v5 only; `None` on v4 connections.
    pub result_metadata_id: Option<Bytes>,
    pub bind_metadata: Metadata,
    pub result_metadata: Metadata,
    /// Indices into `bind_metadata.columns` that form the partition key, in
    /// component order; used for token-aware routing by callers that need it.
    pub partition_key_indices: Vec<u16>,
}

impl Prepared {
    fn decode(buf: &mut impl Buf, protocol_version: u8) -> Result<Self> {
        let id = buf.get_cql_short_bytes()?;
        let result_metadata_id = if protocol_version >= 5 { Some(buf.get_cql_short_bytes()?) } else { None };
        let bind_metadata = Metadata::decode(buf)?;
        let pk_count = buf.get_cql_int()?;
        let mut partition_key_indices = Vec::with_capacity(pk_count.max(0) as usize);
        for _ in 0..pk_count {
            partition_key_indices.push(buf.get_cql_short()?);
        }
        let result_metadata = Metadata::decode(buf)?;
        Ok(Self { id, result_metadata_id, bind_metadata, result_metadata, partition_key_indices })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Void,
    Rows(Rows),
    SetKeyspace(String),
    Prepared(Prepared),
    SchemaChange(crate::message::response::SchemaChange),
}

impl QueryResult {
    pub fn decode(buf: &mut Bytes, protocol_version: u8) -> Result<Self> {
        let kind = ResultKind::try_from(buf.get_cql_int()?)?;
        Ok(match kind {
            ResultKind::Void => QueryResult::Void,
            ResultKind::Rows => QueryResult::Rows(Rows::decode(buf)?),
            ResultKind::SetKeyspace => QueryResult::SetKeyspace(buf.get_cql_string()?),
            ResultKind::Prepared => QueryResult::Prepared(Prepared::decode(buf, protocol_version)?),
            ResultKind::SchemaChange => {
                // SCHEMA_CHANGE result bodies share the EVENT body's layout,
                // minus the leading `event_type` string this kind already implies.
                let mut synthetic = bytes::BytesMut::new();
                use crate::protocol::CqlWrite;
                synthetic.put_cql_string("SCHEMA_CHANGE")?;
                synthetic.extend_from_slice(buf);
                let mut cursor = synthetic.freeze();
                match crate::message::response::Event::decode(&mut cursor)? {
                    crate::message::response::Event::SchemaChange(change) => QueryResult::SchemaChange(change),
                    _ => unreachable!("synthetic event prefix always decodes as SchemaChange"),
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::CqlWrite;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn decodes_void_result() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0001);
        let mut b = buf.freeze();
        assert_eq!(QueryResult::decode(&mut b, 4).unwrap(), QueryResult::Void);
    }

    #[test]
    fn decodes_set_keyspace() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0003);
        buf.put_cql_string("my_ks").unwrap();
        let mut b = buf.freeze();
        assert_eq!(QueryResult::decode(&mut b, 4).unwrap(), QueryResult::SetKeyspace("my_ks".into()));
    }

    #[test]
    fn decodes_rows_with_global_table_spec() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0002); // Rows
        buf.put_i32(Metadata::GLOBAL_TABLES_SPEC); // flags
        buf.put_i32(1); // column_count
        buf.put_cql_string("ks").unwrap();
        buf.put_cql_string("t").unwrap();
        buf.put_cql_string("id").unwrap();
        CqlType::Int.encode(&mut buf).unwrap();
        buf.put_i32(2); // row count
        buf.put_cql_bytes(Some(&1i32.to_be_bytes())).unwrap();
        buf.put_cql_bytes(Some(&2i32.to_be_bytes())).unwrap();
        let mut b = buf.freeze();
        let QueryResult::Rows(rows) = QueryResult::decode(&mut b, 4).unwrap() else { panic!("wrong variant") };
        assert_eq!(rows.metadata.columns.len(), 1);
        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[0].get(0), Some(&Value::Int(1)));
        assert_eq!(rows.rows[1].by_name(&rows.metadata, "id"), Some(&Value::Int(2)));
    }

    #[test]
    fn decodes_rows_with_no_metadata_flag() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0002);
        buf.put_i32(Metadata::NO_METADATA);
        buf.put_i32(1);
        buf.put_i32(0); // zero rows, no column types needed
        let mut b = buf.freeze();
        let QueryResult::Rows(rows) = QueryResult::decode(&mut b, 4).unwrap() else { panic!("wrong variant") };
        assert!(rows.metadata.no_metadata);
        assert!(rows.rows.is_empty());
    }

    #[test]
    fn decodes_rows_with_metadata_changed_flag() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0002);
        buf.put_i32(Metadata::METADATA_CHANGED | Metadata::NO_METADATA);
        buf.put_i32(0);
        buf.put_cql_short_bytes(&[0x01, 0x02]).unwrap();
        buf.put_i32(0); // zero rows
        let mut b = buf.freeze();
        let QueryResult::Rows(rows) = QueryResult::decode(&mut b, 5).unwrap() else { panic!("wrong variant") };
        assert_eq!(rows.metadata.new_metadata_id.as_deref(), Some(&[0x01, 0x02][..]));
    }

    #[test]
    fn decodes_prepared_with_bind_and_result_metadata() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x0004);
        buf.put_cql_short_bytes(&[0xAB, 0xCD]).unwrap();
        // bind metadata: no columns
        buf.put_i32(0);
        buf.put_i32(0);
        buf.put_i32(0); // partition key indices count
        // result metadata: no columns
        buf.put_i32(0);
        buf.put_i32(0);
        let mut b = buf.freeze();
        let QueryResult::Prepared(prepared) = QueryResult::decode(&mut b, 4).unwrap() else { panic!("wrong variant") };
        assert_eq!(&prepared.id[..], &[0xAB, 0xCD]);
        assert!(prepared.result_metadata_id.is_none());
    }
}
