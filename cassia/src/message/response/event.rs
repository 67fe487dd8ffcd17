//! `EVENT`: a server-pushed notification for a subscription registered with
//! `REGISTER`. Arrives on the reserved stream id -1.
use std::net::IpAddr;

use bytes::Buf;

use crate::{error::ErrorKind, protocol::CqlRead, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TopologyChange { change_type: String, node: (IpAddr, i32) },
    StatusChange { change_type: String, node: (IpAddr, i32) },
    SchemaChange(SchemaChange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChange {
    pub change_type: String,
    pub target: SchemaChangeTarget,
    pub keyspace: String,
    pub name: Option<String>,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChangeTarget {
    Keyspace,
    Table,
    Type,
    Function,
    Aggregate,
}

impl Event {
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let event_type = buf.get_cql_string()?;
        Ok(match event_type.as_str() {
            "TOPOLOGY_CHANGE" => {
                let change_type = buf.get_cql_string()?;
                let node = buf.get_cql_inet()?;
                Event::TopologyChange { change_type, node }
            }
            "STATUS_CHANGE" => {
                let change_type = buf.get_cql_string()?;
                let node = buf.get_cql_inet()?;
                Event::StatusChange { change_type, node }
            }
            "SCHEMA_CHANGE" => {
                let change_type = buf.get_cql_string()?;
                let target_raw = buf.get_cql_string()?;
                let target = match target_raw.as_str() {
                    "KEYSPACE" => SchemaChangeTarget::Keyspace,
                    "TABLE" => SchemaChangeTarget::Table,
                    "TYPE" => SchemaChangeTarget::Type,
                    "FUNCTION" => SchemaChangeTarget::Function,
                    "AGGREGATE" => SchemaChangeTarget::Aggregate,
                    other => return Err(ErrorKind::ProtocolViolation(format!("unknown schema change target `{other}`")).into()),
                };
                let keyspace = buf.get_cql_string()?;
                let (name, arguments) = match target {
                    SchemaChangeTarget::Keyspace => (None, Vec::new()),
                    SchemaChangeTarget::Table | SchemaChangeTarget::Type => (Some(buf.get_cql_string()?), Vec::new()),
                    SchemaChangeTarget::Function | SchemaChangeTarget::Aggregate => {
                        let name = buf.get_cql_string()?;
                        let arguments = buf.get_cql_string_list()?;
                        (Some(name), arguments)
                    }
                };
                Event::SchemaChange(SchemaChange { change_type, target, keyspace, name, arguments })
            }
            other => return Err(ErrorKind::ProtocolViolation(format!("unknown event type `{other}`")).into()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::CqlWrite;
    use bytes::BytesMut;
    use std::net::Ipv4Addr;

    #[test]
    fn decodes_status_change() {
        let mut buf = BytesMut::new();
        buf.put_cql_string("STATUS_CHANGE").unwrap();
        buf.put_cql_string("UP").unwrap();
        buf.put_cql_inet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 9042);
        let mut read = buf.freeze();
        let event = Event::decode(&mut read).unwrap();
        assert_eq!(event, Event::StatusChange { change_type: "UP".into(), node: (IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 9042) });
    }

    #[test]
    fn decodes_schema_change_for_table() {
        let mut buf = BytesMut::new();
        buf.put_cql_string("SCHEMA_CHANGE").unwrap();
        buf.put_cql_string("UPDATED").unwrap();
        buf.put_cql_string("TABLE").unwrap();
        buf.put_cql_string("my_ks").unwrap();
        buf.put_cql_string("my_table").unwrap();
        let mut read = buf.freeze();
        let event = Event::decode(&mut read).unwrap();
        match event {
            Event::SchemaChange(change) => {
                assert_eq!(change.target, SchemaChangeTarget::Table);
                assert_eq!(change.name.as_deref(), Some("my_table"));
            }
            _ => panic!("wrong variant"),
        }
    }
}
