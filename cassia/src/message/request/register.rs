//! `REGISTER`: subscribes this connection to server-pushed `EVENT` frames.
use bytes::BufMut;

use crate::{protocol::CqlWrite, Result};

/// The event categories a connection may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    TopologyChange,
    StatusChange,
    SchemaChange,
}

impl EventType {
    fn as_str(self) -> &'static str {
        match self {
            EventType::TopologyChange => "TOPOLOGY_CHANGE",
            EventType::StatusChange => "STATUS_CHANGE",
            EventType::SchemaChange => "SCHEMA_CHANGE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub event_types: Vec<EventType>,
}

impl Register {
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        let names: Vec<&str> = self.event_types.iter().map(|t| t.as_str()).collect();
        buf.put_cql_string_list(&names)
    }
}
