//! `AUTHENTICATE`: tells the client which authenticator class the server requires.
use bytes::Buf;

use crate::{protocol::CqlRead, Result};

#[derive(Debug, Clone)]
pub struct Authenticate {
    pub authenticator_class: String,
}

impl Authenticate {
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self { authenticator_class: buf.get_cql_string()? })
    }
}
