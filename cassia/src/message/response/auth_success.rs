//! `AUTH_SUCCESS`: ends a successful authentication exchange, with an
//! optional final token from the authenticator.
use bytes::{Buf, Bytes};

use crate::{protocol::CqlRead, Result};

#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub token: Option<Bytes>,
}

impl AuthSuccess {
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self { token: buf.get_cql_bytes()? })
    }
}
