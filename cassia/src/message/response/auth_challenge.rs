//! `AUTH_CHALLENGE`: an intermediate SASL challenge sent during a multi-step
//! authentication exchange.
use bytes::{Buf, Bytes};

use crate::{protocol::CqlRead, Result};

#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub token: Bytes,
}

impl AuthChallenge {
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let token = buf.get_cql_bytes()?.unwrap_or_default();
        Ok(Self { token })
    }
}
