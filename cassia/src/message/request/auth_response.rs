//! `AUTH_RESPONSE`: a client's SASL token, sent in reply to `AUTHENTICATE`
//! or `AUTH_CHALLENGE`. See [`crate::auth::AuthProvider`].
use bytes::BufMut;

use crate::{protocol::CqlWrite, Result};

pub struct AuthResponse {
    pub token: Vec<u8>,
}

impl AuthResponse {
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        buf.put_cql_bytes(Some(&self.token))
    }
}
