//! SASL authentication hook negotiated through `AUTHENTICATE`/`AUTH_CHALLENGE`/`AUTH_SUCCESS`.
//!
//! This module only defines the seam and the trivial password authenticator
//! every Cassandra install ships; anything beyond that (Kerberos, LDAP, a
//! custom `IAuthenticator`) is a concrete [`AuthProvider`] a caller supplies.
use crate::{error::ErrorKind, Result};

/// Drives one authentication exchange. `initial_response` answers the
/// server's `AUTHENTICATE` message; `evaluate_challenge` answers each
/// subsequent `AUTH_CHALLENGE`, if the authenticator needs more than one
/// round trip.
pub trait AuthProvider: Send + Sync {
    /// The authenticator class name this provider supports, e.g.
    /// `org.apache.cassandra.auth.PasswordAuthenticator`. Connection setup
    /// rejects a server's `AUTHENTICATE` with a different class name.
    fn authenticator_class(&self) -> &str;

    fn initial_response(&self) -> Vec<u8>;

    /// Returns `None` to end the exchange without sending a further
    /// `AUTH_RESPONSE` (the default trivial authenticators never challenge).
    fn evaluate_challenge(&self, _challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// `org.apache.cassandra.auth.PasswordAuthenticator`: a single
/// `\0username\0password` token, no challenge round trip.
pub struct PlainTextAuthProvider {
    user: String,
    password: String,
}

impl PlainTextAuthProvider {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self { user: user.into(), password: password.into() }
    }
}

impl AuthProvider for PlainTextAuthProvider {
    fn authenticator_class(&self) -> &str {
        "org.apache.cassandra.auth.PasswordAuthenticator"
    }

    fn initial_response(&self) -> Vec<u8> {
        let mut token = Vec::with_capacity(self.user.len() + self.password.len() + 2);
        token.push(0);
        token.extend_from_slice(self.user.as_bytes());
        token.push(0);
        token.extend_from_slice(self.password.as_bytes());
        token
    }
}

pub(crate) fn check_authenticator_class(provider: &dyn AuthProvider, requested: &str) -> Result<()> {
    if provider.authenticator_class() != requested {
        return Err(ErrorKind::UnsupportedAuthenticator(requested.to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plaintext_token_has_leading_nulls() {
        let provider = PlainTextAuthProvider::new("scylla", "secret");
        let token = provider.initial_response();
        assert_eq!(token, b"\0scylla\0secret");
    }

    #[test]
    fn rejects_mismatched_authenticator_class() {
        let provider = PlainTextAuthProvider::new("a", "b");
        assert!(check_authenticator_class(&provider, "com.example.CustomAuthenticator").is_err());
    }
}
