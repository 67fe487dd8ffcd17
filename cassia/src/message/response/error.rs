//! `ERROR`: a structured failure reported by the server, with a numeric code
//! and code-specific extra fields.
use bytes::Buf;

use crate::protocol::{Consistency, CqlRead};

/// Error codes defined by the protocol, grouped the way the spec groups them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServerError {
    #[error("server error: {0}")]
    ServerError(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("authentication error: {0}")]
    AuthenticationError(String),
    #[error("unavailable: {message} (consistency={consistency:?}, required={required}, alive={alive})")]
    Unavailable { message: String, consistency: Consistency, required: i32, alive: i32 },
    #[error("overloaded: {0}")]
    Overloaded(String),
    #[error("is_bootstrapping: {0}")]
    IsBootstrapping(String),
    #[error("truncate error: {0}")]
    TruncateError(String),
    #[error("write timeout: {message} (consistency={consistency:?}, received={received}, block_for={block_for}, write_type={write_type})")]
    WriteTimeout { message: String, consistency: Consistency, received: i32, block_for: i32, write_type: String },
    #[error("read timeout: {message} (consistency={consistency:?}, received={received}, block_for={block_for}, data_present={data_present})")]
    ReadTimeout { message: String, consistency: Consistency, received: i32, block_for: i32, data_present: bool },
    #[error("read failure: {message} (consistency={consistency:?}, received={received}, block_for={block_for}, num_failures={num_failures})")]
    ReadFailure { message: String, consistency: Consistency, received: i32, block_for: i32, num_failures: i32 },
    #[error("function failure: {keyspace}.{function}({arg_types:?}): {detail}")]
    FunctionFailure { keyspace: String, function: String, arg_types: Vec<String>, detail: String },
    #[error("write failure: {message} (consistency={consistency:?}, received={received}, block_for={block_for}, num_failures={num_failures}, write_type={write_type})")]
    WriteFailure { message: String, consistency: Consistency, received: i32, block_for: i32, num_failures: i32, write_type: String },
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("config error: {0}")]
    ConfigError(String),
    #[error("already exists: keyspace={keyspace} table={table}")]
    AlreadyExists { keyspace: String, table: String },
    /// The prepared statement id referenced by `EXECUTE` is unknown to this
    /// node; the caller should re-`PREPARE` and retry once.
    #[error("unprepared: {message} (id={id:?})")]
    Unprepared { message: String, id: bytes::Bytes },
}

impl ServerError {
    pub fn code(&self) -> i32 {
        match self {
            ServerError::ServerError(_) => 0x0000,
            ServerError::ProtocolError(_) => 0x000A,
            ServerError::AuthenticationError(_) => 0x0100,
            ServerError::Unavailable { .. } => 0x1000,
            ServerError::Overloaded(_) => 0x1001,
            ServerError::IsBootstrapping(_) => 0x1002,
            ServerError::TruncateError(_) => 0x1003,
            ServerError::WriteTimeout { .. } => 0x1100,
            ServerError::ReadTimeout { .. } => 0x1200,
            ServerError::ReadFailure { .. } => 0x1300,
            ServerError::FunctionFailure { .. } => 0x1400,
            ServerError::WriteFailure { .. } => 0x1500,
            ServerError::SyntaxError(_) => 0x2000,
            ServerError::Unauthorized(_) => 0x2100,
            ServerError::Invalid(_) => 0x2200,
            ServerError::ConfigError(_) => 0x2300,
            ServerError::AlreadyExists { .. } => 0x2400,
            ServerError::Unprepared { .. } => 0x2500,
        }
    }

    /// Whether this error means "re-`PREPARE` the statement and retry once",
    /// per the `UNPREPARED` handling the connection state machine implements.
    pub fn is_unprepared(&self) -> bool {
        matches!(self, ServerError::Unprepared { .. })
    }

    pub fn decode(buf: &mut impl Buf) -> crate::Result<Self> {
        let code = buf.get_cql_int()?;
        let message = buf.get_cql_string()?;
        Ok(match code {
            0x0000 => ServerError::ServerError(message),
            0x000A => ServerError::ProtocolError(message),
            0x0100 => ServerError::AuthenticationError(message),
            0x1000 => {
                let consistency = buf.get_cql_consistency()?;
                let required = buf.get_cql_int()?;
                let alive = buf.get_cql_int()?;
                ServerError::Unavailable { message, consistency, required, alive }
            }
            0x1001 => ServerError::Overloaded(message),
            0x1002 => ServerError::IsBootstrapping(message),
            0x1003 => ServerError::TruncateError(message),
            0x1100 => {
                let consistency = buf.get_cql_consistency()?;
                let received = buf.get_cql_int()?;
                let block_for = buf.get_cql_int()?;
                let write_type = buf.get_cql_string()?;
                ServerError::WriteTimeout { message, consistency, received, block_for, write_type }
            }
            0x1200 => {
                let consistency = buf.get_cql_consistency()?;
                let received = buf.get_cql_int()?;
                let block_for = buf.get_cql_int()?;
                let data_present = buf.get_cql_byte()? != 0;
                ServerError::ReadTimeout { message, consistency, received, block_for, data_present }
            }
            0x1300 => {
                let consistency = buf.get_cql_consistency()?;
                let received = buf.get_cql_int()?;
                let block_for = buf.get_cql_int()?;
                let num_failures = buf.get_cql_int()?;
                ServerError::ReadFailure { message, consistency, received, block_for, num_failures }
            }
            0x1400 => {
                let keyspace = buf.get_cql_string()?;
                let function = buf.get_cql_string()?;
                let arg_types = buf.get_cql_string_list()?;
                ServerError::FunctionFailure { keyspace, function, arg_types, detail: message }
            }
            0x1500 => {
                let consistency = buf.get_cql_consistency()?;
                let received = buf.get_cql_int()?;
                let block_for = buf.get_cql_int()?;
                let num_failures = buf.get_cql_int()?;
                let write_type = buf.get_cql_string()?;
                ServerError::WriteFailure { message, consistency, received, block_for, num_failures, write_type }
            }
            0x2000 => ServerError::SyntaxError(message),
            0x2100 => ServerError::Unauthorized(message),
            0x2200 => ServerError::Invalid(message),
            0x2300 => ServerError::ConfigError(message),
            0x2400 => {
                let keyspace = buf.get_cql_string()?;
                let table = buf.get_cql_string()?;
                ServerError::AlreadyExists { keyspace, table }
            }
            0x2500 => {
                let id = buf.get_cql_short_bytes()?;
                ServerError::Unprepared { message, id }
            }
            other => {
                return Err(crate::error::ErrorKind::ProtocolViolation(format!("unknown error code {other:#06x}: {message}")).into());
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
    fn decodes_unprepared_with_id() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x2500);
        buf.put_cql_string("Unknown prepared statement").unwrap();
        buf.put_cql_short_bytes(&[1, 2, 3, 4]).unwrap();
        let mut read = buf.freeze();
        let err = ServerError::decode(&mut read).unwrap();
        assert!(err.is_unprepared());
        assert_eq!(err.code(), 0x2500);
    }

    #[test]
    fn decodes_unavailable_with_consistency() {
        let mut buf = BytesMut::new();
        buf.put_i32(0x1000);
        buf.put_cql_string("not enough replicas").unwrap();
        buf.put_cql_consistency(Consistency::Quorum);
        buf.put_i32(3);
        buf.put_i32(1);
        let mut read = buf.freeze();
        let err = ServerError::decode(&mut read).unwrap();
        match err {
            ServerError::Unavailable { required, alive, .. } => {
                assert_eq!(required, 3);
                assert_eq!(alive, 1);
            }
            _ => panic!("wrong variant"),
        }
    }
}
