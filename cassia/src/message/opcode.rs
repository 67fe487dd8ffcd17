//! `[opcode]`: a single byte naming the message carried by a frame.

use crate::error::ErrorKind;

/// The opcode byte from a frame header. `0x04` (`CREDENTIALS`) was dropped
/// from the protocol after v1 and is not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Error = 0x00,
    Startup = 0x01,
    Ready = 0x02,
    Authenticate = 0x03,
    Options = 0x05,
    Supported = 0x06,
    Query = 0x07,
    Result = 0x08,
    Prepare = 0x09,
    Execute = 0x0A,
    Register = 0x0B,
    Event = 0x0C,
    Batch = 0x0D,
    AuthChallenge = 0x0E,
    AuthResponse = 0x0F,
    AuthSuccess = 0x10,
}

impl OpCode {
    /// Whether a request frame carrying this opcode is legal to send to a server.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            OpCode::Startup
                | OpCode::Options
                | OpCode::Query
                | OpCode::Prepare
                | OpCode::Execute
                | OpCode::Register
                | OpCode::Batch
                | OpCode::AuthResponse
        )
    }

    /// Whether a frame carrying this opcode can legally arrive unsolicited,
    /// i.e. on the reserved event stream id.
    pub fn is_push(self) -> bool {
        matches!(self, OpCode::Event)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = crate::Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        use OpCode::*;
        Ok(match raw {
            0x00 => Error,
            0x01 => Startup,
            0x02 => Ready,
            0x03 => Authenticate,
            0x05 => Options,
            0x06 => Supported,
            0x07 => Query,
            0x08 => Result,
            0x09 => Prepare,
            0x0A => Execute,
            0x0B => Register,
            0x0C => Event,
            0x0D => Batch,
            0x0E => AuthChallenge,
            0x0F => AuthResponse,
            0x10 => AuthSuccess,
            other => return Err(ErrorKind::ProtocolViolation(format!("unknown opcode {other:#04x}")).into()),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips_every_opcode() {
        for raw in [0x00u8, 0x01, 0x02, 0x03, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10] {
            let op = OpCode::try_from(raw).unwrap();
            assert_eq!(u8::from(op), raw);
        }
    }

    #[test]
    fn rejects_retired_credentials_opcode() {
        assert!(OpCode::try_from(0x04).is_err());
    }
}
