//! The frame layer: the 9-byte header plus the optional trailing elements
//! (tracing id, warnings, custom payload) that precede a message body.
use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::{
    error::ErrorKind,
    message::OpCode,
    protocol::{CqlRead, CqlWrite},
    Result,
};

/// Direction encoded in the high bit of the version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// The protocol version byte: direction bit plus a 7-bit version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(u8);

impl Version {
    pub const REQUEST_MASK: u8 = 0x80;

    pub fn request(version: u8) -> Self {
        Self(version & 0x7f)
    }

    pub fn response(version: u8) -> Self {
        Self((version & 0x7f) | Self::REQUEST_MASK)
    }

    pub fn direction(self) -> Direction {
        if self.0 & Self::REQUEST_MASK == 0 {
            Direction::Request
        } else {
            Direction::Response
        }
    }

    pub fn protocol_version(self) -> u8 {
        self.0 & 0x7f
    }

    pub fn raw(self) -> u8 {
        self.0
    }
}

/// Flags applying to the frame; the low nibble is defined by the protocol,
/// the rest is reserved and rejected on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    pub const COMPRESSION: u8 = 0x01;
    pub const TRACING: u8 = 0x02;
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    pub const WARNING: u8 = 0x08;
    const KNOWN: u8 = Self::COMPRESSION | Self::TRACING | Self::CUSTOM_PAYLOAD | Self::WARNING;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with(mut self, flag: u8, set: bool) -> Self {
        if set {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
        self
    }

    pub fn compression(self) -> bool {
        self.0 & Self::COMPRESSION != 0
    }

    pub fn tracing(self) -> bool {
        self.0 & Self::TRACING != 0
    }

    pub fn custom_payload(self) -> bool {
        self.0 & Self::CUSTOM_PAYLOAD != 0
    }

    pub fn warning(self) -> bool {
        self.0 & Self::WARNING != 0
    }

    fn check_known(self) -> Result<()> {
        if self.0 & !Self::KNOWN != 0 {
            return Err(ErrorKind::ProtocolViolation(format!("frame with unknown flag bits {:#04x}", self.0 & !Self::KNOWN)).into());
        }
        Ok(())
    }
}

impl From<u8> for HeaderFlags {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<HeaderFlags> for u8 {
    fn from(flags: HeaderFlags) -> Self {
        flags.0
    }
}

/// The 9-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub flags: HeaderFlags,
    /// `-1` is reserved for server-initiated EVENT frames.
    pub stream: i16,
    pub opcode: OpCode,
    pub length: i32,
}

pub const HEADER_LEN: usize = 9;

impl Header {
    pub fn request(stream: i16, opcode: OpCode, protocol_version: u8, flags: HeaderFlags) -> Self {
        Self { version: Version::request(protocol_version), flags, stream, opcode, length: 0 }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        buf.require(HEADER_LEN)?;
        let version = Version(buf.get_u8());
        let flags = HeaderFlags::from(buf.get_u8());
        flags.check_known()?;
        let stream = buf.get_i16();
        let opcode_raw = buf.get_u8();
        let opcode = OpCode::try_from(opcode_raw)?;
        let length = buf.get_i32();
        if length < 0 {
            return Err(ErrorKind::ProtocolViolation(format!("negative frame body length {length}")).into());
        }
        Ok(Self { version, flags, stream, opcode, length })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.version.raw());
        buf.put_u8(self.flags.into());
        buf.put_i16(self.stream);
        buf.put_u8(self.opcode.into());
        buf.put_i32(self.length);
    }
}

/// Hook for a negotiated frame-body compression algorithm. No concrete
/// implementation (lz4/snappy) ships here; callers that negotiate
/// compression in `STARTUP` supply one.
pub trait FrameCompressor: Send + Sync {
    fn compress(&self, body: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, body: &[u8]) -> Result<Vec<u8>>;
}

/// Elements that precede the opcode-specific payload inside a frame body,
/// in the fixed order the protocol defines them: tracing id, warnings,
/// custom payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameExtras {
    pub tracing_id: Option<Uuid>,
    pub warnings: Vec<String>,
    pub custom_payload: Option<HashMap<String, Bytes>>,
}

/// A decoded frame: header plus the leading extras, with `remainder` left
/// positioned at the opcode-specific payload.
pub struct DecodedFrame {
    pub header: Header,
    pub extras: FrameExtras,
    pub body: Bytes,
}

/// Reads a full frame from `buf`, decompressing the body through `compressor`
/// when the compression flag is set. `max_frame_len` enforces a locally
/// configured ceiling independent of the protocol's 256 MiB hard limit.
pub fn decode_frame(buf: &mut impl Buf, compressor: Option<&dyn FrameCompressor>, max_frame_len: usize) -> Result<DecodedFrame> {
    let header = Header::decode(buf)?;
    let len = header.length as usize;
    if len > max_frame_len {
        return Err(ErrorKind::OversizedFrame { len, max: max_frame_len }.into());
    }
    buf.require(len)?;
    let raw_body = buf.copy_to_bytes(len);
    decode_body(header, raw_body, compressor)
}

/// Parses the extras and leaves the remainder positioned at the
/// opcode-specific payload, given a header already read off the wire and its
/// (still possibly compressed) raw body. Split out from [`decode_frame`] so a
/// socket reader can read the header and length-delimited body with
/// `read_exact` calls before this purely in-memory step runs.
pub fn decode_body(header: Header, raw_body: Bytes, compressor: Option<&dyn FrameCompressor>) -> Result<DecodedFrame> {
    let body = if header.flags.compression() {
        let compressor = compressor.ok_or_else(|| ErrorKind::ProtocolViolation("compressed frame but no compressor configured".into()))?;
        Bytes::from(compressor.decompress(&raw_body)?)
    } else {
        raw_body
    };

    let mut cursor = body;
    let mut extras = FrameExtras::default();
    if header.flags.tracing() {
        extras.tracing_id = Some(cursor.get_cql_uuid()?);
    }
    if header.flags.warning() {
        extras.warnings = cursor.get_cql_string_list()?;
    }
    if header.flags.custom_payload() {
        extras.custom_payload = Some(cursor.get_cql_bytes_map()?);
    }

    Ok(DecodedFrame { header, extras, body: cursor })
}

/// Serializes `header` (length overwritten to match `body`) followed by
/// `body`, compressing through `compressor` when the compression flag is set.
pub fn encode_frame(mut header: Header, body: &[u8], compressor: Option<&dyn FrameCompressor>) -> Result<BytesMut> {
    let payload = if header.flags.compression() {
        let compressor = compressor.ok_or_else(|| ErrorKind::ProtocolViolation("compression requested but no compressor configured".into()))?;
        compressor.compress(body)?
    } else {
        body.to_vec()
    };

    let length: i32 = payload.len().try_into().map_err(|_| ErrorKind::Encode("frame body"))?;
    header.length = length;

    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    header.encode(&mut out);
    out.put_slice(&payload);
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let header = Header { version: Version::request(4), flags: HeaderFlags::new().with(HeaderFlags::TRACING, true), stream: 12, opcode: OpCode::Query, length: 42 };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        let mut read = buf.freeze();
        let decoded = Header::decode(&mut read).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn response_direction_bit_is_set() {
        let v = Version::response(4);
        assert_eq!(v.direction(), Direction::Response);
        assert_eq!(v.protocol_version(), 4);
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x84); // response, v4
        buf.put_u8(0x40); // unknown flag bit
        buf.put_i16(0);
        buf.put_u8(OpCode::Ready.into());
        buf.put_i32(0);
        let mut read = buf.freeze();
        assert!(Header::decode(&mut read).is_err());
    }

    #[test]
    fn frame_without_extras_roundtrips() {
        let header = Header { version: Version::request(4), flags: HeaderFlags::new(), stream: 7, opcode: OpCode::Options, length: 0 };
        let encoded = encode_frame(header, b"", None).unwrap();
        let mut read = encoded.freeze();
        let decoded = decode_frame(&mut read, None, 16 * 1024 * 1024).unwrap();
        assert_eq!(decoded.header.stream, 7);
        assert_eq!(decoded.header.opcode, OpCode::Options);
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let header = Header { version: Version::request(4), flags: HeaderFlags::new(), stream: 1, opcode: OpCode::Query, length: 0 };
        let encoded = encode_frame(header, &vec![0u8; 128], None).unwrap();
        let mut read = encoded.freeze();
        assert!(decode_frame(&mut read, None, 64).is_err());
    }

    #[test]
    fn extras_are_parsed_in_tracing_warning_payload_order() {
        let mut body = BytesMut::new();
        let tracing_id = Uuid::new_v4();
        body.put_slice(tracing_id.as_bytes());
        body.put_cql_string_list(&["node under load"]).unwrap();
        let mut payload = HashMap::new();
        payload.insert("key".to_string(), Bytes::from_static(b"value"));
        body.put_cql_bytes_map(&payload).unwrap();
        body.put_cql_string("REST").unwrap();

        let flags = HeaderFlags::new().with(HeaderFlags::TRACING, true).with(HeaderFlags::WARNING, true).with(HeaderFlags::CUSTOM_PAYLOAD, true);
        let header = Header { version: Version::response(4), flags, stream: 3, opcode: OpCode::Result, length: 0 };
        let encoded = encode_frame(header, &body, None).unwrap();
        let mut read = encoded.freeze();
        let decoded = decode_frame(&mut read, None, 16 * 1024 * 1024).unwrap();

        assert_eq!(decoded.extras.tracing_id, Some(tracing_id));
        assert_eq!(decoded.extras.warnings, vec!["node under load".to_string()]);
        assert_eq!(decoded.extras.custom_payload.unwrap().get("key").unwrap(), &Bytes::from_static(b"value"));
        let mut remainder = decoded.body;
        assert_eq!(remainder.get_cql_string().unwrap(), "REST");
    }
}
