//! The primitive codec: the byte-level alphabet shared by every frame and message.
//!
//! Every reader returns [`crate::Result`] so truncated input surfaces as
//! [`crate::error::ErrorKind::TruncatedFrame`] instead of a panic. Writers are
//! infallible for primitives that cannot overflow their wire width; the few
//! that can (`string`, `string_list`, ...) return a `Result` instead.
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

pub mod consistency;
pub mod duration;
pub mod varint;

pub use consistency::Consistency;

use crate::error::{Error, ErrorKind};

/// Read operations for the CQL primitive alphabet, layered over [`bytes::Buf`].
pub trait CqlRead: Buf {
    fn require(&self, n: usize) -> crate::Result<()> {
        if self.remaining() < n {
            return Err(ErrorKind::TruncatedFrame { expected: n, got: self.remaining() }.into());
        }
        Ok(())
    }

    fn get_cql_byte(&mut self) -> crate::Result<u8> {
        self.require(1)?;
        Ok(self.get_u8())
    }

    fn get_cql_short(&mut self) -> crate::Result<u16> {
        self.require(2)?;
        Ok(self.get_u16())
    }

    fn get_cql_int(&mut self) -> crate::Result<i32> {
        self.require(4)?;
        Ok(self.get_i32())
    }

    fn get_cql_long(&mut self) -> crate::Result<i64> {
        self.require(8)?;
        Ok(self.get_i64())
    }

    fn get_cql_float(&mut self) -> crate::Result<f32> {
        self.require(4)?;
        Ok(self.get_f32())
    }

    fn get_cql_double(&mut self) -> crate::Result<f64> {
        self.require(8)?;
        Ok(self.get_f64())
    }

    /// `[string]`: u16 byte length + UTF-8 bytes. Length counts bytes, not code points.
    fn get_cql_string(&mut self) -> crate::Result<String> {
        let len = self.get_cql_short()? as usize;
        self.require(len)?;
        let mut buf = vec![0u8; len];
        self.copy_to_slice(&mut buf);
        String::from_utf8(buf).map_err(|e| ErrorKind::Decode(e.to_string()).into())
    }

    /// `[long string]`: i32 byte length + UTF-8 bytes.
    fn get_cql_long_string(&mut self) -> crate::Result<String> {
        let len = self.get_cql_int()?;
        if len < 0 {
            return Err(ErrorKind::Decode("negative long string length".into()).into());
        }
        let len = len as usize;
        self.require(len)?;
        let mut buf = vec![0u8; len];
        self.copy_to_slice(&mut buf);
        String::from_utf8(buf).map_err(|e| ErrorKind::Decode(e.to_string()).into())
    }

    /// `[uuid]`: 16 raw bytes.
    fn get_cql_uuid(&mut self) -> crate::Result<Uuid> {
        self.require(16)?;
        let mut buf = [0u8; 16];
        self.copy_to_slice(&mut buf);
        Ok(Uuid::from_bytes(buf))
    }

    /// `[string list]`: u16 count + count x `[string]`.
    fn get_cql_string_list(&mut self) -> crate::Result<Vec<String>> {
        let count = self.get_cql_short()?;
        (0..count).map(|_| self.get_cql_string()).collect()
    }

    /// `[bytes]`: i32 length; -1 denotes null (no payload follows).
    fn get_cql_bytes(&mut self) -> crate::Result<Option<Bytes>> {
        let len = self.get_cql_int()?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        self.require(len)?;
        Ok(Some(self.copy_to_bytes(len)))
    }

    /// `[short bytes]`: u16 length, used for prepared ids and paging-state-shaped fields.
    fn get_cql_short_bytes(&mut self) -> crate::Result<Bytes> {
        let len = self.get_cql_short()? as usize;
        self.require(len)?;
        Ok(self.copy_to_bytes(len))
    }

    /// `[inet]` without port: single length byte (4 or 16) + address bytes.
    fn get_cql_inet_addr(&mut self) -> crate::Result<IpAddr> {
        let len = self.get_cql_byte()?;
        match len {
            4 => {
                self.require(4)?;
                let mut b = [0u8; 4];
                self.copy_to_slice(&mut b);
                Ok(IpAddr::V4(Ipv4Addr::from(b)))
            }
            16 => {
                self.require(16)?;
                let mut b = [0u8; 16];
                self.copy_to_slice(&mut b);
                Ok(IpAddr::V6(Ipv6Addr::from(b)))
            }
            other => Err(ErrorKind::Decode(format!("invalid inet address length {other}")).into()),
        }
    }

    /// `[inet]` with port, used by EVENT bodies: address + i32 port.
    fn get_cql_inet(&mut self) -> crate::Result<(IpAddr, i32)> {
        let addr = self.get_cql_inet_addr()?;
        let port = self.get_cql_int()?;
        Ok((addr, port))
    }

    /// `[string map]`: u16 count + count x (string, string).
    fn get_cql_string_map(&mut self) -> crate::Result<HashMap<String, String>> {
        let count = self.get_cql_short()?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let k = self.get_cql_string()?;
            let v = self.get_cql_string()?;
            map.insert(k, v);
        }
        Ok(map)
    }

    /// `[string multimap]`: u16 count + count x (string, string list).
    fn get_cql_string_multimap(&mut self) -> crate::Result<HashMap<String, Vec<String>>> {
        let count = self.get_cql_short()?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let k = self.get_cql_string()?;
            let v = self.get_cql_string_list()?;
            map.insert(k, v);
        }
        Ok(map)
    }

    /// `[bytes map]`: u16 count + count x (string, bytes), used for custom payloads.
    fn get_cql_bytes_map(&mut self) -> crate::Result<HashMap<String, Bytes>> {
        let count = self.get_cql_short()?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let k = self.get_cql_string()?;
            let v = self.get_cql_bytes()?.unwrap_or_default();
            map.insert(k, v);
        }
        Ok(map)
    }

    fn get_cql_consistency(&mut self) -> crate::Result<Consistency> {
        let raw = self.get_cql_short()?;
        Consistency::try_from(raw)
    }
}

impl<B: Buf + ?Sized> CqlRead for B {}

/// Write operations mirroring [`CqlRead`], layered over [`bytes::BufMut`].
pub trait CqlWrite: BufMut {
    fn put_cql_byte(&mut self, v: u8) {
        self.put_u8(v);
    }

    fn put_cql_short(&mut self, v: u16) {
        self.put_u16(v);
    }

    fn put_cql_int(&mut self, v: i32) {
        self.put_i32(v);
    }

    fn put_cql_long(&mut self, v: i64) {
        self.put_i64(v);
    }

    fn put_cql_float(&mut self, v: f32) {
        self.put_f32(v);
    }

    fn put_cql_double(&mut self, v: f64) {
        self.put_f64(v);
    }

    /// `[string]`: fails with `EncodeError` if the UTF-8 byte length overflows u16.
    fn put_cql_string(&mut self, v: &str) -> crate::Result<()> {
        let bytes = v.as_bytes();
        let len: u16 = bytes.len().try_into().map_err(|_| ErrorKind::Encode("string"))?;
        self.put_cql_short(len);
        self.put_slice(bytes);
        Ok(())
    }

    fn put_cql_long_string(&mut self, v: &str) -> crate::Result<()> {
        let bytes = v.as_bytes();
        let len: i32 = bytes.len().try_into().map_err(|_| ErrorKind::Encode("long_string"))?;
        self.put_cql_int(len);
        self.put_slice(bytes);
        Ok(())
    }

    fn put_cql_uuid(&mut self, v: &Uuid) {
        self.put_slice(v.as_bytes());
    }

    fn put_cql_string_list<S: AsRef<str>>(&mut self, v: &[S]) -> crate::Result<()> {
        let count: u16 = v.len().try_into().map_err(|_| ErrorKind::Encode("string_list"))?;
        self.put_cql_short(count);
        for s in v {
            self.put_cql_string(s.as_ref())?;
        }
        Ok(())
    }

    /// `[bytes]`: `None` is written as length -1.
    fn put_cql_bytes(&mut self, v: Option<&[u8]>) -> crate::Result<()> {
        match v {
            None => self.put_cql_int(-1),
            Some(b) => {
                let len: i32 = b.len().try_into().map_err(|_| ErrorKind::Encode("bytes"))?;
                self.put_cql_int(len);
                self.put_slice(b);
            }
        }
        Ok(())
    }

    fn put_cql_short_bytes(&mut self, v: &[u8]) -> crate::Result<()> {
        let len: u16 = v.len().try_into().map_err(|_| ErrorKind::Encode("short_bytes"))?;
        self.put_cql_short(len);
        self.put_slice(v);
        Ok(())
    }

    fn put_cql_inet_addr(&mut self, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => {
                self.put_cql_byte(4);
                self.put_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                self.put_cql_byte(16);
                self.put_slice(&v6.octets());
            }
        }
    }

    fn put_cql_inet(&mut self, addr: IpAddr, port: i32) {
        self.put_cql_inet_addr(addr);
        self.put_cql_int(port);
    }

    fn put_cql_string_map(&mut self, v: &HashMap<String, String>) -> crate::Result<()> {
        let count: u16 = v.len().try_into().map_err(|_| ErrorKind::Encode("string_map"))?;
        self.put_cql_short(count);
        for (k, val) in v {
            self.put_cql_string(k)?;
            self.put_cql_string(val)?;
        }
        Ok(())
    }

    fn put_cql_bytes_map(&mut self, v: &HashMap<String, Bytes>) -> crate::Result<()> {
        let count: u16 = v.len().try_into().map_err(|_| ErrorKind::Encode("bytes_map"))?;
        self.put_cql_short(count);
        for (k, val) in v {
            self.put_cql_string(k)?;
            self.put_cql_bytes(Some(val))?;
        }
        Ok(())
    }

    fn put_cql_consistency(&mut self, v: Consistency) {
        self.put_cql_short(v.into());
    }
}

impl<B: BufMut + ?Sized> CqlWrite for B {}

pub(crate) fn utf8(bytes: &[u8]) -> crate::Result<&str> {
    std::str::from_utf8(bytes).map_err(Error::from)
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn string_roundtrip_uses_byte_length() {
        let mut buf = BytesMut::new();
        let s = "Hello World برای همه";
        buf.put_cql_string(s).unwrap();
        // first two bytes are the u16 byte length, not the code point count
        let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        assert_eq!(len, s.len());
        assert_ne!(len, s.chars().count());
        let mut read = buf.freeze();
        assert_eq!(read.get_cql_string().unwrap(), s);
    }

    #[test]
    fn bytes_null_roundtrip() {
        let mut buf = BytesMut::new();
        buf.put_cql_bytes(None).unwrap();
        let mut read = buf.freeze();
        assert_eq!(read.get_cql_bytes().unwrap(), None);
    }

    #[test]
    fn bytes_empty_vs_null() {
        let mut buf = BytesMut::new();
        buf.put_cql_bytes(Some(&[])).unwrap();
        let mut read = buf.freeze();
        assert_eq!(read.get_cql_bytes().unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn string_list_roundtrip() {
        let mut buf = BytesMut::new();
        buf.put_cql_string_list(&["TOPOLOGY_CHANGE", "SCHEMA_CHANGE"]).unwrap();
        let mut read = buf.freeze();
        assert_eq!(read.get_cql_string_list().unwrap(), vec!["TOPOLOGY_CHANGE", "SCHEMA_CHANGE"]);
    }

    #[test]
    fn inet_v4_roundtrip() {
        let mut buf = BytesMut::new();
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        buf.put_cql_inet(addr, 9042);
        let mut read = buf.freeze();
        assert_eq!(read.get_cql_inet().unwrap(), (addr, 9042));
    }

    #[test]
    fn truncated_frame_is_reported() {
        let mut buf = Bytes::from_static(&[0, 5, b'a', b'b']);
        assert!(buf.get_cql_string().is_err());
    }
}
