//! Argument codec
//!
//! Encoders append one typed argument to a [`BytesMut`]. Decoders consume
//! one typed argument from any [`Buf`] cursor (usually `&[u8]`) and fail
//! with [`WireError`] instead of panicking when the input is short.
//!
//! Layout rules:
//! - integers, fixed-point numbers and object ids are 4 bytes in host order
//! - strings are `u32 len` (including the trailing NUL) + bytes + padding
//! - arrays are `u32 len` (raw) + bytes + padding
//! - padding fills the field up to the next multiple of 4 with zeros
//! - file descriptors never appear in the byte stream

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::WireError;
use crate::message::MAX_MESSAGE_SIZE;
use crate::ObjectId;

/// Number of zero bytes needed to align `n` to a 4-byte boundary
#[inline]
pub const fn pad(n: usize) -> usize {
    (4 - n % 4) % 4
}

/// Signed 24.8 fixed-point number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    /// Wrap the raw 32-bit wire value
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit wire value
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert from floating point, saturating at the i32 range
    pub fn from_f64(value: f64) -> Self {
        // `as` saturates out-of-range values and maps NaN to 0
        Self((value * 256.0).round() as i32)
    }

    /// Convert to floating point
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 256.0
    }

    /// Convert from an integer, saturating at the representable range
    pub fn from_int(value: i32) -> Self {
        Self(value.saturating_mul(256))
    }

    /// Integer part, truncated toward zero
    pub fn to_int(self) -> i32 {
        self.0 / 256
    }
}

impl From<f64> for Fixed {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> Self {
        value.to_f64()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// A `new_id` argument whose interface is not fixed by the request
/// signature, so the interface name and version travel on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewId {
    pub interface: String,
    pub version: u32,
    pub id: ObjectId,
}

// === Encoding ===

pub fn put_int(buf: &mut BytesMut, value: i32) {
    buf.put_i32_ne(value);
}

pub fn put_uint(buf: &mut BytesMut, value: u32) {
    buf.put_u32_ne(value);
}

pub fn put_fixed(buf: &mut BytesMut, value: Fixed) {
    buf.put_i32_ne(value.raw());
}

/// Object reference or typed `new_id`; `0` encodes a null object
pub fn put_object(buf: &mut BytesMut, id: ObjectId) {
    buf.put_u32_ne(id);
}

/// Untyped `new_id`: interface, version, then the id itself
pub fn put_new_id(buf: &mut BytesMut, new_id: &NewId) {
    put_string(buf, Some(&new_id.interface));
    put_uint(buf, new_id.version);
    put_object(buf, new_id.id);
}

/// String argument; `None` encodes a null string (length 0, no body)
pub fn put_string(buf: &mut BytesMut, value: Option<&str>) {
    let Some(s) = value else {
        buf.put_u32_ne(0);
        return;
    };

    let len = s.len() + 1;
    buf.reserve(4 + len + pad(len));
    buf.put_u32_ne(len as u32);
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    buf.put_bytes(0, pad(len));
}

pub fn put_array(buf: &mut BytesMut, value: &[u8]) {
    buf.reserve(4 + value.len() + pad(value.len()));
    buf.put_u32_ne(value.len() as u32);
    buf.put_slice(value);
    buf.put_bytes(0, pad(value.len()));
}

// === Decoding ===

#[inline]
fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        return Err(WireError::UnexpectedEof {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_int<B: Buf>(buf: &mut B) -> Result<i32, WireError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32_ne())
}

pub fn get_uint<B: Buf>(buf: &mut B) -> Result<u32, WireError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_ne())
}

pub fn get_fixed<B: Buf>(buf: &mut B) -> Result<Fixed, WireError> {
    get_int(buf).map(Fixed::from_raw)
}

pub fn get_object<B: Buf>(buf: &mut B) -> Result<ObjectId, WireError> {
    get_uint(buf)
}

pub fn get_new_id<B: Buf>(buf: &mut B) -> Result<NewId, WireError> {
    let interface = get_string(buf)?;
    let version = get_uint(buf)?;
    let id = get_object(buf)?;
    Ok(NewId {
        interface,
        version,
        id,
    })
}

/// Decode a string argument. A null string decodes as empty.
pub fn get_string<B: Buf>(buf: &mut B) -> Result<String, WireError> {
    let raw_len = get_uint(buf)?;
    if raw_len == 0 {
        return Ok(String::new());
    }
    if raw_len as usize > MAX_MESSAGE_SIZE {
        return Err(WireError::InvalidStringLen(raw_len));
    }

    let len = raw_len as usize;
    ensure(buf, len + pad(len))?;

    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    buf.advance(pad(len));

    if data[len - 1] != 0 {
        return Err(WireError::StringNotTerminated);
    }
    data.truncate(len - 1);

    String::from_utf8(data).map_err(|_| WireError::InvalidUtf8)
}

pub fn get_array<B: Buf>(buf: &mut B) -> Result<Vec<u8>, WireError> {
    let raw_len = get_uint(buf)?;
    if raw_len as usize > MAX_MESSAGE_SIZE {
        return Err(WireError::InvalidArrayLen(raw_len));
    }

    let len = raw_len as usize;
    ensure(buf, len + pad(len))?;

    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    buf.advance(pad(len));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_invariant() {
        for n in 0..1024usize {
            let p = pad(n);
            assert!(p <= 3, "pad({}) = {}", n, p);
            assert_eq!((n + p) % 4, 0, "n={} pad={}", n, p);
        }
    }

    #[test]
    fn test_string_hi_layout() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, Some("hi"));

        let mut expected = Vec::new();
        expected.extend_from_slice(&3u32.to_ne_bytes());
        expected.extend_from_slice(b"hi\0");
        expected.push(0);
        assert_eq!(&buf[..], &expected[..]);
        assert_eq!(buf.len(), 8);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_string(&mut cursor).unwrap(), "hi");
        assert_eq!(buf.len() - cursor.remaining(), 8);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_string_exact_multiple_of_four_has_no_padding() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, Some("abc"));
        assert_eq!(buf.len(), 8);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_string(&mut cursor).unwrap(), "abc");
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_null_string() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, None);
        assert_eq!(&buf[..], &0u32.to_ne_bytes());

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_string(&mut cursor).unwrap(), "");
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_string_leaves_following_args() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, Some("wl_compositor"));
        put_uint(&mut buf, 6);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_string(&mut cursor).unwrap(), "wl_compositor");
        assert_eq!(get_uint(&mut cursor).unwrap(), 6);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_string_not_terminated() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(3);
        buf.put_slice(b"hiX\0");

        let mut cursor: &[u8] = &buf;
        assert!(matches!(
            get_string(&mut cursor),
            Err(WireError::StringNotTerminated)
        ));
    }

    #[test]
    fn test_string_length_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(70_000);

        let mut cursor: &[u8] = &buf;
        assert!(matches!(
            get_string(&mut cursor),
            Err(WireError::InvalidStringLen(70_000))
        ));
    }

    #[test]
    fn test_string_truncated() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(10);
        buf.put_slice(b"short");

        let mut cursor: &[u8] = &buf;
        assert!(matches!(
            get_string(&mut cursor),
            Err(WireError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(3);
        buf.put_slice(&[0xff, 0xfe, 0, 0]);

        let mut cursor: &[u8] = &buf;
        assert!(matches!(get_string(&mut cursor), Err(WireError::InvalidUtf8)));
    }

    #[test]
    fn test_array_layout() {
        let mut buf = BytesMut::new();
        put_array(&mut buf, &[1, 2, 3, 4, 5]);
        assert_eq!(buf.len(), 4 + 5 + 3);
        assert_eq!(&buf[..4], &5u32.to_ne_bytes());
        assert_eq!(&buf[9..], &[0, 0, 0]);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_array(&mut cursor).unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_empty_array() {
        let mut buf = BytesMut::new();
        put_array(&mut buf, &[]);
        assert_eq!(buf.len(), 4);

        let mut cursor: &[u8] = &buf;
        assert!(get_array(&mut cursor).unwrap().is_empty());
    }

    #[test]
    fn test_array_length_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(u32::MAX);

        let mut cursor: &[u8] = &buf;
        assert!(matches!(
            get_array(&mut cursor),
            Err(WireError::InvalidArrayLen(u32::MAX))
        ));
    }

    #[test]
    fn test_int_needs_four_bytes() {
        let mut cursor: &[u8] = &[1, 2, 3];
        assert!(matches!(
            get_int(&mut cursor),
            Err(WireError::UnexpectedEof {
                needed: 4,
                remaining: 3
            })
        ));
    }

    #[test]
    fn test_signed_and_unsigned_ints() {
        let mut buf = BytesMut::new();
        put_int(&mut buf, -42);
        put_uint(&mut buf, u32::MAX);
        put_object(&mut buf, 7);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_int(&mut cursor).unwrap(), -42);
        assert_eq!(get_uint(&mut cursor).unwrap(), u32::MAX);
        assert_eq!(get_object(&mut cursor).unwrap(), 7);
    }

    #[test]
    fn test_new_id_layout() {
        let new_id = NewId {
            interface: "wl_seat".to_string(),
            version: 7,
            id: 12,
        };
        let mut buf = BytesMut::new();
        put_new_id(&mut buf, &new_id);
        // string field (4 + 8) + version + id
        assert_eq!(buf.len(), 12 + 4 + 4);

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_new_id(&mut cursor).unwrap(), new_id);
    }

    #[test]
    fn test_fixed_conversions() {
        assert_eq!(Fixed::from_f64(0.0).raw(), 0);
        assert_eq!(Fixed::from_f64(1.0).raw(), 256);
        assert_eq!(Fixed::from_f64(-2.5).raw(), -640);
        assert_eq!(Fixed::from_raw(384).to_f64(), 1.5);
        assert_eq!(Fixed::from_int(3).raw(), 768);
        assert_eq!(Fixed::from_raw(-640).to_int(), -2);
    }

    #[test]
    fn test_fixed_precision() {
        let samples = [0.001, 0.5, 3.14159, -7.77, 1234.5678, -65535.99];
        for f in samples {
            let back = Fixed::from_f64(f).to_f64();
            assert!((back - f).abs() <= 1.0 / 256.0, "{} -> {}", f, back);
        }
    }

    #[test]
    fn test_fixed_saturates() {
        assert_eq!(Fixed::from_f64(1e12).raw(), i32::MAX);
        assert_eq!(Fixed::from_f64(-1e12).raw(), i32::MIN);
        assert_eq!(Fixed::from_f64(f64::NAN).raw(), 0);
        assert_eq!(Fixed::from_int(i32::MAX).raw(), i32::MAX);
    }

    #[test]
    fn test_fixed_wire() {
        let mut buf = BytesMut::new();
        put_fixed(&mut buf, Fixed::from_f64(10.25));

        let mut cursor: &[u8] = &buf;
        assert_eq!(get_fixed(&mut cursor).unwrap().to_f64(), 10.25);
    }
}
