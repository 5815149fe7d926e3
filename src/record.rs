//! Geo-records and their byte encoding.

use std::fmt;
use std::io::Write;

use serde::Serialize;
use thiserror::Error;

// Implementation details:
//
// A record is encoded as a version byte followed by one field per struct member. Every field is
// a tag byte, a big-endian u32 payload length, then the payload:
//
//   | version | 0x01 | 8 | zip (u64 BE) | 0x02 | len | latitude | 0x03 | len | longitude |
//
// Strings are UTF-8. Decoding checks every tag and length so that bytes from some other encoder
// are rejected instead of misread.
const VERSION: u8 = 1;
const ZIP_TAG: u8 = 0x01;
const LATITUDE_TAG: u8 = 0x02;
const LONGITUDE_TAG: u8 = 0x03;

const FIELD_HEADER_LEN: usize = 5;
const ZIP_LEN: usize = std::mem::size_of::<u64>();

/// The geographical position of a ZIP code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GeoRecord {
    pub zip_code: u64,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Field {field} is {len} bytes, longer than the encoding allows")]
    FieldTooLong { field: &'static str, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Record truncated: needed {needed} more bytes but only {remaining} remain")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unsupported record version {0}")]
    Version(u8),

    #[error("Expected field tag {expected:#04x}, found {found:#04x}")]
    Tag { expected: u8, found: u8 },

    #[error("Field {field} must be {expected} bytes, found {found}")]
    FieldLen {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Field {field} is not valid utf8")]
    Utf8 {
        field: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("{0} unexpected bytes after record")]
    TrailingBytes(usize),

    #[error("Key must be 8 bytes, found {0}")]
    Key(usize),

    #[error("Record for zip {record} is stored under the key for zip {key}")]
    KeyMismatch { key: u64, record: u64 },
}

/// Builds the store key for a ZIP code. Keys are fixed-width and big-endian, so they never collide
/// and sort in numeric order.
pub fn zip_key(zip_code: u64) -> [u8; ZIP_LEN] {
    zip_code.to_be_bytes()
}

/// Recovers the ZIP code from a key built by [`zip_key`].
pub fn zip_from_key(key: &[u8]) -> Result<u64, DecodeError> {
    let key: [u8; ZIP_LEN] = key.try_into().map_err(|_| DecodeError::Key(key.len()))?;
    Ok(u64::from_be_bytes(key))
}

impl GeoRecord {
    pub fn new(zip_code: u64, latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            zip_code,
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }

    /// Placeholder coordinates derived from the ZIP code itself.
    pub fn mock(zip_code: u64) -> Self {
        let latitude = zip_code.wrapping_mul(1024);
        let longitude = zip_code.wrapping_mul(2048);
        Self::new(zip_code, latitude.to_string(), longitude.to_string())
    }

    /// The key this record is stored under.
    pub fn key(&self) -> [u8; ZIP_LEN] {
        zip_key(self.zip_code)
    }

    /// Number of bytes [`GeoRecord::encode`] produces.
    pub fn encoded_len(&self) -> usize {
        1 + 3 * FIELD_HEADER_LEN + ZIP_LEN + self.latitude.len() + self.longitude.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Writes the encoded record into the passed writer, returning the bytes written.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<usize, EncodeError> {
        w.write_all(&[VERSION])?;
        let mut written = 1;
        written += write_field(w, "zip_code", ZIP_TAG, &self.zip_code.to_be_bytes())?;
        written += write_field(w, "latitude", LATITUDE_TAG, self.latitude.as_bytes())?;
        written += write_field(w, "longitude", LONGITUDE_TAG, self.longitude.as_bytes())?;
        Ok(written)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut fields = Fields { rest: bytes };

        let version = fields.take(1)?[0];
        if version != VERSION {
            return Err(DecodeError::Version(version));
        }

        let zip = fields.field(ZIP_TAG)?;
        let zip: [u8; ZIP_LEN] = zip.try_into().map_err(|_| DecodeError::FieldLen {
            field: "zip_code",
            expected: ZIP_LEN,
            found: zip.len(),
        })?;
        let latitude = fields.str_field(LATITUDE_TAG, "latitude")?;
        let longitude = fields.str_field(LONGITUDE_TAG, "longitude")?;

        if !fields.rest.is_empty() {
            return Err(DecodeError::TrailingBytes(fields.rest.len()));
        }

        Ok(Self::new(u64::from_be_bytes(zip), latitude, longitude))
    }
}

impl fmt::Display for GeoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zip={} lat={} lon={}",
            self.zip_code, self.latitude, self.longitude
        )
    }
}

fn write_field<W: Write>(
    w: &mut W,
    field: &'static str,
    tag: u8,
    payload: &[u8],
) -> Result<usize, EncodeError> {
    let len = u32::try_from(payload.len()).map_err(|_| EncodeError::FieldTooLong {
        field,
        len: payload.len(),
    })?;
    let len = len.to_be_bytes();
    let header = [tag, len[0], len[1], len[2], len[3]];

    w.write_all(&header)?;
    w.write_all(payload)?;

    Ok(header.len() + payload.len())
}

/// Cursor over the unread part of an encoded record.
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.rest.len() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.rest.len(),
            });
        }
        let (head, rest) = self.rest.split_at(n);
        self.rest = rest;
        Ok(head)
    }

    fn field(&mut self, expected: u8) -> Result<&'a [u8], DecodeError> {
        let header = self.take(FIELD_HEADER_LEN)?;
        if header[0] != expected {
            return Err(DecodeError::Tag {
                expected,
                found: header[0],
            });
        }
        let len = u32::from_be_bytes(header[1..].try_into().expect("sliced 1..5"));
        self.take(len as usize)
    }

    fn str_field(&mut self, tag: u8, field: &'static str) -> Result<&'a str, DecodeError> {
        let payload = self.field(tag)?;
        std::str::from_utf8(payload).map_err(|source| DecodeError::Utf8 { field, source })
    }
}
