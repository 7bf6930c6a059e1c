//! The snapshot container: a fixed header followed by tagged byte fields.
//!
//! Layout (all little-endian):
//!
//! ```text
//! [0..4)   device id (magic)
//! [4..6)   device version, major
//! [6..8)   device version, minor
//! then per field:
//!   u16 tag | u32 length | bytes
//! ```
//!
//! Fields are emitted sorted by tag, so equal state always encodes to equal
//! bytes.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("unexpected end of snapshot input")]
    UnexpectedEof,
    #[error("device id mismatch: expected {expected:?}, found {found:?}")]
    BadDeviceId { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported device version {0}")]
    UnsupportedVersion(SnapshotVersion),
    #[error("duplicate field tag {0}")]
    DuplicateField(u16),
    #[error("invalid field encoding: {0}")]
    InvalidFieldEncoding(&'static str),
}

/// Major/minor version of a device's snapshot schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parsed snapshot header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub device_id: [u8; 4],
    pub device_version: SnapshotVersion,
}

/// A device that can serialize its state into a snapshot blob.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError>;
}

/// Builder for a snapshot blob.
pub struct SnapshotWriter {
    header: SnapshotHeader,
    fields: BTreeMap<u16, Vec<u8>>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], device_version: SnapshotVersion) -> Self {
        Self {
            header: SnapshotHeader {
                device_id,
                device_version,
            },
            fields: BTreeMap::new(),
        }
    }

    /// Add a field. Re-adding a tag replaces the previous bytes.
    pub fn field_bytes(&mut self, tag: u16, bytes: Vec<u8>) {
        self.fields.insert(tag, bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.header.device_id);
        out.extend_from_slice(&self.header.device_version.major.to_le_bytes());
        out.extend_from_slice(&self.header.device_version.minor.to_le_bytes());
        for (tag, bytes) in &self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        out
    }
}

/// Parsed view of a snapshot blob.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    header: SnapshotHeader,
    fields: BTreeMap<u16, &'a [u8]>,
}

impl<'a> SnapshotReader<'a> {
    /// Parse a blob, checking the device id. The version is surfaced via
    /// [`SnapshotReader::header`]; callers reject majors they do not know.
    pub fn parse(bytes: &'a [u8], device_id: [u8; 4]) -> Result<Self, SnapshotError> {
        if bytes.len() < 8 {
            return Err(SnapshotError::UnexpectedEof);
        }
        let found: [u8; 4] = bytes[0..4].try_into().unwrap();
        if found != device_id {
            return Err(SnapshotError::BadDeviceId {
                expected: device_id,
                found,
            });
        }
        let major = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let minor = u16::from_le_bytes(bytes[6..8].try_into().unwrap());

        let mut fields = BTreeMap::new();
        let mut pos = 8usize;
        while pos < bytes.len() {
            if bytes.len() - pos < 6 {
                return Err(SnapshotError::UnexpectedEof);
            }
            let tag = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap());
            let len = u32::from_le_bytes(bytes[pos + 2..pos + 6].try_into().unwrap()) as usize;
            pos += 6;
            if bytes.len() - pos < len {
                return Err(SnapshotError::UnexpectedEof);
            }
            if fields.insert(tag, &bytes[pos..pos + len]).is_some() {
                return Err(SnapshotError::DuplicateField(tag));
            }
            pos += len;
        }

        Ok(Self {
            header: SnapshotHeader {
                device_id,
                device_version: SnapshotVersion::new(major, minor),
            },
            fields,
        })
    }

    pub fn header(&self) -> SnapshotHeader {
        self.header
    }

    /// Bytes of a field, or `None` if the snapshot does not carry the tag.
    pub fn bytes(&self, tag: u16) -> Option<&'a [u8]> {
        self.fields.get(&tag).copied()
    }
}
