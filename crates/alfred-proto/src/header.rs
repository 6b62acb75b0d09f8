//! The 4-byte frame header shared by every frame type.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Protocol version pinned by this build. Frames carrying any other version
/// byte are rejected at decode time.
pub const ALFRED_VERSION: u8 = 1;

/// Fixed 4-byte header: `type (u8) | version (u8) | length (u16 big-endian)`.
///
/// `length` counts the bytes following the header, not including it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FrameHeader {
    frame_type: u8,
    version: u8,
    length: [u8; 2],
}

impl FrameHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 4;

    /// Builds a header for a given frame type and body length.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `length` exceeds
    /// `u16::MAX`, since the wire field is 16 bits.
    pub fn new(frame_type: u8, length: usize) -> Result<Self> {
        let length_u16 = u16::try_from(length).map_err(|_| ProtocolError::PayloadTooLarge {
            size: length,
            max: usize::from(u16::MAX),
        })?;
        Ok(Self { frame_type, version: ALFRED_VERSION, length: length_u16.to_be_bytes() })
    }

    /// Parses a header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::HeaderTruncated`] if fewer than
    /// [`FrameHeader::SIZE`] bytes are available, or
    /// [`ProtocolError::UnsupportedVersion`] if the version byte does not
    /// match [`ALFRED_VERSION`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(header_bytes) = bytes.get(..Self::SIZE) else {
            return Err(ProtocolError::HeaderTruncated { expected: Self::SIZE, actual: bytes.len() });
        };
        let Ok(header) = Self::read_from_bytes(header_bytes) else {
            return Err(ProtocolError::HeaderTruncated { expected: Self::SIZE, actual: bytes.len() });
        };
        if header.version != ALFRED_VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    /// Serializes the header to its 4-byte wire form.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        self.as_bytes().try_into().unwrap_or([0; Self::SIZE])
    }

    /// The raw `type` byte. Use [`crate::FrameType::from_u8`] to interpret it.
    #[must_use]
    pub const fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// The `version` byte, already validated to equal [`ALFRED_VERSION`] by
    /// [`Self::parse`].
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// The declared body length in bytes.
    #[must_use]
    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }
}
