//! Room names.
//!
//! Rooms are never declared up front. A room exists while it has members and
//! is named by whatever the client put in the accept path, so the only thing
//! this module owns is deciding which names are acceptable.

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::RoomNameError;

/// Validated name of a chat room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Longest accepted name, in bytes after percent-decoding.
    pub const MAX_LEN: usize = 128;

    /// Validate a room name.
    ///
    /// # Errors
    ///
    /// - `RoomNameError::Empty` if the name is empty
    /// - `RoomNameError::TooLong` if it exceeds [`RoomName::MAX_LEN`] bytes
    /// - `RoomNameError::InvalidChar` for `/`, `?`, `#` or control characters
    pub fn new(name: impl Into<String>) -> Result<Self, RoomNameError> {
        let name = name.into();

        if name.is_empty() {
            return Err(RoomNameError::Empty);
        }

        if name.len() > Self::MAX_LEN {
            return Err(RoomNameError::TooLong { len: name.len(), max: Self::MAX_LEN });
        }

        if let Some(ch) = name.chars().find(|c| matches!(c, '/' | '?' | '#') || c.is_control()) {
            return Err(RoomNameError::InvalidChar(ch));
        }

        Ok(Self(name))
    }

    /// Decode a percent-encoded URL path segment and validate it.
    ///
    /// # Errors
    ///
    /// - `RoomNameError::InvalidEncoding` if the decoded bytes are not UTF-8
    /// - Any error from [`RoomName::new`]
    pub fn from_path_segment(segment: &str) -> Result<Self, RoomNameError> {
        let decoded =
            percent_decode_str(segment).decode_utf8().map_err(|_| RoomNameError::InvalidEncoding)?;
        Self::new(decoded.into_owned())
    }

    /// Name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
