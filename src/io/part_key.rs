//! Object keys identifying one recorded part of a song
//!
//! Renditions are stored under keys of the form `choir+song+part.ext`. The
//! reference recording of a song conventionally uses the part id `reference`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;

/// Part id used for the reference recording
pub const REFERENCE_PART_ID: &str = "reference";

/// Parsed `choir+song+part.ext` key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartKey {
    /// Choir id
    pub choir_id: String,
    /// Song id
    pub song_id: String,
    /// Part id
    pub part_id: String,
    /// File extension without the dot
    pub extension: String,
}

impl PartKey {
    /// Parse a key
    ///
    /// The choir and song ids end at the first and second `+`; the part id
    /// ends at the first `.` after that and everything behind it is the
    /// extension.
    ///
    /// # Example
    ///
    /// ```
    /// use rendition_sync::io::part_key::PartKey;
    ///
    /// let key = PartKey::parse("c1+s9+alto.nut")?;
    /// assert_eq!(key.part_id, "alto");
    /// assert_eq!(key.reference_key().to_string(), "c1+s9+reference.nut");
    /// # Ok::<(), rendition_sync::AlignmentError>(())
    /// ```
    pub fn parse(key: &str) -> Result<Self, AlignmentError> {
        let unparsable = || AlignmentError::InvalidInput(format!("Could not parse key: {}", key));

        let (choir_id, rest) = key.split_once('+').ok_or_else(unparsable)?;
        let (song_id, rest) = rest.split_once('+').ok_or_else(unparsable)?;
        let (part_id, extension) = rest.split_once('.').ok_or_else(unparsable)?;

        Ok(Self {
            choir_id: choir_id.to_string(),
            song_id: song_id.to_string(),
            part_id: part_id.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Key of the reference recording for the same song
    pub fn reference_key(&self) -> PartKey {
        PartKey {
            part_id: REFERENCE_PART_ID.to_string(),
            ..self.clone()
        }
    }

    /// True if this key names the reference recording
    pub fn is_reference(&self) -> bool {
        self.part_id == REFERENCE_PART_ID
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}+{}+{}.{}",
            self.choir_id, self.song_id, self.part_id, self.extension
        )
    }
}
