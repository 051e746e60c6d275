/// Shared data structures for the catalog
///
/// These structs represent the data model that flows between
/// the store, the snapshot/import documents and the UI layer.
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the six fixed tiers, highest first.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Rank {
    /// All ranks in display order (S first)
    pub const ALL: [Rank; 6] = [Rank::S, Rank::A, Rank::B, Rank::C, Rank::D, Rank::F];

    /// Default rank for new and coerced entries
    pub const TOP: Rank = Rank::S;

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::F => "F",
        }
    }

    /// Position in `Rank::ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown tier '{0}'")]
pub struct UnknownRank(pub String);

impl FromStr for Rank {
    type Err = UnknownRank;

    /// Exact, case-sensitive match against the six tier names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::ALL
            .iter()
            .copied()
            .find(|rank| rank.as_str() == s)
            .ok_or_else(|| UnknownRank(s.to_string()))
    }
}

/// Entry identifier: a millisecond timestamp taken at creation time
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A self-contained image, stored as a `data:<mime>;base64,<payload>` URL
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct ImagePayload(String);

/// Raw bytes recovered from an `ImagePayload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Not of the form `data:<mime>;base64,<payload>`
    #[error("image is not a base64 data URL")]
    Malformed,
    #[error("invalid base64 image data: {0}")]
    Base64(String),
}

impl ImagePayload {
    /// Encode raw image bytes of the given MIME type into a data URL
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }

    /// Wrap an existing string without checking it. Imported documents are
    /// trusted, so their image strings are passed through untouched.
    pub fn from_raw(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type from the data URL header, if it has one
    pub fn mime(&self) -> Option<&str> {
        let header = self.0.strip_prefix("data:")?.split(',').next()?;
        let mime = header.split(';').next()?;
        if mime.is_empty() {
            None
        } else {
            Some(mime)
        }
    }

    /// Split the data URL and decode its payload
    pub fn decode(&self) -> Result<DecodedImage, PayloadError> {
        let rest = self.0.strip_prefix("data:").ok_or(PayloadError::Malformed)?;
        let (header, payload) = rest.split_once(',').ok_or(PayloadError::Malformed)?;
        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default().to_string();
        if !parts.any(|p| p == "base64") {
            return Err(PayloadError::Malformed);
        }

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| PayloadError::Base64(e.to_string()))?;

        Ok(DecodedImage { mime, bytes })
    }

    /// File extension to use when the payload is written out as a file
    pub fn extension(&self) -> &'static str {
        extension_for_mime(self.mime().unwrap_or_default())
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "bin",
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Represents a single game in the catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub title: String,
    /// Stored under `tier` to stay compatible with existing tier-data documents
    #[serde(rename = "tier")]
    pub rank: Rank,
    /// Always present for entries created in the editor; imports may omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
