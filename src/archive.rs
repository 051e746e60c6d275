/// Tier pack archives
///
/// An exported pack is a zip holding `tier-data.json` plus one file per
/// entry under `images/`. The manifest points at those files instead of
/// embedding the image data, so the pack does not depend on the store it
/// came from. `read_archive` turns a pack back into catalog entries.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::state::catalog::{games_array, sanitize_games, IdGenerator};
use crate::state::data::{mime_for_extension, CatalogEntry, EntryId, ImagePayload, Rank};

/// Manifest file name at the archive root
pub const MANIFEST_NAME: &str = "tier-data.json";
/// Directory holding the per-entry image files
pub const IMAGES_DIR: &str = "images/";
/// Suggested file name for saved packs
pub const DEFAULT_ARCHIVE_NAME: &str = "tier-pack.zip";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No games to export")]
    Empty,
    #[error("Export library not loaded")]
    ArchiverUnavailable,
    #[error("Entry {id} has no usable image: {reason}")]
    Image { id: EntryId, reason: String },
    #[error("Invalid tier-data.json: {0}")]
    Manifest(String),
    #[error("Pack is missing {0}")]
    MissingFile(String),
    #[cfg(feature = "archive")]
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMeta {
    pub generated_at: String,
    pub total: usize,
    pub tiers: Vec<Rank>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub id: EntryId,
    pub title: String,
    #[serde(rename = "tier")]
    pub rank: Rank,
    /// Path of the image inside the archive
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Manifest {
    pub meta: ManifestMeta,
    pub games: Vec<ManifestEntry>,
}

/// A file to place in the archive
#[derive(Debug, Clone)]
struct PackFile {
    path: String,
    bytes: Vec<u8>,
}

pub fn archiver_available() -> bool {
    cfg!(feature = "archive")
}

/// Build the manifest and decode every image. Fails before anything is written.
fn prepare(entries: &[CatalogEntry], generated_at: DateTime<Utc>) -> Result<(Manifest, Vec<PackFile>), ExportError> {
    let mut games = Vec::with_capacity(entries.len());
    let mut files = Vec::with_capacity(entries.len());

    for entry in entries {
        let payload = entry.image.as_ref().ok_or_else(|| ExportError::Image {
            id: entry.id,
            reason: "no image".to_string(),
        })?;
        let decoded = payload.decode().map_err(|e| ExportError::Image {
            id: entry.id,
            reason: e.to_string(),
        })?;

        let path = format!("{}{}.{}", IMAGES_DIR, entry.id, payload.extension());
        games.push(ManifestEntry {
            id: entry.id,
            title: entry.title.clone(),
            rank: entry.rank,
            image: path.clone(),
            description: entry.description.clone(),
        });
        files.push(PackFile {
            path,
            bytes: decoded.bytes,
        });
    }

    let manifest = Manifest {
        meta: ManifestMeta {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            total: entries.len(),
            tiers: Rank::ALL.to_vec(),
        },
        games,
    };
    Ok((manifest, files))
}

/// Serialize the catalog and its images into a zip archive held in memory
pub fn export(entries: &[CatalogEntry], generated_at: DateTime<Utc>) -> Result<Vec<u8>, ExportError> {
    if !archiver_available() {
        return Err(ExportError::ArchiverUnavailable);
    }
    if entries.is_empty() {
        return Err(ExportError::Empty);
    }

    let (manifest, files) = prepare(entries, generated_at)?;
    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| ExportError::Manifest(e.to_string()))?;

    let bytes = zip_support::write(&manifest_json, &files)?;
    tracing::info!("📦 Exported {} entries ({} KB)", entries.len(), bytes.len() / 1024);
    Ok(bytes)
}

/// Write a finished archive to disk
pub fn save_archive(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes)?;
    tracing::info!("💾 Saved tier pack to {}", path.display());
    Ok(())
}

/// Read an exported pack back into catalog entries, re-embedding each image
pub fn read_archive(bytes: &[u8]) -> Result<Vec<CatalogEntry>, ExportError> {
    if !archiver_available() {
        return Err(ExportError::ArchiverUnavailable);
    }

    let mut pack = zip_support::Reader::open(bytes)?;
    let manifest = pack.read(MANIFEST_NAME)?;
    let document: Value = serde_json::from_slice(&manifest).map_err(|e| ExportError::Manifest(e.to_string()))?;
    let games = games_array(&document).ok_or_else(|| ExportError::Manifest("no games array".to_string()))?;

    let mut entries = sanitize_games(games, &mut IdGenerator::new());
    for entry in &mut entries {
        let Some(reference) = entry.image.take() else {
            continue;
        };
        entry.image = Some(resolve_image(&mut pack, reference)?);
    }
    Ok(entries)
}

/// Paths inside the pack become data URLs again; anything else is kept as-is
fn resolve_image(pack: &mut zip_support::Reader<'_>, reference: ImagePayload) -> Result<ImagePayload, ExportError> {
    let path = reference.as_str();
    if path.starts_with("data:") {
        return Ok(reference);
    }

    let bytes = pack.read(path)?;
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    Ok(ImagePayload::from_bytes(mime_for_extension(extension), &bytes))
}

#[cfg(feature = "archive")]
mod zip_support {
    use std::io::{Cursor, Read, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipArchive, ZipWriter};

    use super::{ExportError, PackFile, IMAGES_DIR, MANIFEST_NAME};

    pub(super) fn write(manifest_json: &str, files: &[PackFile]) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.add_directory(IMAGES_DIR, SimpleFileOptions::default())?;
        for file in files {
            // images are already compressed
            let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file(file.path.as_str(), stored)?;
            zip.write_all(&file.bytes)?;
        }

        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(MANIFEST_NAME, deflated)?;
        zip.write_all(manifest_json.as_bytes())?;

        Ok(zip.finish()?.into_inner())
    }

    pub(super) struct Reader<'a> {
        archive: ZipArchive<Cursor<&'a [u8]>>,
    }

    impl<'a> Reader<'a> {
        pub(super) fn open(bytes: &'a [u8]) -> Result<Self, ExportError> {
            Ok(Self {
                archive: ZipArchive::new(Cursor::new(bytes))?,
            })
        }

        pub(super) fn read(&mut self, name: &str) -> Result<Vec<u8>, ExportError> {
            let mut file = match self.archive.by_name(name) {
                Ok(file) => file,
                Err(zip::result::ZipError::FileNotFound) => return Err(ExportError::MissingFile(name.to_string())),
                Err(e) => return Err(e.into()),
            };
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

#[cfg(not(feature = "archive"))]
mod zip_support {
    use std::marker::PhantomData;

    use super::{ExportError, PackFile};

    pub(super) fn write(_manifest_json: &str, _files: &[PackFile]) -> Result<Vec<u8>, ExportError> {
        Err(ExportError::ArchiverUnavailable)
    }

    pub(super) struct Reader<'a> {
        _bytes: PhantomData<&'a [u8]>,
    }

    impl<'a> Reader<'a> {
        pub(super) fn open(_bytes: &'a [u8]) -> Result<Self, ExportError> {
            Err(ExportError::ArchiverUnavailable)
        }

        pub(super) fn read(&mut self, _name: &str) -> Result<Vec<u8>, ExportError> {
            Err(ExportError::ArchiverUnavailable)
        }
    }
}
