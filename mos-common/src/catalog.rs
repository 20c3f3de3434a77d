//! Audio catalog discovery
//!
//! Lists the audio folder (non-recursively), keeps supported formats, and
//! sorts by name so every session sees the same order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Extensions accepted in the catalog (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["wav", "mp3", "ogg"];

/// List supported audio files in `directory`, sorted ascending by name
///
/// # Errors
/// * [`Error::CatalogUnavailable`] if the directory cannot be read
/// * [`Error::EmptyCatalog`] if no supported file is present
pub fn list_audio_files(directory: &Path) -> Result<Vec<String>> {
    // Surface an unreadable root as an error instead of an empty walk.
    std::fs::read_dir(directory).map_err(|source| Error::CatalogUnavailable {
        path: directory.to_path_buf(),
        source,
    })?;

    let walker = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable catalog entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping non UTF-8 file name: {:?}", entry.file_name());
            continue;
        };

        if is_supported(name) {
            files.push(name.to_string());
        }
    }

    if files.is_empty() {
        return Err(Error::EmptyCatalog(directory.to_path_buf()));
    }

    files.sort();
    debug!("Catalog {}: {} files", directory.display(), files.len());
    Ok(files)
}

/// True if the file name carries a supported audio extension
pub fn is_supported(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// MIME type served to the audio player
pub fn content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Create the audio folder if it does not exist yet
pub fn ensure_audio_folder(directory: &Path) -> Result<()> {
    if !directory.exists() {
        std::fs::create_dir_all(directory)?;
        tracing::info!("Created audio folder: {}", directory.display());
    }
    Ok(())
}

/// Snapshot of the audio folder taken at session start
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    files: Arc<[String]>,
}

impl Catalog {
    /// List `root` and capture the result
    pub fn load(root: &Path) -> Result<Self> {
        let files = list_audio_files(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            files: files.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.files.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.binary_search_by(|f| f.as_str().cmp(name)).is_ok()
    }

    /// Path of a catalog file; `None` for names outside the listing
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.contains(name).then(|| self.root.join(name))
    }

    /// Read the bytes of a catalog file for the audio player
    pub async fn read_audio(&self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .path_of(name)
            .ok_or_else(|| Error::InvalidInput(format!("Not in catalog: {}", name)))?;
        Ok(tokio::fs::read(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"RIFF").unwrap();
    }

    #[test]
    fn test_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.wav", "a.MP3", "c.ogg", "notes.txt", "d.flac", "noext"] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("folder.wav")).unwrap();

        let files = list_audio_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.MP3", "b.wav", "c.ogg"]);
    }

    #[test]
    fn test_listing_is_deterministic() {
        let dir = TempDir::new().unwrap();
        for name in ["z.wav", "m.ogg", "a.wav", "k.mp3"] {
            touch(dir.path(), name);
        }

        let first = list_audio_files(dir.path()).unwrap();
        let second = list_audio_files(dir.path()).unwrap();
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }

    #[test]
    fn test_does_not_recurse() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.wav");
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        touch(&nested, "deep.wav");

        assert_eq!(list_audio_files(dir.path()).unwrap(), vec!["top.wav"]);
    }

    #[test]
    fn test_empty_catalog() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "readme.md");

        let err = list_audio_files(dir.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyCatalog(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = list_audio_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("x.WAV"), "audio/wav");
        assert_eq!(content_type("x.mp3"), "audio/mpeg");
        assert_eq!(content_type("x.ogg"), "audio/ogg");
    }

    #[tokio::test]
    async fn test_catalog_guards_paths() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.wav");
        std::fs::write(dir.path().join("secret.txt"), b"nope").unwrap();

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0), Some("a.wav"));
        assert!(catalog.path_of("../secret.txt").is_none());
        assert!(catalog.read_audio("secret.txt").await.is_err());
        assert_eq!(catalog.read_audio("a.wav").await.unwrap(), b"RIFF");
    }

    #[test]
    fn test_ensure_audio_folder_creates() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("audio_files");
        ensure_audio_folder(&target).unwrap();
        assert!(target.is_dir());
        assert!(matches!(
            list_audio_files(&target),
            Err(Error::EmptyCatalog(_))
        ));
    }
}
