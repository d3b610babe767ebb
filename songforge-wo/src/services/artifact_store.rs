//! Artifact store
//!
//! Two-stage file lifecycle under the artifact root:
//! - `songs/pending/`: in-flight candidates
//! - `songs/final/`: kept or fail-safe-preserved outputs
//!
//! File names follow `{slug}_{song-identifier}_{timestamp}.{ext}`. The
//! identifier is the remote song identifier, never a positional index;
//! candidates without one get an `unresolved-xxxxxxxx` token instead.
//! A move is the unit of mutation: a file is never visible in both stages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use songforge_common::events::CandidatePosition;
use songforge_common::time::{artifact_timestamp, is_artifact_timestamp};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Candidate;

const PENDING_DIR: &str = "pending";
const FINAL_DIR: &str = "final";
const PARTIAL_SUFFIX: &str = ".partial";

/// Artifact store errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Candidate {0} has no local file")]
    NoLocalFile(CandidatePosition),

    #[error("Not in pending storage: {}", .0.display())]
    NotPending(PathBuf),

    #[error("Final artifact already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parsed artifact file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactName {
    pub slug: String,
    pub song_id: String,
    /// Fixed-width UTC timestamp, e.g. `20261016T143015123`
    pub timestamp: String,
    pub extension: String,
}

impl ArtifactName {
    pub fn new(slug: &str, song_id: Option<&str>, at: DateTime<Utc>, extension: &str) -> Self {
        let song_id = song_id
            .map(sanitize_identifier)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(unresolved_identifier);

        Self {
            slug: slug.to_string(),
            song_id,
            timestamp: artifact_timestamp(at),
            extension: extension.to_string(),
        }
    }

    /// Parse `{slug}_{song-identifier}_{timestamp}.{ext}`
    ///
    /// The slug never contains `_`; the identifier may.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        let (slug, rest) = stem.split_once('_')?;
        let (song_id, timestamp) = rest.rsplit_once('_')?;

        if slug.is_empty()
            || song_id.is_empty()
            || extension.is_empty()
            || !is_artifact_timestamp(timestamp)
        {
            return None;
        }

        Some(Self {
            slug: slug.to_string(),
            song_id: song_id.to_string(),
            timestamp: timestamp.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.slug, self.song_id, self.timestamp, self.extension
        )
    }
}

/// Keep identifiers filename-safe: ASCII alphanumerics, `-` and `_`
fn sanitize_identifier(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn unresolved_identifier() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("unresolved-{}", &token[..8])
}

/// One file in final storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    pub file_name: String,
    /// Path relative to the songs directory, e.g. `final/x_y_z.mp3`
    pub relative_path: String,
    #[serde(flatten)]
    pub name: ArtifactName,
}

/// File lifecycle manager for candidate audio
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    songs_dir: PathBuf,
    pending_dir: PathBuf,
    final_dir: PathBuf,
    default_extension: String,
}

impl ArtifactStore {
    /// Open (creating if needed) the `pending/` and `final/` stages
    pub fn open(songs_dir: impl Into<PathBuf>, default_extension: &str) -> Result<Self, ArtifactError> {
        let songs_dir = songs_dir.into();
        let pending_dir = songs_dir.join(PENDING_DIR);
        let final_dir = songs_dir.join(FINAL_DIR);

        for dir in [&pending_dir, &final_dir] {
            std::fs::create_dir_all(dir).map_err(io_error(dir))?;
        }

        tracing::info!(songs_dir = %songs_dir.display(), "Artifact store opened");

        Ok(Self {
            songs_dir,
            pending_dir,
            final_dir,
            default_extension: default_extension.to_string(),
        })
    }

    pub fn songs_dir(&self) -> &Path {
        &self.songs_dir
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    pub fn final_dir(&self) -> &Path {
        &self.final_dir
    }

    /// Pending location of a downloaded candidate under the naming contract
    pub fn pending_path(&self, slug: &str, candidate: &Candidate, at: DateTime<Utc>) -> PathBuf {
        let extension = candidate
            .local_path
            .as_deref()
            .and_then(Path::extension)
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.default_extension.clone());

        let name = ArtifactName::new(slug, candidate.song_id.as_deref(), at, &extension);
        self.pending_dir.join(name.file_name())
    }

    /// Rename a freshly downloaded file to its pending name
    ///
    /// A name already taken in either stage is never reused: the timestamp
    /// is advanced one millisecond at a time until the name is free.
    pub async fn adopt_download(
        &self,
        slug: &str,
        candidate: &Candidate,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, ArtifactError> {
        let source = candidate
            .local_path
            .as_deref()
            .ok_or(ArtifactError::NoLocalFile(candidate.position))?;

        let mut at = at;
        let mut target = self.pending_path(slug, candidate, at);
        while source != target && self.is_taken(&target).await {
            at += chrono::Duration::milliseconds(1);
            target = self.pending_path(slug, candidate, at);
        }

        if source != target {
            self.move_file(source, &target, &self.pending_dir).await?;
        }
        Ok(target)
    }

    /// A pending name whose file, or final counterpart, already exists
    async fn is_taken(&self, pending: &Path) -> bool {
        if self.exists(pending).await {
            return true;
        }
        match pending.file_name() {
            Some(name) => self.exists(&self.final_dir.join(name)).await,
            None => false,
        }
    }

    /// Move a pending candidate into final storage, keeping its file name
    pub async fn move_to_final(&self, candidate: &Candidate) -> Result<PathBuf, ArtifactError> {
        let source = candidate
            .local_path
            .as_deref()
            .ok_or(ArtifactError::NoLocalFile(candidate.position))?;

        let file_name = match (source.parent(), source.file_name()) {
            (Some(parent), Some(name)) if parent == self.pending_dir => name.to_os_string(),
            _ => return Err(ArtifactError::NotPending(source.to_path_buf())),
        };

        let target = self.final_dir.join(file_name);
        if self.exists(&target).await {
            return Err(ArtifactError::AlreadyExists(target));
        }

        self.move_file(source, &target, &self.final_dir).await?;
        Ok(target)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Final artifacts for a title slug, newest first
    pub async fn list_final(&self, slug: &str) -> Result<Vec<ArtifactEntry>, ArtifactError> {
        let prefix = format!("{}_", slug);
        let mut entries = Vec::new();

        let mut dir = tokio::fs::read_dir(&self.final_dir)
            .await
            .map_err(io_error(&self.final_dir))?;
        while let Some(entry) = dir.next_entry().await.map_err(io_error(&self.final_dir))? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(&prefix) {
                continue;
            }
            let Some(name) = ArtifactName::parse(&file_name) else {
                tracing::debug!(file = %file_name, "Skipping file outside the naming contract");
                continue;
            };
            if name.slug != slug {
                continue;
            }
            entries.push(ArtifactEntry {
                relative_path: format!("{}/{}", FINAL_DIR, file_name),
                file_name,
                name,
            });
        }

        entries.sort_by(|a, b| {
            b.name
                .timestamp
                .cmp(&a.name.timestamp)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(entries)
    }

    /// Path relative to the songs directory, `/`-separated
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.songs_dir).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Rename, or copy through a hidden `.partial` file when the rename
    /// crosses filesystems. The source is removed before the final rename.
    async fn move_file(&self, source: &Path, target: &Path, staging_dir: &Path) -> Result<(), ArtifactError> {
        match tokio::fs::rename(source, target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                let file_name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let partial = staging_dir.join(format!(".{}{}", file_name, PARTIAL_SUFFIX));

                tokio::fs::copy(source, &partial).await.map_err(io_error(&partial))?;
                if let Err(e) = tokio::fs::remove_file(source).await {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(io_error(source)(e));
                }
                tokio::fs::rename(&partial, target).await.map_err(io_error(target))
            }
            Err(err) => Err(io_error(source)(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, secs).unwrap()
    }

    fn downloaded(store: &ArtifactStore, position: CandidatePosition, song_id: Option<&str>) -> Candidate {
        let raw = store.pending_dir().join(format!("download-{}.mp3", position));
        std::fs::write(&raw, b"ID3fake").unwrap();
        let mut candidate = Candidate::generated(position);
        candidate.record_download(raw, song_id.map(str::to_string));
        candidate
    }

    #[test]
    fn test_name_roundtrip_with_underscore_in_identifier() {
        let name = ArtifactName::new("psalm-23", Some("song_abc"), at(5), "mp3");
        assert_eq!(name.file_name(), "psalm-23_song_abc_20261016T120005000.mp3");
        assert_eq!(ArtifactName::parse(&name.file_name()), Some(name));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(ArtifactName::parse("download-1.mp3"), None);
        assert_eq!(ArtifactName::parse("a_b_notatimestamp.mp3"), None);
        assert_eq!(ArtifactName::parse("a_b_20261016T120005000"), None);
        assert_eq!(ArtifactName::parse("_b_20261016T120005000.mp3"), None);
    }

    #[test]
    fn test_missing_identifier_is_not_positional() {
        let name = ArtifactName::new("hymn", None, at(0), "mp3");
        assert!(name.song_id.starts_with("unresolved-"));
        assert_eq!(name.song_id.len(), "unresolved-".len() + 8);
    }

    #[test]
    fn test_identifier_sanitized() {
        let name = ArtifactName::new("hymn", Some("a/b c"), at(0), "mp3");
        assert_eq!(name.song_id, "a-b-c");
    }

    #[tokio::test]
    async fn test_adopt_then_move_to_final() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path().join("songs"), "mp3").unwrap();
        let mut candidate = downloaded(&store, CandidatePosition::First, Some("s-1"));
        let raw = candidate.local_path.clone().unwrap();

        let pending = store.adopt_download("hymn", &candidate, at(1)).await.unwrap();
        assert_eq!(pending, store.pending_dir().join("hymn_s-1_20261016T120001000.mp3"));
        assert!(!store.exists(&raw).await);
        candidate.relocate(pending.clone());

        let final_path = store.move_to_final(&candidate).await.unwrap();
        assert_eq!(final_path, store.final_dir().join("hymn_s-1_20261016T120001000.mp3"));
        assert!(store.exists(&final_path).await);
        assert!(!store.exists(&pending).await);
        assert_eq!(
            store.relative_path(&final_path).as_deref(),
            Some("final/hymn_s-1_20261016T120001000.mp3")
        );
    }

    #[tokio::test]
    async fn test_move_to_final_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "mp3").unwrap();
        let mut candidate = downloaded(&store, CandidatePosition::First, Some("s-1"));
        let pending = store.adopt_download("hymn", &candidate, at(1)).await.unwrap();
        candidate.relocate(pending.clone());

        std::fs::write(store.final_dir().join("hymn_s-1_20261016T120001000.mp3"), b"x").unwrap();

        let err = store.move_to_final(&candidate).await.unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyExists(_)));
        assert!(store.exists(&pending).await);
    }

    #[tokio::test]
    async fn test_adopt_never_overwrites_same_name() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "mp3").unwrap();

        let first = downloaded(&store, CandidatePosition::First, Some("dup"));
        let first_path = store.adopt_download("hymn", &first, at(1)).await.unwrap();

        let second = downloaded(&store, CandidatePosition::Second, Some("dup"));
        std::fs::write(second.local_path.as_ref().unwrap(), b"second").unwrap();
        let second_path = store.adopt_download("hymn", &second, at(1)).await.unwrap();

        assert_eq!(first_path, store.pending_dir().join("hymn_dup_20261016T120001000.mp3"));
        assert_eq!(second_path, store.pending_dir().join("hymn_dup_20261016T120001001.mp3"));
        assert_eq!(std::fs::read(&first_path).unwrap(), b"ID3fake");
        assert_eq!(std::fs::read(&second_path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_adopt_avoids_names_taken_in_final() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "mp3").unwrap();
        std::fs::write(store.final_dir().join("hymn_s-1_20261016T120001000.mp3"), b"old").unwrap();

        let mut candidate = downloaded(&store, CandidatePosition::First, Some("s-1"));
        let pending = store.adopt_download("hymn", &candidate, at(1)).await.unwrap();
        assert_eq!(pending, store.pending_dir().join("hymn_s-1_20261016T120001001.mp3"));
        candidate.relocate(pending);

        let final_path = store.move_to_final(&candidate).await.unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"ID3fake");
        assert_eq!(
            std::fs::read(store.final_dir().join("hymn_s-1_20261016T120001000.mp3")).unwrap(),
            b"old"
        );
    }

    #[tokio::test]
    async fn test_move_to_final_requires_pending_location() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "mp3").unwrap();
        let mut candidate = Candidate::generated(CandidatePosition::Second);
        candidate.record_download(temp.path().join("elsewhere.mp3"), None);

        let err = store.move_to_final(&candidate).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotPending(_)));

        let never_downloaded = Candidate::generated(CandidatePosition::First);
        let err = store.move_to_final(&never_downloaded).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NoLocalFile(CandidatePosition::First)));
    }

    #[tokio::test]
    async fn test_list_final_filters_by_slug_and_sorts_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "mp3").unwrap();
        for name in [
            "hymn_a_20261016T120001000.mp3",
            "hymn_b_20261016T120003000.mp3",
            "hymn_c_20261015T235959999.mp3",
            "hymn-of-praise_d_20261016T130000000.mp3",
            "other_e_20261016T140000000.mp3",
            ".hymn_f_20261016T150000000.mp3.partial",
            "hymn_notes.txt",
        ] {
            std::fs::write(store.final_dir().join(name), b"x").unwrap();
        }

        let listed: Vec<String> = store
            .list_final("hymn")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name.song_id)
            .collect();

        assert_eq!(listed, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_pending_path_uses_default_extension() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::open(temp.path(), "wav").unwrap();
        let mut candidate = Candidate::generated(CandidatePosition::First);
        candidate.record_download(temp.path().join("raw"), Some("id-9".to_string()));

        let path = store.pending_path("hymn", &candidate, at(2));
        assert_eq!(path, store.pending_dir().join("hymn_id-9_20261016T120002000.wav"));
    }
}
