// SPDX-License-Identifier: GPL-3.0-or-later

//! The fingerprinting/recognition engine.
//!
//! [`Engine`] is the contract the command line drives. [`RefrainEngine`] implements
//! it on top of Chromaprint fingerprints kept in SQLite.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use refrain_config::Configuration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::adapter::RecognitionAdapter;
use crate::decoder;
use crate::fingerprint::ITEM_DURATION_SECS;
use crate::matcher::{best_alignment, Alignment};
use crate::store::{DatabaseSettings, SongStore, StoredSong};
use crate::value::{RawResultValue, Scalar};
use crate::{EngineError, Result};

#[async_trait]
pub trait Engine: Send + Sync {
    /// Fingerprint every file under `directory` whose extension is listed, using at
    /// most `concurrency` workers. Per-file failures are the engine's to report.
    async fn fingerprint_directory(
        &self,
        directory: &Path,
        extensions: &[String],
        concurrency: usize,
    ) -> Result<()>;

    async fn fingerprint_file(&self, path: &Path) -> Result<()>;

    /// Recognize audio from `adapter`. `Ok(None)` means nothing matched.
    async fn recognize(&self, adapter: &dyn RecognitionAdapter) -> Result<Option<RawResultValue>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Minimum fraction of the query that must match.
    pub min_confidence: f32,
    /// Maximum number of candidates reported.
    pub topn: usize,
    /// Bit differences tolerated between aligned sub-fingerprints.
    pub max_bit_errors: u32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.2,
            topn: 2,
            max_bit_errors: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub database: DatabaseSettings,
    pub recognition: RecognitionSettings,
}

impl EngineSettings {
    /// Read the `database` and `recognition` sections; other keys are ignored.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            database: config.section("database")?,
            recognition: config.section("recognition")?,
        })
    }
}

pub struct RefrainEngine {
    store: SongStore,
    recognition: RecognitionSettings,
}

impl RefrainEngine {
    pub async fn new(config: &Configuration) -> Result<Self> {
        Self::with_settings(EngineSettings::from_config(config)?).await
    }

    pub async fn with_settings(settings: EngineSettings) -> Result<Self> {
        let store = SongStore::connect(&settings.database).await?;
        info!(target: "engine", "engine ready");
        Ok(Self {
            store,
            recognition: settings.recognition,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ingest {
    Stored,
    AlreadyStored,
}

fn file_digest(path: &Path) -> Result<String> {
    let io_error = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_error)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(io_error)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn song_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Fingerprint one file into the store unless its contents are already there.
async fn ingest(store: SongStore, path: PathBuf) -> Result<Ingest> {
    let digest_path = path.clone();
    let file_sha = tokio::task::spawn_blocking(move || file_digest(&digest_path)).await??;

    if store.contains(&file_sha).await? {
        debug!(target: "engine", file = %path.display(), "already fingerprinted, skipping");
        return Ok(Ingest::AlreadyStored);
    }

    let decode_path = path.clone();
    let fingerprint = tokio::task::spawn_blocking(move || {
        decoder::decode_file(&decode_path).and_then(decoder::fingerprint_samples)
    })
    .await??;

    if store.insert(&song_name(&path), &file_sha, &fingerprint).await? {
        info!(target: "engine", file = %path.display(), items = fingerprint.raw.len(), "fingerprinted");
        Ok(Ingest::Stored)
    } else {
        Ok(Ingest::AlreadyStored)
    }
}

/// Regular files under `directory` with one of `extensions` (case-insensitive,
/// leading dot optional), in file name order.
fn find_files(directory: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    WalkDir::new(directory)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(target: "engine", error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| wanted.contains(&ext.to_lowercase()))
                .unwrap_or(false)
        })
        .collect()
}

/// A stored song aligned with the query.
#[derive(Debug, Clone)]
struct SongMatch<'a> {
    song: &'a StoredSong,
    alignment: Alignment,
    query_len: usize,
}

impl SongMatch<'_> {
    fn to_value(&self) -> RawResultValue {
        let reference_len = self.song.fingerprint.raw.len();
        RawResultValue::map([
            ("song_id", RawResultValue::Int(self.song.id)),
            ("song_name", RawResultValue::Bytes(self.song.name.clone().into_bytes())),
            ("file_sha", RawResultValue::Bytes(self.song.file_sha.clone().into_bytes())),
            ("input_total_hashes", Scalar::U64(self.query_len as u64).into()),
            ("fingerprinted_hashes_in_db", Scalar::U64(reference_len as u64).into()),
            ("hashes_matched_in_input", Scalar::U64(self.alignment.matched as u64).into()),
            (
                "input_confidence",
                Scalar::F32(self.alignment.input_confidence(self.query_len)).into(),
            ),
            (
                "fingerprinted_confidence",
                Scalar::F32(self.alignment.fingerprinted_confidence(reference_len)).into(),
            ),
            ("offset", RawResultValue::Int(self.alignment.offset as i64)),
            (
                "offset_seconds",
                Scalar::F32(self.alignment.offset as f32 * ITEM_DURATION_SECS).into(),
            ),
        ])
    }
}

/// Align `query` against every song, keep those above the confidence floor, best first.
fn rank_matches<'a>(
    query: &[u32],
    songs: &'a [StoredSong],
    settings: &RecognitionSettings,
) -> Vec<SongMatch<'a>> {
    let mut matches: Vec<SongMatch<'a>> = songs
        .iter()
        .filter_map(|song| {
            best_alignment(query, &song.fingerprint.raw, settings.max_bit_errors).map(
                |alignment| SongMatch {
                    song,
                    alignment,
                    query_len: query.len(),
                },
            )
        })
        .filter(|m| m.alignment.input_confidence(m.query_len) >= settings.min_confidence)
        .collect();

    matches.sort_by(|a, b| {
        b.alignment
            .matched
            .cmp(&a.alignment.matched)
            .then(a.song.id.cmp(&b.song.id))
    });
    matches.truncate(settings.topn.max(1));
    matches
}

#[async_trait]
impl Engine for RefrainEngine {
    #[instrument(target = "engine", skip_all, fields(directory = %directory.display(), concurrency = concurrency))]
    async fn fingerprint_directory(
        &self,
        directory: &Path,
        extensions: &[String],
        concurrency: usize,
    ) -> Result<()> {
        if !directory.is_dir() {
            return Err(EngineError::NotADirectory(directory.to_path_buf()));
        }

        let files = find_files(directory, extensions);
        info!(target: "engine", files = files.len(), concurrency, ?extensions, "fingerprinting directory");

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut workers = JoinSet::new();

        for path in files {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let store = self.store.clone();
            workers.spawn(async move {
                let _permit = permit;
                let outcome = ingest(store, path.clone()).await;
                (path, outcome)
            });
        }

        let (mut stored, mut skipped, mut failed) = (0usize, 0usize, 0usize);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(Ingest::Stored))) => stored += 1,
                Ok((_, Ok(Ingest::AlreadyStored))) => skipped += 1,
                Ok((path, Err(err))) => {
                    warn!(target: "engine", file = %path.display(), error = %err, "failed to fingerprint file");
                    failed += 1;
                }
                Err(err) => {
                    warn!(target: "engine", error = %err, "fingerprint worker aborted");
                    failed += 1;
                }
            }
        }

        info!(target: "engine", stored, skipped, failed, "directory fingerprinting finished");
        Ok(())
    }

    #[instrument(target = "engine", skip_all, fields(file = %path.display()))]
    async fn fingerprint_file(&self, path: &Path) -> Result<()> {
        match ingest(self.store.clone(), path.to_path_buf()).await? {
            Ingest::Stored => {}
            Ingest::AlreadyStored => {
                info!(target: "engine", "file already fingerprinted");
            }
        }
        Ok(())
    }

    async fn recognize(&self, adapter: &dyn RecognitionAdapter) -> Result<Option<RawResultValue>> {
        let started = Instant::now();
        info!(target: "engine", source = %adapter.describe(), "recognizing");

        // Capture and decoding block; hand the worker's other tasks off meanwhile
        let fingerprint = tokio::task::block_in_place(|| {
            adapter.acquire().and_then(decoder::fingerprint_samples)
        })?;
        let fingerprint_time = started.elapsed();

        let query_started = Instant::now();
        let songs = self.store.all().await?;
        let query_time = query_started.elapsed();

        let align_started = Instant::now();
        let matches = rank_matches(&fingerprint.raw, &songs, &self.recognition);
        let align_time = align_started.elapsed();

        if matches.is_empty() {
            info!(target: "engine", candidates = songs.len(), "no match");
            return Ok(None);
        }

        debug!(target: "engine", matches = matches.len(), "recognized");
        Ok(Some(RawResultValue::map([
            ("total_time", Scalar::F64(started.elapsed().as_secs_f64()).into()),
            ("fingerprint_time", Scalar::F64(fingerprint_time.as_secs_f64()).into()),
            ("query_time", Scalar::F64(query_time.as_secs_f64()).into()),
            ("align_time", Scalar::F64(align_time.as_secs_f64()).into()),
            (
                "results",
                RawResultValue::Sequence(matches.iter().map(SongMatch::to_value).collect()),
            ),
        ])))
    }
}
