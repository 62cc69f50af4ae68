use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::UploadSettings;
use crate::infrastructure::error::{AppError, AppResult};

/// Upper bound on chunk count for a single upload, independent of the byte
/// ceilings. Clients send 1-5 MB chunks, so a 500 MB file stays well under
/// this.
const MAX_TOTAL_CHUNKS: u32 = 4096;

const PART_PREFIX: &str = "part_";

/// On-disk staging and reassembly of chunked uploads.
///
/// Chunks are staged under `staging/{user}/{file}/part_NNNNN` and may arrive
/// in any order. `assemble` verifies the index set is exactly
/// `0..total_chunks`, concatenates in index order into the assembled area,
/// and tears the staging session down. Unfinalized sessions are purged by
/// the cleanup worker after a TTL.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    staging_root: PathBuf,
    assembled_root: PathBuf,
    max_chunk_bytes: u64,
    max_file_bytes: u64,
}

/// A fully reassembled upload, ready for grading.
#[derive(Debug)]
pub struct AssembledUpload {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256_hex: String,
}

impl ChunkStore {
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            staging_root: settings.staging_dir.clone(),
            assembled_root: settings.assembled_dir.clone(),
            max_chunk_bytes: settings.max_chunk_bytes,
            max_file_bytes: settings.max_file_bytes,
        }
    }

    pub async fn ensure_dirs(&self) -> AppResult<()> {
        fs::create_dir_all(&self.staging_root).await?;
        fs::create_dir_all(&self.assembled_root).await?;
        Ok(())
    }

    /// Strip anything that could escape the session directory. Uploaded
    /// names come straight from the browser.
    pub fn sanitize_file_name(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect();
        let cleaned = cleaned.trim().trim_matches('.');
        if cleaned.is_empty() {
            "upload.bin".to_string()
        } else {
            cleaned.to_string()
        }
    }

    fn session_dir(&self, user_id: &Uuid, file_name: &str) -> PathBuf {
        self.staging_root
            .join(user_id.to_string())
            .join(Self::sanitize_file_name(file_name))
    }

    pub async fn put_chunk(
        &self,
        user_id: &Uuid,
        file_name: &str,
        chunk_index: u32,
        total_chunks: u32,
        bytes: &[u8],
    ) -> AppResult<()> {
        if total_chunks == 0 || total_chunks > MAX_TOTAL_CHUNKS {
            return Err(AppError::BadRequest(format!(
                "totalChunks must be between 1 and {}",
                MAX_TOTAL_CHUNKS
            )));
        }
        if chunk_index >= total_chunks {
            return Err(AppError::BadRequest(format!(
                "chunkIndex {} out of range for {} chunks",
                chunk_index, total_chunks
            )));
        }
        if bytes.len() as u64 > self.max_chunk_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Chunk exceeds {} bytes",
                self.max_chunk_bytes
            )));
        }

        let dir = self.session_dir(user_id, file_name);
        fs::create_dir_all(&dir).await?;

        let part = dir.join(format!("{}{:05}", PART_PREFIX, chunk_index));

        // A re-sent chunk replaces its part on disk, so the bytes being
        // replaced must not count against the ceiling.
        let staged = self.staged_bytes(&dir).await?;
        let replaced = match fs::metadata(&part).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if staged.saturating_sub(replaced) + bytes.len() as u64 > self.max_file_bytes {
            // A runaway session would otherwise fill the disk before
            // finalize ever runs.
            fs::remove_dir_all(&dir).await.ok();
            return Err(AppError::PayloadTooLarge(format!(
                "Upload exceeds {} bytes",
                self.max_file_bytes
            )));
        }

        let tmp = dir.join(format!("{}{:05}.tmp", PART_PREFIX, chunk_index));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        fs::rename(&tmp, &part).await?;

        debug!(
            user = %user_id,
            file = file_name,
            index = chunk_index,
            total = total_chunks,
            "chunk staged"
        );
        Ok(())
    }

    async fn staged_bytes(&self, dir: &Path) -> AppResult<u64> {
        let mut total = 0u64;
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            total += entry.metadata().await?.len();
        }
        Ok(total)
    }

    async fn staged_parts(&self, dir: &Path) -> AppResult<BTreeMap<u32, PathBuf>> {
        let mut parts = BTreeMap::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(index) = name
                .strip_prefix(PART_PREFIX)
                .and_then(|s| s.parse::<u32>().ok())
            {
                parts.insert(index, entry.path());
            }
        }
        Ok(parts)
    }

    /// Concatenate the staged chunks into one file, in index order, and
    /// remove the staging session. Fails without side effects when any
    /// index in `0..expected_total` is missing or indices beyond it are
    /// present.
    pub async fn assemble(
        &self,
        user_id: &Uuid,
        file_name: &str,
        expected_total: u32,
    ) -> AppResult<AssembledUpload> {
        if expected_total == 0 || expected_total > MAX_TOTAL_CHUNKS {
            return Err(AppError::BadRequest(format!(
                "totalChunks must be between 1 and {}",
                MAX_TOTAL_CHUNKS
            )));
        }

        let dir = self.session_dir(user_id, file_name);
        if !dir.is_dir() {
            return Err(AppError::UploadIncomplete(
                "No staged chunks for this upload".to_string(),
            ));
        }

        let parts = self.staged_parts(&dir).await?;
        let missing: Vec<u32> = (0..expected_total)
            .filter(|i| !parts.contains_key(i))
            .collect();
        let unexpected: Vec<u32> = parts.keys().copied().filter(|i| *i >= expected_total).collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(AppError::UploadIncomplete(format!(
                "Expected chunks 0..{}, missing {:?}, unexpected {:?}",
                expected_total, missing, unexpected
            )));
        }

        let sanitized = Self::sanitize_file_name(file_name);
        let dest_dir = self.assembled_root.join(user_id.to_string());
        fs::create_dir_all(&dest_dir).await?;
        let dest = dest_dir.join(format!("{}_{}", Uuid::new_v4(), sanitized));

        let mut out = fs::File::create(&dest).await?;
        let mut hasher = Sha256::new();
        let mut size_bytes = 0u64;
        for (_, part_path) in parts.iter() {
            let bytes = fs::read(part_path).await?;
            hasher.update(&bytes);
            size_bytes += bytes.len() as u64;
            out.write_all(&bytes).await?;
        }
        out.flush().await?;

        if size_bytes > self.max_file_bytes {
            fs::remove_file(&dest).await.ok();
            fs::remove_dir_all(&dir).await.ok();
            return Err(AppError::PayloadTooLarge(format!(
                "Upload exceeds {} bytes",
                self.max_file_bytes
            )));
        }

        fs::remove_dir_all(&dir).await?;

        let digest = hasher.finalize();
        let sha256_hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

        Ok(AssembledUpload {
            path: dest,
            size_bytes,
            sha256_hex,
        })
    }

    /// Drop a staging session, if any.
    pub async fn discard(&self, user_id: &Uuid, file_name: &str) {
        let dir = self.session_dir(user_id, file_name);
        if let Err(e) = fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(user = %user_id, file = file_name, "failed to discard staging session: {}", e);
            }
        }
    }

    /// Remove an assembled file, used when grading fails after reassembly.
    pub async fn remove_assembled(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove assembled file {}: {}", path.display(), e);
            }
        }
    }

    /// Purge staging sessions whose last activity is older than `ttl`.
    /// Renaming a part into the session directory bumps its mtime, so the
    /// directory mtime tracks last chunk arrival.
    pub async fn purge_stale(&self, ttl: Duration) -> AppResult<usize> {
        let mut purged = 0usize;
        let mut users = match fs::read_dir(&self.staging_root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(user_entry) = users.next_entry().await? {
            if !user_entry.metadata().await?.is_dir() {
                continue;
            }
            let mut sessions = fs::read_dir(user_entry.path()).await?;
            while let Some(session) = sessions.next_entry().await? {
                let meta = session.metadata().await?;
                if !meta.is_dir() {
                    continue;
                }
                let stale = meta
                    .modified()
                    .ok()
                    .and_then(|m| m.elapsed().ok())
                    .map(|age| age > ttl)
                    .unwrap_or(false);
                if stale {
                    fs::remove_dir_all(session.path()).await?;
                    purged += 1;
                }
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadSettings;
    use tempfile::TempDir;

    fn store(tmp: &TempDir, max_chunk: u64, max_file: u64) -> ChunkStore {
        ChunkStore::new(&UploadSettings {
            staging_dir: tmp.path().join("staging"),
            assembled_dir: tmp.path().join("assembled"),
            max_chunk_bytes: max_chunk,
            max_file_bytes: max_file,
            session_ttl_minutes: 120,
        })
    }

    /// Split a payload the way the frontend does: fixed-size slices, last
    /// one short.
    fn split(payload: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        payload.chunks(chunk_size).map(|c| c.to_vec()).collect()
    }

    #[tokio::test]
    async fn assembles_out_of_order_chunks() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let user = Uuid::new_v4();

        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let chunks = split(&payload, 1000);
        assert_eq!(chunks.len(), 3); // ceil(2500 / 1000)

        // reverse arrival order
        for (i, chunk) in chunks.iter().enumerate().rev() {
            store
                .put_chunk(&user, "resp.webm", i as u32, chunks.len() as u32, chunk)
                .await
                .unwrap();
        }

        let assembled = store.assemble(&user, "resp.webm", 3).await.unwrap();
        assert_eq!(assembled.size_bytes, 2500);
        let bytes = std::fs::read(&assembled.path).unwrap();
        assert_eq!(bytes, payload);

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let expected: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(assembled.sha256_hex, expected);
    }

    #[tokio::test]
    async fn chunk_count_matches_ceil_division() {
        for (len, chunk_size, expected) in [(1usize, 1000usize, 1usize), (1000, 1000, 1), (1001, 1000, 2), (5000, 1000, 5)] {
            let payload = vec![7u8; len];
            assert_eq!(split(&payload, chunk_size).len(), expected);
        }
    }

    #[tokio::test]
    async fn missing_chunk_fails_finalize_and_preserves_session() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let user = Uuid::new_v4();

        store.put_chunk(&user, "a.webm", 0, 3, b"one").await.unwrap();
        store.put_chunk(&user, "a.webm", 2, 3, b"three").await.unwrap();

        let err = store.assemble(&user, "a.webm", 3).await.unwrap_err();
        assert!(matches!(err, AppError::UploadIncomplete(_)));
        assert!(err.to_string().contains("[1]"));

        // Retrying after the hole is filled succeeds.
        store.put_chunk(&user, "a.webm", 1, 3, b"two").await.unwrap();
        let assembled = store.assemble(&user, "a.webm", 3).await.unwrap();
        assert_eq!(std::fs::read(assembled.path).unwrap(), b"onetwothree");
    }

    #[tokio::test]
    async fn finalize_with_fewer_total_than_staged_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let user = Uuid::new_v4();

        store.put_chunk(&user, "a.webm", 0, 3, b"one").await.unwrap();
        store.put_chunk(&user, "a.webm", 1, 3, b"two").await.unwrap();
        store.put_chunk(&user, "a.webm", 2, 3, b"three").await.unwrap();

        let err = store.assemble(&user, "a.webm", 2).await.unwrap_err();
        assert!(matches!(err, AppError::UploadIncomplete(_)));
    }

    #[tokio::test]
    async fn rejects_out_of_range_index_and_oversized_chunk() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 8, 1 << 20);
        let user = Uuid::new_v4();

        let err = store.put_chunk(&user, "a.webm", 3, 3, b"x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = store.put_chunk(&user, "a.webm", 0, 3, b"x").await;
        assert!(err.is_ok());
        let err = store
            .put_chunk(&user, "a.webm", 1, 3, b"nine bytes")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));

        let err = store.put_chunk(&user, "a.webm", 0, 0, b"x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn enforces_total_upload_ceiling() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 16, 32);
        let user = Uuid::new_v4();

        store.put_chunk(&user, "a.webm", 0, 4, &[0u8; 16]).await.unwrap();
        store.put_chunk(&user, "a.webm", 1, 4, &[0u8; 16]).await.unwrap();
        let err = store
            .put_chunk(&user, "a.webm", 2, 4, &[0u8; 16])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn resent_chunk_at_the_ceiling_is_not_double_counted() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 16, 32);
        let user = Uuid::new_v4();

        // Session exactly at the total ceiling.
        store.put_chunk(&user, "a.webm", 0, 2, &[1u8; 16]).await.unwrap();
        store.put_chunk(&user, "a.webm", 1, 2, &[2u8; 16]).await.unwrap();

        // A network retry of chunk 1 replaces the part; the session must
        // survive and still assemble.
        store.put_chunk(&user, "a.webm", 1, 2, &[3u8; 16]).await.unwrap();

        let assembled = store.assemble(&user, "a.webm", 2).await.unwrap();
        assert_eq!(assembled.size_bytes, 32);
        let bytes = std::fs::read(assembled.path).unwrap();
        assert_eq!(&bytes[16..], &[3u8; 16]);
    }

    #[tokio::test]
    async fn repeated_chunk_overwrites_instead_of_duplicating() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let user = Uuid::new_v4();

        store.put_chunk(&user, "a.webm", 0, 1, b"first").await.unwrap();
        store.put_chunk(&user, "a.webm", 0, 1, b"second").await.unwrap();

        let assembled = store.assemble(&user, "a.webm", 1).await.unwrap();
        assert_eq!(std::fs::read(assembled.path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.put_chunk(&alice, "a.webm", 0, 1, b"alice").await.unwrap();
        store.put_chunk(&bob, "a.webm", 0, 1, b"bob").await.unwrap();

        let a = store.assemble(&alice, "a.webm", 1).await.unwrap();
        assert_eq!(std::fs::read(a.path).unwrap(), b"alice");
        let b = store.assemble(&bob, "a.webm", 1).await.unwrap();
        assert_eq!(std::fs::read(b.path).unwrap(), b"bob");
    }

    #[tokio::test]
    async fn purge_removes_only_stale_sessions() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 1024, 1 << 20);
        let user = Uuid::new_v4();

        store.put_chunk(&user, "a.webm", 0, 2, b"one").await.unwrap();

        // Fresh session survives a generous TTL.
        let purged = store.purge_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(purged, 0);
        assert!(store.assemble(&user, "a.webm", 2).await.is_err()); // still staged, still incomplete

        // Zero TTL treats everything as stale.
        let purged = store.purge_stale(Duration::ZERO).await.unwrap();
        assert_eq!(purged, 1);
        let err = store.assemble(&user, "a.webm", 2).await.unwrap_err();
        assert!(matches!(err, AppError::UploadIncomplete(_)));
    }

    #[test]
    fn sanitizes_hostile_file_names() {
        assert_eq!(ChunkStore::sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(ChunkStore::sanitize_file_name("a\\b/c.webm"), "a_b_c.webm");
        assert_eq!(ChunkStore::sanitize_file_name(""), "upload.bin");
        assert_eq!(ChunkStore::sanitize_file_name("..."), "upload.bin");
        assert_eq!(ChunkStore::sanitize_file_name("recording.webm"), "recording.webm");
    }
}
