//! SQLite-backed [`VectorStore`].
//!
//! WAL journal mode so concurrent readers see a stable snapshot while an
//! ingestion transaction replaces an artifact. Vectors are stored as
//! little-endian f32 BLOBs; similarity is computed in Rust over all
//! candidate rows (brute force, fine at knowledge-base scale).

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::models::{Chunk, MediaKind};

use super::{
    blob_to_vec, cosine_similarity, rank_candidates, vec_to_blob, IndexMeta, VectorCandidate,
    VectorFilter, VectorStore,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and migrate the database at `path`.
    /// Idempotent; safe to call on every process start.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                dims INTEGER NOT NULL,
                model TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                kind TEXT NOT NULL,
                ingested_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                text TEXT NOT NULL,
                start_off INTEGER NOT NULL,
                end_off INTEGER NOT NULL,
                hash TEXT NOT NULL,
                UNIQUE(artifact_id, seq),
                FOREIGN KEY (artifact_id) REFERENCES artifacts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_artifact_id ON chunks(artifact_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_artifact_id ON chunk_vectors(artifact_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn meta(&self) -> Result<Option<IndexMeta>> {
        let row = sqlx::query("SELECT dims, model FROM index_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| IndexMeta {
            dims: r.get::<i64, _>("dims") as usize,
            model: r.get("model"),
        }))
    }

    async fn replace_artifact(
        &self,
        artifact_id: &str,
        filename: &str,
        kind: MediaKind,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        meta: &IndexMeta,
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch for artifact {}: {} vs {}",
                artifact_id,
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;

        // Record index metadata on first write; later writes must match
        // (the indexer checks before calling, this is the last line of defense).
        let existing: Option<(i64, String)> =
            sqlx::query_as("SELECT dims, model FROM index_meta WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            None => {
                sqlx::query("INSERT INTO index_meta (id, dims, model) VALUES (1, ?, ?)")
                    .bind(meta.dims as i64)
                    .bind(&meta.model)
                    .execute(&mut *tx)
                    .await?;
            }
            Some((dims, _)) if dims as usize != meta.dims => {
                bail!(
                    "index dimensionality is {} but write carries {}",
                    dims,
                    meta.dims
                );
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM chunk_vectors WHERE artifact_id = ?")
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE artifact_id = ?")
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, filename, kind, ingested_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                kind = excluded.kind,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(artifact_id)
        .bind(filename)
        .bind(kind.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, artifact_id, seq, text, start_off, end_off, hash) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.artifact_id)
            .bind(chunk.seq)
            .bind(&chunk.text)
            .bind(chunk.start as i64)
            .bind(chunk.end as i64)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, artifact_id, embedding) VALUES (?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(artifact_id)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_artifact(&self, artifact_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors WHERE artifact_id = ?")
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE artifact_id = ?")
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(artifact_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        query: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.artifact_id, cv.embedding, cv.rowid AS position,
                   c.seq, c.text, a.kind
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            JOIN artifacts a ON a.id = cv.artifact_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<VectorCandidate> = rows
            .iter()
            .filter_map(|row| {
                let artifact_id: String = row.get("artifact_id");
                let kind: MediaKind = row.get::<String, _>("kind").parse().ok()?;
                if !filter.matches(&artifact_id, kind) {
                    return None;
                }
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(query, &blob_to_vec(&blob));
                Some(VectorCandidate {
                    chunk_id: row.get("chunk_id"),
                    artifact_id,
                    seq: row.get("seq"),
                    kind,
                    text: row.get("text"),
                    score,
                    position: row.get("position"),
                })
            })
            .collect();

        Ok(rank_candidates(candidates, k))
    }

    async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::config::ChunkingConfig;
    use tempfile::TempDir;

    fn cfg() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 100,
            overlap_chars: 20,
        }
    }

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    fn meta() -> IndexMeta {
        IndexMeta {
            dims: 3,
            model: "stub".to_string(),
        }
    }

    fn vectors_for(chunks: &[Chunk], base: f32) -> Vec<Vec<f32>> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, _)| vec![base, i as f32, 1.0])
            .collect()
    }

    #[tokio::test]
    async fn test_replace_and_query_roundtrip() {
        let (_tmp, store) = open_temp().await;
        let chunks = chunk_text("a1", "Login requires a valid email address.", &cfg());
        let vectors = vectors_for(&chunks, 1.0);

        store
            .replace_artifact("a1", "req.txt", MediaKind::Text, &chunks, &vectors, &meta())
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0, 1.0], 10, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), chunks.len());
        assert_eq!(hits[0].artifact_id, "a1");
        assert_eq!(store.meta().await.unwrap(), Some(meta()));
    }

    #[tokio::test]
    async fn test_reingestion_replaces_atomically() {
        let (_tmp, store) = open_temp().await;
        let old = chunk_text("a1", "Old content about logout.", &cfg());
        store
            .replace_artifact("a1", "req.txt", MediaKind::Text, &old, &vectors_for(&old, 1.0), &meta())
            .await
            .unwrap();

        let new = chunk_text("a1", "New content about login and sessions.", &cfg());
        store
            .replace_artifact("a1", "req.txt", MediaKind::Text, &new, &vectors_for(&new, 2.0), &meta())
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0, 0.0], 50, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), new.len());
        for hit in &hits {
            assert!(hit.text.contains("New content"));
        }
    }

    #[tokio::test]
    async fn test_kind_filter_narrows_candidates() {
        let (_tmp, store) = open_temp().await;
        let text = chunk_text("a1", "Requirement text.", &cfg());
        let img = chunk_text("a2", "Screenshot description.", &cfg());
        store
            .replace_artifact("a1", "req.txt", MediaKind::Text, &text, &vectors_for(&text, 1.0), &meta())
            .await
            .unwrap();
        store
            .replace_artifact("a2", "shot.png", MediaKind::Image, &img, &vectors_for(&img, 1.0), &meta())
            .await
            .unwrap();

        let filter = VectorFilter {
            artifact_id: None,
            kinds: vec![MediaKind::Image],
        };
        let hits = store.query(&[1.0, 0.0, 1.0], 10, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artifact_id, "a2");
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            let chunks = chunk_text("a1", "Persistent requirement.", &cfg());
            store
                .replace_artifact("a1", "req.txt", MediaKind::Text, &chunks, &vectors_for(&chunks, 1.0), &meta())
                .await
                .unwrap();
            store.close().await;
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(reopened.meta().await.unwrap(), Some(meta()));
        assert_eq!(reopened.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_artifact_leaves_no_orphans() {
        let (_tmp, store) = open_temp().await;
        let chunks = chunk_text("a1", "Doomed content.", &cfg());
        store
            .replace_artifact("a1", "req.txt", MediaKind::Text, &chunks, &vectors_for(&chunks, 1.0), &meta())
            .await
            .unwrap();

        store.delete_artifact("a1").await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);
        let hits = store
            .query(&[1.0, 0.0, 0.0], 10, &VectorFilter::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
