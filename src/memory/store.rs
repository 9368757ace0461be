use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::embeddings::{cosine_similarity, deserialize_embedding, serialize_embedding};
use super::{MemoryEntry, MemoryType};

/// Score given to rows found by the LIKE scan.
const LIKE_SCORE: f32 = 0.5;

/// SQLite-backed long-term memory for one or more users.
#[derive(Clone)]
pub struct LongTermStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl LongTermStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                seq INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                memory_type TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                content_hash TEXT NOT NULL,
                embedding TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, content_hash)
            );

            CREATE INDEX IF NOT EXISTS memories_user_type
                ON memories (user_id, memory_type);

            -- Trigram tokens work for Hangul, which has no spaces inside words
            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                content,
                content='memories',
                content_rowid='seq',
                tokenize='trigram'
            );

            CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
                INSERT INTO memories_fts(rowid, content) VALUES (new.seq, new.content);
            END;

            CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content) VALUES('delete', old.seq, old.content);
            END;

            CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content) VALUES('delete', old.seq, old.content);
                INSERT INTO memories_fts(rowid, content) VALUES (new.seq, new.content);
            END;
            "#,
        )?;

        debug!("Opened memory store at {}", db_path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Store a memory. Returns false when the same content already exists
    /// for this user.
    pub fn add(
        &self,
        user_id: &str,
        content: &str,
        memory_type: MemoryType,
        metadata: &HashMap<String, Value>,
        embedding: Option<&[f32]>,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO memories
                (id, user_id, content, memory_type, metadata, content_hash, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                content,
                memory_type.as_str(),
                serde_json::to_string(metadata)?,
                hash_content(content),
                embedding.map(serialize_embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            debug!("Memory already stored, skipping duplicate");
        }
        Ok(inserted > 0)
    }

    /// Full-text search. Terms of three or more characters go through FTS5;
    /// a query made only of shorter terms falls back to a LIKE scan.
    pub fn search_text(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryEntry>> {
        let terms: Vec<&str> = query.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let long_terms: Vec<&str> = terms
            .iter()
            .copied()
            .filter(|t| t.chars().count() >= 3)
            .collect();

        if long_terms.is_empty() {
            self.search_like(user_id, &terms, limit)
        } else {
            self.search_fts(user_id, &long_terms, limit)
        }
    }

    fn search_fts(&self, user_id: &str, terms: &[&str], limit: usize) -> Result<Vec<MemoryEntry>> {
        let match_expr = terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, m.user_id, m.content, m.memory_type, m.metadata, m.created_at,
                   bm25(memories_fts) AS relevance
            FROM memories_fts
            JOIN memories m ON memories_fts.rowid = m.seq
            WHERE memories_fts MATCH ?1 AND m.user_id = ?2
            ORDER BY relevance
            LIMIT ?3
            "#,
        )?;

        let rows = stmt.query_map(params![match_expr, user_id, limit as i64], |row| {
            let rank: f64 = row.get(6)?;
            let mut entry = row_to_entry(row)?;
            // bm25 is negative, larger magnitude is better
            let magnitude = rank.abs() as f32;
            entry.score = Some(magnitude / (1.0 + magnitude));
            Ok(entry)
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn search_like(&self, user_id: &str, terms: &[&str], limit: usize) -> Result<Vec<MemoryEntry>> {
        let clauses = (0..terms.len())
            .map(|i| format!("content LIKE ?{} ESCAPE '\\'", i + 2))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT id, user_id, content, memory_type, metadata, created_at
             FROM memories
             WHERE user_id = ?1 AND ({})
             ORDER BY seq DESC
             LIMIT {}",
            clauses, limit
        );

        let mut values = vec![user_id.to_string()];
        values.extend(terms.iter().map(|t| format!("%{}%", escape_like(t))));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let mut entry = row_to_entry(row)?;
            entry.score = Some(LIKE_SCORE);
            Ok(entry)
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rank stored embeddings by cosine similarity to `query_embedding`.
    pub fn search_vector(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<MemoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, memory_type, metadata, created_at, embedding
             FROM memories
             WHERE user_id = ?1 AND embedding IS NOT NULL",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            let embedding: String = row.get(6)?;
            Ok((row_to_entry(row)?, embedding))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (mut entry, embedding) = row?;
            let similarity = cosine_similarity(query_embedding, &deserialize_embedding(&embedding));
            if similarity >= min_similarity {
                entry.score = Some(similarity);
                scored.push(entry);
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Newest first.
    pub fn list_by_type(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, memory_type, metadata, created_at
             FROM memories
             WHERE user_id = ?1 AND memory_type = ?2
             ORDER BY seq DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![user_id, memory_type.as_str(), limit as i64],
            row_to_entry,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Newest first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, memory_type, metadata, created_at
             FROM memories
             WHERE user_id = ?1
             ORDER BY seq DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count(&self, user_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Timestamp of the newest memory, if any.
    pub fn last_updated(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let created: Option<String> = conn
            .query_row(
                "SELECT created_at FROM memories WHERE user_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(created.map(|c| parse_timestamp(&c)))
    }

    /// Delete every memory of `user_id`, returning how many were removed.
    pub fn clear_user(&self, user_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM memories WHERE user_id = ?1", params![user_id])?;
        debug!("Removed {} memories for {}", removed, user_id);
        Ok(removed)
    }

    pub fn size_bytes(&self) -> Result<u64> {
        if self.db_path.exists() {
            Ok(fs::metadata(&self.db_path)?.len())
        } else {
            Ok(0)
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let memory_type: String = row.get(3)?;
    let metadata: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(MemoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        memory_type: memory_type.parse().unwrap_or(MemoryType::Fact),
        score: None,
        created_at: parse_timestamp(&created_at),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LongTermStore) {
        let temp = TempDir::new().unwrap();
        let store = LongTermStore::open(&temp.path().join("memory/test.sqlite")).unwrap();
        (temp, store)
    }

    fn meta() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[test]
    fn duplicates_are_ignored() -> Result<()> {
        let (_temp, store) = store();
        assert!(store.add("alice", "피자를 좋아해", MemoryType::Fact, &meta(), None)?);
        assert!(!store.add("alice", "피자를 좋아해", MemoryType::Fact, &meta(), None)?);
        // Same content for another user is a different memory
        assert!(store.add("bob", "피자를 좋아해", MemoryType::Fact, &meta(), None)?);

        assert_eq!(store.count("alice")?, 1);
        assert_eq!(store.count("bob")?, 1);
        assert!(store.size_bytes()? > 0);
        Ok(())
    }

    #[test]
    fn fts_search_finds_korean_substrings() -> Result<()> {
        let (_temp, store) = store();
        store.add("alice", "사용자: 주말에 떡볶이를 먹었어\nAI: 맛있었겠네요", MemoryType::Conversation, &meta(), None)?;
        store.add("alice", "사용자: 오늘은 비가 와\nAI: 우산 챙기세요", MemoryType::Conversation, &meta(), None)?;
        store.add("bob", "사용자: 떡볶이 최고\nAI: 맞아요", MemoryType::Conversation, &meta(), None)?;

        let hits = store.search_text("alice", "떡볶이", 5)?;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("주말에"));
        let score = hits[0].score.unwrap();
        assert!(score > 0.0 && score < 1.0);
        Ok(())
    }

    #[test]
    fn short_terms_use_like_scan() -> Result<()> {
        let (_temp, store) = store();
        store.add("alice", "사용자 선호도: 음식_피자 = 좋아함", MemoryType::Preference, &meta(), None)?;
        store.add("alice", "100% sure_thing", MemoryType::Fact, &meta(), None)?;

        let hits = store.search_text("alice", "피자", 5)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, Some(LIKE_SCORE));
        assert_eq!(hits[0].memory_type, MemoryType::Preference);

        // Wildcards in the query are literal
        assert_eq!(store.search_text("alice", "%", 5)?.len(), 1);
        assert!(store.search_text("alice", "  ", 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn vector_search_ranks_by_similarity() -> Result<()> {
        let (_temp, store) = store();
        store.add("alice", "north", MemoryType::Fact, &meta(), Some(&[1.0, 0.0][..]))?;
        store.add("alice", "east", MemoryType::Fact, &meta(), Some(&[0.0, 1.0][..]))?;
        store.add("alice", "north-east", MemoryType::Fact, &meta(), Some(&[0.7071, 0.7071][..]))?;
        store.add("alice", "no vector", MemoryType::Fact, &meta(), None)?;

        let hits = store.search_vector("alice", &[1.0, 0.0], 5, 0.3)?;
        let contents: Vec<_> = hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["north", "north-east"]);
        Ok(())
    }

    #[test]
    fn listing_and_clearing() -> Result<()> {
        let (_temp, store) = store();
        let mut metadata = meta();
        metadata.insert("category".to_string(), Value::from("음식_피자"));
        store.add("alice", "pref one", MemoryType::Preference, &metadata, None)?;
        store.add("alice", "chat one", MemoryType::Conversation, &meta(), None)?;
        store.add("alice", "pref two", MemoryType::Preference, &meta(), None)?;

        let prefs = store.list_by_type("alice", MemoryType::Preference, 10)?;
        assert_eq!(prefs.len(), 2);
        assert_eq!(prefs[0].content, "pref two");
        assert_eq!(prefs[1].metadata["category"], "음식_피자");

        assert_eq!(store.recent("alice", 1)?[0].content, "pref two");
        assert!(store.last_updated("alice")?.is_some());
        assert!(store.last_updated("nobody")?.is_none());

        assert_eq!(store.clear_user("alice")?, 3);
        assert_eq!(store.count("alice")?, 0);
        assert!(store.search_text("alice", "pref", 5)?.is_empty());
        Ok(())
    }
}
