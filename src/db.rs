//! Database module for wallet settings and base node lists
//!
//! Uses SQLite with WAL mode for concurrent reads.
//! Writes are serialized through a tokio mutex to prevent lock contention.

use crate::base_node::BaseNode;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Setting keys
mod key {
    pub const HAS_VERIFIED_SEED_WORDS: &str = "has_verified_seed_words";
    pub const BACKUP_ENABLED: &str = "backup_enabled";
    pub const BACKUP_PASSWORD_SET: &str = "backup_password_set";
    pub const SECURITY_COOLDOWN_UNTIL: &str = "security_cooldown_until";
    pub const LAST_PROMPTED_STAGE: &str = "last_prompted_stage";
    pub const CURRENT_BASE_NODE: &str = "current_base_node";
    pub const BASE_NODE_LAST_SYNC_RESULT: &str = "base_node_last_sync_result";
    pub const HEIGHT_OF_LONGEST_CHAIN: &str = "height_of_longest_chain";
}

/// Which base node list a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseNodeListKind {
    /// Peers reported by the wallet engine
    Engine,
    /// Nodes added by the user
    User,
}

impl std::fmt::Display for BaseNodeListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaseNodeListKind::Engine => write!(f, "engine"),
            BaseNodeListKind::User => write!(f, "user"),
        }
    }
}

/// Database connection and operations
///
/// Uses a write lock to serialize write operations (SQLite limitation)
/// while allowing concurrent reads via WAL mode.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    /// Write lock to serialize write operations
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        // Enable WAL mode for better concurrent read performance
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        // Set busy timeout to wait for locks instead of failing immediately
        sqlx::query("PRAGMA busy_timeout=5000")
            .execute(&pool)
            .await?;

        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let db = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        db.init_schema().await?;

        Ok(db)
    }

    /// In-memory database (single connection, so every query sees the same data)
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        db.init_schema().await?;

        Ok(db)
    }

    /// Close the pool; later queries fail
    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS base_nodes (
                list TEXT NOT NULL,
                public_key_hex TEXT NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                is_custom INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (list, public_key_hex)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }


    /// Read a setting value
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    /// Write a setting value (serialized write)
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let _lock = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a setting (serialized write)
    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        let _lock = self.write_lock.lock().await;
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read a boolean setting. A missing key reads as `false`.
    async fn get_flag(&self, key: &str) -> Result<bool> {
        match self.get_setting(key).await? {
            Some(value) => value
                .parse::<bool>()
                .with_context(|| format!("Invalid value {value:?} for setting {key}")),
            None => Ok(false),
        }
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        self.set_setting(key, if value { "true" } else { "false" }).await
    }


    pub async fn has_verified_seed_words(&self) -> Result<bool> {
        self.get_flag(key::HAS_VERIFIED_SEED_WORDS).await
    }

    pub async fn set_verified_seed_words(&self, value: bool) -> Result<()> {
        self.set_flag(key::HAS_VERIFIED_SEED_WORDS, value).await
    }

    pub async fn is_backup_enabled(&self) -> Result<bool> {
        self.get_flag(key::BACKUP_ENABLED).await
    }

    pub async fn set_backup_enabled(&self, value: bool) -> Result<()> {
        self.set_flag(key::BACKUP_ENABLED, value).await
    }

    pub async fn is_backup_password_set(&self) -> Result<bool> {
        self.get_flag(key::BACKUP_PASSWORD_SET).await
    }

    pub async fn set_backup_password_set(&self, value: bool) -> Result<()> {
        self.set_flag(key::BACKUP_PASSWORD_SET, value).await
    }

    /// Point in time until which security prompts are suppressed
    pub async fn get_security_cooldown(&self) -> Result<Option<DateTime<Utc>>> {
        match self.get_setting(key::SECURITY_COOLDOWN_UNTIL).await? {
            Some(value) => Ok(Some(
                DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    pub async fn set_security_cooldown(&self, until: DateTime<Utc>) -> Result<()> {
        self.set_setting(key::SECURITY_COOLDOWN_UNTIL, &until.to_rfc3339())
            .await
    }

    pub async fn get_last_prompted_stage(&self) -> Result<Option<String>> {
        self.get_setting(key::LAST_PROMPTED_STAGE).await
    }

    pub async fn set_last_prompted_stage(&self, stage: &str) -> Result<()> {
        self.set_setting(key::LAST_PROMPTED_STAGE, stage).await
    }


    pub async fn get_current_base_node(&self) -> Result<Option<BaseNode>> {
        match self.get_setting(key::CURRENT_BASE_NODE).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set_current_base_node(&self, node: &BaseNode) -> Result<()> {
        let json = serde_json::to_string(node)?;
        self.set_setting(key::CURRENT_BASE_NODE, &json).await
    }

    pub async fn get_last_sync_result(&self) -> Result<Option<bool>> {
        match self.get_setting(key::BASE_NODE_LAST_SYNC_RESULT).await? {
            Some(_) => Ok(Some(self.get_flag(key::BASE_NODE_LAST_SYNC_RESULT).await?)),
            None => Ok(None),
        }
    }

    pub async fn set_last_sync_result(&self, result: Option<bool>) -> Result<()> {
        match result {
            Some(value) => self.set_flag(key::BASE_NODE_LAST_SYNC_RESULT, value).await,
            None => self.delete_setting(key::BASE_NODE_LAST_SYNC_RESULT).await,
        }
    }

    pub async fn get_chain_tip(&self) -> Result<u64> {
        match self.get_setting(key::HEIGHT_OF_LONGEST_CHAIN).await? {
            Some(value) => Ok(value.parse()?),
            None => Ok(0),
        }
    }

    pub async fn set_chain_tip(&self, height: u64) -> Result<()> {
        self.set_setting(key::HEIGHT_OF_LONGEST_CHAIN, &height.to_string())
            .await
    }

    /// Get all base nodes in a list, ordered by name
    pub async fn get_base_nodes(&self, list: BaseNodeListKind) -> Result<Vec<BaseNode>> {
        let rows = sqlx::query_as::<_, (String, String, String, i32)>(
            r#"
            SELECT name, public_key_hex, address, is_custom
            FROM base_nodes
            WHERE list = ?
            ORDER BY name ASC
            "#,
        )
        .bind(list.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BaseNode {
                name: row.0,
                public_key_hex: row.1,
                address: row.2,
                is_custom: row.3 != 0,
            })
            .collect())
    }

    /// Insert or update a base node (serialized write)
    pub async fn insert_base_node(&self, list: BaseNodeListKind, node: &BaseNode) -> Result<()> {
        let _lock = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO base_nodes (list, public_key_hex, name, address, is_custom)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(list, public_key_hex) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                is_custom = excluded.is_custom
            "#,
        )
        .bind(list.to_string())
        .bind(&node.public_key_hex)
        .bind(&node.name)
        .bind(&node.address)
        .bind(node.is_custom as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a base node (serialized write). Returns whether a row was removed.
    pub async fn delete_base_node(&self, list: BaseNodeListKind, public_key_hex: &str) -> Result<bool> {
        let _lock = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM base_nodes WHERE list = ? AND public_key_hex = ?")
            .bind(list.to_string())
            .bind(public_key_hex)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a whole list in one transaction (serialized write)
    pub async fn replace_base_nodes(&self, list: BaseNodeListKind, nodes: &[BaseNode]) -> Result<()> {
        let _lock = self.write_lock.lock().await;
        let list_str = list.to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM base_nodes WHERE list = ?")
            .bind(&list_str)
            .execute(&mut *tx)
            .await?;

        for node in nodes {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO base_nodes (list, public_key_hex, name, address, is_custom)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&list_str)
            .bind(&node.public_key_hex)
            .bind(&node.name)
            .bind(&node.address)
            .bind(node.is_custom as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_flags_default_to_false() {
        let db = Database::in_memory().await.unwrap();

        assert!(!db.has_verified_seed_words().await.unwrap());
        assert!(!db.is_backup_enabled().await.unwrap());
        assert!(!db.is_backup_password_set().await.unwrap());

        db.set_verified_seed_words(true).await.unwrap();
        db.set_backup_enabled(true).await.unwrap();
        assert!(db.has_verified_seed_words().await.unwrap());
        assert!(db.is_backup_enabled().await.unwrap());
        assert!(!db.is_backup_password_set().await.unwrap());

        db.set_backup_enabled(false).await.unwrap();
        assert!(!db.is_backup_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_flag_is_an_error() {
        let db = Database::in_memory().await.unwrap();

        db.set_setting(key::BACKUP_ENABLED, "yes").await.unwrap();
        assert!(db.is_backup_enabled().await.is_err());

        db.set_setting(key::BASE_NODE_LAST_SYNC_RESULT, "1").await.unwrap();
        assert!(db.get_last_sync_result().await.is_err());
    }

    #[tokio::test]
    async fn test_security_cooldown() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.get_security_cooldown().await.unwrap(), None);

        let until = DateTime::parse_from_rfc3339("2026-01-08T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::days(7);
        db.set_security_cooldown(until).await.unwrap();
        assert_eq!(db.get_security_cooldown().await.unwrap(), Some(until));
    }

    #[tokio::test]
    async fn test_current_base_node_and_sync_result() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.get_current_base_node().await.unwrap(), None);

        let node = BaseNode {
            name: "node".to_string(),
            public_key_hex: "ab".repeat(32),
            address: "/ip4/10.0.0.1/tcp/18189".to_string(),
            is_custom: false,
        };
        db.set_current_base_node(&node).await.unwrap();
        assert_eq!(db.get_current_base_node().await.unwrap(), Some(node));

        db.set_last_sync_result(Some(true)).await.unwrap();
        assert_eq!(db.get_last_sync_result().await.unwrap(), Some(true));
        db.set_last_sync_result(None).await.unwrap();
        assert_eq!(db.get_last_sync_result().await.unwrap(), None);

        assert_eq!(db.get_chain_tip().await.unwrap(), 0);
        db.set_chain_tip(12_345).await.unwrap();
        assert_eq!(db.get_chain_tip().await.unwrap(), 12_345);
    }

    #[tokio::test]
    async fn test_replace_base_nodes_keeps_lists_apart() {
        let db = Database::in_memory().await.unwrap();

        let node = |name: &str, key: char| BaseNode {
            name: name.to_string(),
            public_key_hex: key.to_string().repeat(64),
            address: String::new(),
            is_custom: false,
        };

        db.insert_base_node(BaseNodeListKind::User, &node("mine", 'f'))
            .await
            .unwrap();
        db.replace_base_nodes(BaseNodeListKind::Engine, &[node("b", 'b'), node("a", 'a')])
            .await
            .unwrap();
        db.replace_base_nodes(BaseNodeListKind::Engine, &[node("c", 'c')])
            .await
            .unwrap();

        let engine = db.get_base_nodes(BaseNodeListKind::Engine).await.unwrap();
        assert_eq!(engine.len(), 1);
        assert_eq!(engine[0].name, "c");

        let user = db.get_base_nodes(BaseNodeListKind::User).await.unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].name, "mine");
    }
}
