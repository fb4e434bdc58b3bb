//! # Database Module
//!
//! SQLite persistence for inventory items and events. Every operation takes
//! the same async mutex, so reads and writes from concurrent chats are
//! serialized against the single database file.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::text_processing::{collapse_whitespace, normalize_text};

/// Represents an inventory item in the database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub storage: String,
    pub owner: Option<String>,
    pub issued: bool,
}

impl Item {
    pub fn is_available(&self) -> bool {
        !self.issued
    }
}

/// Represents a calendar event in the database
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "event_date")]
    pub date: NaiveDate,
}

/// Result of adding an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Item),
    AlreadyExists(Item),
}

/// Time window for listing events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPeriod {
    All,
    Week,
    Month,
}

impl EventPeriod {
    /// Number of days after today included in the window
    pub fn horizon_days(self) -> Option<i64> {
        match self {
            EventPeriod::All => None,
            EventPeriod::Week => Some(7),
            EventPeriod::Month => Some(30),
        }
    }
}

/// Shared handle to the inventory database
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    lock: Arc<Mutex<()>>,
}

impl Database {
    /// Open (creating if missing) the database at `database_url` and
    /// initialize the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database at: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        // One connection: in-memory databases are per-connection and the
        // mutex serializes access anyway
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self {
            pool,
            lock: Arc::new(Mutex::new(())),
        };
        db.init_database_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_database_schema(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        info!("Initializing database schema...");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL,
                storage TEXT NOT NULL,
                owner TEXT,
                issued BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (storage, normalized_name),
                CHECK ((owner IS NULL AND issued = 0) OR (owner IS NOT NULL AND issued = 1))
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create items table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                event_date DATE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create events table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS events_date_idx ON events (event_date)")
            .execute(&self.pool)
            .await
            .context("Failed to create events index")?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// List items ordered by name, optionally limited to one storage
    pub async fn list_items(&self, storage: Option<&str>) -> Result<Vec<Item>> {
        let _guard = self.lock.lock().await;

        let items = match storage {
            Some(storage) => {
                sqlx::query_as::<_, Item>(
                    "SELECT id, name, normalized_name, storage, owner, issued
                     FROM items WHERE storage = ?1 ORDER BY normalized_name, id",
                )
                .bind(storage)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Item>(
                    "SELECT id, name, normalized_name, storage, owner, issued
                     FROM items ORDER BY storage, normalized_name, id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list items")?;

        debug!(storage = ?storage, count = items.len(), "Listed items");
        Ok(items)
    }

    /// Read a single item by ID
    pub async fn get_item(&self, item_id: i64) -> Result<Option<Item>> {
        let _guard = self.lock.lock().await;
        self.fetch_item(item_id).await
    }

    async fn fetch_item(&self, item_id: i64) -> Result<Option<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT id, name, normalized_name, storage, owner, issued FROM items WHERE id = ?1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read item")
    }

    async fn fetch_by_normalized_name(&self, normalized: &str, storage: &str) -> Result<Option<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT id, name, normalized_name, storage, owner, issued
             FROM items WHERE storage = ?1 AND normalized_name = ?2",
        )
        .bind(storage)
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up item by name")
    }

    /// Find an item whose normalized name matches the normalized `text`
    pub async fn find_by_normalized_name(&self, text: &str, storage: &str) -> Result<Option<Item>> {
        let _guard = self.lock.lock().await;
        self.fetch_by_normalized_name(&normalize_text(text), storage)
            .await
    }

    /// Add an item unless one with the same normalized name already exists
    /// in the storage
    pub async fn add_item(&self, name: &str, storage: &str) -> Result<AddOutcome> {
        let _guard = self.lock.lock().await;

        let display_name = collapse_whitespace(name);
        let normalized = normalize_text(&display_name);

        if let Some(existing) = self.fetch_by_normalized_name(&normalized, storage).await? {
            debug!(item = %existing.name, storage, "Item already exists");
            return Ok(AddOutcome::AlreadyExists(existing));
        }

        let item_id = sqlx::query(
            "INSERT INTO items (name, normalized_name, storage, owner, issued)
             VALUES (?1, ?2, ?3, NULL, 0)",
        )
        .bind(&display_name)
        .bind(&normalized)
        .bind(storage)
        .execute(&self.pool)
        .await
        .context("Failed to insert new item")?
        .last_insert_rowid();

        info!(item_id, item = %display_name, storage, "Item added");

        Ok(AddOutcome::Added(Item {
            id: item_id,
            name: display_name,
            normalized_name: normalized,
            storage: storage.to_string(),
            owner: None,
            issued: false,
        }))
    }

    /// Delete items by ID, returning how many rows were removed
    pub async fn delete_items(&self, item_ids: &[i64]) -> Result<u64> {
        let _guard = self.lock.lock().await;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut deleted = 0;
        for item_id in item_ids {
            deleted += sqlx::query("DELETE FROM items WHERE id = ?1")
                .bind(*item_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete item")?
                .rows_affected();
        }
        tx.commit().await.context("Failed to commit item deletion")?;

        info!(requested = item_ids.len(), deleted, "Items deleted");
        Ok(deleted)
    }

    /// Issue items to `owner`. Only currently unissued items are assigned;
    /// the IDs that were actually assigned are returned.
    pub async fn assign_items(&self, item_ids: &[i64], owner: &str) -> Result<Vec<i64>> {
        let _guard = self.lock.lock().await;

        let owner = collapse_whitespace(owner);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut assigned = Vec::new();
        for item_id in item_ids {
            let rows = sqlx::query(
                "UPDATE items SET owner = ?1, issued = 1 WHERE id = ?2 AND issued = 0",
            )
            .bind(&owner)
            .bind(*item_id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign item")?
            .rows_affected();
            if rows > 0 {
                assigned.push(*item_id);
            }
        }
        tx.commit().await.context("Failed to commit item assignment")?;

        info!(owner = %owner, assigned = assigned.len(), "Items issued");
        Ok(assigned)
    }

    /// Return items. Only currently issued items are cleared; the IDs that
    /// were actually returned are returned.
    pub async fn clear_items(&self, item_ids: &[i64]) -> Result<Vec<i64>> {
        let _guard = self.lock.lock().await;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut cleared = Vec::new();
        for item_id in item_ids {
            let rows = sqlx::query(
                "UPDATE items SET owner = NULL, issued = 0 WHERE id = ?1 AND issued = 1",
            )
            .bind(*item_id)
            .execute(&mut *tx)
            .await
            .context("Failed to return item")?
            .rows_affected();
            if rows > 0 {
                cleared.push(*item_id);
            }
        }
        tx.commit().await.context("Failed to commit item return")?;

        info!(returned = cleared.len(), "Items returned");
        Ok(cleared)
    }

    /// Return every issued item of a storage
    pub async fn clear_all(&self, storage: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;

        let returned = sqlx::query(
            "UPDATE items SET owner = NULL, issued = 0 WHERE storage = ?1 AND issued = 1",
        )
        .bind(storage)
        .execute(&self.pool)
        .await
        .context("Failed to return all items")?
        .rows_affected();

        info!(storage, returned, "All items returned");
        Ok(returned)
    }

    /// Create a new event
    pub async fn add_event(&self, name: &str, date: NaiveDate) -> Result<Event> {
        let _guard = self.lock.lock().await;

        let name = collapse_whitespace(name);
        let event_id = sqlx::query("INSERT INTO events (name, event_date) VALUES (?1, ?2)")
            .bind(&name)
            .bind(date)
            .execute(&self.pool)
            .await
            .context("Failed to insert new event")?
            .last_insert_rowid();

        info!(event_id, event = %name, %date, "Event added");
        Ok(Event {
            id: event_id,
            name,
            date,
        })
    }

    /// List events ordered by date. `Week` and `Month` keep only events in
    /// `[today, today + N days]`.
    pub async fn list_events(&self, period: EventPeriod, today: NaiveDate) -> Result<Vec<Event>> {
        let _guard = self.lock.lock().await;

        let events = match period.horizon_days() {
            None => {
                sqlx::query_as::<_, Event>(
                    "SELECT id, name, event_date FROM events ORDER BY event_date, id",
                )
                .fetch_all(&self.pool)
                .await
            }
            Some(days) => {
                sqlx::query_as::<_, Event>(
                    "SELECT id, name, event_date FROM events
                     WHERE event_date >= ?1 AND event_date <= ?2
                     ORDER BY event_date, id",
                )
                .bind(today)
                .bind(today + Duration::days(days))
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list events")?;

        debug!(period = ?period, count = events.len(), "Listed events");
        Ok(events)
    }

    /// Delete events by ID, returning how many rows were removed
    pub async fn delete_events(&self, event_ids: &[i64]) -> Result<u64> {
        let _guard = self.lock.lock().await;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut deleted = 0;
        for event_id in event_ids {
            deleted += sqlx::query("DELETE FROM events WHERE id = ?1")
                .bind(*event_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete event")?
                .rows_affected();
        }
        tx.commit().await.context("Failed to commit event deletion")?;

        info!(requested = event_ids.len(), deleted, "Events deleted");
        Ok(deleted)
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> Result<Database> {
        Database::connect("sqlite::memory:").await
    }

    #[tokio::test]
    async fn test_add_item_normalizes_name() -> Result<()> {
        let db = setup_test_db().await?;

        let outcome = db.add_item("  Red   Chair ", "main").await?;
        match outcome {
            AddOutcome::Added(item) => {
                assert_eq!(item.name, "Red Chair");
                assert_eq!(item.normalized_name, "red chair");
                assert!(item.is_available());
            }
            other => panic!("Unexpected outcome: {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_same_name_in_different_storages() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(matches!(db.add_item("Tent", "a").await?, AddOutcome::Added(_)));
        assert!(matches!(db.add_item("tent", "b").await?, AddOutcome::Added(_)));
        assert_eq!(db.list_items(None).await?.len(), 2);
        assert_eq!(db.list_items(Some("a")).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_owner_invariant_enforced_by_schema() -> Result<()> {
        let db = setup_test_db().await?;
        db.add_item("Tent", "main").await?;

        let result = sqlx::query("UPDATE items SET owner = 'Bob', issued = 0")
            .execute(&db.pool)
            .await;
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn test_event_period_horizon() {
        assert_eq!(EventPeriod::All.horizon_days(), None);
        assert_eq!(EventPeriod::Week.horizon_days(), Some(7));
        assert_eq!(EventPeriod::Month.horizon_days(), Some(30));
    }
}
