use std::sync::Arc;

use anyhow::{Context, Result};
use novacite_core::{CircularRecord, FacultyRecord};
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};

/// Faculty rows scraped from the department pages. Writes overwrite the table.
pub trait FacultyRepository: Send + Sync {
    async fn replace_faculty(&self, records: &[FacultyRecord]) -> Result<()>;
    async fn list_faculty(&self) -> Result<Vec<FacultyRecord>>;
}

/// Indexed circulars. Writes drop and rebuild the table.
pub trait CircularRepository: Send + Sync {
    async fn replace_circulars(&self, records: &[CircularRecord]) -> Result<()>;
    async fn list_circulars(&self) -> Result<Vec<CircularRecord>>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    faculty: Arc<RwLock<Vec<FacultyRecord>>>,
    circulars: Arc<RwLock<Vec<CircularRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FacultyRepository for MemoryStore {
    async fn replace_faculty(&self, records: &[FacultyRecord]) -> Result<()> {
        *self.faculty.write() = records.to_vec();
        Ok(())
    }

    async fn list_faculty(&self) -> Result<Vec<FacultyRecord>> {
        Ok(self.faculty.read().clone())
    }
}

impl CircularRepository for MemoryStore {
    async fn replace_circulars(&self, records: &[CircularRecord]) -> Result<()> {
        *self.circulars.write() = records.to_vec();
        Ok(())
    }

    async fn list_circulars(&self) -> Result<Vec<CircularRecord>> {
        Ok(self.circulars.read().clone())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faculty (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              designation TEXT NOT NULL,
              qualification TEXT NOT NULL,
              phone TEXT NOT NULL,
              email TEXT NOT NULL,
              img_url TEXT NOT NULL,
              department TEXT NOT NULL,
              embedding_json TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS circulars (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              description TEXT NOT NULL,
              url TEXT NOT NULL,
              embedding_json TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn encode_embedding(embedding: &Option<Vec<f32>>) -> Result<Option<String>> {
    embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("failed encoding embedding")
}

fn decode_embedding(raw: Option<String>) -> Option<Vec<f32>> {
    raw.and_then(|value| serde_json::from_str(&value).ok())
}

impl FacultyRepository for SqliteStore {
    async fn replace_faculty(&self, records: &[FacultyRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM faculty").execute(&mut *tx).await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO faculty
                  (name, designation, qualification, phone, email, img_url, department, embedding_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&record.name)
            .bind(&record.designation)
            .bind(&record.qualification)
            .bind(&record.phone)
            .bind(&record.email)
            .bind(&record.img_url)
            .bind(&record.department)
            .bind(encode_embedding(&record.embedding)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_faculty(&self) -> Result<Vec<FacultyRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT name, designation, qualification, phone, email, img_url, department, embedding_json
            FROM faculty
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| FacultyRecord {
                name: row.get("name"),
                designation: row.get("designation"),
                qualification: row.get("qualification"),
                phone: row.get("phone"),
                email: row.get("email"),
                img_url: row.get("img_url"),
                department: row.get("department"),
                embedding: decode_embedding(row.get("embedding_json")),
            })
            .collect();

        Ok(records)
    }
}

impl CircularRepository for SqliteStore {
    async fn replace_circulars(&self, records: &[CircularRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM circulars").execute(&mut *tx).await?;

        for record in records {
            sqlx::query(
                "INSERT INTO circulars (description, url, embedding_json) VALUES (?1, ?2, ?3)",
            )
                .bind(&record.description)
                .bind(&record.url)
                .bind(encode_embedding(&record.embedding)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_circulars(&self) -> Result<Vec<CircularRecord>> {
        let rows = sqlx::query("SELECT description, url, embedding_json FROM circulars ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CircularRecord {
                description: row.get("description"),
                url: row.get("url"),
                embedding: decode_embedding(row.get("embedding_json")),
            })
            .collect())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }
}

impl FacultyRepository for Store {
    async fn replace_faculty(&self, records: &[FacultyRecord]) -> Result<()> {
        match self {
            Store::Memory(store) => store.replace_faculty(records).await,
            Store::Sqlite(store) => store.replace_faculty(records).await,
        }
    }

    async fn list_faculty(&self) -> Result<Vec<FacultyRecord>> {
        match self {
            Store::Memory(store) => store.list_faculty().await,
            Store::Sqlite(store) => store.list_faculty().await,
        }
    }
}

impl CircularRepository for Store {
    async fn replace_circulars(&self, records: &[CircularRecord]) -> Result<()> {
        match self {
            Store::Memory(store) => store.replace_circulars(records).await,
            Store::Sqlite(store) => store.replace_circulars(records).await,
        }
    }

    async fn list_circulars(&self) -> Result<Vec<CircularRecord>> {
        match self {
            Store::Memory(store) => store.list_circulars().await,
            Store::Sqlite(store) => store.list_circulars().await,
        }
    }
}
