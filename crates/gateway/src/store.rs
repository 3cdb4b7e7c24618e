use std::str::FromStr;

use {
    async_trait::async_trait,
    hugli_whatsapp::{ContactForm, Order},
    serde::Serialize,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::info,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to encode order payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Catalog entry returned by `GET /api/products`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub created_at: String,
}

/// Durable record of every submission, written before any delivery attempt.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a contact submission and return its row id.
    async fn insert_contact(&self, form: &ContactForm) -> Result<i64, StoreError>;
    /// Persist an order. `order.order_id` must already be assigned.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::init(&pool).await?;
        info!(url, "database ready");
        Ok(Self::new(pool))
    }

    /// Create the tables if they don't exist.
    pub async fn init(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS contact_messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                name         TEXT NOT NULL,
                email        TEXT,
                phone        TEXT,
                company      TEXT,
                subject      TEXT,
                message      TEXT,
                service_type TEXT,
                created_at   TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS orders (
                order_id       TEXT PRIMARY KEY,
                customer_name  TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                payload        TEXT NOT NULL,
                created_at     TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS products (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                description TEXT,
                category    TEXT,
                price       REAL,
                created_at  TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_contact(&self, form: &ContactForm) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO contact_messages
                 (name, email, phone, company, subject, message, service_type, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.phone)
        .bind(&form.company)
        .bind(&form.subject)
        .bind(&form.message)
        .bind(&form.service_type)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let payload = serde_json::to_string(order)?;
        sqlx::query(
            r#"INSERT INTO orders (order_id, customer_name, customer_email, payload, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&order.order_id)
        .bind(order.customer_info.name.as_deref().unwrap_or_default())
        .bind(order.customer_info.email.as_deref().unwrap_or_default())
        .bind(payload)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    SqliteStore::init(&pool).await.unwrap();
    pool
}
