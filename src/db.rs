use sqlx::{postgres::PgPoolOptions, PgPool};

/// Schema of the record store. One row per record, unique identity document.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bank_integration (
    id             TEXT PRIMARY KEY,
    identity_dni   VARCHAR(8)  NOT NULL UNIQUE,
    account_number VARCHAR(20) NOT NULL,
    account_type   VARCHAR(20) NOT NULL,
    balance        NUMERIC     NOT NULL,
    date_register  DATE        NOT NULL,
    scan_available BOOLEAN     NOT NULL DEFAULT FALSE,
    prefetch       INTEGER     NOT NULL DEFAULT 0
)
"#;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }
}
