use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::errors::StoreError;
use crate::models::{BankIntegration, NewBankIntegration};
use crate::repository::{new_record_id, IntegrationRepository};

const COLUMNS: &str = "id, identity_dni, account_number, account_type, balance, \
                       date_register, scan_available, prefetch";

/// Postgres-backed record store
pub struct PgIntegrationStorage {
    pool: PgPool,
}

impl PgIntegrationStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique violation on write to a duplicate identity document.
fn write_error(err: sqlx::Error, dni: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateIdentityDni(dni.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl IntegrationRepository for PgIntegrationStorage {
    async fn find_all(&self) -> Result<Vec<BankIntegration>, StoreError> {
        let records = sqlx::query_as::<_, BankIntegration>(&format!(
            "SELECT {} FROM bank_integration ORDER BY date_register, id",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BankIntegration>, StoreError> {
        let record = sqlx::query_as::<_, BankIntegration>(&format!(
            "SELECT {} FROM bank_integration WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_identity_dni(
        &self,
        dni: &str,
    ) -> Result<Option<BankIntegration>, StoreError> {
        let record = sqlx::query_as::<_, BankIntegration>(&format!(
            "SELECT {} FROM bank_integration WHERE identity_dni = $1",
            COLUMNS
        ))
        .bind(dni)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(
        &self,
        record: NewBankIntegration,
        date_register: NaiveDate,
    ) -> Result<BankIntegration, StoreError> {
        let dni = record.identity_dni.clone();
        let record = record.into_record(new_record_id(), date_register);

        sqlx::query_as::<_, BankIntegration>(&format!(
            r#"
            INSERT INTO bank_integration ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COLUMNS, COLUMNS
        ))
        .bind(&record.id)
        .bind(&record.identity_dni)
        .bind(&record.account_number)
        .bind(&record.account_type)
        .bind(&record.balance)
        .bind(record.date_register)
        .bind(record.scan_available)
        .bind(record.prefetch)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, &dni))
    }

    async fn save(&self, record: BankIntegration) -> Result<BankIntegration, StoreError> {
        sqlx::query_as::<_, BankIntegration>(&format!(
            r#"
            INSERT INTO bank_integration ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                identity_dni = EXCLUDED.identity_dni,
                account_number = EXCLUDED.account_number,
                account_type = EXCLUDED.account_type,
                balance = EXCLUDED.balance,
                scan_available = EXCLUDED.scan_available,
                prefetch = EXCLUDED.prefetch
            RETURNING {}
            "#,
            COLUMNS, COLUMNS
        ))
        .bind(&record.id)
        .bind(&record.identity_dni)
        .bind(&record.account_number)
        .bind(&record.account_type)
        .bind(&record.balance)
        .bind(record.date_register)
        .bind(record.scan_available)
        .bind(record.prefetch)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, &record.identity_dni))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bank_integration WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
