use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::hash::{Hash, Hasher};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Maximum length of the identity document number.
pub const IDENTITY_DNI_MAX_LEN: usize = 8;
/// Maximum length of the account number and account type.
pub const ACCOUNT_FIELD_MAX_LEN: usize = 20;

// ============ Database Models ============

/// A bank account integration record.
///
/// Two records are the same record when their identity document numbers match,
/// regardless of the store-assigned `id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BankIntegration {
    /// Store-assigned identifier. Immutable once created.
    pub id: String,
    /// Identity document number (unique, at most 8 characters).
    pub identity_dni: String,
    /// Account number (at most 20 characters).
    pub account_number: String,
    /// Account type, e.g. "SAVINGS" (at most 20 characters).
    pub account_type: String,
    /// Current balance.
    pub balance: BigDecimal,
    /// Creation date. Written once when the record is created.
    pub date_register: NaiveDate,
    /// Internal flag, never exposed through the API.
    pub scan_available: bool,
    /// Internal prefetch count, never exposed through the API.
    pub prefetch: i32,
}

impl PartialEq for BankIntegration {
    fn eq(&self, other: &Self) -> bool {
        self.identity_dni == other.identity_dni
    }
}

impl Eq for BankIntegration {}

impl Hash for BankIntegration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_dni.hash(state);
    }
}

impl BankIntegration {
    /// Overwrites every field supplied by the patch.
    ///
    /// `id` and `date_register` are never touched.
    pub fn apply(&mut self, patch: BankIntegrationPatch) {
        if let Some(identity_dni) = patch.identity_dni {
            self.identity_dni = identity_dni;
        }
        if let Some(account_number) = patch.account_number {
            self.account_number = account_number;
        }
        if let Some(account_type) = patch.account_type {
            self.account_type = account_type;
        }
        if let Some(balance) = patch.balance {
            self.balance = balance;
        }
    }
}

/// A record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBankIntegration {
    pub identity_dni: String,
    pub account_number: String,
    pub account_type: String,
    pub balance: BigDecimal,
}

impl NewBankIntegration {
    /// Builds the stored form once the store has assigned an id.
    pub fn into_record(self, id: String, date_register: NaiveDate) -> BankIntegration {
        BankIntegration {
            id,
            identity_dni: self.identity_dni,
            account_number: self.account_number,
            account_type: self.account_type,
            balance: self.balance,
            date_register,
            scan_available: false,
            prefetch: 0,
        }
    }
}

/// Replacement values for an existing record. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankIntegrationPatch {
    pub identity_dni: Option<String>,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub balance: Option<BigDecimal>,
}

// ============ API Models ============

/// Body of `POST /v1/bank/`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegrationRequest {
    #[schema(example = "12345678")]
    pub identity_dni: Option<String>,
    #[schema(example = "ACC-1")]
    pub account_number: Option<String>,
    #[schema(example = "SAVINGS")]
    pub account_type: Option<String>,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub balance: Option<BigDecimal>,
}

impl CreateIntegrationRequest {
    /// Checks required fields and length limits, producing the record to store.
    pub fn validate(self) -> Result<NewBankIntegration, AppError> {
        let identity_dni = require("identityDni", self.identity_dni)?;
        let account_number = require("accountNumber", self.account_number)?;
        let account_type = require("accountType", self.account_type)?;
        let balance = self
            .balance
            .ok_or_else(|| AppError::BadRequest("balance is required".to_string()))?;

        check_text("identityDni", &identity_dni, IDENTITY_DNI_MAX_LEN)?;
        check_text("accountNumber", &account_number, ACCOUNT_FIELD_MAX_LEN)?;
        check_text("accountType", &account_type, ACCOUNT_FIELD_MAX_LEN)?;

        Ok(NewBankIntegration {
            identity_dni,
            account_number,
            account_type,
            balance,
        })
    }
}

/// Body of `PUT /v1/bank/{id}`. Only the supplied fields are replaced.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntegrationRequest {
    pub identity_dni: Option<String>,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    #[schema(value_type = Option<String>, example = "50.00")]
    pub balance: Option<BigDecimal>,
}

impl UpdateIntegrationRequest {
    pub fn validate(self) -> Result<BankIntegrationPatch, AppError> {
        if let Some(ref dni) = self.identity_dni {
            check_text("identityDni", dni, IDENTITY_DNI_MAX_LEN)?;
        }
        if let Some(ref number) = self.account_number {
            check_text("accountNumber", number, ACCOUNT_FIELD_MAX_LEN)?;
        }
        if let Some(ref kind) = self.account_type {
            check_text("accountType", kind, ACCOUNT_FIELD_MAX_LEN)?;
        }

        Ok(BankIntegrationPatch {
            identity_dni: self.identity_dni,
            account_number: self.account_number,
            account_type: self.account_type,
            balance: self.balance,
        })
    }
}

/// Public view of a record. Internal flags are not part of it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResponse {
    pub id: String,
    pub identity_dni: String,
    pub account_number: String,
    pub account_type: String,
    #[schema(value_type = String, example = "100.00")]
    pub balance: BigDecimal,
    pub date_register: NaiveDate,
}

impl From<BankIntegration> for IntegrationResponse {
    fn from(record: BankIntegration) -> Self {
        Self {
            id: record.id,
            identity_dni: record.identity_dni,
            account_number: record.account_number,
            account_type: record.account_type,
            balance: record.balance,
            date_register: record.date_register,
        }
    }
}

fn require(field: &str, value: Option<String>) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

fn check_text(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}
