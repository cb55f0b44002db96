//! Domain models for Finanza

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{FALLBACK_CATEGORY_ID, INCOME_CATEGORY_ID};
use crate::error::{Error, Result};
use crate::money::Amount;

/// Opaque transaction identifier, assigned by the store
pub type TransactionId = String;

/// Opaque user identifier, assigned by the identity provider
pub type UserId = String;

/// Direction of a transaction. The amount itself is always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded income or expense event.
///
/// Transactions are never edited, only created and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub description: String,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Catalog id; stored as given even if the catalog does not know it
    pub category: String,
    pub date: NaiveDate,
}

/// A validated transaction that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub date: NaiveDate,
}

impl NewTransaction {
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            category: self.category,
            date: self.date,
        }
    }
}

impl From<Transaction> for NewTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            description: tx.description,
            amount: tx.amount,
            kind: tx.kind,
            category: tx.category,
            date: tx.date,
        }
    }
}

/// Raw form submission, validated into a [`NewTransaction`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionDraft {
    #[serde(default)]
    pub description: Option<String>,
    /// Number or numeric string, as typed by the user
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionType>,
    #[serde(default)]
    pub category: Option<String>,
    /// `YYYY-MM-DD`; defaults to today
    #[serde(default)]
    pub date: Option<String>,
}

impl TransactionDraft {
    /// Validate the submission. Nothing partial is produced on error.
    pub fn validate(self, today: NaiveDate) -> Result<NewTransaction> {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::Validation("Description is required".into()))?;

        let amount = match self.amount {
            None | Some(serde_json::Value::Null) => {
                return Err(Error::Validation("Amount is required".into()))
            }
            Some(serde_json::Value::Number(n)) => {
                let value = n
                    .as_f64()
                    .ok_or_else(|| Error::Validation(format!("Invalid amount: {}", n)))?;
                Amount::from_units(value)?
            }
            Some(serde_json::Value::String(s)) => Amount::parse(&s)?,
            Some(other) => {
                return Err(Error::Validation(format!("Invalid amount: {}", other)));
            }
        };

        let kind = self.kind.unwrap_or(TransactionType::Expense);

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| match kind {
                TransactionType::Income => INCOME_CATEGORY_ID.to_string(),
                TransactionType::Expense => FALLBACK_CATEGORY_ID.to_string(),
            });

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => today,
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| Error::Validation(format!("Invalid date: {}", s)))?,
        };

        Ok(NewTransaction {
            description,
            amount,
            kind,
            category,
            date,
        })
    }
}

/// Kind of advisory text produced by the insight generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InsightType {
    Tip,
    Warning,
    Opportunity,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tip => "TIP",
            Self::Warning => "WARNING",
            Self::Opportunity => "OPPORTUNITY",
        }
    }
}

/// A short, non-authoritative tip derived from transaction history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AIInsight {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: InsightType,
}

impl AIInsight {
    /// Generic tip shown whenever the generator cannot produce anything
    pub fn fallback() -> Self {
        Self {
            title: "Today's tip".to_string(),
            message: "Keep your transactions up to date for more accurate analysis.".to_string(),
            kind: InsightType::Tip,
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// An authenticated session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Bearer token; only its hash is stored
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// Session lifecycle events published by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: UserId },
    SignedOut { user_id: UserId },
}
