//! Financial summary aggregation
//!
//! Pure functions over an in-memory transaction list. The summary is derived
//! state: it is recomputed on every change to the list and never persisted.

use std::collections::HashMap;

use chrono::Datelike;
use serde::Serialize;

use crate::category::CategoryCatalog;
use crate::models::{Transaction, TransactionType};
use crate::money::{serialize_units, Total};

/// Expense total for one catalog category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub id: String,
    pub name: String,
    #[serde(serialize_with = "serialize_units")]
    pub value: Total,
    pub color: String,
}

/// Aggregate view of a set of transactions.
///
/// `monthly_income` and `monthly_expenses` are totals over whatever set was
/// summarized; use [`summarize_month`] to restrict them to a calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    #[serde(serialize_with = "serialize_units")]
    pub total_balance: Total,
    #[serde(serialize_with = "serialize_units")]
    pub monthly_income: Total,
    #[serde(serialize_with = "serialize_units")]
    pub monthly_expenses: Total,
    pub categories_breakdown: Vec<CategoryBreakdown>,
}

impl FinancialSummary {
    /// Sum of all breakdown values
    pub fn breakdown_total(&self) -> Total {
        self.categories_breakdown.iter().map(|c| c.value).sum()
    }
}

/// Summarize transactions against a category catalog.
///
/// Single pass. Income adds to balance and income; expenses subtract from the
/// balance, add to expenses and to their category bucket. The breakdown lists
/// every non-income catalog entry in catalog order, zero or not. Expenses whose
/// category has no bucket go to the catalog's fallback entry, or nowhere if the
/// catalog has none (they still count toward expenses and balance).
///
/// Totals are accumulated as [`Total`], so no list of valid amounts overflows.
pub fn summarize<'a, I>(transactions: I, catalog: &CategoryCatalog) -> FinancialSummary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut balance: Total = 0;
    let mut income: Total = 0;
    let mut expenses: Total = 0;
    let mut by_category: HashMap<&str, Total> = HashMap::new();

    for tx in transactions {
        let amount = Total::from(tx.amount.cents());
        match tx.kind {
            TransactionType::Income => {
                balance += amount;
                income += amount;
            }
            TransactionType::Expense => {
                balance -= amount;
                expenses += amount;
                if let Some(bucket) = catalog.expense_bucket(&tx.category) {
                    *by_category.entry(bucket).or_insert(0) += amount;
                }
            }
        }
    }

    let categories_breakdown = catalog
        .expense_categories()
        .map(|c| CategoryBreakdown {
            id: c.id.clone(),
            name: c.name.clone(),
            value: by_category.get(c.id.as_str()).copied().unwrap_or(0),
            color: c.color.clone(),
        })
        .collect();

    FinancialSummary {
        total_balance: balance,
        monthly_income: income,
        monthly_expenses: expenses,
        categories_breakdown,
    }
}

/// Summarize only the transactions dated within the given calendar month
pub fn summarize_month(
    transactions: &[Transaction],
    catalog: &CategoryCatalog,
    year: i32,
    month: u32,
) -> FinancialSummary {
    summarize(
        transactions
            .iter()
            .filter(|tx| tx.date.year() == year && tx.date.month() == month),
        catalog,
    )
}
