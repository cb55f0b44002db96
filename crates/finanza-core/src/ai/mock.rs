//! Mock backend for testing
//!
//! Derives predictable insights from the transactions themselves.
//! Useful for unit tests and development without an AI service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{AIInsight, InsightType, Transaction, TransactionType};
use crate::money::{format_cents, Total};

use super::InsightGenerator;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true and generation should succeed
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock backend; generation fails
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }
}

#[async_trait]
impl InsightGenerator for MockBackend {
    async fn generate_insights(&self, transactions: &[Transaction]) -> Result<Vec<AIInsight>> {
        if !self.healthy {
            return Err(Error::InvalidData("Mock backend is unhealthy".into()));
        }

        let mut income: Total = 0;
        let mut expenses: Total = 0;
        let mut by_category: HashMap<&str, Total> = HashMap::new();
        for tx in transactions {
            let amount = Total::from(tx.amount.cents());
            match tx.kind {
                TransactionType::Income => income += amount,
                TransactionType::Expense => {
                    expenses += amount;
                    *by_category.entry(tx.category.as_str()).or_insert(0) += amount;
                }
            }
        }

        let top = by_category
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)));

        let balance_insight = if expenses > income {
            AIInsight {
                title: "Spending exceeds income".to_string(),
                message: format!(
                    "Expenses of {} are above income of {}.",
                    format_cents(expenses),
                    format_cents(income)
                ),
                kind: InsightType::Warning,
            }
        } else {
            AIInsight {
                title: "Positive balance".to_string(),
                message: format!(
                    "You kept {} this period. Consider saving part of it.",
                    format_cents(income - expenses)
                ),
                kind: InsightType::Opportunity,
            }
        };

        let category_insight = match top {
            Some((category, cents)) => AIInsight {
                title: "Largest expense category".to_string(),
                message: format!("{} accounts for {} of spending.", category, format_cents(cents)),
                kind: InsightType::Tip,
            },
            None => AIInsight {
                title: "No expenses yet".to_string(),
                message: "Record your expenses to see where your money goes.".to_string(),
                kind: InsightType::Tip,
            },
        };

        Ok(vec![
            balance_insight,
            category_insight,
            AIInsight {
                title: "Track consistently".to_string(),
                message: format!("{} transactions recorded so far.", transactions.len()),
                kind: InsightType::Tip,
            },
        ])
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
