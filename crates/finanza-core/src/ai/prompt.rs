//! Insight prompt construction

use crate::models::{Transaction, TransactionType};

/// Number of insights requested from the model
pub const INSIGHT_COUNT: usize = 3;

/// Currency symbol shown to the model next to every amount (Brazilian real)
pub const CURRENCY_LABEL: &str = "R$";

/// One prompt line per transaction:
/// `2024-05-05: Rent - R$ 1500.00 (Expense, Category: housing)`
pub fn describe_transaction(tx: &Transaction) -> String {
    let kind = match tx.kind {
        TransactionType::Income => "Income",
        TransactionType::Expense => "Expense",
    };
    format!(
        "{}: {} - {} {} ({}, Category: {})",
        tx.date.format("%Y-%m-%d"),
        tx.description,
        CURRENCY_LABEL,
        tx.amount,
        kind,
        tx.category
    )
}

/// Build the insight request prompt for a list of transactions
pub fn build_insight_prompt(transactions: &[Transaction]) -> String {
    let context = transactions
        .iter()
        .map(describe_transaction)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze the following financial transactions and give {count} personalized insights or tips to help the user save money or manage it better.

Transactions:
{context}

Respond strictly in JSON: an array of objects shaped like
{{"title": string, "message": string, "type": "TIP" | "WARNING" | "OPPORTUNITY"}}"#,
        count = INSIGHT_COUNT,
        context = context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::demo_transactions;

    #[test]
    fn test_describe_transaction() {
        let txs = demo_transactions();
        assert_eq!(
            describe_transaction(&txs[0]),
            "2024-05-01: Monthly salary - R$ 5000.00 (Income, Category: income)"
        );
        assert_eq!(
            describe_transaction(&txs[1]),
            "2024-05-05: Rent - R$ 1500.00 (Expense, Category: housing)"
        );
    }

    #[test]
    fn test_prompt_lists_every_transaction() {
        let txs = demo_transactions();
        let prompt = build_insight_prompt(&txs);
        for tx in &txs {
            assert!(prompt.contains(&describe_transaction(tx)));
        }
        assert_eq!(prompt.matches("R$ ").count(), txs.len());
        assert!(prompt.contains("3 personalized insights"));
        assert!(prompt.contains("\"OPPORTUNITY\""));
    }
}
