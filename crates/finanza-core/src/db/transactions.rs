//! Transaction operations

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::params;
use rusqlite::types::Type;
use uuid::Uuid;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionType};
use crate::money::Amount;
use crate::store::TransactionStore;

const SELECT_COLUMNS: &str = "SELECT id, date, description, amount_cents, type, category FROM transactions";

fn conversion_error(column: usize, kind: Type, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(err))
}

impl Database {
    /// Insert a transaction for `owner`, assigning a fresh id
    pub fn insert_transaction(&self, owner: Option<&str>, tx: &NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            r#"
            INSERT INTO transactions (id, user_id, date, description, amount_cents, type, category)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                id,
                owner,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.description,
                tx.amount.cents(),
                tx.kind.as_str(),
                tx.category,
            ],
        )?;

        Ok(tx.clone().into_transaction(id))
    }

    /// List transactions for `owner`, most recent first
    ///
    /// `None` selects the records written without a signed-in user.
    pub fn list_transactions(&self, owner: Option<&str>) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id IS ? ORDER BY date DESC, created_at DESC, rowid DESC",
            SELECT_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![owner], |row| Self::row_to_transaction(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transactions)
    }

    /// Get a single transaction, scoped to its owner
    pub fn get_transaction(&self, owner: Option<&str>, id: &str) -> Result<Option<Transaction>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE id = ? AND user_id IS ?",
            SELECT_COLUMNS
        ))?;

        let transaction = stmt
            .query_row(params![id, owner], |row| Self::row_to_transaction(row))
            .optional()?;

        Ok(transaction)
    }

    /// Delete a transaction owned by `owner`
    ///
    /// A row that exists but belongs to someone else is reported as not found.
    pub fn delete_transaction(&self, owner: Option<&str>, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id IS ?",
            params![id, owner],
        )?;

        if deleted == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    /// Count transactions for `owner`
    pub fn count_transactions(&self, owner: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id IS ?",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Helper to convert a row to Transaction
    /// Column order: id, date, description, amount_cents, type, category
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(1)?;
        let cents: i64 = row.get(3)?;
        let kind_str: String = row.get(4)?;

        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            conversion_error(1, Type::Text, Error::InvalidData(format!("date {}: {}", date_str, e)))
        })?;
        let amount = Amount::from_cents(cents).map_err(|e| conversion_error(3, Type::Integer, e))?;
        let kind: TransactionType = kind_str
            .parse()
            .map_err(|e: String| conversion_error(4, Type::Text, Error::InvalidData(e)))?;

        Ok(Transaction {
            id: row.get(0)?,
            description: row.get(2)?,
            amount,
            kind,
            category: row.get(5)?,
            date,
        })
    }
}

#[async_trait]
impl TransactionStore for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Transaction>> {
        self.list_transactions(owner)
    }

    async fn insert(&self, owner: Option<&str>, tx: NewTransaction) -> Result<Transaction> {
        self.insert_transaction(owner, &tx)
    }

    async fn delete(&self, owner: Option<&str>, id: &str) -> Result<()> {
        self.delete_transaction(owner, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tx(description: &str, cents: i64, kind: TransactionType, date: &str) -> NewTransaction {
        NewTransaction {
            description: description.to_string(),
            amount: Amount::from_cents(cents).unwrap(),
            kind,
            category: match kind {
                TransactionType::Income => "income".to_string(),
                TransactionType::Expense => "food".to_string(),
            },
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn create_user(db: &Database, email: &str) -> String {
        db.create_user(email, "not-a-real-hash").unwrap().id
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::in_memory().unwrap();
        let user = create_user(&db, "ana@example.com");

        let salary = db
            .insert_transaction(
                Some(&user),
                &new_tx("Salary", 500_000, TransactionType::Income, "2024-05-01"),
            )
            .unwrap();
        db.insert_transaction(
            Some(&user),
            &new_tx("Groceries", 60_000, TransactionType::Expense, "2024-05-10"),
        )
        .unwrap();

        assert!(Uuid::parse_str(&salary.id).is_ok());

        let listed = db.list_transactions(Some(&user)).unwrap();
        assert_eq!(listed.len(), 2);
        // Most recent date first
        assert_eq!(listed[0].description, "Groceries");
        assert_eq!(listed[1], salary);
        assert_eq!(listed[1].amount.cents(), 500_000);
    }

    #[test]
    fn test_owners_are_isolated() {
        let db = Database::in_memory().unwrap();
        let ana = create_user(&db, "ana@example.com");
        let bruno = create_user(&db, "bruno@example.com");

        let tx = db
            .insert_transaction(
                Some(&ana),
                &new_tx("Rent", 150_000, TransactionType::Expense, "2024-05-05"),
            )
            .unwrap();
        db.insert_transaction(None, &new_tx("Cash", 1_000, TransactionType::Income, "2024-05-06"))
            .unwrap();

        assert_eq!(db.count_transactions(Some(&ana)).unwrap(), 1);
        assert_eq!(db.count_transactions(Some(&bruno)).unwrap(), 0);
        assert_eq!(db.count_transactions(None).unwrap(), 1);
        assert!(db.get_transaction(Some(&bruno), &tx.id).unwrap().is_none());

        // Bruno cannot delete Ana's transaction
        assert!(matches!(
            db.delete_transaction(Some(&bruno), &tx.id),
            Err(Error::NotFound(_))
        ));
        assert!(db.get_transaction(Some(&ana), &tx.id).unwrap().is_some());
    }

    #[test]
    fn test_delete() {
        let db = Database::in_memory().unwrap();
        let tx = db
            .insert_transaction(None, &new_tx("Fuel", 30_000, TransactionType::Expense, "2024-05-12"))
            .unwrap();

        db.delete_transaction(None, &tx.id).unwrap();
        assert_eq!(db.count_transactions(None).unwrap(), 0);
        assert!(matches!(
            db.delete_transaction(None, &tx.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT INTO transactions (id, user_id, date, description, amount_cents, type, category)
             VALUES ('x', NULL, 'not-a-date', 'Broken', 100, 'EXPENSE', 'food')",
            [],
        )
        .unwrap();
        drop(conn);

        assert!(db.list_transactions(None).is_err());
    }

    #[tokio::test]
    async fn test_store_trait() {
        let db = Database::in_memory().unwrap();
        let store: &dyn TransactionStore = &db;

        let tx = store
            .insert(None, new_tx("Course", 20_000, TransactionType::Expense, "2024-05-20"))
            .await
            .unwrap();
        assert_eq!(store.list(None).await.unwrap(), vec![tx.clone()]);
        store.delete(None, &tx.id).await.unwrap();
        assert!(store.list(None).await.unwrap().is_empty());
    }
}
