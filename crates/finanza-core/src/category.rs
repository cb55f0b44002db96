//! Static category catalog
//!
//! Categories are not user-editable. Exactly one entry is the income category,
//! which never appears in expense breakdowns; one entry may be designated as the
//! fallback used to display (and aggregate) transactions whose category id is
//! not in the catalog.

use serde::{Deserialize, Serialize};

/// Id of the income entry in the default catalog
pub const INCOME_CATEGORY_ID: &str = "income";

/// Id of the fallback entry in the default catalog
pub const FALLBACK_CATEGORY_ID: &str = "others";

/// A fixed classification label with display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
}

impl Category {
    pub fn new(id: &str, name: &str, icon: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }
}

/// Ordered category catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
    income_id: String,
    fallback_id: Option<String>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::new(
            vec![
                Category::new("housing", "Housing", "🏠", "#3b82f6"),
                Category::new("food", "Food", "🍕", "#ef4444"),
                Category::new("transport", "Transport", "🚗", "#10b981"),
                Category::new("entertainment", "Entertainment", "🎮", "#8b5cf6"),
                Category::new("health", "Health", "🏥", "#f59e0b"),
                Category::new("education", "Education", "📚", "#6366f1"),
                Category::new(INCOME_CATEGORY_ID, "Income", "💰", "#22c55e"),
                Category::new(FALLBACK_CATEGORY_ID, "Others", "📦", "#94a3b8"),
            ],
            INCOME_CATEGORY_ID,
            Some(FALLBACK_CATEGORY_ID),
        )
    }
}

impl CategoryCatalog {
    /// Create a catalog. `fallback_id` of `None` means expenses in unknown
    /// categories are left out of breakdowns.
    pub fn new(categories: Vec<Category>, income_id: &str, fallback_id: Option<&str>) -> Self {
        Self {
            categories,
            income_id: income_id.to_string(),
            fallback_id: fallback_id.map(str::to_string),
        }
    }

    /// All entries in catalog order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn income_id(&self) -> &str {
        &self.income_id
    }

    pub fn fallback_id(&self) -> Option<&str> {
        self.fallback_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn is_income(&self, id: &str) -> bool {
        self.income_id == id
    }

    /// Expense categories in catalog order (everything but the income entry)
    pub fn expense_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(move |c| !self.is_income(&c.id))
    }

    /// Display lookup: unknown ids resolve to the fallback entry, or the last
    /// catalog entry when no fallback is designated
    pub fn resolve(&self, id: &str) -> Option<&Category> {
        self.get(id)
            .or_else(|| self.fallback_id().and_then(|f| self.get(f)))
            .or_else(|| self.categories.last())
    }

    /// Id of the breakdown bucket an expense in `category_id` belongs to.
    ///
    /// Known expense categories map to themselves. Unknown ids, and the income
    /// id used on an expense, map to the fallback entry if there is one.
    pub fn expense_bucket<'a>(&'a self, category_id: &'a str) -> Option<&'a str> {
        if !self.is_income(category_id) && self.get(category_id).is_some() {
            return Some(category_id);
        }
        self.fallback_id()
    }
}
