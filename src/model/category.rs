use super::{optional_ref, required};
use crate::domain::{ExpenseCategoryId, ValidationError, optional_text, required_text};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node of the expense category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    pub id: ExpenseCategoryId,
    pub name: String,
    pub parent_category_id: Option<ExpenseCategoryId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ExpenseCategory {
    const COLLECTION: &'static str = "expense_categories";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategoryInput {
    pub name: Option<String>,
    #[serde(alias = "parentCategory")]
    pub parent_category_id: Option<String>,
    pub description: Option<String>,
}

impl ExpenseCategoryInput {
    pub fn into_category(
        self,
        existing: Option<&ExpenseCategory>,
        now: DateTime<Utc>,
    ) -> Result<ExpenseCategory, ValidationError> {
        let id = existing.map_or_else(ExpenseCategoryId::generate, |c| c.id.clone());
        let parent_category_id = optional_ref(self.parent_category_id, ExpenseCategoryId::new)?;
        if parent_category_id.as_ref() == Some(&id) {
            return Err(ValidationError::invalid(
                "parentCategoryId",
                "a category cannot be its own parent",
            ));
        }

        Ok(ExpenseCategory {
            name: required_text("name", &required("name", self.name)?)?,
            parent_category_id,
            description: optional_text(self.description),
            created_at: existing.map_or(now, |c| c.created_at),
            updated_at: now,
            id,
        })
    }
}
