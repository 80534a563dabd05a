use super::{optional_ref, required};
use crate::domain::{ProductCategoryId, ValidationError, required_text};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Crop category; subcategories point at their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub id: ProductCategoryId,
    pub name: String,
    pub is_subcategory: bool,
    pub parent_id: Option<ProductCategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ProductCategory {
    const COLLECTION: &'static str = "categories";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategoryInput {
    pub name: Option<String>,
    pub is_subcategory: Option<bool>,
    #[serde(alias = "parent")]
    pub parent_id: Option<String>,
}

impl ProductCategoryInput {
    /// `isSubcategory` defaults to whether a parent is given.
    pub fn into_category(
        self,
        existing: Option<&ProductCategory>,
        now: DateTime<Utc>,
    ) -> Result<ProductCategory, ValidationError> {
        let id = existing.map_or_else(ProductCategoryId::generate, |c| c.id.clone());
        let parent_id = optional_ref(self.parent_id, ProductCategoryId::new)?;
        if parent_id.as_ref() == Some(&id) {
            return Err(ValidationError::invalid(
                "parentId",
                "a category cannot be its own parent",
            ));
        }
        let is_subcategory = self.is_subcategory.unwrap_or(parent_id.is_some());
        if !is_subcategory && parent_id.is_some() {
            return Err(ValidationError::invalid(
                "isSubcategory",
                "a category with a parent is a subcategory",
            ));
        }

        Ok(ProductCategory {
            name: required_text("name", &required("name", self.name)?)?,
            is_subcategory,
            parent_id,
            created_at: existing.map_or(now, |c| c.created_at),
            updated_at: now,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> ProductCategoryInput {
        ProductCategoryInput {
            name: Some(name.to_string()),
            ..ProductCategoryInput::default()
        }
    }

    #[test]
    fn parent_marks_a_subcategory() {
        let now = Utc::now();
        let grain = named("Grain").into_category(None, now).unwrap();
        assert!(!grain.is_subcategory);

        let wheat = ProductCategoryInput {
            parent_id: Some(grain.id.to_string()),
            ..named("Wheat")
        }
        .into_category(None, now)
        .unwrap();
        assert!(wheat.is_subcategory);
        assert_eq!(wheat.parent_id, Some(grain.id));
    }

    #[test]
    fn parent_contradicting_the_flag_is_rejected() {
        let err = ProductCategoryInput {
            is_subcategory: Some(false),
            parent_id: Some("grain".to_string()),
            ..named("Wheat")
        }
        .into_category(None, Utc::now())
        .unwrap_err();
        assert_eq!(err.field(), "isSubcategory");
    }

    #[test]
    fn category_cannot_parent_itself() {
        let now = Utc::now();
        let grain = named("Grain").into_category(None, now).unwrap();
        let err = ProductCategoryInput {
            parent_id: Some(grain.id.to_string()),
            ..named("Grain")
        }
        .into_category(Some(&grain), now)
        .unwrap_err();
        assert_eq!(err.field(), "parentId");
    }
}
