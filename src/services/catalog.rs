//! Generic CRUD over the catalog documents.
//!
//! Each document kind implements [`Resource`]: how to build it from its
//! input, which capabilities guard it and which references must exist
//! before it is written. The operations below are shared by every kind.

use crate::access::{Caller, Capability, Role};
use crate::domain::ValidationError;
use crate::error::{ApiError, ErrorCode};
use crate::model::{
    ExpenseCategory, ExpenseCategoryInput, Fertilizer, FertilizerInput, Field, FieldInput,
    InventoryItem, InventoryItemInput, OwnershipShare, Product, ProductCategory,
    ProductCategoryInput, ProductInput, Season, SeasonInput, User, UserInput, Well, WellInput,
    ensure_complete,
};
use crate::state::AppState;
use crate::store::Document;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

#[async_trait]
pub trait Resource: Document {
    type Input: DeserializeOwned + Send + 'static;

    /// Singular name used in messages and logs.
    const KIND: &'static str;
    const READ: Capability;
    const WRITE: Capability;

    fn build(
        input: Self::Input,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError>;

    /// Cross-document rules checked against the store before a write.
    async fn check_integrity(&self, _state: &AppState) -> Result<(), ApiError> {
        Ok(())
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

pub async fn list<R: Resource>(state: &AppState) -> Result<Vec<R>, ApiError> {
    Ok(state.repo::<R>().list().await?)
}

pub async fn get<R: Resource>(state: &AppState, id: &str) -> Result<R, ApiError> {
    state
        .repo::<R>()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::missing(R::KIND, id))
}

pub async fn create<R: Resource>(state: &AppState, input: R::Input) -> Result<R, ApiError> {
    let document = R::build(input, None, Utc::now())?;
    document.check_integrity(state).await?;
    state.repo::<R>().insert(&document).await?;
    info!(kind = R::KIND, id = document.document_id(), "document created");
    Ok(document)
}

/// Replaces a document wholesale, keeping its id and creation time.
pub async fn update<R: Resource>(
    state: &AppState,
    id: &str,
    input: R::Input,
) -> Result<R, ApiError> {
    let existing = get::<R>(state, id).await?;
    let document = R::build(input, Some(&existing), Utc::now())?;
    document.check_integrity(state).await?;
    if !state.repo::<R>().replace(&document).await? {
        return Err(ApiError::missing(R::KIND, id));
    }
    info!(kind = R::KIND, id, "document updated");
    Ok(document)
}

/// Deletes without cascading; records keep the names they copied.
pub async fn delete<R: Resource>(state: &AppState, id: &str) -> Result<(), ApiError> {
    if !state.repo::<R>().delete(id).await? {
        return Err(ApiError::missing(R::KIND, id));
    }
    info!(kind = R::KIND, id, "document deleted");
    Ok(())
}

// =============================================================================
// INVENTORY QUERIES
// =============================================================================

/// Distinct sub-categories used within `category`, in first-seen order.
pub async fn inventory_subcategories(
    state: &AppState,
    category: Option<&str>,
) -> Result<Vec<String>, ApiError> {
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(ValidationError::Missing("category"))?;

    let items = state.repo::<InventoryItem>().list().await?;
    let subcategories: IndexSet<String> = items
        .into_iter()
        .filter(|item| item.category == category)
        .filter_map(|item| item.sub_category)
        .collect();
    debug!(category, count = subcategories.len(), "sub-categories listed");
    Ok(subcategories.into_iter().collect())
}

/// Items visible to the caller: everything for an admin, co-owned items
/// for a partner.
pub async fn inventory_for(
    state: &AppState,
    caller: &Caller,
) -> Result<Vec<InventoryItem>, ApiError> {
    let items = state.repo::<InventoryItem>().list().await?;
    if caller.is(Role::Admin) {
        return Ok(items);
    }
    Ok(items
        .into_iter()
        .filter(|item| item.owned_by(caller.user_id.as_str()))
        .collect())
}

/// Products growing on `field_id`; 404 when the field is unknown.
pub async fn field_products(state: &AppState, field_id: &str) -> Result<Vec<Product>, ApiError> {
    get::<Field>(state, field_id).await?;
    let products = state.repo::<Product>().list().await?;
    Ok(products
        .into_iter()
        .filter(|product| product.field_id.as_ref().is_some_and(|id| id.as_str() == field_id))
        .collect())
}

// =============================================================================
// REFERENCE CHECKS
// =============================================================================

async fn ensure_exists<T: Document>(
    state: &AppState,
    field: &'static str,
    id: &str,
) -> Result<(), ApiError> {
    if state.repo::<T>().exists(id).await? {
        Ok(())
    } else {
        Err(ValidationError::UnknownReference {
            field,
            id: id.to_string(),
        }
        .into())
    }
}

async fn ensure_owners(state: &AppState, owners: &[OwnershipShare]) -> Result<(), ApiError> {
    for owner in owners {
        ensure_exists::<User>(state, "owners", owner.user_id.as_str()).await?;
    }
    if state.config.strict_ownership {
        ensure_complete(owners)?;
    }
    Ok(())
}

// =============================================================================
// RESOURCES
// =============================================================================

#[async_trait]
impl Resource for Field {
    type Input = FieldInput;
    const KIND: &'static str = "field";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: FieldInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_field(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        if let Some(well) = &self.well_id {
            ensure_exists::<Well>(state, "wellId", well.as_str()).await?;
        }
        if let Some(season) = &self.season_id {
            ensure_exists::<Season>(state, "seasonId", season.as_str()).await?;
        }
        ensure_owners(state, &self.owners).await
    }
}

#[async_trait]
impl Resource for InventoryItem {
    type Input = InventoryItemInput;
    const KIND: &'static str = "inventory item";
    const READ: Capability = Capability::ViewAssets;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: InventoryItemInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_item(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        ensure_owners(state, &self.owners).await
    }
}

#[async_trait]
impl Resource for Well {
    type Input = WellInput;
    const KIND: &'static str = "well";
    const READ: Capability = Capability::ViewAssets;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: WellInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_well(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        if let Some(user) = &self.responsible_user_id {
            ensure_exists::<User>(state, "responsibleUserId", user.as_str()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for Season {
    type Input = SeasonInput;
    const KIND: &'static str = "season";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: SeasonInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_season(existing, now)
    }
}

#[async_trait]
impl Resource for Product {
    type Input = ProductInput;
    const KIND: &'static str = "product";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: ProductInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_product(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        if let Some(field) = &self.field_id {
            ensure_exists::<Field>(state, "fieldId", field.as_str()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for Fertilizer {
    type Input = FertilizerInput;
    const KIND: &'static str = "fertilizer";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: FertilizerInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_fertilizer(existing, now)
    }
}

#[async_trait]
impl Resource for ExpenseCategory {
    type Input = ExpenseCategoryInput;
    const KIND: &'static str = "expense category";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: ExpenseCategoryInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_category(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        if let Some(parent) = &self.parent_category_id {
            ensure_exists::<ExpenseCategory>(state, "parentCategoryId", parent.as_str()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for ProductCategory {
    type Input = ProductCategoryInput;
    const KIND: &'static str = "category";
    const READ: Capability = Capability::ViewCatalog;
    const WRITE: Capability = Capability::ManageCatalog;

    fn build(
        input: ProductCategoryInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_category(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        if let Some(parent) = &self.parent_id {
            ensure_exists::<ProductCategory>(state, "parentId", parent.as_str()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for User {
    type Input = UserInput;
    const KIND: &'static str = "user";
    const READ: Capability = Capability::ManageUsers;
    const WRITE: Capability = Capability::ManageUsers;

    fn build(
        input: UserInput,
        existing: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        input.into_user(existing, now)
    }

    async fn check_integrity(&self, state: &AppState) -> Result<(), ApiError> {
        let users = state.repo::<User>().list().await?;
        let taken = users
            .iter()
            .any(|other| other.id != self.id && other.email == self.email);
        if taken {
            return Err(ApiError::builder(ErrorCode::Conflict)
                .message(format!("email '{}' is already registered", self.email))
                .resource(Self::KIND)
                .field("email")
                .build());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    fn state(strict: bool) -> AppState {
        let config = ServerConfig {
            strict_ownership: strict,
            ..ServerConfig::in_memory()
        };
        AppState::new(config, Arc::new(MemoryStore::new()))
    }

    fn input<T: DeserializeOwned>(body: serde_json::Value) -> T {
        serde_json::from_value(body).unwrap()
    }

    async fn user(state: &AppState, name: &str) -> User {
        create::<User>(
            state,
            input(json!({"name": name, "email": format!("{name}@farm.example"), "role": "Ortak"})),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn crud_cycle_keeps_identity() {
        let state = state(false);
        let created = create::<Fertilizer>(
            &state,
            input(json!({"name": "Urea", "kind": "Solid", "unit": "Ton", "price": 10})),
        )
        .await
        .unwrap();

        let updated = update::<Fertilizer>(
            &state,
            created.id.as_str(),
            input(json!({"name": "Urea 46", "kind": "Solid", "unit": "Ton", "price": 12})),
        )
        .await
        .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(get::<Fertilizer>(&state, created.id.as_str()).await.unwrap().name, "Urea 46");
        assert_eq!(list::<Fertilizer>(&state).await.unwrap().len(), 1);

        delete::<Fertilizer>(&state, created.id.as_str()).await.unwrap();
        let err = get::<Fertilizer>(&state, created.id.as_str()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = delete::<Fertilizer>(&state, created.id.as_str()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let state = state(false);
        let err = update::<Season>(&state, "nope", input(json!({"year": 2024})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn references_must_exist() {
        let state = state(false);
        let field = input(json!({"name": "North", "size": 5, "wellId": "w-x"}));
        let err = create::<Field>(&state, field).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.context.field.as_deref(), Some("wellId"));

        let err = create::<Field>(
            &state,
            input(json!({
                "name": "North",
                "size": 5,
                "owners": [{"userId": "ghost", "percentage": 100}]
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("owners"));

        let err = create::<ExpenseCategory>(
            &state,
            input(json!({"name": "Diesel", "parentCategoryId": "missing"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("parentCategoryId"));
    }

    #[tokio::test]
    async fn product_categories_need_an_existing_parent() {
        let state = state(false);
        let orphan = input(json!({"name": "Wheat", "parent": "gone"}));
        let err = create::<ProductCategory>(&state, orphan).await.unwrap_err();
        assert_eq!(err.context.field.as_deref(), Some("parentId"));

        let grain = create::<ProductCategory>(&state, input(json!({"name": "Grain"})))
            .await
            .unwrap();
        let wheat = create::<ProductCategory>(
            &state,
            input(json!({"name": "Wheat", "parent": grain.id.as_str()})),
        )
        .await
        .unwrap();
        assert!(wheat.is_subcategory);
    }

    #[tokio::test]
    async fn field_products_are_filtered_by_field() {
        let state = state(false);
        let north = create::<Field>(&state, input(json!({"name": "North", "size": 5})))
            .await
            .unwrap();
        for (name, field) in [("Wheat", Some(north.id.as_str())), ("Barley", None)] {
            create::<Product>(
                &state,
                input(json!({"name": name, "category": "Grain", "unit": "ton", "fieldId": field})),
            )
            .await
            .unwrap();
        }

        let products = field_products(&state, north.id.as_str()).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Wheat");
        assert_matches!(
            field_products(&state, "nowhere").await,
            Err(ApiError { code: ErrorCode::NotFound, .. })
        );
    }

    #[tokio::test]
    async fn ownership_sum_is_enforced_only_when_strict() {
        for strict in [false, true] {
            let state = state(strict);
            let a = user(&state, "a").await;
            let result = create::<Field>(
                &state,
                input(json!({
                    "name": "West",
                    "size": 8,
                    "owners": [{"userId": a.id.as_str(), "percentage": 50}]
                })),
            )
            .await;
            assert_eq!(result.is_err(), strict);
        }
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let state = state(false);
        let first = user(&state, "ali").await;
        let err = create::<User>(
            &state,
            input(json!({"name": "Ali 2", "email": "ALI@farm.example", "role": "worker"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        // Re-saving the same user with its own email is fine.
        let again = update::<User>(
            &state,
            first.id.as_str(),
            input(json!({"name": "Ali", "email": "ali@farm.example", "role": "Admin"})),
        )
        .await
        .unwrap();
        assert_eq!(again.role, Role::Admin);
    }

    #[tokio::test]
    async fn subcategories_are_distinct_per_category() {
        let state = state(false);
        for (category, sub) in [
            ("Equipment", Some("Tillage")),
            ("Equipment", Some("Spraying")),
            ("Equipment", Some("Tillage")),
            ("Equipment", None),
            ("Material", Some("Seed")),
        ] {
            create::<InventoryItem>(
                &state,
                input(json!({"name": "x", "category": category, "subCategory": sub})),
            )
            .await
            .unwrap();
        }

        let subs = inventory_subcategories(&state, Some("Equipment")).await.unwrap();
        assert_eq!(subs, vec!["Tillage".to_string(), "Spraying".to_string()]);
        assert_matches!(
            inventory_subcategories(&state, Some(" ")).await,
            Err(ApiError { code: ErrorCode::ValidationError, .. })
        );
    }

    #[tokio::test]
    async fn partners_see_only_co_owned_inventory() {
        let state = state(false);
        let a = user(&state, "a").await;
        let b = user(&state, "b").await;
        create::<InventoryItem>(
            &state,
            input(json!({
                "name": "Plough",
                "category": "Equipment",
                "owners": [{"userId": a.id.as_str(), "percentage": 100}]
            })),
        )
        .await
        .unwrap();
        create::<InventoryItem>(
            &state,
            input(json!({
                "name": "Harrow",
                "category": "Equipment",
                "owners": [{"userId": b.id.as_str(), "percentage": 100}]
            })),
        )
        .await
        .unwrap();

        let partner = Caller::new(a.id.clone(), Role::Ortak);
        let mine = inventory_for(&state, &partner).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Plough");

        let admin = Caller::new(b.id.clone(), Role::Admin);
        assert_eq!(inventory_for(&state, &admin).await.unwrap().len(), 2);
    }
}
