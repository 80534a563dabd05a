//! Domain primitives shared by the model, the allocation calculator and the
//! HTTP layer.

pub mod value_objects;

pub use value_objects::{
    ExpenseCategoryId, FertilizerId, FieldId, FuelConsumptionId, InventoryItemId,
    ProductCategoryId, ProductId, RecordId, SeasonId, UserId, ValidationError, WellId,
    non_negative, optional_text, percentage, positive, required_text,
};
