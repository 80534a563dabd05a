//! Fuel cost allocation.
//!
//! Turns one field-processing event into fuel usage, fuel cost and a
//! per-owner split of that cost:
//!
//! ```text
//! total_fuel_consumption = fuel_consumption_rate * processed_area
//! total_cost             = total_fuel_consumption * fuel_unit_price
//! owner amount           = total_cost * ownership_percentage / 100
//! ```
//!
//! Percentages are used exactly as given. A ledger summing to 80 % therefore
//! distributes only 80 % of the cost; callers that want a complete split must
//! validate the ledger before calling in.

use crate::domain::{UserId, ValidationError, non_negative, percentage};
use serde::{Deserialize, Serialize};

/// One co-owner's share of a field, as submitted with a processing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerShare {
    pub user_id: UserId,
    pub ownership_percentage: f64,
    #[serde(default)]
    pub owner_name: String,
}

/// Inputs of a single allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationInput {
    /// Liters per decare; `None` means the item burns no fuel.
    pub fuel_consumption_rate: Option<f64>,
    pub processed_area: f64,
    pub fuel_unit_price: f64,
    pub owners: Vec<OwnerShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAllocation {
    pub user_id: UserId,
    pub amount: f64,
    pub owner_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub total_fuel_consumption: f64,
    pub total_cost: f64,
    pub distribution: Vec<OwnerAllocation>,
}

impl Allocation {
    /// Sum of all owner amounts. Differs from `total_cost` when the
    /// percentages do not add up to 100.
    pub fn distributed_total(&self) -> f64 {
        self.distribution.iter().map(|entry| entry.amount).sum()
    }
}

/// Fuel used and its cost for one pass over `processed_area`.
pub fn fuel_usage(
    fuel_consumption_rate: Option<f64>,
    processed_area: f64,
    fuel_unit_price: f64,
) -> Result<(f64, f64), ValidationError> {
    let rate = non_negative("fuelConsumptionRate", fuel_consumption_rate.unwrap_or(0.0))?;
    let area = non_negative("processedArea", processed_area)?;
    let price = non_negative("fuelUnitPrice", fuel_unit_price)?;

    let total_fuel_consumption = finite("totalFuelConsumption", rate * area)?;
    let total_cost = finite("totalCost", total_fuel_consumption * price)?;
    Ok((total_fuel_consumption, total_cost))
}

/// Rejects a product of finite inputs that overflowed.
fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

/// Computes fuel usage, cost and the owner split.
///
/// Fails when the owner list is empty or any share is outside `0..=100`.
pub fn allocate(input: &AllocationInput) -> Result<Allocation, ValidationError> {
    if input.owners.is_empty() {
        return Err(ValidationError::NoOwners);
    }
    for owner in &input.owners {
        percentage("ownershipPercentage", owner.ownership_percentage)?;
    }

    let (total_fuel_consumption, total_cost) = fuel_usage(
        input.fuel_consumption_rate,
        input.processed_area,
        input.fuel_unit_price,
    )?;

    let distribution = input
        .owners
        .iter()
        .map(|owner| {
            Ok(OwnerAllocation {
                user_id: owner.user_id.clone(),
                amount: finite("amount", total_cost * owner.ownership_percentage / 100.0)?,
                owner_name: owner.owner_name.clone(),
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    Ok(Allocation {
        total_fuel_consumption,
        total_cost,
        distribution,
    })
}

/// Sum of the ledger's percentages.
pub fn ownership_total(owners: &[OwnerShare]) -> f64 {
    owners.iter().map(|owner| owner.ownership_percentage).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(id: &str, pct: f64) -> OwnerShare {
        OwnerShare {
            user_id: UserId::new(id.to_string()).unwrap(),
            ownership_percentage: pct,
            owner_name: id.to_uppercase(),
        }
    }

    fn input(rate: Option<f64>, area: f64, price: f64, owners: Vec<OwnerShare>) -> AllocationInput {
        AllocationInput {
            fuel_consumption_rate: rate,
            processed_area: area,
            fuel_unit_price: price,
            owners,
        }
    }

    #[test]
    fn rate_area_and_price_multiply_out() {
        let result = allocate(&input(Some(2.5), 10.0, 30.0, vec![owner("a", 100.0)])).unwrap();
        assert_eq!(result.total_fuel_consumption, 25.0);
        assert_eq!(result.total_cost, 750.0);
        assert_eq!(result.distribution[0].amount, 750.0);
    }

    #[test]
    fn cost_splits_by_percentage_in_input_order() {
        let result = allocate(&input(
            Some(2.5),
            10.0,
            30.0,
            vec![owner("a", 60.0), owner("b", 40.0)],
        ))
        .unwrap();

        let amounts: Vec<_> = result
            .distribution
            .iter()
            .map(|d| (d.user_id.as_str(), d.amount, d.owner_name.as_str()))
            .collect();
        assert_eq!(amounts, vec![("a", 450.0, "A"), ("b", 300.0, "B")]);
    }

    #[test]
    fn partial_ledger_is_not_normalized() {
        // 10 L/da * 10 da * 10 = 1000
        let result = allocate(&input(
            Some(10.0),
            10.0,
            10.0,
            vec![owner("a", 50.0), owner("b", 30.0)],
        ))
        .unwrap();

        assert_eq!(result.total_cost, 1000.0);
        assert_eq!(result.distribution[0].amount, 500.0);
        assert_eq!(result.distribution[1].amount, 300.0);
        assert_eq!(result.distributed_total(), 800.0);
    }

    #[test]
    fn missing_or_zero_rate_burns_nothing() {
        for rate in [None, Some(0.0)] {
            let result = allocate(&input(rate, 42.0, 31.5, vec![owner("a", 70.0)])).unwrap();
            assert_eq!(result.total_fuel_consumption, 0.0);
            assert_eq!(result.total_cost, 0.0);
            assert_eq!(result.distribution[0].amount, 0.0);
        }
    }

    #[test]
    fn empty_owner_list_is_rejected() {
        let err = allocate(&input(Some(2.5), 10.0, 30.0, vec![])).unwrap_err();
        assert_eq!(err, ValidationError::NoOwners);
    }

    #[test]
    fn out_of_range_share_is_rejected() {
        let err = allocate(&input(Some(1.0), 1.0, 1.0, vec![owner("a", 120.0)])).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        assert!(fuel_usage(Some(-1.0), 1.0, 1.0).is_err());
        assert!(fuel_usage(Some(1.0), -1.0, 1.0).is_err());
        assert!(fuel_usage(Some(1.0), 1.0, -1.0).is_err());
        assert!(fuel_usage(Some(f64::INFINITY), 1.0, 1.0).is_err());
    }

    #[test]
    fn overflowing_products_are_rejected() {
        assert_eq!(
            fuel_usage(Some(1.0), 1e300, 1e300),
            Err(ValidationError::NotFinite { field: "totalCost" })
        );
        assert_eq!(
            fuel_usage(Some(1e200), 1e200, 1.0),
            Err(ValidationError::NotFinite { field: "totalFuelConsumption" })
        );

        // The cost fits, but scaling it by the share overflows.
        let whole = input(Some(1.0), 1.0, f64::MAX, vec![owner("a", 100.0)]);
        let err = allocate(&whole).unwrap_err();
        assert_eq!(err, ValidationError::NotFinite { field: "amount" });
    }

    #[test]
    fn ownership_total_sums_shares() {
        assert_eq!(ownership_total(&[owner("a", 50.0), owner("b", 30.0)]), 80.0);
        assert_eq!(ownership_total(&[]), 0.0);
    }
}
