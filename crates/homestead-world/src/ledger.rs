//! Resource ledger arithmetic.
//!
//! Ledgers (owner stockpiles) and inventories (worker packs) are both a
//! [`ResourceMap`]. Quantities are unsigned, so a ledger can never go
//! negative; every operation here uses checked arithmetic and leaves the
//! map untouched when it fails.

use homestead_types::{ResourceKind, ResourceMap};

use crate::error::WorldError;

/// Quantity of `resource` held, zero if absent.
pub fn amount(ledger: &ResourceMap, resource: ResourceKind) -> u32 {
    ledger.get(&resource).copied().unwrap_or(0)
}

/// Check that `ledger` holds at least every quantity in `cost`.
///
/// # Errors
///
/// Returns [`WorldError::InsufficientResources`] naming the first resource
/// that falls short.
pub fn ensure_covers(ledger: &ResourceMap, cost: &ResourceMap) -> Result<(), WorldError> {
    for (&resource, &required) in cost {
        let available = amount(ledger, resource);
        if available < required {
            return Err(WorldError::InsufficientResources {
                resource,
                required,
                available,
            });
        }
    }
    Ok(())
}

/// Remove `cost` from `ledger`.
///
/// Entries that reach zero are kept at zero so the ledger shape is stable
/// for snapshots.
///
/// # Errors
///
/// Returns [`WorldError::InsufficientResources`] if the ledger cannot cover
/// the cost. Nothing is deducted in that case.
pub fn deduct(ledger: &mut ResourceMap, cost: &ResourceMap) -> Result<(), WorldError> {
    ensure_covers(ledger, cost)?;
    for (&resource, &required) in cost {
        let entry = ledger.entry(resource).or_insert(0);
        *entry = entry
            .checked_sub(required)
            .ok_or(WorldError::ArithmeticOverflow {
                context: "ledger deduction",
            })?;
    }
    Ok(())
}

/// Add every quantity in `resources` to `ledger`.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if any entry would exceed
/// `u32::MAX`. Nothing is credited in that case.
pub fn credit(ledger: &mut ResourceMap, resources: &ResourceMap) -> Result<(), WorldError> {
    let mut updated = ledger.clone();
    for (&resource, &quantity) in resources {
        let entry = updated.entry(resource).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or(WorldError::ArithmeticOverflow {
                context: "ledger credit",
            })?;
    }
    *ledger = updated;
    Ok(())
}
