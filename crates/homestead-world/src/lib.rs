//! Seasons, resource ledgers, and construction rules for the Homestead
//! simulation.
//!
//! Everything in this crate is pure and synchronous. The actor layer in
//! `homestead-core` owns the state and calls in here to compute the next
//! state; nothing in this crate knows about mailboxes or ticks.
//!
//! # Modules
//!
//! - [`construction`] -- Structure placement, construction progress, and
//!   cancellation with partial refunds.
//! - [`error`] -- Error types for ledger and construction operations.
//! - [`ledger`] -- Checked arithmetic over resource ledgers and inventories.
//! - [`resource`] -- Base gathering rates and per-tick gathering yield.
//! - [`seasonal`] -- Seasonal multiplier tables and floor scaling.

pub mod construction;
pub mod error;
pub mod ledger;
pub mod resource;
pub mod seasonal;

// Re-export primary items at crate root.
pub use construction::{
    advance_construction, cancel_construction, cancellation_refund, construction_rate,
    parse_structure_kind, place_structure, structure_cost,
};
pub use error::WorldError;
pub use resource::{gather_yield, gathering_rate};
pub use seasonal::{
    construction_multiplier, farming_multiplier, movement_multiplier, resource_multiplier,
    scale_floor,
};
