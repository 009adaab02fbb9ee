//! Error types for the `homestead-world` crate.
//!
//! Every construction and ledger failure is returned as a [`WorldError`]
//! value. A failed operation never mutates its input.

use homestead_types::{Coordinate, ResourceKind, StructureId, Terrain};

/// Errors that can occur during ledger and construction operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The ledger does not hold enough of a resource.
    #[error("insufficient resources: need {required} {resource:?} but only have {available}")]
    InsufficientResources {
        /// The first resource found short.
        resource: ResourceKind,
        /// Quantity required.
        required: u32,
        /// Quantity held.
        available: u32,
    },

    /// Structures cannot be placed on this terrain.
    #[error("invalid terrain {terrain:?} at ({}, {})", coordinate.x, coordinate.y)]
    InvalidTerrain {
        /// The rejected terrain.
        terrain: Terrain,
        /// Where the placement was attempted.
        coordinate: Coordinate,
    },

    /// Something already stands on the tile.
    #[error("tile at ({}, {}) is occupied", coordinate.x, coordinate.y)]
    TileOccupied {
        /// The occupied coordinate.
        coordinate: Coordinate,
    },

    /// The requested building type is not one the rules know.
    #[error("invalid building type: {0}")]
    InvalidBuildingType(String),

    /// The owner has no structure with this ID.
    #[error("structure not found: {0}")]
    StructureNotFound(StructureId),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: &'static str,
    },
}
