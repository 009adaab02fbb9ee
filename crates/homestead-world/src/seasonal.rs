//! Seasonal multiplier tables.
//!
//! Every rate in the simulation is scaled by the current season. The tables
//! are fixed-point [`Decimal`] values so results are exact and reproducible:
//!
//! | Table        | Spring | Summer | Fall | Winter |
//! |--------------|--------|--------|------|--------|
//! | resource     | 1.0    | 1.2    | 1.1  | 0.7    |
//! | farming      | 1.3    | 1.5    | 1.2  | 0.3    |
//! | construction | 1.1    | 1.2    | 1.0  | 0.6    |
//! | movement     | 1.0    | 1.1    | 0.9  | 0.7    |
//!
//! Scaled quantities always round toward zero via [`scale_floor`].

use homestead_types::Season;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Multiplier for gathering non-food resources.
pub fn resource_multiplier(season: Season) -> Decimal {
    match season {
        Season::Spring => Decimal::ONE,
        Season::Summer => Decimal::new(12, 1), // 1.2
        Season::Fall => Decimal::new(11, 1),   // 1.1
        Season::Winter => Decimal::new(7, 1),  // 0.7
    }
}

/// Multiplier for gathering food.
pub fn farming_multiplier(season: Season) -> Decimal {
    match season {
        Season::Spring => Decimal::new(13, 1), // 1.3
        Season::Summer => Decimal::new(15, 1), // 1.5
        Season::Fall => Decimal::new(12, 1),   // 1.2
        Season::Winter => Decimal::new(3, 1),  // 0.3
    }
}

/// Multiplier for construction work, both worker build progress and
/// structure construction rate.
pub fn construction_multiplier(season: Season) -> Decimal {
    match season {
        Season::Spring => Decimal::new(11, 1), // 1.1
        Season::Summer => Decimal::new(12, 1), // 1.2
        Season::Fall => Decimal::ONE,
        Season::Winter => Decimal::new(6, 1), // 0.6
    }
}

/// Multiplier for worker movement speed.
pub fn movement_multiplier(season: Season) -> Decimal {
    match season {
        Season::Spring => Decimal::ONE,
        Season::Summer => Decimal::new(11, 1), // 1.1
        Season::Fall => Decimal::new(9, 1),    // 0.9
        Season::Winter => Decimal::new(7, 1),  // 0.7
    }
}

/// Compute `floor(base * multiplier)`.
///
/// Saturates at `u32::MAX` on overflow and returns 0 for negative results.
pub fn scale_floor(base: u32, multiplier: Decimal) -> u32 {
    Decimal::from(base)
        .checked_mul(multiplier)
        .map_or(u32::MAX, |scaled| {
            if scaled.is_sign_negative() {
                0
            } else {
                scaled.floor().to_u32().unwrap_or(u32::MAX)
            }
        })
}
