//! Gathering rates and per-tick gathering yield.
//!
//! A gathering worker adds `floor(base_rate * multiplier)` units per tick,
//! where the base rate depends on the resource and the multiplier comes from
//! the farming table for food and the resource table for everything else.

use homestead_types::{ResourceKind, Season};

use crate::seasonal::{farming_multiplier, resource_multiplier, scale_floor};

/// Base rate for any resource without a dedicated entry.
pub const DEFAULT_GATHERING_RATE: u32 = 5;

/// Units gathered per tick before the seasonal multiplier.
pub const fn gathering_rate(resource: ResourceKind) -> u32 {
    match resource {
        ResourceKind::Wood => 5,
        ResourceKind::Stone => 3,
        ResourceKind::Food => 8,
        ResourceKind::Ore => DEFAULT_GATHERING_RATE,
    }
}

/// Units of `resource` one worker gathers in one tick of `season`.
pub fn gather_yield(resource: ResourceKind, season: Season) -> u32 {
    let multiplier = match resource {
        ResourceKind::Food => farming_multiplier(season),
        ResourceKind::Wood | ResourceKind::Stone | ResourceKind::Ore => {
            resource_multiplier(season)
        }
    };
    scale_floor(gathering_rate(resource), multiplier)
}
