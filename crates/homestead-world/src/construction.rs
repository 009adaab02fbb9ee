//! Structure placement, construction progress, and cancellation.
//!
//! This is the rules component the owner actor calls into. It is pure: each
//! operation takes the current owner aggregate and returns the next one, so
//! a failure can never leave the owner half-updated.
//!
//! - [`place_structure`] validates terrain, occupancy, building type, and
//!   cost (in that order), then deducts the cost and appends the structure.
//! - [`advance_construction`] applies `floor(rate * multiplier) * ticks` of
//!   progress, capped at [`MAX_PROGRESS`].
//! - [`cancel_construction`] removes a structure, refunding half its cost
//!   when it is less than [`REFUND_THRESHOLD`] percent complete.

use homestead_types::{
    Coordinate, OwnerAggregate, ResourceKind, ResourceMap, Season, Structure, StructureId,
    StructureKind, Tile,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::WorldError;
use crate::ledger;
use crate::seasonal::{construction_multiplier, scale_floor};

/// Construction progress of a finished structure.
pub const MAX_PROGRESS: u32 = 100;

/// Hit points of a freshly placed structure.
pub const INITIAL_HP: u32 = 100;

/// Progress percentage at or above which cancellation refunds nothing.
pub const REFUND_THRESHOLD: u32 = 50;

/// Material cost of a structure kind.
pub fn structure_cost(kind: StructureKind) -> ResourceMap {
    let (wood, stone) = match kind {
        StructureKind::House => (50, 20),
        StructureKind::Farm => (30, 10),
        StructureKind::Lumberyard => (40, 30),
        StructureKind::Storage => (60, 40),
    };
    ResourceMap::from([(ResourceKind::Wood, wood), (ResourceKind::Stone, stone)])
}

/// Construction progress gained per tick before the seasonal multiplier.
pub const fn construction_rate(kind: StructureKind) -> u32 {
    match kind {
        StructureKind::House => 10,
        StructureKind::Farm => 8,
        StructureKind::Lumberyard => 12,
        StructureKind::Storage => 15,
    }
}

/// Parse a building type name as supplied by an external caller.
///
/// # Errors
///
/// Returns [`WorldError::InvalidBuildingType`] for unknown names.
pub fn parse_structure_kind(name: &str) -> Result<StructureKind, WorldError> {
    StructureKind::ALL
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| WorldError::InvalidBuildingType(name.to_owned()))
}

/// Validate and place a new structure for `owner`.
///
/// Checks run in a fixed order and the first failure wins:
///
/// 1. the tile terrain is buildable, else [`WorldError::InvalidTerrain`];
/// 2. the tile references no structure and the owner has none at
///    `coordinate`, else [`WorldError::TileOccupied`];
/// 3. `kind` names a known building, else [`WorldError::InvalidBuildingType`];
/// 4. the owner's ledger covers the cost, else
///    [`WorldError::InsufficientResources`].
///
/// On success returns the updated owner (cost deducted, structure appended)
/// together with the new structure.
///
/// # Errors
///
/// Returns the first failed check as described above. `owner` is never
/// modified.
pub fn place_structure(
    owner: &OwnerAggregate,
    tile: &Tile,
    kind: &str,
    coordinate: Coordinate,
) -> Result<(OwnerAggregate, Structure), WorldError> {
    if !tile.terrain.is_buildable() {
        return Err(WorldError::InvalidTerrain {
            terrain: tile.terrain,
            coordinate,
        });
    }

    let already_built = owner.structures.iter().any(|s| s.location == coordinate);
    if tile.structure_id.is_some() || already_built {
        return Err(WorldError::TileOccupied { coordinate });
    }

    let kind = parse_structure_kind(kind)?;
    let cost = structure_cost(kind);

    let mut next = owner.clone();
    ledger::deduct(&mut next.resource_ledger, &cost)?;

    let structure = Structure {
        id: StructureId::new(),
        kind,
        location: coordinate,
        construction_progress: 0,
        hp: INITIAL_HP,
    };
    next.structures.push(structure);

    debug!(
        owner_id = %owner.id,
        structure_id = %structure.id,
        kind = kind.as_str(),
        x = coordinate.x,
        y = coordinate.y,
        "Structure placed"
    );

    Ok((next, structure))
}

/// Advance construction by `ticks` ticks of work.
///
/// Progress per tick is `floor(rate * multiplier)`, where the multiplier is
/// the construction multiplier of `season` or 1 when no season is given.
/// The result never exceeds [`MAX_PROGRESS`].
pub fn advance_construction(structure: &Structure, ticks: u32, season: Option<Season>) -> Structure {
    let multiplier = season.map_or(Decimal::ONE, construction_multiplier);
    let per_tick = scale_floor(construction_rate(structure.kind), multiplier);
    let gained = per_tick.saturating_mul(ticks);

    let mut next = *structure;
    next.construction_progress = structure
        .construction_progress
        .saturating_add(gained)
        .min(MAX_PROGRESS);
    next
}

/// Materials returned when cancelling `structure`.
///
/// Half the cost (rounded down) below [`REFUND_THRESHOLD`] percent,
/// nothing at or above it.
pub fn cancellation_refund(structure: &Structure) -> ResourceMap {
    if structure.construction_progress >= REFUND_THRESHOLD {
        return ResourceMap::new();
    }
    structure_cost(structure.kind)
        .into_iter()
        .map(|(resource, quantity)| (resource, quantity.checked_div(2).unwrap_or(0)))
        .collect()
}

/// Remove a structure from `owner`, refunding per [`cancellation_refund`].
///
/// The structure is removed whether or not a refund is paid. Returns the
/// updated owner and the refund that was credited.
///
/// # Errors
///
/// Returns [`WorldError::StructureNotFound`] if the owner has no such
/// structure, or [`WorldError::ArithmeticOverflow`] if the refund would
/// overflow the ledger. `owner` is never modified.
pub fn cancel_construction(
    owner: &OwnerAggregate,
    structure_id: StructureId,
) -> Result<(OwnerAggregate, ResourceMap), WorldError> {
    let structure = owner
        .structures
        .iter()
        .find(|s| s.id == structure_id)
        .ok_or(WorldError::StructureNotFound(structure_id))?;

    let refund = cancellation_refund(structure);

    let mut next = owner.clone();
    ledger::credit(&mut next.resource_ledger, &refund)?;
    next.structures.retain(|s| s.id != structure_id);

    debug!(
        owner_id = %owner.id,
        structure_id = %structure_id,
        progress = structure.construction_progress,
        refunded = !refund.is_empty(),
        "Construction cancelled"
    );

    Ok((next, refund))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use homestead_types::{OwnerId, Terrain};

    use super::*;

    fn owner_with(wood: u32, stone: u32) -> OwnerAggregate {
        OwnerAggregate::new(
            OwnerId::from("o1"),
            String::from("Oakvale"),
            ResourceMap::from([(ResourceKind::Wood, wood), (ResourceKind::Stone, stone)]),
        )
    }

    fn grass(x: i32, y: i32) -> Tile {
        Tile {
            coordinate: Coordinate::new(x, y),
            terrain: Terrain::Grass,
            structure_id: None,
        }
    }

    fn structure(kind: StructureKind, progress: u32) -> Structure {
        Structure {
            id: StructureId::new(),
            kind,
            location: Coordinate::new(0, 0),
            construction_progress: progress,
            hp: INITIAL_HP,
        }
    }

    #[test]
    fn cost_table() {
        let house = structure_cost(StructureKind::House);
        assert_eq!(ledger::amount(&house, ResourceKind::Wood), 50);
        assert_eq!(ledger::amount(&house, ResourceKind::Stone), 20);
        let storage = structure_cost(StructureKind::Storage);
        assert_eq!(ledger::amount(&storage, ResourceKind::Wood), 60);
        assert_eq!(ledger::amount(&storage, ResourceKind::Stone), 40);
    }

    #[test]
    fn place_deducts_cost_and_appends() {
        let owner = owner_with(100, 50);
        let (next, built) =
            place_structure(&owner, &grass(2, 3), "house", Coordinate::new(2, 3)).unwrap();

        assert_eq!(ledger::amount(&next.resource_ledger, ResourceKind::Wood), 50);
        assert_eq!(ledger::amount(&next.resource_ledger, ResourceKind::Stone), 30);
        assert_eq!(next.structures.len(), 1);
        assert_eq!(next.structures[0], built);
        assert_eq!(built.kind, StructureKind::House);
        assert_eq!(built.construction_progress, 0);
        assert_eq!(built.hp, 100);
        // The input aggregate is untouched.
        assert!(owner.structures.is_empty());
    }

    #[test]
    fn insufficient_resources_leaves_owner_unchanged() {
        let owner = owner_with(10, 5);
        let result = place_structure(&owner, &grass(0, 0), "house", Coordinate::new(0, 0));
        assert!(matches!(
            result,
            Err(WorldError::InsufficientResources { .. })
        ));
        assert_eq!(owner, owner_with(10, 5));
    }

    #[test]
    fn water_and_mountain_are_rejected() {
        let owner = owner_with(100, 100);
        for terrain in [Terrain::Water, Terrain::Mountain] {
            let tile = Tile {
                terrain,
                ..grass(1, 1)
            };
            let result = place_structure(&owner, &tile, "farm", Coordinate::new(1, 1));
            assert!(matches!(result, Err(WorldError::InvalidTerrain { .. })));
        }
    }

    #[test]
    fn occupied_tile_is_rejected() {
        let owner = owner_with(100, 100);
        let tile = Tile {
            structure_id: Some(StructureId::new()),
            ..grass(1, 1)
        };
        let result = place_structure(&owner, &tile, "farm", Coordinate::new(1, 1));
        assert!(matches!(result, Err(WorldError::TileOccupied { .. })));
    }

    #[test]
    fn owner_structure_at_coordinate_counts_as_occupied() {
        let owner = owner_with(200, 200);
        let (owner, _) =
            place_structure(&owner, &grass(4, 4), "farm", Coordinate::new(4, 4)).unwrap();
        let again = place_structure(&owner, &grass(4, 4), "house", Coordinate::new(4, 4));
        assert!(matches!(again, Err(WorldError::TileOccupied { .. })));
    }

    #[test]
    fn unknown_building_type_is_rejected() {
        let owner = owner_with(100, 100);
        let result = place_structure(&owner, &grass(0, 0), "castle", Coordinate::new(0, 0));
        assert_eq!(
            result.map(|(_, s)| s.kind),
            Err(WorldError::InvalidBuildingType(String::from("castle")))
        );
    }

    #[test]
    fn terrain_is_checked_before_building_type() {
        let owner = owner_with(0, 0);
        let tile = Tile {
            terrain: Terrain::Water,
            ..grass(0, 0)
        };
        let result = place_structure(&owner, &tile, "castle", Coordinate::new(0, 0));
        assert!(matches!(result, Err(WorldError::InvalidTerrain { .. })));
    }

    #[test]
    fn kind_names_parse_case_insensitively() {
        assert_eq!(parse_structure_kind("Lumberyard"), Ok(StructureKind::Lumberyard));
        assert_eq!(parse_structure_kind(" storage "), Ok(StructureKind::Storage));
    }

    #[test]
    fn advance_without_season_uses_base_rate() {
        let s = advance_construction(&structure(StructureKind::Farm, 0), 3, None);
        assert_eq!(s.construction_progress, 24);
    }

    #[test]
    fn advance_applies_seasonal_multiplier() {
        // floor(10 * 1.2) = 12 per tick in summer.
        let s = advance_construction(&structure(StructureKind::House, 0), 2, Some(Season::Summer));
        assert_eq!(s.construction_progress, 24);
        // floor(8 * 0.6) = 4 per tick in winter.
        let s = advance_construction(&structure(StructureKind::Farm, 0), 1, Some(Season::Winter));
        assert_eq!(s.construction_progress, 4);
    }

    #[test]
    fn progress_is_capped_at_one_hundred() {
        let s = advance_construction(&structure(StructureKind::House, 95), 1, None);
        assert_eq!(s.construction_progress, 100);
        let s = advance_construction(&structure(StructureKind::Storage, 0), u32::MAX, None);
        assert_eq!(s.construction_progress, 100);
    }

    #[test]
    fn cancel_below_half_refunds_half_cost() {
        let mut owner = owner_with(10, 5);
        let house = structure(StructureKind::House, 30);
        owner.structures.push(house);

        let (next, refund) = cancel_construction(&owner, house.id).unwrap();
        assert_eq!(ledger::amount(&next.resource_ledger, ResourceKind::Wood), 35);
        assert_eq!(ledger::amount(&next.resource_ledger, ResourceKind::Stone), 15);
        assert_eq!(ledger::amount(&refund, ResourceKind::Wood), 25);
        assert!(next.structures.is_empty());
    }

    #[test]
    fn cancel_at_half_or_more_refunds_nothing() {
        let mut owner = owner_with(10, 5);
        let house = structure(StructureKind::House, 50);
        owner.structures.push(house);

        let (next, refund) = cancel_construction(&owner, house.id).unwrap();
        assert_eq!(next.resource_ledger, owner_with(10, 5).resource_ledger);
        assert!(refund.is_empty());
        assert!(next.structures.is_empty());
    }

    #[test]
    fn cancel_unknown_structure_is_not_found() {
        let owner = owner_with(10, 5);
        let id = StructureId::new();
        assert_eq!(
            cancel_construction(&owner, id).map(|(o, _)| o),
            Err(WorldError::StructureNotFound(id))
        );
    }
}
