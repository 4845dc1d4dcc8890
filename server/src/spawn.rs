//! Best-effort spawn placement.
//!
//! Candidates are sampled uniformly inside a region and checked against every
//! wall. After [`MAX_SPAWN_ATTEMPTS`] failures the last candidate is used
//! anyway so a crowded map can never stall the tick.

use crate::config::MAX_SPAWN_ATTEMPTS;
use log::debug;
use rand::Rng;
use shared::{rects_intersect, Faction, Rect, ARENA_HEIGHT, ARENA_WIDTH, ENTITY_SIZE};

/// Fraction of the arena width given to each team's spawn band.
pub const TEAM_BAND_FRACTION: f32 = 0.25;
/// Depth of the border ring hostile NPCs appear in.
pub const PERIMETER_DEPTH: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRegion {
    Anywhere,
    LeftBand,
    RightBand,
    Perimeter,
}

impl SpawnRegion {
    pub fn for_faction(faction: Faction) -> Self {
        match faction {
            Faction::Red => SpawnRegion::LeftBand,
            Faction::Blue => SpawnRegion::RightBand,
            Faction::Zombie => SpawnRegion::Perimeter,
            _ => SpawnRegion::Anywhere,
        }
    }
}

fn sample<R: Rng + ?Sized>(region: SpawnRegion, rng: &mut R) -> (f32, f32) {
    let max_x = ARENA_WIDTH - ENTITY_SIZE;
    let max_y = ARENA_HEIGHT - ENTITY_SIZE;
    let band = ARENA_WIDTH * TEAM_BAND_FRACTION;

    match region {
        SpawnRegion::Anywhere => (rng.gen_range(0.0..=max_x), rng.gen_range(0.0..=max_y)),
        SpawnRegion::LeftBand => (
            rng.gen_range(0.0..=band - ENTITY_SIZE),
            rng.gen_range(0.0..=max_y),
        ),
        SpawnRegion::RightBand => (
            rng.gen_range(ARENA_WIDTH - band..=max_x),
            rng.gen_range(0.0..=max_y),
        ),
        SpawnRegion::Perimeter => match rng.gen_range(0..4) {
            0 => (rng.gen_range(0.0..=max_x), rng.gen_range(0.0..=PERIMETER_DEPTH)),
            1 => (
                rng.gen_range(0.0..=max_x),
                rng.gen_range(max_y - PERIMETER_DEPTH..=max_y),
            ),
            2 => (rng.gen_range(0.0..=PERIMETER_DEPTH), rng.gen_range(0.0..=max_y)),
            _ => (
                rng.gen_range(max_x - PERIMETER_DEPTH..=max_x),
                rng.gen_range(0.0..=max_y),
            ),
        },
    }
}

/// True if a standard entity box at `(x, y)` overlaps no wall.
pub fn is_clear(x: f32, y: f32, walls: &[Rect]) -> bool {
    let candidate = Rect::new(x, y, ENTITY_SIZE, ENTITY_SIZE);
    !walls.iter().any(|wall| rects_intersect(&candidate, wall))
}

/// Returns the top-left corner for a new entity box inside `region`.
pub fn find_spawn<R: Rng + ?Sized>(region: SpawnRegion, walls: &[Rect], rng: &mut R) -> (f32, f32) {
    let mut candidate = sample(region, rng);
    for _ in 1..MAX_SPAWN_ATTEMPTS {
        if is_clear(candidate.0, candidate.1, walls) {
            return candidate;
        }
        candidate = sample(region, rng);
    }
    if !is_clear(candidate.0, candidate.1, walls) {
        debug!(
            "No clear spawn in {:?} after {} attempts, using ({:.0}, {:.0})",
            region, MAX_SPAWN_ATTEMPTS, candidate.0, candidate.1
        );
    }
    candidate
}
