//! Safety guardrails applied on top of the strategic intent.
//!
//! Everything here is a pure function of a snapshot, the arena geometry and
//! the reflex configuration, so each guardrail can be tested on its own.

use glam::Vec2;

use crate::arena::{ArenaGeometry, ObstacleProximity};
use crate::config::ReflexConfig;
use crate::entity::EntityId;
use crate::snapshot::StateSnapshot;

/// Earliest time of closest approach still treated as incoming. Slightly
/// negative so a projectile grazing past this very tick still counts.
const TCA_FLOOR: f32 = -0.05;

/// Repulsion against the dodge direction beyond which the probe is
/// considered pinned and the dodge flips.
const PINNED_DOT: f32 = -0.28;

/// A projectile on a collision course.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImminentThreat {
    /// Projectile id.
    pub id: EntityId,
    /// Projectile position at capture.
    pub position: Vec2,
    /// Projectile velocity.
    pub velocity: Vec2,
    /// Seconds until closest approach.
    pub tca: f32,
    /// Distance at closest approach.
    pub miss: f32,
}

/// Time and distance of closest approach of a moving point to a fixed target.
///
/// Returns `None` for a (nearly) stationary point.
#[must_use]
pub fn closest_approach(position: Vec2, velocity: Vec2, target: Vec2) -> Option<(f32, f32)> {
    let speed_sq = velocity.length_squared();
    if speed_sq < 1e-6 {
        return None;
    }
    let tca = (target - position).dot(velocity) / speed_sq;
    let miss = target.distance(position + velocity * tca);
    Some((tca, miss))
}

/// Threats whose closest approach falls within the dodge horizon and inside
/// the collision margin, in snapshot order.
#[must_use]
pub fn imminent_threats(snapshot: &StateSnapshot, config: &ReflexConfig) -> Vec<ImminentThreat> {
    let me = snapshot.actor.position;
    snapshot
        .threats
        .iter()
        .filter_map(|t| {
            let (tca, miss) = closest_approach(t.position, t.velocity, me)?;
            let incoming = (TCA_FLOOR..=config.dodge_horizon_s).contains(&tca);
            (incoming && miss < config.collision_margin).then_some(ImminentThreat {
                id: t.id,
                position: t.position,
                velocity: t.velocity,
                tca,
                miss,
            })
        })
        .collect()
}

/// Unit evasive direction for a set of imminent threats.
///
/// Each threat votes for the perpendicular on the actor's side of its path,
/// flipped when a probe that way is pinned against a wall, weighted by
/// urgency (sooner and more central is stronger).
#[must_use]
pub fn evasive_vector(
    actor: Vec2,
    threats: &[ImminentThreat],
    geometry: &ArenaGeometry,
    config: &ReflexConfig,
) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut strongest = (0.0_f32, Vec2::ZERO);

    for threat in threats {
        let side = dodge_side(actor, threat, geometry, config);
        let hit_factor = (1.0 - threat.miss / config.collision_margin).max(0.0);
        let urgency = 3.5 / threat.tca.max(0.03) * (0.4 + 0.6 * hit_factor);
        sum += side * urgency;
        if urgency > strongest.0 {
            strongest = (urgency, side);
        }
    }

    let dir = sum.normalize_or_zero();
    if dir == Vec2::ZERO {
        strongest.1
    } else {
        dir
    }
}

fn dodge_side(actor: Vec2, threat: &ImminentThreat, geometry: &ArenaGeometry, config: &ReflexConfig) -> Vec2 {
    let perp = threat.velocity.normalize_or_zero().perp();
    let on_path = threat.position + threat.velocity * threat.tca.max(0.0);
    let mut side = if perp.dot(actor - on_path) >= 0.0 { perp } else { -perp };

    let probe = actor + side * config.probe_distance;
    let pinned = geometry.is_blocked(probe) || geometry.repulsion(probe, config.wall_buffer).dot(side) < PINNED_DOT;
    if pinned {
        side = -side;
    }
    side
}

/// Zeroes each movement component that points at a wall closer than
/// `buffer`. Returns the clamped vector and whether anything changed.
#[must_use]
pub fn boundary_clamp(movement: Vec2, obstacles: &ObstacleProximity, buffer: f32) -> (Vec2, bool) {
    let mut out = movement;
    if obstacles.north < buffer && out.y < 0.0 {
        out.y = 0.0;
    }
    if obstacles.south < buffer && out.y > 0.0 {
        out.y = 0.0;
    }
    if obstacles.west < buffer && out.x < 0.0 {
        out.x = 0.0;
    }
    if obstacles.east < buffer && out.x > 0.0 {
        out.x = 0.0;
    }
    (out, out != movement)
}
