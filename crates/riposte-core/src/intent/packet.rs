//! Intent packets and their ingestion-boundary validation.
//!
//! [`RawIntent`] is whatever a strategy source managed to produce: every
//! field optional, numbers unchecked. [`IntentPacket::validate`] is the only
//! way to obtain an [`IntentPacket`], so nothing downstream ever sees an
//! out-of-range or unattributed directive.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::IntentError;
use crate::snapshot::TickId;

/// High-level goal a strategy source may attach to a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Close on the opponent.
    Engage,
    /// Move away from the opponent.
    Retreat,
    /// Stay put.
    Hold,
}

/// Unvalidated directive as decoded from a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIntent {
    /// Horizontal movement bias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    /// Vertical movement bias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    /// Discrete fire request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot: Option<bool>,
    /// Probabilistic fire request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot_probability: Option<f64>,
    /// How hard to press, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggression: Option<f64>,
    /// Optional goal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    /// Echo of the request's tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_id: Option<u64>,
}

impl RawIntent {
    /// Returns true if any directive field is present.
    #[must_use]
    pub fn has_directive(&self) -> bool {
        self.dx.is_some() || self.dy.is_some() || self.shoot.is_some() || self.shoot_probability.is_some()
    }
}

/// Fire request carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShootSignal {
    /// Fire or hold fire.
    Fire(bool),
    /// Fire when the probability reaches the executor's threshold.
    Probability(f32),
}

impl ShootSignal {
    /// Resolves the signal against a probability threshold.
    #[must_use]
    pub fn wants_fire(self, threshold: f32) -> bool {
        match self {
            Self::Fire(fire) => fire,
            Self::Probability(p) => p >= threshold,
        }
    }
}

/// A validated directive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentPacket {
    /// Tick of the request this answers.
    pub tick_id: TickId,
    /// Horizontal movement bias in [-1, 1].
    pub dx: f32,
    /// Vertical movement bias in [-1, 1].
    pub dy: f32,
    /// Fire request.
    pub shoot: ShootSignal,
    /// Aggression in [0, 1].
    pub aggression: Option<f32>,
    /// Goal.
    pub goal: Option<Goal>,
}

impl IntentPacket {
    /// The intent held before any packet is accepted: no movement, no fire.
    #[must_use]
    pub const fn safe_default() -> Self {
        Self {
            tick_id: TickId::GENESIS,
            dx: 0.0,
            dy: 0.0,
            shoot: ShootSignal::Fire(false),
            aggression: None,
            goal: None,
        }
    }

    /// Validates a raw directive answering the request issued for `expected`.
    ///
    /// Missing `dx`/`dy` default to 0, but at least one of `dx`, `dy`,
    /// `shoot`, `shoot_probability` must be present. When both `shoot` and
    /// `shoot_probability` are given, `shoot` wins.
    ///
    /// # Errors
    ///
    /// Returns an [`IntentError`] describing the first problem found.
    pub fn validate(raw: &RawIntent, expected: TickId) -> Result<Self, IntentError> {
        let tick = raw.tick_id.ok_or(IntentError::MissingTickId)?;
        if tick != expected.as_u64() {
            return Err(IntentError::TickMismatch { expected, got: tick });
        }
        if !raw.has_directive() {
            return Err(IntentError::Empty);
        }

        let dx = bounded("dx", raw.dx.unwrap_or(0.0), -1.0, 1.0)?;
        let dy = bounded("dy", raw.dy.unwrap_or(0.0), -1.0, 1.0)?;
        let probability = raw
            .shoot_probability
            .map(|p| bounded("shoot_probability", p, 0.0, 1.0))
            .transpose()?;
        let aggression = raw
            .aggression
            .map(|a| bounded("aggression", a, 0.0, 1.0))
            .transpose()?;

        let shoot = match (raw.shoot, probability) {
            (Some(fire), _) => ShootSignal::Fire(fire),
            (None, Some(p)) => ShootSignal::Probability(p),
            (None, None) => ShootSignal::Fire(false),
        };

        Ok(Self {
            tick_id: expected,
            dx,
            dy,
            shoot,
            aggression,
            goal: raw.goal,
        })
    }

    /// Movement bias as a vector.
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bounded(field: &'static str, value: f64, min: f64, max: f64) -> Result<f32, IntentError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value as f32)
    } else {
        Err(IntentError::OutOfRange { field, value, min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tick: u64) -> RawIntent {
        RawIntent {
            dx: Some(0.5),
            dy: Some(-0.25),
            shoot: Some(true),
            tick_id: Some(tick),
            ..RawIntent::default()
        }
    }

    #[test]
    fn valid_packet_is_accepted() {
        let packet = IntentPacket::validate(&raw(7), TickId::new(7)).unwrap();
        assert_eq!(packet.tick_id, TickId::new(7));
        assert_eq!(packet.direction(), Vec2::new(0.5, -0.25));
        assert_eq!(packet.shoot, ShootSignal::Fire(true));
    }

    #[test]
    fn missing_tick_is_malformed() {
        let mut r = raw(7);
        r.tick_id = None;
        assert_eq!(IntentPacket::validate(&r, TickId::new(7)), Err(IntentError::MissingTickId));
    }

    #[test]
    fn mismatched_tick_is_malformed() {
        let err = IntentPacket::validate(&raw(6), TickId::new(7)).unwrap_err();
        assert_eq!(
            err,
            IntentError::TickMismatch {
                expected: TickId::new(7),
                got: 6
            }
        );
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let mut r = raw(1);
        r.dx = Some(1.5);
        assert!(matches!(
            IntentPacket::validate(&r, TickId::new(1)),
            Err(IntentError::OutOfRange { field: "dx", .. })
        ));

        let mut r = raw(1);
        r.dy = Some(f64::NAN);
        assert!(IntentPacket::validate(&r, TickId::new(1)).is_err());

        let mut r = raw(1);
        r.shoot_probability = Some(1.01);
        assert!(IntentPacket::validate(&r, TickId::new(1)).is_err());

        let mut r = raw(1);
        r.aggression = Some(-0.1);
        assert!(IntentPacket::validate(&r, TickId::new(1)).is_err());
    }

    #[test]
    fn empty_payload_is_malformed() {
        let r = RawIntent {
            tick_id: Some(3),
            goal: Some(Goal::Hold),
            ..RawIntent::default()
        };
        assert_eq!(IntentPacket::validate(&r, TickId::new(3)), Err(IntentError::Empty));
    }

    #[test]
    fn missing_axes_default_to_zero() {
        let r = RawIntent {
            shoot_probability: Some(0.8),
            tick_id: Some(2),
            ..RawIntent::default()
        };
        let packet = IntentPacket::validate(&r, TickId::new(2)).unwrap();
        assert_eq!(packet.direction(), Vec2::ZERO);
        assert!(packet.shoot.wants_fire(0.5));
        assert!(!packet.shoot.wants_fire(0.9));
    }

    #[test]
    fn boundary_values_are_inclusive() {
        let r = RawIntent {
            dx: Some(-1.0),
            dy: Some(1.0),
            aggression: Some(0.0),
            tick_id: Some(4),
            ..RawIntent::default()
        };
        assert!(IntentPacket::validate(&r, TickId::new(4)).is_ok());
    }

    #[test]
    fn safe_default_does_nothing() {
        let packet = IntentPacket::safe_default();
        assert_eq!(packet.tick_id, TickId::GENESIS);
        assert_eq!(packet.direction(), Vec2::ZERO);
        assert!(!packet.shoot.wants_fire(0.0));
    }
}
