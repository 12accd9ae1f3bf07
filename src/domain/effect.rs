/// Fire-and-forget visual effect requests.
///
/// The simulation only ever appends. Whoever draws drains the queue once
/// per frame; nothing in the simulation reads a request back.
///
/// Requests carry no randomness. Spreads are fanned deterministically so
/// that identical input always yields identical requests.

use std::f32::consts::PI;

use super::geom::Vec2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectKind {
    Particle,
    Spark,
    Leaf,
    Pickup,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum EffectRequest {
    /// `count` items thrown out in all directions from `at`.
    Burst { kind: EffectKind, at: Vec2, count: u32, speed_range: (f32, f32) },
    /// One spark along `angle` (radians, 0 = +x).
    DirectedSpark { at: Vec2, angle: f32, speed: f32 },
    /// One item drifting with `velocity`.
    Trail { kind: EffectKind, at: Vec2, velocity: Vec2 },
    /// Full-screen level change wipe.
    LevelTransition,
}

/// Sparks per muzzle flash or impact.
pub const SPARK_FAN: u32 = 4;

#[derive(Clone, Debug, Default)]
pub struct EffectQueue {
    requests: Vec<EffectRequest>,
}

impl EffectQueue {
    pub fn new() -> Self {
        EffectQueue::default()
    }

    pub fn push(&mut self, request: EffectRequest) {
        self.requests.push(request);
    }

    pub fn burst(&mut self, kind: EffectKind, at: Vec2, count: u32, speed_range: (f32, f32)) {
        self.push(EffectRequest::Burst { kind, at, count, speed_range });
    }

    pub fn trail(&mut self, kind: EffectKind, at: Vec2, velocity: Vec2) {
        self.push(EffectRequest::Trail { kind, at, velocity });
    }

    /// A fan of `SPARK_FAN` sparks centred on `angle`, ±0.375 rad.
    pub fn spark_fan(&mut self, at: Vec2, angle: f32) {
        for i in 0..SPARK_FAN {
            let t = i as f32 - (SPARK_FAN - 1) as f32 / 2.0;
            self.push(EffectRequest::DirectedSpark {
                at,
                angle: angle + t * 0.25,
                speed: 2.0 + i as f32 * 0.25,
            });
        }
    }

    /// Spark fan pointing left or right.
    pub fn horizontal_sparks(&mut self, at: Vec2, heading_left: bool) {
        self.spark_fan(at, if heading_left { PI } else { 0.0 });
    }

    /// Player death: sparks and particles in every direction.
    pub fn explosion(&mut self, at: Vec2) {
        self.burst(EffectKind::Spark, at, 30, (2.0, 3.0));
        self.burst(EffectKind::Particle, at, 30, (0.0, 2.5));
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, EffectRequest> {
        self.requests.drain(..)
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[EffectRequest] {
        &self.requests
    }

    #[cfg(test)]
    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spark_fan_is_centred_and_deterministic() {
        let mut a = EffectQueue::new();
        let mut b = EffectQueue::new();
        a.horizontal_sparks(Vec2::new(1.0, 2.0), true);
        b.horizontal_sparks(Vec2::new(1.0, 2.0), true);
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.as_slice().len(), SPARK_FAN as usize);

        let angles: Vec<f32> = a.as_slice().iter().map(|r| match r {
            EffectRequest::DirectedSpark { angle, .. } => *angle,
            other => panic!("unexpected {other:?}"),
        }).collect();
        let mean = angles.iter().sum::<f32>() / angles.len() as f32;
        assert!((mean - PI).abs() < 1e-5);
    }

    #[test]
    fn drain_empties_queue() {
        let mut q = EffectQueue::new();
        q.explosion(Vec2::ZERO);
        assert_eq!(q.drain().count(), 2);
        assert!(q.as_slice().is_empty());
    }
}
