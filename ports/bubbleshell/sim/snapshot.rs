/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Read-only per-tick view handed to renderers.

use euclid::default::Point3D;

use crate::physics::collision::CollisionEvent;
use crate::world::{Deformation, ParticleId, Population};

/// What a renderer needs to draw one bubble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub id: ParticleId,
    pub position: Point3D<f32>,
    pub radius: f32,
    pub deformation: Deformation,
}

/// State of the world immediately after a completed tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    pub tick: u64,
    /// Live particles in arena order
    pub particles: Vec<ParticleView>,
    /// Highest-priority collision events of the tick
    pub emphasis: Vec<CollisionEvent>,
}

impl FrameSnapshot {
    pub fn capture(tick: u64, population: &Population, emphasis: Vec<CollisionEvent>) -> Self {
        let particles = population
            .live()
            .map(|p| ParticleView {
                id: p.id,
                position: p.position,
                radius: p.radius,
                deformation: p.deformation,
            })
            .collect();
        Self {
            tick,
            particles,
            emphasis,
        }
    }

    /// Number of live particles
    pub fn population(&self) -> usize {
        self.particles.len()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&ParticleView> {
        self.particles.iter().find(|p| p.id == id)
    }

    /// Total volume proxy (sum of radius cubed) of the live particles
    pub fn total_volume(&self) -> f32 {
        self.particles.iter().map(|p| p.radius.powi(3)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid::default::Vector3D;

    #[test]
    fn test_capture_skips_dead_particles() {
        let mut population = Population::new(4);
        let a = population.spawn(Point3D::new(1.0, 2.0, 3.0), Vector3D::zero(), 2.0, 0);
        let b = population.spawn(Point3D::new(4.0, 5.0, 6.0), Vector3D::zero(), 3.0, 0);
        population.as_mut_slice()[0].kill();

        let snapshot = FrameSnapshot::capture(7, &population, Vec::new());
        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.population(), 1);
        assert!(snapshot.particle(a.unwrap()).is_none());
        let view = snapshot.particle(b.unwrap()).unwrap();
        assert_eq!(view.radius, 3.0);
        assert_eq!(view.position, Point3D::new(4.0, 5.0, 6.0));
        assert_eq!(snapshot.total_volume(), 27.0);
    }
}
