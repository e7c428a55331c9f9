//! Explicitly owned physics world: a flat ground plane, a body arena and
//! trigger-volume overlap reports.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::body::{Aabb, BodyHandle, BodyKind, RigidBody, Shape};
use crate::error::{Error, Result, require_non_negative};

/// Horizontal friction applied to a body resting on the ground plane (1/s).
const GROUND_FRICTION: f32 = 2.0;

/// Broad-phase strategy for trigger overlap tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Broadphase {
    /// Test every sensor against every solid body.
    Naive,
    /// Sort bounding boxes along x and only test overlapping intervals.
    #[default]
    SweepAndPrune,
}

/// World-wide physics tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Gravity acceleration.
    pub gravity: Vec3,
    /// Broad-phase used for trigger overlaps.
    pub broadphase: Broadphase,
    /// Height of the infinite ground plane.
    pub ground_height: f32,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -2.8, 0.0),
            broadphase: Broadphase::SweepAndPrune,
            ground_height: 0.0,
            linear_damping: 0.01,
            angular_damping: 0.01,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(Error::config("gravity", "must be finite"));
        }
        if !self.ground_height.is_finite() {
            return Err(Error::config("ground_height", "must be finite"));
        }
        for (field, value) in [
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            require_non_negative(field, value)?;
            if value > 1.0 {
                return Err(Error::config(field, format!("must be at most 1, got {value}")));
            }
        }
        Ok(())
    }
}

/// Result of a successful raycast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// World-space hit point.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
}

/// A solid body overlapping a sensor during the last step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerContact {
    /// The sensor (trigger) body.
    pub sensor: BodyHandle,
    /// The solid body inside it.
    pub other: BodyHandle,
}

/// The physics world.
///
/// Owns every body; other components hold [`BodyHandle`]s into it.
pub struct PhysicsWorld {
    config: WorldConfig,
    bodies: Vec<RigidBody>,
    contacts: Vec<TriggerContact>,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Physics world: gravity {:?}, broadphase {:?}",
            config.gravity,
            config.broadphase
        );
        Ok(Self {
            config,
            bodies: Vec::new(),
            contacts: Vec::new(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Add a body and return its handle.
    pub fn insert(&mut self, body: RigidBody) -> BodyHandle {
        let index = u32::try_from(self.bodies.len()).unwrap_or(u32::MAX);
        self.bodies.push(body);
        BodyHandle(index)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0 as usize)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0 as usize)
    }

    /// Like [`Self::body`], but a stale handle is an error.
    pub fn get(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.body(handle).ok_or(Error::UnknownBody { handle })
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Cast a ray against the ground plane.
    ///
    /// Returns `None` for degenerate rays (non-finite input, zero direction, no
    /// positive range) and for rays that never reach the ground within range.
    /// An origin already below the ground reports a hit at distance zero.
    pub fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        if !origin.is_finite() || !max_distance.is_finite() || max_distance <= 0.0 {
            return None;
        }
        let direction = direction.try_normalize()?;

        let normal = Vec3::Y;
        let height = origin.y - self.config.ground_height;
        if height <= 0.0 {
            return Some(RayHit {
                distance: 0.0,
                point: origin,
                normal,
            });
        }

        // Ray must point into the ground.
        let approach = -direction.y;
        if approach <= f32::EPSILON {
            return None;
        }

        let distance = height / approach;
        (distance <= max_distance).then(|| RayHit {
            distance,
            point: origin + direction * distance,
            normal,
        })
    }

    /// Advance every body by `dt` and recompute trigger overlaps.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }

        let WorldConfig {
            gravity,
            ground_height,
            linear_damping,
            angular_damping,
            ..
        } = self.config;

        for body in &mut self.bodies {
            body.integrate(dt, gravity, linear_damping, angular_damping);
            if body.kind() == BodyKind::Dynamic && !body.is_sensor() && body.is_enabled() {
                keep_above_ground(body, ground_height, dt);
            }
        }

        self.contacts = self.find_trigger_contacts();
    }

    /// Overlaps found during the last step.
    pub fn contacts(&self) -> &[TriggerContact] {
        &self.contacts
    }

    /// Take the overlaps found during the last step.
    pub fn drain_contacts(&mut self) -> Vec<TriggerContact> {
        std::mem::take(&mut self.contacts)
    }

    fn find_trigger_contacts(&self) -> Vec<TriggerContact> {
        let entries: Vec<BroadphaseEntry> = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(_, body)| body.is_enabled())
            .map(|(index, body)| BroadphaseEntry {
                index,
                aabb: body.shape().aabb(body.position, body.orientation),
                sensor: body.is_sensor(),
            })
            .collect();

        let pairs = match self.config.broadphase {
            Broadphase::Naive => naive_pairs(&entries),
            Broadphase::SweepAndPrune => sweep_and_prune_pairs(&entries),
        };

        pairs
            .into_iter()
            .filter(|&(sensor, other)| shapes_touch(&self.bodies[sensor], &self.bodies[other]))
            .map(|(sensor, other)| TriggerContact {
                sensor: handle_of(sensor),
                other: handle_of(other),
            })
            .collect()
    }
}

fn handle_of(index: usize) -> BodyHandle {
    BodyHandle(u32::try_from(index).unwrap_or(u32::MAX))
}

/// Push a body out of the ground plane and kill its downward velocity.
fn keep_above_ground(body: &mut RigidBody, ground_height: f32, dt: f32) {
    let aabb = body.shape().aabb(body.position, body.orientation);
    let penetration = ground_height - aabb.min.y;
    if penetration <= 0.0 {
        return;
    }
    body.position.y += penetration;
    if body.linear_velocity.y < 0.0 {
        body.linear_velocity.y = 0.0;
    }
    let friction = (-GROUND_FRICTION * dt).exp();
    body.linear_velocity.x *= friction;
    body.linear_velocity.z *= friction;
    body.angular_velocity *= friction;
}

struct BroadphaseEntry {
    index: usize,
    aabb: Aabb,
    sensor: bool,
}

/// Candidate (sensor, solid) pairs, ordered by sensor then solid index.
fn naive_pairs(entries: &[BroadphaseEntry]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for a in entries.iter().filter(|e| e.sensor) {
        for b in entries.iter().filter(|e| !e.sensor) {
            if a.aabb.overlaps(&b.aabb) {
                pairs.push((a.index, b.index));
            }
        }
    }
    pairs
}

/// Same pairs as [`naive_pairs`], found by sweeping along x.
fn sweep_and_prune_pairs(entries: &[BroadphaseEntry]) -> Vec<(usize, usize)> {
    let mut order: Vec<&BroadphaseEntry> = entries.iter().collect();
    order.sort_by(|a, b| a.aabb.min.x.total_cmp(&b.aabb.min.x));

    let mut active: Vec<&BroadphaseEntry> = Vec::new();
    let mut pairs = Vec::new();
    for entry in order {
        active.retain(|other| other.aabb.max.x >= entry.aabb.min.x);
        for other in &active {
            if entry.sensor == other.sensor || !entry.aabb.overlaps(&other.aabb) {
                continue;
            }
            let pair = if entry.sensor {
                (entry.index, other.index)
            } else {
                (other.index, entry.index)
            };
            pairs.push(pair);
        }
        active.push(entry);
    }
    pairs.sort_unstable();
    pairs
}

/// Narrow phase between a sensor and a solid body.
fn shapes_touch(sensor: &RigidBody, other: &RigidBody) -> bool {
    match (sensor.shape(), other.shape()) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sensor.position.distance(other.position) <= ra + rb
        }
        (Shape::Sphere { radius }, Shape::Cuboid { half_extents }) => {
            sphere_touches_box(sensor.position, radius, other, half_extents)
        }
        (Shape::Cuboid { half_extents }, Shape::Sphere { radius }) => {
            sphere_touches_box(other.position, radius, sensor, half_extents)
        }
        (Shape::Cuboid { .. }, Shape::Cuboid { .. }) => true,
    }
}

fn sphere_touches_box(center: Vec3, radius: f32, cuboid: &RigidBody, half_extents: Vec3) -> bool {
    let local = cuboid.orientation.inverse() * (center - cuboid.position);
    let closest = local.clamp(-half_extents, half_extents);
    local.distance_squared(closest) <= radius * radius
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn world(broadphase: Broadphase) -> PhysicsWorld {
        PhysicsWorld::new(WorldConfig {
            broadphase,
            ..WorldConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_ray_hits_ground() {
        let world = world(Broadphase::Naive);
        let hit = world
            .cast_ray(Vec3::new(1.0, 0.5, 2.0), Vec3::NEG_Y, 1.0)
            .unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-6);
        assert!((hit.point - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-6);
        assert_eq!(hit.normal, Vec3::Y);
    }

    #[test]
    fn test_ray_out_of_range() {
        let world = world(Broadphase::Naive);
        assert!(world.cast_ray(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 1.0).is_none());
        // Pointing up never reaches the ground.
        assert!(world.cast_ray(Vec3::new(0.0, 0.5, 0.0), Vec3::Y, 10.0).is_none());
    }

    #[test]
    fn test_degenerate_rays() {
        let world = world(Broadphase::Naive);
        assert!(world.cast_ray(Vec3::Y, Vec3::ZERO, 1.0).is_none());
        assert!(world.cast_ray(Vec3::NAN, Vec3::NEG_Y, 1.0).is_none());
        assert!(world.cast_ray(Vec3::Y, Vec3::NEG_Y, 0.0).is_none());
        assert!(world.cast_ray(Vec3::Y, Vec3::new(f32::NAN, -1.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_ray_origin_below_ground() {
        let world = world(Broadphase::Naive);
        let hit = world
            .cast_ray(Vec3::new(0.0, -0.1, 0.0), Vec3::NEG_Y, 1.0)
            .unwrap();
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_box_rests_on_ground() {
        let mut world = world(Broadphase::Naive);
        let handle = world.insert(
            RigidBody::dynamic(
                Shape::Cuboid {
                    half_extents: Vec3::splat(0.1),
                },
                1.0,
                Vec3::new(0.0, 0.5, 0.0),
            )
            .with_sleep(false),
        );
        for _ in 0..600 {
            world.step(1.0 / 60.0);
        }
        let body = world.get(handle).unwrap();
        assert!((body.position.y - 0.1).abs() < 1e-3);
    }

    fn trigger_world(broadphase: Broadphase) -> (PhysicsWorld, Vec<BodyHandle>, BodyHandle) {
        let mut world = world(broadphase);
        let sensors = (0..5u8)
            .map(|i| {
                world.insert(
                    RigidBody::kinematic(
                        Shape::Sphere { radius: 0.05 },
                        Vec3::new(f32::from(i) * 0.5, 0.05, 0.0),
                    )
                    .with_sensor(true),
                )
            })
            .collect();
        let solid = world.insert(RigidBody::kinematic(
            Shape::Cuboid {
                half_extents: Vec3::new(0.3, 0.1, 0.1),
            },
            Vec3::new(0.75, 0.1, 0.0),
        ));
        (world, sensors, solid)
    }

    #[test]
    fn test_trigger_contacts() {
        let (mut world, sensors, solid) = trigger_world(Broadphase::SweepAndPrune);
        world.step(1.0 / 60.0);
        // Box spans x in [0.45, 1.05]: touches the sensors at 0.5 and 1.0.
        let contacts = world.drain_contacts();
        assert_eq!(
            contacts,
            vec![
                TriggerContact {
                    sensor: sensors[1],
                    other: solid
                },
                TriggerContact {
                    sensor: sensors[2],
                    other: solid
                },
            ]
        );
        assert!(world.contacts().is_empty());
    }

    #[test]
    fn test_broadphases_agree() {
        let (mut naive, _, _) = trigger_world(Broadphase::Naive);
        let (mut sap, _, _) = trigger_world(Broadphase::SweepAndPrune);
        naive.step(1.0 / 60.0);
        sap.step(1.0 / 60.0);
        assert_eq!(naive.contacts(), sap.contacts());
    }

    #[test]
    fn test_rotated_box_misses_sphere() {
        let mut world = world(Broadphase::Naive);
        let sensor = world.insert(
            RigidBody::kinematic(Shape::Sphere { radius: 0.05 }, Vec3::new(0.2, 0.0, 0.2))
                .with_sensor(true),
        );
        // AABB of the rotated box reaches the sphere, the box itself does not.
        world.insert(
            RigidBody::kinematic(
                Shape::Cuboid {
                    half_extents: Vec3::new(0.3, 0.1, 0.02),
                },
                Vec3::ZERO,
            )
            .with_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4)),
        );
        world.step(1.0 / 60.0);
        assert!(world.contacts().iter().all(|c| c.sensor != sensor));
    }

    #[test]
    fn test_disabled_sensor_is_ignored() {
        let (mut world, sensors, _) = trigger_world(Broadphase::SweepAndPrune);
        world.body_mut(sensors[1]).unwrap().set_enabled(false);
        world.step(1.0 / 60.0);
        assert_eq!(world.contacts().len(), 1);
    }

    #[test]
    fn test_invalid_damping() {
        let config = WorldConfig {
            linear_damping: 1.5,
            ..WorldConfig::default()
        };
        assert!(matches!(
            PhysicsWorld::new(config),
            Err(Error::InvalidConfig {
                field: "linear_damping",
                ..
            })
        ));
    }
}
