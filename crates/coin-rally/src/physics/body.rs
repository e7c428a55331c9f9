//! Rigid body state and integration.

use std::fmt;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Linear plus angular speed below which a sleepy body starts counting towards sleep.
const SLEEP_SPEED_LIMIT: f32 = 0.1;

/// Seconds a body must stay slow before it falls asleep.
const SLEEP_TIME_LIMIT: f32 = 1.0;

/// Stable handle of a body inside a [`super::PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u32);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a body responds to forces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyKind {
    /// Integrated every step, responds to forces and impulses.
    #[default]
    Dynamic,
    /// Moved only by explicit teleports. Ignores forces, has no mass.
    Kinematic,
}

/// Collision shape of a body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Box given by its half extents in body space.
    Cuboid {
        /// Half extents along the body axes.
        half_extents: Vec3,
    },
    /// Sphere around the body origin.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
}

impl Shape {
    /// Diagonal of the body-space inertia tensor for the given mass.
    pub fn principal_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Shape::Cuboid { half_extents } => {
                let size = half_extents * 2.0;
                let sq = size * size;
                Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0)
            }
            Shape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
        }
    }

    /// World-space bounding box for this shape at a pose.
    pub fn aabb(&self, position: Vec3, orientation: Quat) -> Aabb {
        let half = match *self {
            Shape::Cuboid { half_extents } => {
                let m = Mat3::from_quat(orientation);
                Vec3::new(
                    m.row(0).abs().dot(half_extents),
                    m.row(1).abs().dot(half_extents),
                    m.row(2).abs().dot(half_extents),
                )
            }
            Shape::Sphere { radius } => Vec3::splat(radius),
        };
        Aabb {
            min: position - half,
            max: position + half,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Whether two boxes overlap (touching counts).
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

/// Position and orientation of something in the world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub orientation: Quat,
}

impl Pose {
    /// Pose at a position with identity orientation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

/// Minimal rigid body: pose, velocities and mass properties.
#[derive(Clone, Debug)]
pub struct RigidBody {
    /// World position of the centre of mass.
    pub position: Vec3,
    /// World orientation.
    pub orientation: Quat,
    /// Linear velocity (units/s).
    pub linear_velocity: Vec3,
    /// Angular velocity (rad/s, world space).
    pub angular_velocity: Vec3,
    kind: BodyKind,
    shape: Shape,
    mass: f32,
    inverse_mass: f32,
    inverse_inertia: Vec3,
    sensor: bool,
    enabled: bool,
    can_sleep: bool,
    sleeping: bool,
    sleep_timer: f32,
    force: Vec3,
    torque: Vec3,
}

impl RigidBody {
    /// Create a dynamic body. A non-positive mass yields a body that cannot be pushed.
    pub fn dynamic(shape: Shape, mass: f32, position: Vec3) -> Self {
        let mut body = Self::kinematic(shape, position);
        body.kind = BodyKind::Dynamic;
        body.set_mass(mass);
        body
    }

    /// Create a kinematic body with zero mass.
    pub fn kinematic(shape: Shape, position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            kind: BodyKind::Kinematic,
            shape,
            mass: 0.0,
            inverse_mass: 0.0,
            inverse_inertia: Vec3::ZERO,
            sensor: false,
            enabled: true,
            can_sleep: true,
            sleeping: false,
            sleep_timer: 0.0,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
        }
    }

    /// Mark the body as a trigger volume: it reports overlaps but never pushes back.
    #[must_use]
    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    /// Allow or forbid automatic sleeping.
    #[must_use]
    pub fn with_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    /// Start from the given orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Disabled bodies are neither integrated nor tested for contacts.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Set the mass and recompute inverse mass and inertia.
    pub fn set_mass(&mut self, mass: f32) {
        if mass.is_finite() && mass > 0.0 {
            self.mass = mass;
            self.inverse_mass = 1.0 / mass;
            self.inverse_inertia = self.shape.principal_inertia(mass).recip();
        } else {
            self.mass = 0.0;
            self.inverse_mass = 0.0;
            self.inverse_inertia = Vec3::ZERO;
        }
    }

    /// Body-space point to world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }

    /// Velocity of a world-space point rigidly attached to the body.
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.position)
    }

    /// Multiply a world-space vector by the world-space inverse inertia tensor.
    fn apply_inverse_inertia(&self, v: Vec3) -> Vec3 {
        let local = self.orientation.inverse() * v;
        self.orientation * (local * self.inverse_inertia)
    }

    /// Mass felt by an impulse along `direction` applied at a world point.
    pub fn effective_mass_at(&self, point: Vec3, direction: Vec3) -> f32 {
        let r = point - self.position;
        let angular = self.apply_inverse_inertia(r.cross(direction)).cross(r);
        let denominator = self.inverse_mass + direction.dot(angular);
        if denominator > f32::EPSILON {
            1.0 / denominator
        } else {
            0.0
        }
    }

    /// Accumulate a force at the centre of mass until the next step.
    pub fn apply_force(&mut self, force: Vec3) {
        self.force += force;
        self.wake();
    }

    /// Accumulate a force applied at a world-space point.
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        self.force += force;
        self.torque += (point - self.position).cross(force);
        self.wake();
    }

    /// Instantly change velocity by an impulse through the centre of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
        self.wake();
    }

    /// Instantly change linear and angular velocity by an impulse at a world point.
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, point: Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
        let angular = (point - self.position).cross(impulse);
        self.angular_velocity += self.apply_inverse_inertia(angular);
        self.wake();
    }

    /// Impulse and application point both given in body space.
    pub fn apply_local_impulse(&mut self, local_impulse: Vec3, local_point: Vec3) {
        let impulse = self.orientation * local_impulse;
        let point = self.transform_point(local_point);
        self.apply_impulse_at_point(impulse, point);
    }

    /// Move to a pose and stop all motion. Mass and kind are kept.
    pub fn teleport(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        self.wake();
    }

    /// Kinematic override: teleport, zero the velocity and drop the mass.
    pub fn make_kinematic_at(&mut self, position: Vec3) {
        self.teleport(position, self.orientation);
        self.kind = BodyKind::Kinematic;
        self.set_mass(0.0);
    }

    fn wake(&mut self) {
        self.sleeping = false;
        self.sleep_timer = 0.0;
    }

    /// Semi-implicit Euler step. Clears accumulated forces.
    pub(crate) fn integrate(
        &mut self,
        dt: f32,
        gravity: Vec3,
        linear_damping: f32,
        angular_damping: f32,
    ) {
        let force = std::mem::take(&mut self.force);
        let torque = std::mem::take(&mut self.torque);

        if !self.enabled || self.kind == BodyKind::Kinematic || self.sleeping {
            return;
        }

        self.linear_velocity += (gravity + force * self.inverse_mass) * dt;
        self.angular_velocity += self.apply_inverse_inertia(torque) * dt;

        // Damping as a per-second fraction, like the velocity drag in the vehicle core.
        self.linear_velocity *= (1.0 - linear_damping).clamp(0.0, 1.0).powf(dt);
        self.angular_velocity *= (1.0 - angular_damping).clamp(0.0, 1.0).powf(dt);

        self.position += self.linear_velocity * dt;

        let spin = Quat::from_xyzw(
            self.angular_velocity.x,
            self.angular_velocity.y,
            self.angular_velocity.z,
            0.0,
        ) * self.orientation;
        self.orientation = (self.orientation + spin * (0.5 * dt)).normalize();

        if self.can_sleep {
            let speed = self.linear_velocity.length() + self.angular_velocity.length();
            if speed < SLEEP_SPEED_LIMIT {
                self.sleep_timer += dt;
                if self.sleep_timer >= SLEEP_TIME_LIMIT {
                    self.sleeping = true;
                    self.linear_velocity = Vec3::ZERO;
                    self.angular_velocity = Vec3::ZERO;
                }
            } else {
                self.sleep_timer = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn unit_box() -> Shape {
        Shape::Cuboid {
            half_extents: Vec3::splat(0.5),
        }
    }

    #[test]
    fn test_box_inertia() {
        let inertia = unit_box().principal_inertia(12.0);
        assert!((inertia - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn test_rotated_box_aabb() {
        let shape = Shape::Cuboid {
            half_extents: Vec3::new(2.0, 1.0, 1.0),
        };
        let aabb = shape.aabb(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
        // Long axis now lies along z.
        assert!((aabb.max.z - 2.0).abs() < 1e-5);
        assert!((aabb.max.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gravity_integration() {
        let mut body = RigidBody::dynamic(unit_box(), 1.0, Vec3::ZERO).with_sleep(false);
        body.integrate(0.5, Vec3::new(0.0, -2.0, 0.0), 0.0, 0.0);
        assert!((body.linear_velocity.y + 1.0).abs() < 1e-6);
        assert!((body.position.y + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_off_centre_force_produces_torque() {
        let mut body = RigidBody::dynamic(unit_box(), 12.0, Vec3::ZERO).with_sleep(false);
        body.apply_force_at_point(Vec3::X, Vec3::new(0.0, 0.0, -0.5));
        body.integrate(0.5, Vec3::ZERO, 0.0, 0.0);

        // Torque (0, -0.5, 0) over inertia 2 for half a second.
        assert!((body.angular_velocity - Vec3::new(0.0, -0.125, 0.0)).length() < 1e-6);
        assert!((body.linear_velocity - Vec3::X * (0.5 / 12.0)).length() < 1e-6);

        // Forces last one step only.
        let spin = body.angular_velocity;
        body.integrate(0.5, Vec3::ZERO, 0.0, 0.0);
        assert!((body.angular_velocity - spin).length() < 1e-6);
    }

    #[test]
    fn test_central_force_does_not_spin() {
        let mut body = RigidBody::dynamic(unit_box(), 2.0, Vec3::ZERO).with_sleep(false);
        body.apply_force(Vec3::new(0.0, 4.0, 0.0));
        body.integrate(0.25, Vec3::ZERO, 0.0, 0.0);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
        assert!((body.linear_velocity.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_off_centre_impulse_spins() {
        let mut body = RigidBody::dynamic(unit_box(), 1.0, Vec3::ZERO);
        body.apply_impulse_at_point(Vec3::X, Vec3::new(0.0, 0.0, -0.5));
        assert!(body.angular_velocity.length() > 0.0);
        assert!((body.linear_velocity - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_effective_mass() {
        let body = RigidBody::dynamic(unit_box(), 2.0, Vec3::ZERO);
        // Through the centre only the linear mass counts.
        assert!((body.effective_mass_at(Vec3::ZERO, Vec3::X) - 2.0).abs() < 1e-5);
        // Off-centre the body also rotates, so it feels lighter.
        assert!(body.effective_mass_at(Vec3::new(0.0, 0.0, 0.5), Vec3::X) < 2.0);
        let kinematic = RigidBody::kinematic(unit_box(), Vec3::ZERO);
        assert_eq!(kinematic.effective_mass_at(Vec3::ZERO, Vec3::X), 0.0);
    }

    #[test]
    fn test_kinematic_override() {
        let mut body = RigidBody::dynamic(Shape::Sphere { radius: 0.05 }, 3.0, Vec3::ONE);
        body.linear_velocity = Vec3::X;
        body.make_kinematic_at(Vec3::ZERO);
        assert_eq!(body.kind(), BodyKind::Kinematic);
        assert_eq!(body.mass(), 0.0);
        assert_eq!(body.position, Vec3::ZERO);
        assert_eq!(body.linear_velocity, Vec3::ZERO);

        // Forces no longer move it.
        body.apply_impulse(Vec3::X);
        body.integrate(1.0, Vec3::NEG_Y, 0.0, 0.0);
        assert_eq!(body.position, Vec3::ZERO);
    }

    #[test]
    fn test_body_falls_asleep_only_when_allowed() {
        let mut sleepy = RigidBody::dynamic(unit_box(), 1.0, Vec3::ZERO);
        let mut awake = sleepy.clone().with_sleep(false);
        for _ in 0..120 {
            sleepy.integrate(1.0 / 60.0, Vec3::ZERO, 0.0, 0.0);
            awake.integrate(1.0 / 60.0, Vec3::ZERO, 0.0, 0.0);
        }
        assert!(sleepy.is_sleeping());
        assert!(!awake.is_sleeping());
    }
}
