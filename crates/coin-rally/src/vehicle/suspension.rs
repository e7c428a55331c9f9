//! Raycast wheel suspension.
//!
//! Each wheel casts a ray from its chassis anchor along the chassis' down axis.
//! A hit within `rest_length + radius` means the wheel is grounded and the
//! compressed spring pushes the chassis up at the wheel anchor.

use glam::{Quat, Vec3};

use super::config::SuspensionConfig;
use crate::physics::{PhysicsWorld, Pose, RayHit, RigidBody};

/// Inverse contact/suspension alignment used when the ray grazes the ground.
const GRAZING_INV_CONTACT_DOT: f32 = 10.0;

/// Where a wheel sits on the chassis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WheelPosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl WheelPosition {
    /// All positions in wheel-layout order.
    pub const ALL: [WheelPosition; 4] = [
        WheelPosition::FrontLeft,
        WheelPosition::FrontRight,
        WheelPosition::RearLeft,
        WheelPosition::RearRight,
    ];

    pub fn is_front(self) -> bool {
        matches!(self, WheelPosition::FrontLeft | WheelPosition::FrontRight)
    }
}

/// One raycast-suspended wheel.
#[derive(Clone, Debug)]
pub struct WheelSuspension {
    position: WheelPosition,
    local_anchor: Vec3,
    radius: f32,
    config: SuspensionConfig,
    /// Steering angle (radians, positive turns left).
    pub(crate) steering: f32,
    /// Drive force along the wheel's forward axis.
    pub(crate) engine_force: f32,
    /// Brake force opposing rolling.
    pub(crate) brake: f32,
    grounded: bool,
    contact: Option<RayHit>,
    anchor_world: Vec3,
    suspension_length: f32,
    suspension_force: f32,
    world_position: Vec3,
    spin: f32,
}

impl WheelSuspension {
    pub fn new(
        position: WheelPosition,
        local_anchor: Vec3,
        radius: f32,
        config: SuspensionConfig,
    ) -> Self {
        Self {
            position,
            local_anchor,
            radius,
            config,
            steering: 0.0,
            engine_force: 0.0,
            brake: 0.0,
            grounded: false,
            contact: None,
            anchor_world: local_anchor,
            suspension_length: config.rest_length,
            suspension_force: 0.0,
            world_position: local_anchor - Vec3::Y * config.rest_length,
            spin: 0.0,
        }
    }

    pub fn position(&self) -> WheelPosition {
        self.position
    }

    pub fn local_anchor(&self) -> Vec3 {
        self.local_anchor
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn rest_length(&self) -> f32 {
        self.config.rest_length
    }

    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Ground contact from the last update, if grounded.
    pub fn contact(&self) -> Option<&RayHit> {
        self.contact.as_ref()
    }

    /// How far the spring is compressed below its rest length.
    pub fn compression(&self) -> f32 {
        self.config.rest_length - self.suspension_length
    }

    /// Suspension force from the last update.
    pub fn suspension_force(&self) -> f32 {
        self.suspension_force
    }

    /// Wheel centre in world space.
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// Accumulated rolling angle, for visuals.
    pub fn spin(&self) -> f32 {
        self.spin
    }

    /// Forward and axle axes of the wheel in world space, including steering.
    pub fn axes(&self, chassis_orientation: Quat) -> (Vec3, Vec3) {
        let steer = Quat::from_rotation_y(self.steering);
        let forward = chassis_orientation * (steer * Vec3::NEG_Z);
        let axle = chassis_orientation * (steer * Vec3::X);
        (forward, axle)
    }

    /// World pose of the wheel for rendering.
    pub fn pose(&self, chassis_orientation: Quat) -> Pose {
        let steer = Quat::from_rotation_y(self.steering);
        let roll = Quat::from_rotation_x(self.spin);
        Pose {
            position: self.world_position,
            orientation: chassis_orientation * steer * roll,
        }
    }

    /// Raycast the ground and compute the suspension force.
    ///
    /// A missing or degenerate hit leaves the wheel ungrounded with no force.
    /// Returns `true` when the grounded flag changed.
    pub fn update_contact(&mut self, world: &PhysicsWorld, chassis: &RigidBody) -> bool {
        let was_grounded = self.grounded;
        let origin = chassis.transform_point(self.local_anchor);
        let direction = chassis.orientation * Vec3::NEG_Y;
        let max_distance = self.config.rest_length + self.radius;
        self.anchor_world = origin;

        let hit = world
            .cast_ray(origin, direction, max_distance)
            .filter(|hit| hit.distance.is_finite() && hit.point.is_finite());

        match hit {
            Some(hit) => {
                let min_length = (self.config.rest_length - self.config.max_travel).max(0.0);
                self.suspension_length =
                    (hit.distance - self.radius).clamp(min_length, self.config.rest_length);
                self.world_position = origin + direction * self.suspension_length;
                self.suspension_force = self.spring_force(&hit, direction, chassis);
                self.grounded = true;
                self.contact = Some(hit);
            }
            None => {
                self.suspension_length = self.config.rest_length;
                self.world_position = origin + direction * self.config.rest_length;
                self.suspension_force = 0.0;
                self.grounded = false;
                self.contact = None;
            }
        }

        was_grounded != self.grounded
    }

    fn spring_force(&self, hit: &RayHit, direction: Vec3, chassis: &RigidBody) -> f32 {
        // Stiffer response when the suspension is not aligned with the ground normal.
        let denominator = hit.normal.dot(direction);
        let (inv_contact_dot, relative_velocity) = if denominator >= -0.1 {
            (GRAZING_INV_CONTACT_DOT, 0.0)
        } else {
            let inv = -1.0 / denominator;
            let projected = hit.normal.dot(chassis.velocity_at_point(hit.point));
            (inv, projected * inv)
        };

        let spring = self.config.stiffness * self.compression() * inv_contact_dot;
        let damping = if relative_velocity < 0.0 {
            self.config.damping_compression
        } else {
            self.config.damping_relaxation
        };
        let force = (spring - damping * relative_velocity) * chassis.mass();
        force.clamp(0.0, self.config.max_force)
    }

    /// Impulse pushing the chassis away from the ground for this step, and the
    /// world-space wheel anchor it acts on.
    pub fn suspension_impulse(&self, dt: f32) -> Option<(Vec3, Vec3)> {
        let contact = self.contact.as_ref()?;
        (self.suspension_force > 0.0)
            .then(|| (contact.normal * self.suspension_force * dt, self.anchor_world))
    }

    /// Roll the wheel by the ground speed along its forward axis.
    pub(crate) fn advance_spin(&mut self, forward_speed: f32, dt: f32) {
        if self.grounded {
            self.spin = (self.spin - forward_speed / self.radius * dt) % std::f32::consts::TAU;
        }
    }

    /// Drop any ground contact without touching driver input.
    pub(crate) fn reset_contact(&mut self) {
        self.grounded = false;
        self.contact = None;
        self.suspension_length = self.config.rest_length;
        self.suspension_force = 0.0;
    }

    /// Clear contact state and place the wheel at rest relative to the chassis.
    pub(crate) fn reset(&mut self, chassis: &RigidBody) {
        self.steering = 0.0;
        self.engine_force = 0.0;
        self.brake = 0.0;
        self.grounded = false;
        self.contact = None;
        self.suspension_length = self.config.rest_length;
        self.suspension_force = 0.0;
        self.spin = 0.0;
        self.sync_to_chassis(chassis);
    }

    /// Recompute the visual wheel centre after the chassis moved.
    pub(crate) fn sync_to_chassis(&mut self, chassis: &RigidBody) {
        self.anchor_world = chassis.transform_point(self.local_anchor);
        let direction = chassis.orientation * Vec3::NEG_Y;
        self.world_position = self.anchor_world + direction * self.suspension_length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Shape, WorldConfig};

    fn setup(height: f32) -> (PhysicsWorld, RigidBody, WheelSuspension) {
        let world = PhysicsWorld::new(WorldConfig::default()).unwrap();
        let chassis = RigidBody::dynamic(
            Shape::Cuboid {
                half_extents: Vec3::new(0.075, 0.035, 0.15),
            },
            250.0,
            Vec3::new(0.0, height, 0.0),
        );
        let wheel = WheelSuspension::new(
            WheelPosition::FrontLeft,
            Vec3::new(-0.1, 0.0, -0.15),
            0.05,
            SuspensionConfig::default(),
        );
        (world, chassis, wheel)
    }

    #[test]
    fn test_grounded_within_range() {
        // Ray range is rest length + radius = 0.15.
        let (world, chassis, mut wheel) = setup(0.12);
        assert!(wheel.update_contact(&world, &chassis));
        assert!(wheel.is_grounded());
        assert!((wheel.compression() - 0.03).abs() < 1e-5);
        assert!(wheel.suspension_force() > 0.0);

        let (impulse, point) = wheel.suspension_impulse(1.0 / 60.0).unwrap();
        assert!(impulse.y > 0.0);
        // Applied at the anchor, not at the ground.
        assert!((point - Vec3::new(-0.1, 0.12, -0.15)).length() < 1e-6);
    }

    #[test]
    fn test_out_of_range_is_airborne() {
        let (world, chassis, mut wheel) = setup(0.5);
        assert!(!wheel.update_contact(&world, &chassis));
        assert!(!wheel.is_grounded());
        assert_eq!(wheel.suspension_force(), 0.0);
        assert!(wheel.suspension_impulse(1.0 / 60.0).is_none());
    }

    #[test]
    fn test_degenerate_chassis_is_airborne() {
        let (world, mut chassis, mut wheel) = setup(0.12);
        chassis.position = Vec3::NAN;
        wheel.update_contact(&world, &chassis);
        assert!(!wheel.is_grounded());
    }

    #[test]
    fn test_upside_down_wheel_sees_no_ground() {
        let (world, mut chassis, mut wheel) = setup(0.12);
        chassis.orientation = Quat::from_rotation_z(std::f32::consts::PI);
        wheel.update_contact(&world, &chassis);
        assert!(!wheel.is_grounded());
    }

    #[test]
    fn test_compression_limited_by_travel() {
        let (world, chassis, mut wheel) = setup(0.0);
        wheel.update_contact(&world, &chassis);
        assert!(wheel.is_grounded());
        assert!((wheel.compression() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_steering_turns_forward_axis_left() {
        let (_, _, mut wheel) = setup(0.12);
        wheel.steering = 0.35;
        let (forward, axle) = wheel.axes(Quat::IDENTITY);
        assert!(forward.x < 0.0);
        assert!(forward.dot(axle).abs() < 1e-6);
    }
}
