//! Vehicle controller: one chassis body on four raycast wheels.

use glam::{Quat, Vec3};

use super::config::{Drivetrain, VehicleConfig, WHEEL_COUNT};
use super::suspension::{WheelPosition, WheelSuspension};
use crate::error::Result;
use crate::physics::{BodyHandle, PhysicsWorld, Pose, RigidBody, Shape};

/// Which way a flip action rolls the car.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipDirection {
    /// Kick pressed down at the tail; the chassis pitches nose up.
    Front,
    /// Kick pressed down at the nose; the chassis pitches nose down.
    Back,
}

/// Vehicle state published after every tick.
///
/// This is what the camera and pickups read; neither touches the chassis body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    /// Chassis position.
    pub position: Vec3,
    /// Chassis orientation.
    pub orientation: Quat,
    /// Chassis linear velocity.
    pub linear_velocity: Vec3,
    /// Chassis angular velocity.
    pub angular_velocity: Vec3,
    /// True iff no wheel touches the ground.
    pub airborne: bool,
}

impl VehicleState {
    fn from_body(body: &RigidBody, airborne: bool) -> Self {
        Self {
            position: body.position,
            orientation: body.orientation,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            airborne,
        }
    }

    /// Current speed magnitude.
    pub fn speed(&self) -> f32 {
        self.linear_velocity.length()
    }

    /// Chassis forward direction (vehicles face -Z).
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }
}

/// Owns the chassis body handle and the four wheels.
pub struct VehicleController {
    config: VehicleConfig,
    chassis: BodyHandle,
    wheels: [WheelSuspension; WHEEL_COUNT],
    state: VehicleState,
    steer_angle: f32,
    throttle: f32,
    brake_force: f32,
    engine_multiplier: f32,
}

impl VehicleController {
    /// Validate the configuration and insert the chassis into the world.
    pub fn new(world: &mut PhysicsWorld, config: VehicleConfig) -> Result<Self> {
        config.validate()?;
        let anchors = config.wheel_anchors()?;

        let body = RigidBody::dynamic(
            Shape::Cuboid {
                half_extents: config.chassis.half_extents(),
            },
            config.mass,
            config.initial_position,
        )
        .with_sleep(false);
        let chassis = world.insert(body);
        let body = world.get(chassis)?;

        let mut wheels: [WheelSuspension; WHEEL_COUNT] = std::array::from_fn(|i| {
            WheelSuspension::new(
                WheelPosition::ALL[i],
                anchors[i],
                config.wheel_radius,
                config.suspension,
            )
        });
        for wheel in &mut wheels {
            wheel.sync_to_chassis(body);
        }
        let state = VehicleState::from_body(body, true);

        tracing::info!(
            "Vehicle created: mass {}, chassis {:?}, spawn {:?}",
            config.mass,
            config.chassis.half_extents(),
            config.initial_position
        );

        Ok(Self {
            config,
            chassis,
            wheels,
            state,
            steer_angle: 0.0,
            throttle: 0.0,
            brake_force: 0.0,
            engine_multiplier: 1.0,
        })
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Handle of the chassis body.
    pub fn chassis(&self) -> BodyHandle {
        self.chassis
    }

    /// Scale engine force, e.g. while a speed boost is active.
    pub fn set_engine_multiplier(&mut self, multiplier: f32) {
        self.engine_multiplier = if multiplier.is_finite() {
            multiplier.max(0.0)
        } else {
            1.0
        };
        self.distribute_input();
    }

    /// Set driver input for the next ticks.
    ///
    /// `steer_angle` is clamped to the configured maximum (positive turns left),
    /// `throttle` to `[-1, 1]` with negative meaning reverse, and `brake_force`
    /// is applied to every wheel. Non-finite values count as zero.
    pub fn apply_input(&mut self, steer_angle: f32, throttle: f32, brake_force: f32) {
        let max_steer = self.config.max_steer_angle;
        self.steer_angle = finite_or_zero(steer_angle).clamp(-max_steer, max_steer);
        self.throttle = finite_or_zero(throttle).clamp(-1.0, 1.0);
        self.brake_force = finite_or_zero(brake_force).max(0.0);
        self.distribute_input();
    }

    fn distribute_input(&mut self) {
        let drivetrain = self.config.drivetrain;
        let engine = self.throttle * self.config.engine_force * self.engine_multiplier;
        for wheel in &mut self.wheels {
            let front = wheel.position().is_front();
            wheel.steering = if front { self.steer_angle } else { 0.0 };
            let driven = match drivetrain {
                Drivetrain::Front => front,
                Drivetrain::Rear => !front,
                Drivetrain::All => true,
            };
            wheel.engine_force = if driven { engine } else { 0.0 };
            wheel.brake = self.brake_force;
        }
    }

    /// Kick the chassis over its pitch axis.
    pub fn apply_flip(&mut self, world: &mut PhysicsWorld, direction: FlipDirection) {
        let flip = self.config.flip;
        let (impulse, point) = match direction {
            FlipDirection::Front => (
                Vec3::new(0.0, -flip.lift, -flip.push),
                Vec3::new(0.0, 0.0, flip.lever),
            ),
            FlipDirection::Back => (
                Vec3::new(0.0, -flip.lift, flip.push),
                Vec3::new(0.0, 0.0, -flip.lever),
            ),
        };
        if let Some(body) = world.body_mut(self.chassis) {
            body.apply_local_impulse(impulse, point);
            tracing::debug!("Flip {:?}", direction);
        }
    }

    /// Advance the vehicle by `dt`.
    ///
    /// Casts every wheel ray against the current chassis pose, turns suspension,
    /// drive, brake and tire grip into chassis impulses, then steps the world.
    pub fn tick(&mut self, world: &mut PhysicsWorld, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }

        let impulses = self.wheel_impulses(world, dt);

        if let Some(body) = world.body_mut(self.chassis) {
            for (impulse, point) in impulses {
                body.apply_impulse_at_point(impulse, point);
            }
        }

        world.step(dt);

        if let Some(body) = world.body(self.chassis) {
            for wheel in &mut self.wheels {
                wheel.sync_to_chassis(body);
            }
            self.state = VehicleState::from_body(body, self.is_airborne());
        }
    }

    /// Update wheel contacts and collect this step's impulses.
    fn wheel_impulses(&mut self, world: &PhysicsWorld, dt: f32) -> Vec<(Vec3, Vec3)> {
        let mut impulses = Vec::with_capacity(WHEEL_COUNT * 4);
        let Some(chassis) = world.body(self.chassis) else {
            for wheel in &mut self.wheels {
                wheel.reset_contact();
            }
            return impulses;
        };

        for wheel in &mut self.wheels {
            if wheel.update_contact(world, chassis) {
                tracing::debug!(
                    "Wheel {:?} grounded: {}",
                    wheel.position(),
                    wheel.is_grounded()
                );
            }
        }

        let grounded = self.wheels.iter().filter(|w| w.is_grounded()).count();
        if grounded == 0 {
            return impulses;
        }
        #[allow(clippy::cast_precision_loss)]
        let share = 1.0 / grounded as f32;
        let up = chassis.orientation * Vec3::Y;

        for wheel in &mut self.wheels {
            let Some(contact) = wheel.contact().copied() else {
                continue;
            };
            if let Some(suspension) = wheel.suspension_impulse(dt) {
                impulses.push(suspension);
            }

            let (forward, axle) = wheel.axes(chassis.orientation);
            let forward = project_onto_plane(forward, contact.normal);
            let side = project_onto_plane(axle, contact.normal);

            let point_velocity = chassis.velocity_at_point(contact.point);
            let forward_speed = point_velocity.dot(forward);
            let side_speed = point_velocity.dot(side);
            wheel.advance_spin(forward_speed, dt);

            // Grip forces act near the chassis' height so they barely roll it.
            let r = contact.point - chassis.position;
            let apply_at =
                chassis.position + r - up * r.dot(up) * (1.0 - self.config.roll_influence);

            if wheel.engine_force != 0.0 {
                impulses.push((forward * wheel.engine_force * dt, apply_at));
            }

            if wheel.brake > 0.0 && forward_speed != 0.0 {
                let stop =
                    forward_speed.abs() * chassis.effective_mass_at(apply_at, forward) * share;
                let brake = (wheel.brake * dt).min(stop);
                impulses.push((-forward * forward_speed.signum() * brake, apply_at));
            }

            let budget = self.config.friction_slip * wheel.suspension_force() * dt;
            let grip = (side_speed * chassis.effective_mass_at(apply_at, side) * share)
                .clamp(-budget, budget);
            if grip != 0.0 {
                impulses.push((-side * grip, apply_at));
            }
        }

        impulses
    }

    /// Restore the spawn pose and stop all motion.
    pub fn reset(&mut self, world: &mut PhysicsWorld) {
        self.steer_angle = 0.0;
        self.throttle = 0.0;
        self.brake_force = 0.0;
        if let Some(body) = world.body_mut(self.chassis) {
            body.teleport(self.config.initial_position, Quat::IDENTITY);
        }
        if let Some(body) = world.body(self.chassis) {
            for wheel in &mut self.wheels {
                wheel.reset(body);
            }
            self.state = VehicleState::from_body(body, true);
        }
        self.distribute_input();
        tracing::info!("Vehicle reset to {:?}", self.config.initial_position);
    }

    /// State published by the last tick.
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn orientation(&self) -> Quat {
        self.state.orientation
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.state.linear_velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.state.angular_velocity
    }

    /// Current clamped steering angle.
    pub fn steer_angle(&self) -> f32 {
        self.steer_angle
    }

    /// Current clamped throttle.
    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    /// Current brake force.
    pub fn brake_force(&self) -> f32 {
        self.brake_force
    }

    /// Whether wheel `index` touches the ground. Out-of-range indices are not grounded.
    pub fn is_wheel_grounded(&self, index: usize) -> bool {
        self.wheels.get(index).is_some_and(WheelSuspension::is_grounded)
    }

    /// True iff all four wheels are off the ground.
    ///
    /// This is the camera's airborne heuristic, not a contact-accurate one: a car
    /// resting on its roof with all wheels in the air counts as airborne.
    pub fn is_airborne(&self) -> bool {
        self.wheels.iter().all(|wheel| !wheel.is_grounded())
    }

    pub fn wheels(&self) -> &[WheelSuspension; WHEEL_COUNT] {
        &self.wheels
    }

    /// Chassis pose for rendering.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.state.position,
            orientation: self.state.orientation,
        }
    }

    /// Wheel poses for rendering, in layout order.
    pub fn wheel_poses(&self) -> [Pose; WHEEL_COUNT] {
        std::array::from_fn(|i| self.wheels[i].pose(self.state.orientation))
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

fn project_onto_plane(v: Vec3, normal: Vec3) -> Vec3 {
    (v - normal * v.dot(normal)).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::physics::WorldConfig;
    use crate::vehicle::ChassisDimensions;

    const DT: f32 = 1.0 / 60.0;

    fn setup() -> (PhysicsWorld, VehicleController) {
        let mut world = PhysicsWorld::new(WorldConfig::default()).unwrap();
        let vehicle = VehicleController::new(&mut world, VehicleConfig::default()).unwrap();
        (world, vehicle)
    }

    fn settle(world: &mut PhysicsWorld, vehicle: &mut VehicleController, seconds: f32) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (seconds / DT) as usize;
        for _ in 0..ticks {
            vehicle.tick(world, DT);
        }
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut world = PhysicsWorld::new(WorldConfig::default()).unwrap();
        let mut layout = ChassisDimensions::default().wheel_layout().to_vec();
        layout.push(Vec3::ZERO);
        let config = VehicleConfig {
            wheel_layout: Some(layout),
            ..VehicleConfig::default()
        };
        assert!(matches!(
            VehicleController::new(&mut world, config),
            Err(Error::WheelCount { actual: 5, .. })
        ));
        // Nothing was inserted.
        assert!(world.is_empty());
    }

    #[test]
    fn test_spawns_airborne_then_lands() {
        let (mut world, mut vehicle) = setup();
        assert!(vehicle.is_airborne());
        settle(&mut world, &mut vehicle, 4.0);
        assert!(!vehicle.is_airborne());
        assert!((0..4).all(|i| vehicle.is_wheel_grounded(i)));
        // Resting on the springs: below spawn height, above the ground.
        let y = vehicle.position().y;
        assert!(y > 0.05 && y < 0.2, "chassis height {y}");
        assert!(vehicle.state().speed() < 0.05);
    }

    #[test]
    fn test_out_of_range_wheel_index() {
        let (_, vehicle) = setup();
        assert!(!vehicle.is_wheel_grounded(4));
    }

    #[test]
    fn test_steering_is_clamped_and_front_only() {
        let (_, mut vehicle) = setup();
        vehicle.apply_input(2.0, 0.0, 0.0);
        assert!((vehicle.steer_angle() - 0.35).abs() < 1e-6);
        let wheels = vehicle.wheels();
        assert!((wheels[0].steering() - 0.35).abs() < 1e-6);
        assert!((wheels[1].steering() - 0.35).abs() < 1e-6);
        assert_eq!(wheels[2].steering(), 0.0);
        assert_eq!(wheels[3].steering(), 0.0);

        vehicle.apply_input(f32::NAN, 5.0, -3.0);
        assert_eq!(vehicle.steer_angle(), 0.0);
        assert_eq!(vehicle.throttle(), 1.0);
        assert_eq!(vehicle.brake_force(), 0.0);
    }

    #[test]
    fn test_throttle_drives_forward_and_reverse() {
        let (mut world, mut vehicle) = setup();
        settle(&mut world, &mut vehicle, 3.0);
        let start = vehicle.position();

        vehicle.apply_input(0.0, 1.0, 0.0);
        settle(&mut world, &mut vehicle, 1.0);
        let forward = vehicle.state().forward();
        assert!((vehicle.position() - start).dot(forward) > 0.05);

        let (mut world, mut vehicle) = setup();
        settle(&mut world, &mut vehicle, 3.0);
        let start = vehicle.position();
        vehicle.apply_input(0.0, -1.0, 0.0);
        settle(&mut world, &mut vehicle, 1.0);
        assert!((vehicle.position() - start).dot(forward) < -0.05);
    }

    #[test]
    fn test_brake_slows_the_car() {
        let (mut world, mut vehicle) = setup();
        settle(&mut world, &mut vehicle, 3.0);
        vehicle.apply_input(0.0, 1.0, 0.0);
        settle(&mut world, &mut vehicle, 1.5);
        let cruising = vehicle.state().speed();

        vehicle.apply_input(0.0, 0.0, vehicle.config().brake_force);
        settle(&mut world, &mut vehicle, 2.0);
        assert!(vehicle.state().speed() < cruising * 0.5);
    }

    #[test]
    fn test_airborne_requires_all_wheels_off_ground() {
        let (mut world, mut vehicle) = setup();
        settle(&mut world, &mut vehicle, 3.0);
        assert!(!vehicle.is_airborne());

        // Lift the chassis so only the rear wheels still reach the ground.
        let body = world.body_mut(vehicle.chassis()).unwrap();
        body.orientation = Quat::from_rotation_x(0.4);
        vehicle.tick(&mut world, DT);
        assert!(!vehicle.is_wheel_grounded(0));
        assert!(!vehicle.is_wheel_grounded(1));
        assert!(vehicle.is_wheel_grounded(2) || vehicle.is_wheel_grounded(3));
        assert!(!vehicle.is_airborne());

        let body = world.body_mut(vehicle.chassis()).unwrap();
        body.position.y = 2.0;
        vehicle.tick(&mut world, DT);
        assert!(vehicle.is_airborne());
        assert!(vehicle.state().airborne);
    }

    #[test]
    fn test_reset_restores_spawn() {
        let (mut world, mut vehicle) = setup();
        vehicle.apply_input(0.3, 1.0, 0.0);
        settle(&mut world, &mut vehicle, 3.0);
        vehicle.apply_flip(&mut world, FlipDirection::Front);
        vehicle.tick(&mut world, DT);

        vehicle.reset(&mut world);
        let config = VehicleConfig::default();
        assert_eq!(vehicle.position(), config.initial_position);
        assert_eq!(vehicle.orientation(), Quat::IDENTITY);
        assert_eq!(vehicle.linear_velocity(), Vec3::ZERO);
        assert_eq!(vehicle.angular_velocity(), Vec3::ZERO);
        assert!(vehicle.is_airborne());
        assert_eq!(vehicle.throttle(), 0.0);
        let body = world.get(vehicle.chassis()).unwrap();
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.mass(), config.mass);
    }

    #[test]
    fn test_flip_directions_pitch_opposite_ways() {
        let (mut world, mut vehicle) = setup();
        vehicle.apply_flip(&mut world, FlipDirection::Front);
        // Downward kick at +z (the tail) spins about +x, lifting the nose.
        let front = world.get(vehicle.chassis()).unwrap().angular_velocity;
        assert!(front.x > 0.0);

        let (mut world, mut vehicle) = setup();
        vehicle.apply_flip(&mut world, FlipDirection::Back);
        let back = world.get(vehicle.chassis()).unwrap().angular_velocity;
        assert!(back.x < 0.0);
    }

    #[test]
    fn test_engine_multiplier_scales_drive() {
        let (_, mut vehicle) = setup();
        vehicle.apply_input(0.0, 1.0, 0.0);
        let base = vehicle.wheels()[2].engine_force;
        vehicle.set_engine_multiplier(2.0);
        assert!((vehicle.wheels()[2].engine_force - 2.0 * base).abs() < 1e-4);
        // Rear-wheel drive by default.
        assert_eq!(vehicle.wheels()[0].engine_force, 0.0);
    }
}
