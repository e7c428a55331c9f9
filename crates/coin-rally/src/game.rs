//! Per-tick pipeline.
//!
//! [`Game`] owns the physics world and every component and runs them in a
//! fixed order each tick: one-shot actions (reset first), driver input,
//! vehicle physics, pickups, camera, then the boost subscriber.

use serde::{Deserialize, Serialize};

use crate::boost::{BoostConfig, BoostState};
use crate::camera::{CameraConfig, CameraMode, CameraRig};
use crate::clock::{ClockConfig, FrameSteps, GameLoopClock};
use crate::error::Result;
use crate::input::{ActionState, DriveIntent};
use crate::physics::{PhysicsWorld, Pose, WorldConfig};
use crate::pickup::{CoinCollected, PickupConfig, PickupField};
use crate::vehicle::{VehicleConfig, VehicleController, WHEEL_COUNT};

/// Every tunable of a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub world: WorldConfig,
    pub vehicle: VehicleConfig,
    pub camera: CameraConfig,
    pub pickups: PickupConfig,
    pub clock: ClockConfig,
    pub boost: BoostConfig,
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;
        self.vehicle.validate()?;
        self.camera.validate()?;
        self.pickups.validate()?;
        self.clock.validate()?;
        self.boost.validate()
    }
}

/// What one host frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Simulation steps run.
    pub steps: usize,
    /// Coins collected during those steps.
    pub collected: Vec<CoinCollected>,
    /// Whether the displayed whole-second counter changed.
    pub seconds_changed: bool,
    /// Whole simulated seconds so far.
    pub elapsed_seconds: u64,
}

/// Transforms a renderer needs for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSnapshot {
    /// Chassis pose.
    pub chassis: Pose,
    /// Wheel poses, spin included, in layout order.
    pub wheels: [Pose; WHEEL_COUNT],
    /// Wheel rolling angles.
    pub wheel_spin: [f32; WHEEL_COUNT],
    /// Active coins by id.
    pub coins: Vec<(u32, Pose)>,
    /// Camera pose.
    pub camera: Pose,
    /// Active camera mode.
    pub camera_mode: CameraMode,
    /// Whole simulated seconds.
    pub elapsed_seconds: u64,
    /// Coins collected so far.
    pub score: u32,
    /// Current combo length.
    pub combo: u32,
    /// Whether a speed boost is running.
    pub boosting: bool,
}

/// A running session.
pub struct Game {
    config: GameConfig,
    world: PhysicsWorld,
    vehicle: VehicleController,
    pickups: PickupField,
    camera: CameraRig,
    clock: GameLoopClock,
    boost: BoostState,
    input: ActionState,
}

impl Game {
    /// Validate `config` and build the scene. Nothing ticks until this succeeds.
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;

        let mut world = PhysicsWorld::new(config.world.clone())?;
        let vehicle = VehicleController::new(&mut world, config.vehicle.clone())?;
        let mut pickups = PickupField::new(&mut world, &config.pickups)?;
        let camera = CameraRig::new(config.camera)?;
        let clock = GameLoopClock::new(config.clock)?;
        let boost = BoostState::new(config.boost, pickups.subscribe())?;

        tracing::info!(
            "Game ready: {} bodies, {} coins, {:?} broadphase",
            world.len(),
            pickups.coins().len(),
            config.world.broadphase
        );

        Ok(Self {
            config,
            world,
            vehicle,
            pickups,
            camera,
            clock,
            boost,
            input: ActionState::default(),
        })
    }

    /// Run the simulation steps due for a host frame of `frame_dt` seconds.
    ///
    /// Key-down actions are applied on the first step only and consumed once a
    /// step has run; held inputs apply to every step.
    pub fn frame(&mut self, frame_dt: f32) -> FrameReport {
        let steps = self.clock.advance(frame_dt);
        self.run_steps(steps)
    }

    /// Like [`Self::frame`], timed by the wall clock.
    pub fn frame_wall_clock(&mut self) -> FrameReport {
        let steps = self.clock.advance_wall_clock();
        self.run_steps(steps)
    }

    fn run_steps(&mut self, steps: FrameSteps) -> FrameReport {
        let seconds_changed = steps.seconds_changed();
        let intent = self.sample_intent();
        let mut report = FrameReport {
            steps: steps.len(),
            seconds_changed,
            elapsed_seconds: self.clock.elapsed_seconds(),
            ..FrameReport::default()
        };
        if report.steps > 0 {
            self.input.clear_just_pressed();
        }

        for (index, dt) in steps.enumerate() {
            let intent = if index == 0 {
                intent
            } else {
                intent.continuous()
            };
            report.collected.extend(self.tick(intent, dt));
        }
        report
    }

    /// Decode the current action state.
    pub fn sample_intent(&self) -> DriveIntent {
        DriveIntent::sample(
            &self.input,
            self.config.vehicle.max_steer_angle,
            self.config.vehicle.brake_force,
        )
    }

    /// One simulation step.
    pub fn tick(&mut self, intent: DriveIntent, dt: f32) -> Vec<CoinCollected> {
        if intent.reset {
            self.vehicle.reset(&mut self.world);
        }
        if intent.toggle_camera {
            self.camera.toggle_mode();
        }
        if let Some(direction) = intent.flip {
            self.vehicle.apply_flip(&mut self.world, direction);
        }

        self.vehicle.set_engine_multiplier(self.boost.engine_multiplier());
        self.vehicle
            .apply_input(intent.steer_angle, intent.throttle, intent.brake_force);
        self.vehicle.tick(&mut self.world, dt);

        let contacts = self.world.drain_contacts();
        self.pickups
            .handle_contacts(&mut self.world, &contacts, self.vehicle.chassis());
        self.pickups.tick(&mut self.world, self.vehicle.position());

        self.camera.tick(self.vehicle.state(), dt);

        self.boost.tick(dt)
    }

    /// Receive every future [`CoinCollected`].
    pub fn subscribe(&mut self) -> async_channel::Receiver<CoinCollected> {
        self.pickups.subscribe()
    }

    /// Transforms for the renderer.
    pub fn snapshot(&self) -> FrameSnapshot {
        let wheels = self.vehicle.wheels();
        FrameSnapshot {
            chassis: self.vehicle.pose(),
            wheels: self.vehicle.wheel_poses(),
            wheel_spin: std::array::from_fn(|i| wheels[i].spin()),
            coins: self.pickups.active_poses(),
            camera: self.camera.pose(),
            camera_mode: self.camera.mode(),
            elapsed_seconds: self.clock.elapsed_seconds(),
            score: self.boost.score(),
            combo: self.boost.combo(),
            boosting: self.boost.is_boosting(),
        }
    }

    /// Host side of the input surface.
    pub fn input_mut(&mut self) -> &mut ActionState {
        &mut self.input
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn vehicle(&self) -> &VehicleController {
        &self.vehicle
    }

    pub fn pickups(&self) -> &PickupField {
        &self.pickups
    }

    /// Collect a coin directly, e.g. from a host-side trigger.
    pub fn collect(&mut self, coin_id: u32) -> bool {
        self.pickups.collect(&mut self.world, coin_id)
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    pub fn clock(&self) -> &GameLoopClock {
        &self.clock
    }

    pub fn boost(&self) -> &BoostState {
        &self.boost
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};
    use proptest::prelude::*;

    use super::*;
    use crate::error::Error;
    use crate::input::DriveAction;
    use crate::vehicle::FlipDirection;

    const DT: f32 = 1.0 / 60.0;

    fn game() -> Game {
        Game::new(GameConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_never_ticks() {
        let mut config = GameConfig::default();
        config.vehicle.mass = 0.0;
        assert!(matches!(
            Game::new(config),
            Err(Error::InvalidConfig { field: "mass", .. })
        ));
    }

    #[test]
    fn test_default_config_from_empty_json() {
        let config: GameConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_one_shot_actions_fire_once() {
        let mut game = game();
        game.input_mut().press(DriveAction::ToggleCamera);
        // Three steps in one frame: the toggle applies once.
        let report = game.frame(3.0 * DT + 1e-5);
        assert_eq!(report.steps, 3);
        assert_eq!(game.camera().mode(), CameraMode::Fixed);

        // Still held: no new edge.
        game.frame(DT);
        assert_eq!(game.camera().mode(), CameraMode::Fixed);

        game.input_mut().release(DriveAction::ToggleCamera);
        game.input_mut().press(DriveAction::ToggleCamera);
        game.frame(DT);
        assert_eq!(game.camera().mode(), CameraMode::Follow);
    }

    #[test]
    fn test_edge_survives_frames_without_steps() {
        let mut game = game();
        game.input_mut().press(DriveAction::ToggleCamera);
        assert_eq!(game.frame(DT * 0.25).steps, 0);
        game.frame(DT);
        assert_eq!(game.camera().mode(), CameraMode::Fixed);
    }

    #[test]
    fn test_wall_clock_frames() {
        let mut game = game();
        game.input_mut().press(DriveAction::ToggleCamera);

        // The first wall-clock frame only starts timing.
        let report = game.frame_wall_clock();
        assert_eq!(report.steps, 0);
        assert!(game.input_mut().just_pressed(DriveAction::ToggleCamera));

        std::thread::sleep(std::time::Duration::from_millis(50));
        let report = game.frame_wall_clock();
        assert!(report.steps >= 1);
        let max_substeps = usize::try_from(game.config().clock.max_substeps).unwrap();
        assert!(report.steps <= max_substeps);
        assert_eq!(game.clock().tick_count(), u64::try_from(report.steps).unwrap());
        assert_eq!(game.camera().mode(), CameraMode::Fixed);
        assert!(!game.input_mut().just_pressed(DriveAction::ToggleCamera));
    }

    #[test]
    fn test_snapshot_lists_active_coins_only() {
        let mut game = game();
        assert_eq!(game.snapshot().coins.len(), 10);
        assert!(game.collect(5));
        let snapshot = game.snapshot();
        assert_eq!(snapshot.coins.len(), 9);
        assert!(snapshot.coins.iter().all(|(id, _)| *id != 5));
    }

    #[test]
    fn test_boost_follows_collection() {
        let mut game = game();
        assert!(game.collect(1));
        game.tick(DriveIntent::default(), DT);
        assert!(game.boost().is_boosting());
        assert_eq!(game.snapshot().score, 1);
    }

    #[test]
    fn test_reset_runs_before_the_rest_of_the_tick() {
        let mut game = game();
        for _ in 0..120 {
            game.tick(DriveIntent::default(), DT);
        }
        let intent = DriveIntent {
            reset: true,
            flip: Some(FlipDirection::Back),
            ..DriveIntent::default()
        };
        game.tick(intent, DT);
        // The flip lands on the freshly reset chassis.
        let body = game.world().get(game.vehicle().chassis()).unwrap();
        assert!(body.angular_velocity.x < 0.0);
        assert!(game.vehicle().position().distance(Vec3::new(-1.5, 0.5, 3.0)) < 0.01);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_reset_restores_spawn(
            ticks in 0usize..120,
            throttle in -1.0f32..1.0,
            steer in -0.35f32..0.35,
            tilt in -3.0f32..3.0,
        ) {
            let mut game = game();
            let intent = DriveIntent {
                throttle,
                steer_angle: steer,
                ..DriveIntent::default()
            };
            if let Some(body) = game.world.body_mut(game.vehicle.chassis()) {
                body.orientation = Quat::from_rotation_z(tilt);
                body.angular_velocity = Vec3::new(tilt, 1.0, -tilt);
            }
            for _ in 0..ticks {
                game.tick(intent, DT);
            }

            game.vehicle.reset(&mut game.world);

            let spawn = game.config().vehicle.initial_position;
            prop_assert_eq!(game.vehicle().position(), spawn);
            prop_assert_eq!(game.vehicle().linear_velocity(), Vec3::ZERO);
            prop_assert_eq!(game.vehicle().angular_velocity(), Vec3::ZERO);
            let body = game.world().get(game.vehicle().chassis()).unwrap();
            prop_assert_eq!(body.position, spawn);
            prop_assert_eq!(body.linear_velocity, Vec3::ZERO);
            prop_assert_eq!(body.angular_velocity, Vec3::ZERO);
        }
    }
}
