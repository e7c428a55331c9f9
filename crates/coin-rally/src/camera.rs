//! Third-person camera rig.
//!
//! In follow mode the camera trails the vehicle at a speed-dependent distance
//! and height, eases towards that spot with time-corrected exponential
//! smoothing, and looks at the vehicle. While the car is grounded its yaw (and
//! only its yaw) is eased into a stabilized reference frame that provides the
//! camera's up vector; while airborne that frame is held.

use glam::{EulerRot, Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, require_non_negative};
use crate::physics::Pose;
use crate::vehicle::VehicleState;

/// Which view is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    /// Chase the vehicle.
    #[default]
    Follow,
    /// Hold the configured overview pose; the rig stops updating.
    Fixed,
}

impl CameraMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::Follow => CameraMode::Fixed,
            CameraMode::Fixed => CameraMode::Follow,
        }
    }
}

/// Camera tunables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Trailing distance at rest.
    pub base_distance: f32,
    /// Extra trailing distance per unit of speed.
    pub distance_per_speed: f32,
    /// Height above the vehicle at rest.
    pub base_height: f32,
    /// Extra height per unit of speed.
    pub height_per_speed: f32,
    /// Position smoothing rate (1/s).
    pub follow_rate: f32,
    /// Yaw smoothing rate (1/s).
    pub rotation_rate: f32,
    /// Pose used by [`CameraMode::Fixed`] and as the starting pose.
    pub fixed_position: Vec3,
    /// Point the fixed pose looks at.
    pub fixed_target: Vec3,
    /// Mode at startup.
    pub initial_mode: CameraMode,
}

/// Per-second rate equivalent to a lerp factor of 0.02 applied every frame at 60 Hz.
pub const REFERENCE_SMOOTHING_RATE: f32 = 1.212_16;

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_distance: 0.5,
            distance_per_speed: 0.01,
            base_height: 0.2,
            height_per_speed: 0.01,
            follow_rate: REFERENCE_SMOOTHING_RATE,
            rotation_rate: REFERENCE_SMOOTHING_RATE,
            fixed_position: Vec3::new(-6.0, 3.9, 6.21),
            fixed_target: Vec3::ZERO,
            initial_mode: CameraMode::Follow,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("camera.base_distance", self.base_distance)?;
        require_non_negative("camera.distance_per_speed", self.distance_per_speed)?;
        require_non_negative("camera.base_height", self.base_height)?;
        require_non_negative("camera.height_per_speed", self.height_per_speed)?;
        require_non_negative("camera.follow_rate", self.follow_rate)?;
        require_non_negative("camera.rotation_rate", self.rotation_rate)?;
        if !(self.fixed_position.is_finite() && self.fixed_target.is_finite()) {
            return Err(Error::config("camera.fixed_position", "must be finite"));
        }
        if self.fixed_position.distance_squared(self.fixed_target) <= f32::EPSILON {
            return Err(Error::config(
                "camera.fixed_target",
                "must differ from the fixed position",
            ));
        }
        Ok(())
    }

    /// Trailing distance and height for a given speed.
    pub fn framing(&self, speed: f32) -> (f32, f32) {
        (
            self.base_distance + self.distance_per_speed * speed,
            self.base_height + self.height_per_speed * speed,
        )
    }

    fn fixed_pose(&self) -> Pose {
        let orientation = looking_to(self.fixed_target - self.fixed_position, Vec3::Y)
            .unwrap_or(Quat::IDENTITY);
        Pose {
            position: self.fixed_position,
            orientation,
        }
    }
}

/// Camera state carried between ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// Camera position.
    pub position: Vec3,
    /// Camera orientation after the look-at.
    pub orientation: Quat,
    /// Yaw-only reference frame, eased towards the vehicle's yaw while grounded.
    pub stabilized: Quat,
    /// Vehicle yaw targeted by the last grounded tick (radians).
    pub last_target_yaw: f32,
}

/// Chase camera driven by published vehicle state.
pub struct CameraRig {
    config: CameraConfig,
    mode: CameraMode,
    state: CameraState,
}

impl CameraRig {
    pub fn new(config: CameraConfig) -> Result<Self> {
        config.validate()?;
        let pose = config.fixed_pose();
        let last_target_yaw = yaw_of(pose.orientation);
        Ok(Self {
            config,
            mode: config.initial_mode,
            state: CameraState {
                position: pose.position,
                orientation: pose.orientation,
                stabilized: Quat::from_rotation_y(last_target_yaw),
                last_target_yaw,
            },
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Switch modes. Entering fixed mode snaps to the fixed pose; returning to
    /// follow mode resumes smoothing from wherever the camera is.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if mode == CameraMode::Fixed {
            let pose = self.config.fixed_pose();
            self.state.position = pose.position;
            self.state.orientation = pose.orientation;
        }
        tracing::info!("Camera mode: {:?}", mode);
    }

    pub fn toggle_mode(&mut self) -> CameraMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.state.position,
            orientation: self.state.orientation,
        }
    }

    /// Where follow mode wants the camera for this vehicle state.
    pub fn desired_position(&self, vehicle: &VehicleState) -> Vec3 {
        let (distance, height) = self.config.framing(vehicle.speed());
        vehicle.position + vehicle.orientation * Vec3::new(0.0, height, distance)
    }

    /// Advance the follow camera. No-op in fixed mode.
    pub fn tick(&mut self, vehicle: &VehicleState, dt: f32) {
        if self.mode != CameraMode::Follow {
            return;
        }
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let desired = self.desired_position(vehicle);
        if !desired.is_finite() {
            return;
        }

        let follow = smoothing_factor(self.config.follow_rate, dt);
        self.state.position = self.state.position.lerp(desired, follow);

        if !vehicle.airborne {
            let target = yaw_only(vehicle.orientation);
            self.state.last_target_yaw = yaw_of(target);
            let turn = smoothing_factor(self.config.rotation_rate, dt);
            self.state.stabilized = self.state.stabilized.slerp(target, turn).normalize();
        }

        let up = self.state.stabilized * Vec3::Y;
        if let Some(orientation) = looking_to(vehicle.position - self.state.position, up) {
            self.state.orientation = orientation;
        }
    }
}

/// Fraction of the remaining gap to close over `dt` at `rate` per second.
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

/// Rotation about the vertical axis only, matching the yaw of `orientation`.
pub fn yaw_only(orientation: Quat) -> Quat {
    Quat::from_rotation_y(yaw_of(orientation))
}

fn yaw_of(orientation: Quat) -> f32 {
    orientation.to_euler(EulerRot::YXZ).0
}

/// Rotation whose -Z axis points along `direction`, with +Y as close to `up` as
/// possible. `None` when the direction is degenerate or parallel to `up`.
pub fn looking_to(direction: Vec3, up: Vec3) -> Option<Quat> {
    let back = -direction.try_normalize()?;
    let right = up.cross(back).try_normalize()?;
    let up = back.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, back)))
}
