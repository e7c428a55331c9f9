//! Decoded driver input.
//!
//! The host maps its devices onto [`DriveAction`]s and presses/releases them
//! on an [`ActionState`]; each tick the game samples a [`DriveIntent`] from it.

use serde::{Deserialize, Serialize};

use crate::vehicle::FlipDirection;

/// Everything the driver can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveAction {
    SteerLeft,
    SteerRight,
    Forward,
    Reverse,
    Brake,
    ToggleCamera,
    Reset,
    FlipFront,
    FlipBack,
}

impl DriveAction {
    pub const ALL: [DriveAction; 9] = [
        DriveAction::SteerLeft,
        DriveAction::SteerRight,
        DriveAction::Forward,
        DriveAction::Reverse,
        DriveAction::Brake,
        DriveAction::ToggleCamera,
        DriveAction::Reset,
        DriveAction::FlipFront,
        DriveAction::FlipBack,
    ];

    fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Held actions plus the ones pressed since the last [`ActionState::clear_just_pressed`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionState {
    pressed: u16,
    just_pressed: u16,
}

impl ActionState {
    /// Key-down. Repeated presses while held do not count as new edges.
    pub fn press(&mut self, action: DriveAction) {
        if !self.is_pressed(action) {
            self.just_pressed |= action.bit();
        }
        self.pressed |= action.bit();
    }

    /// Key-up.
    pub fn release(&mut self, action: DriveAction) {
        self.pressed &= !action.bit();
    }

    pub fn is_pressed(&self, action: DriveAction) -> bool {
        self.pressed & action.bit() != 0
    }

    pub fn just_pressed(&self, action: DriveAction) -> bool {
        self.just_pressed & action.bit() != 0
    }

    /// Forget key-down edges once they have been consumed.
    pub fn clear_just_pressed(&mut self) {
        self.just_pressed = 0;
    }
}

/// One tick's worth of driver intent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveIntent {
    /// Steering angle in radians, positive turns left.
    pub steer_angle: f32,
    /// Throttle in `[-1, 1]`; negative reverses.
    pub throttle: f32,
    /// Brake force per wheel.
    pub brake_force: f32,
    /// Switch between follow and fixed camera.
    pub toggle_camera: bool,
    /// Put the car back at its spawn point.
    pub reset: bool,
    /// Flip requested this tick.
    pub flip: Option<FlipDirection>,
}

impl DriveIntent {
    /// Decode held keys into continuous inputs and key-down edges into one-shot
    /// actions.
    pub fn sample(actions: &ActionState, max_steer_angle: f32, brake_force: f32) -> Self {
        let axis = |positive: DriveAction, negative: DriveAction| {
            f32::from(u8::from(actions.is_pressed(positive)))
                - f32::from(u8::from(actions.is_pressed(negative)))
        };

        let flip = if actions.just_pressed(DriveAction::FlipFront) {
            Some(FlipDirection::Front)
        } else if actions.just_pressed(DriveAction::FlipBack) {
            Some(FlipDirection::Back)
        } else {
            None
        };

        Self {
            steer_angle: max_steer_angle * axis(DriveAction::SteerLeft, DriveAction::SteerRight),
            throttle: axis(DriveAction::Forward, DriveAction::Reverse),
            brake_force: if actions.is_pressed(DriveAction::Brake) {
                brake_force
            } else {
                0.0
            },
            toggle_camera: actions.just_pressed(DriveAction::ToggleCamera),
            reset: actions.just_pressed(DriveAction::Reset),
            flip,
        }
    }

    /// The same held inputs without any one-shot actions.
    pub fn continuous(&self) -> Self {
        Self {
            toggle_camera: false,
            reset: false,
            flip: None,
            ..*self
        }
    }
}
