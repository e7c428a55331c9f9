//! Arcade driving core: a raycast-suspension car on a flat ground plane,
//! coin pickups and a speed-aware chase camera.
//!
//! The crate is a pure in-process simulation. It consumes decoded driver input
//! and produces world transforms plus [`CoinCollected`] events; rendering,
//! asset loading and device polling belong to the host.
//!
//! # Design principles
//!
//! - **Explicit ownership**: the [`PhysicsWorld`] is constructed and passed
//!   around, never global
//! - **Deterministic ticks**: given the same inputs and step lengths, a
//!   session replays identically
//! - **Fail fast, tick safely**: configuration errors surface at construction;
//!   ticking never fails
//!
//! # Example
//!
//! ```ignore
//! use coin_rally::{DriveAction, Game, GameConfig};
//!
//! let mut game = Game::new(GameConfig::default())?;
//! let coins = game.subscribe();
//!
//! game.input_mut().press(DriveAction::Forward);
//! let report = game.frame(1.0 / 60.0);
//! let snapshot = game.snapshot();
//! ```

pub mod boost;
pub mod camera;
pub mod clock;
mod error;
pub mod game;
pub mod input;
pub mod physics;
pub mod pickup;
pub mod telemetry;
pub mod vehicle;

pub use boost::{BoostConfig, BoostState};
pub use camera::{CameraConfig, CameraMode, CameraRig, CameraState};
pub use clock::{ClockConfig, FrameSteps, GameLoopClock, StepMode};
pub use error::{Error, Result};
pub use game::{FrameReport, FrameSnapshot, Game, GameConfig};
pub use input::{ActionState, DriveAction, DriveIntent};
pub use physics::{BodyHandle, Broadphase, PhysicsWorld, Pose, RigidBody, WorldConfig};
pub use pickup::{Coin, CoinCollected, CoinSpec, PickupConfig, PickupField};
pub use vehicle::{
    FlipDirection, VehicleConfig, VehicleController, VehicleState, WheelPosition, WheelSuspension,
};
