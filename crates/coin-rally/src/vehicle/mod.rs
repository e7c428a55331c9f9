//! Raycast vehicle: configuration, wheel suspension and the controller that
//! ties the wheels to a chassis body.

mod config;
mod controller;
mod suspension;

pub use config::{
    ChassisDimensions, Drivetrain, FlipConfig, SuspensionConfig, VehicleConfig, WHEEL_COUNT,
};
pub use controller::{FlipDirection, VehicleController, VehicleState};
pub use suspension::{WheelPosition, WheelSuspension};
