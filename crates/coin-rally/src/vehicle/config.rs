//! Vehicle tunables.
//!
//! Defaults reproduce the reference arcade car: a 250-unit chassis on four
//! small raycast wheels, tuned for the low (-2.8) gravity of the scene.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, require_non_negative, require_positive};

/// A valid vehicle always has exactly this many wheels.
pub const WHEEL_COUNT: usize = 4;

/// Chassis size as the scene describes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisDimensions {
    /// Full width (x).
    pub width: f32,
    /// Full height (y).
    pub height: f32,
    /// Half length (z), from the centre to the front bumper.
    pub front: f32,
}

impl Default for ChassisDimensions {
    fn default() -> Self {
        Self {
            width: 0.15,
            height: 0.07,
            front: 0.15,
        }
    }
}

impl ChassisDimensions {
    /// Half extents of the chassis box.
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.width * 0.5, self.height * 0.5, self.front)
    }

    /// Symmetric wheel anchors: front-left, front-right, rear-left, rear-right.
    ///
    /// The vehicle faces -Z, so front wheels sit at negative z.
    pub fn wheel_layout(&self) -> [Vec3; WHEEL_COUNT] {
        let x = self.width * 0.65;
        let y = self.height * 0.4;
        let z = self.front;
        [
            Vec3::new(-x, y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, z),
            Vec3::new(x, y, z),
        ]
    }

    fn validate(&self) -> Result<()> {
        require_positive("chassis.width", self.width)?;
        require_positive("chassis.height", self.height)?;
        require_positive("chassis.front", self.front)
    }
}

/// Spring-damper parameters shared by every wheel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    /// Spring length with no load.
    pub rest_length: f32,
    /// Spring stiffness per unit chassis mass.
    pub stiffness: f32,
    /// Damping while the spring is being compressed.
    pub damping_compression: f32,
    /// Damping while the spring is extending.
    pub damping_relaxation: f32,
    /// Upper bound on the suspension force.
    pub max_force: f32,
    /// How far the spring may compress below its rest length.
    pub max_travel: f32,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            rest_length: 0.1,
            stiffness: 60.0,
            damping_compression: 4.4,
            damping_relaxation: 2.3,
            max_force: 100_000.0,
            max_travel: 0.1,
        }
    }
}

impl SuspensionConfig {
    fn validate(&self) -> Result<()> {
        require_positive("suspension.rest_length", self.rest_length)?;
        require_positive("suspension.stiffness", self.stiffness)?;
        require_non_negative("suspension.damping_compression", self.damping_compression)?;
        require_non_negative("suspension.damping_relaxation", self.damping_relaxation)?;
        require_positive("suspension.max_force", self.max_force)?;
        require_non_negative("suspension.max_travel", self.max_travel)
    }
}

/// Which wheels receive engine force.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Drivetrain {
    Front,
    #[default]
    Rear,
    All,
}

/// Local impulses used by the flip actions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    /// Downward component of the flip impulse.
    pub lift: f32,
    /// Longitudinal component of the flip impulse.
    pub push: f32,
    /// Distance from the centre, along z, where the impulse is applied.
    pub lever: f32,
}

impl Default for FlipConfig {
    fn default() -> Self {
        Self {
            lift: 5.0,
            push: 10.0,
            lever: 1.0,
        }
    }
}

/// Everything needed to build a [`super::VehicleController`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Chassis mass.
    pub mass: f32,
    /// Chassis dimensions.
    pub chassis: ChassisDimensions,
    /// Spawn and reset position.
    pub initial_position: Vec3,
    /// Wheel anchors in chassis space, ordered front-left, front-right,
    /// rear-left, rear-right. Must contain exactly four entries when set;
    /// `None` derives them from `chassis`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel_layout: Option<Vec<Vec3>>,
    /// Wheel radius.
    pub wheel_radius: f32,
    /// Suspension parameters.
    pub suspension: SuspensionConfig,
    /// Steering clamp for the front wheels (radians).
    pub max_steer_angle: f32,
    /// Engine force per driven wheel at full throttle.
    pub engine_force: f32,
    /// Brake force per wheel at full brake.
    pub brake_force: f32,
    /// Which wheels are driven.
    pub drivetrain: Drivetrain,
    /// Tire grip: side impulse budget relative to the suspension load.
    pub friction_slip: f32,
    /// How much side forces roll the chassis (0 = none, 1 = fully physical).
    pub roll_influence: f32,
    /// Flip action impulses.
    pub flip: FlipConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            mass: 250.0,
            chassis: ChassisDimensions::default(),
            initial_position: Vec3::new(-1.5, 0.5, 3.0),
            wheel_layout: None,
            wheel_radius: 0.05,
            suspension: SuspensionConfig::default(),
            max_steer_angle: 0.35,
            engine_force: 150.0,
            brake_force: 50.0,
            drivetrain: Drivetrain::Rear,
            friction_slip: 5.0,
            roll_influence: 0.01,
            flip: FlipConfig::default(),
        }
    }
}

impl VehicleConfig {
    /// Fail fast on geometry or mass the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        require_positive("mass", self.mass)?;
        self.chassis.validate()?;
        if let Some(layout) = &self.wheel_layout {
            if layout.len() != WHEEL_COUNT {
                return Err(Error::WheelCount {
                    expected: WHEEL_COUNT,
                    actual: layout.len(),
                });
            }
            if layout.iter().any(|anchor| !anchor.is_finite()) {
                return Err(Error::config("wheel_layout", "anchors must be finite"));
            }
        }
        if !self.initial_position.is_finite() {
            return Err(Error::config("initial_position", "must be finite"));
        }
        require_positive("wheel_radius", self.wheel_radius)?;
        self.suspension.validate()?;
        require_non_negative("max_steer_angle", self.max_steer_angle)?;
        require_non_negative("engine_force", self.engine_force)?;
        require_non_negative("brake_force", self.brake_force)?;
        require_non_negative("friction_slip", self.friction_slip)?;
        require_non_negative("roll_influence", self.roll_influence)?;
        if !(self.flip.lift.is_finite()
            && self.flip.push.is_finite()
            && self.flip.lever.is_finite())
        {
            return Err(Error::config("flip", "impulses must be finite"));
        }
        Ok(())
    }

    /// Wheel anchors as a fixed array, from the explicit layout if one is
    /// set and from the chassis dimensions otherwise.
    pub(crate) fn wheel_anchors(&self) -> Result<[Vec3; WHEEL_COUNT]> {
        let Some(layout) = &self.wheel_layout else {
            return Ok(self.chassis.wheel_layout());
        };
        <[Vec3; WHEEL_COUNT]>::try_from(layout.as_slice()).map_err(|_| Error::WheelCount {
            expected: WHEEL_COUNT,
            actual: layout.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(VehicleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_wheel_layout_is_symmetric() {
        let layout = ChassisDimensions::default().wheel_layout();
        assert_eq!(layout[0].x, -layout[1].x);
        assert_eq!(layout[2].x, -layout[3].x);
        assert!(layout[0].z < 0.0 && layout[2].z > 0.0);
        assert!(layout.iter().all(|w| (w.y - 0.028).abs() < 1e-6));
    }

    #[test]
    fn test_wheel_count_enforced() {
        let mut layout = ChassisDimensions::default().wheel_layout().to_vec();
        layout.pop();
        let config = VehicleConfig {
            wheel_layout: Some(layout),
            ..VehicleConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::WheelCount {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_non_positive_mass_rejected() {
        for mass in [0.0, -250.0, f32::NAN] {
            let config = VehicleConfig {
                mass,
                ..VehicleConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfig { field: "mass", .. })
            ));
        }
    }

    #[test]
    fn test_missing_dimension_rejected() {
        let mut config = VehicleConfig::default();
        config.chassis.height = 0.0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                field: "chassis.height",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VehicleConfig = serde_json::from_str(r#"{ "mass": 300.0 }"#).unwrap();
        assert_eq!(config.mass, 300.0);
        assert_eq!(config.wheel_layout, None);
        assert_eq!(
            config.wheel_anchors().unwrap(),
            ChassisDimensions::default().wheel_layout()
        );
        assert_eq!(config.suspension, SuspensionConfig::default());
    }

    #[test]
    fn test_wheel_anchors_follow_loaded_chassis() {
        let config: VehicleConfig = serde_json::from_str(
            r#"{ "chassis": { "width": 0.6, "height": 0.2, "front": 0.5 } }"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        let anchors = config.wheel_anchors().unwrap();
        let expected = [
            Vec3::new(-0.39, 0.08, -0.5),
            Vec3::new(0.39, 0.08, -0.5),
            Vec3::new(-0.39, 0.08, 0.5),
            Vec3::new(0.39, 0.08, 0.5),
        ];
        for (anchor, expected) in anchors.iter().zip(expected) {
            assert!(anchor.distance(expected) < 1e-5, "{anchor} vs {expected}");
        }
    }

    #[test]
    fn test_explicit_wheel_layout_overrides_chassis() {
        let layout = vec![
            Vec3::new(-0.2, 0.0, -0.3),
            Vec3::new(0.2, 0.0, -0.3),
            Vec3::new(-0.2, 0.0, 0.3),
            Vec3::new(0.2, 0.0, 0.3),
        ];
        let config = VehicleConfig {
            wheel_layout: Some(layout.clone()),
            ..VehicleConfig::default()
        };
        assert_eq!(config.wheel_anchors().unwrap().to_vec(), layout);
    }
}
