//! Driving telemetry.
//!
//! Outputs CSV data for analysis. Supports multiple output destinations via
//! the `TelemetryOutput` trait.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::PathBuf,
};

use glam::{EulerRot, Quat, Vec3};

use crate::game::Game;
use crate::vehicle::WHEEL_COUNT;

/// Snapshot of the simulation state for one telemetry row.
pub struct TelemetrySnapshot {
    pub elapsed: f64,
    pub dt: f32,
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
    pub airborne: bool,
    pub grounded: [bool; WHEEL_COUNT],
    pub compression: [f32; WHEEL_COUNT],
    pub suspension_force: [f32; WHEEL_COUNT],
    pub position: Vec3,
    pub rotation: [f32; 4],
    pub linear_vel: Vec3,
    pub angular_vel: Vec3,
    pub camera_position: Vec3,
    pub score: u32,
    pub combo: u32,
    pub boosting: bool,
}

impl TelemetrySnapshot {
    /// Capture the state left by the last step of `dt` seconds.
    pub fn capture(game: &Game, dt: f32) -> Self {
        let vehicle = game.vehicle();
        let wheels = vehicle.wheels();
        Self {
            elapsed: game.clock().elapsed(),
            dt,
            steer: vehicle.steer_angle(),
            throttle: vehicle.throttle(),
            brake: vehicle.brake_force(),
            airborne: vehicle.is_airborne(),
            grounded: std::array::from_fn(|i| wheels[i].is_grounded()),
            compression: std::array::from_fn(|i| wheels[i].compression()),
            suspension_force: std::array::from_fn(|i| wheels[i].suspension_force()),
            position: vehicle.position(),
            rotation: vehicle.orientation().to_array(),
            linear_vel: vehicle.linear_velocity(),
            angular_vel: vehicle.angular_velocity(),
            camera_position: game.camera().state().position,
            score: game.boost().score(),
            combo: game.boost().combo(),
            boosting: game.boost().is_boosting(),
        }
    }
}

/// Trait for telemetry output destinations.
pub trait TelemetryOutput {
    /// Write the CSV header.
    fn write_header(&mut self, header: &str);
    /// Write a data row.
    fn write_row(&mut self, row: &str);
}

/// Appends to a CSV file; the header truncates it.
pub struct FileTelemetryOutput {
    path: PathBuf,
}

impl FileTelemetryOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileTelemetryOutput {
    fn default() -> Self {
        Self::new("telemetry.csv")
    }
}

impl TelemetryOutput for FileTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        match File::create(&self.path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{header}");
            }
            Err(e) => tracing::warn!("Failed to create {}: {e}", self.path.display()),
        }
    }

    fn write_row(&mut self, row: &str) {
        if let Ok(mut file) = OpenOptions::new().append(true).open(&self.path) {
            let _ = writeln!(file, "{row}");
        }
    }
}

/// Stdout output for the headless runner.
pub struct StdoutTelemetryOutput;

impl TelemetryOutput for StdoutTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        println!("{header}");
    }

    fn write_row(&mut self, row: &str) {
        println!("{row}");
    }
}

/// Keeps lines in memory.
#[derive(Default)]
pub struct MemoryTelemetryOutput {
    pub lines: Vec<String>,
}

impl TelemetryOutput for MemoryTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        self.lines.clear();
        self.lines.push(header.to_owned());
    }

    fn write_row(&mut self, row: &str) {
        self.lines.push(row.to_owned());
    }
}

/// Macro to define CSV schema and generate telemetry functions.
///
/// This generates `reset_telemetry_to()` and `emit_telemetry_to()` from a
/// single schema definition, keeping column names and formats in sync.
macro_rules! define_telemetry {
    (
        columns: { $( $name:ident : $fmt:literal ),* $(,)? },
        prelude: |$snapshot:ident| { $( $prelude:stmt );* $(;)? },
        row_values: { $( $val:expr ),* $(,)? }
    ) => {
        /// CSV header string.
        const CSV_HEADER: &str = concat!( $( stringify!($name), "," ),* );

        /// Reset telemetry (write header) to the specified output.
        pub fn reset_telemetry_to(output: &mut dyn TelemetryOutput) {
            output.write_header(CSV_HEADER.trim_end_matches(','));
        }

        /// Write telemetry data to the specified output.
        pub fn emit_telemetry_to($snapshot: &TelemetrySnapshot, output: &mut dyn TelemetryOutput) {
            $( $prelude )*

            let line = format!( concat!( $( $fmt, "," ),* ), $( $val ),* );
            let line = line.trim_end_matches(',');

            output.write_row(line);
        }
    };
}

define_telemetry! {
    columns: {
        t: "{:.4}",
        dt: "{:.5}",
        steer: "{:.3}",
        throttle: "{:.3}",
        brake: "{:.1}",
        airborne: "{}",
        pos_x: "{:.3}",
        pos_y: "{:.3}",
        pos_z: "{:.3}",
        pitch_deg: "{:.2}",
        yaw_deg: "{:.2}",
        roll_deg: "{:.2}",
        speed: "{:.3}",
        vel_x: "{:.3}",
        vel_y: "{:.3}",
        vel_z: "{:.3}",
        ang_x: "{:.3}",
        ang_y: "{:.3}",
        ang_z: "{:.3}",
        cam_dist: "{:.3}",
        cam_height: "{:.3}",
        w0_grounded: "{}",
        w0_comp: "{:.4}",
        w0_force: "{:.1}",
        w1_grounded: "{}",
        w1_comp: "{:.4}",
        w1_force: "{:.1}",
        w2_grounded: "{}",
        w2_comp: "{:.4}",
        w2_force: "{:.1}",
        w3_grounded: "{}",
        w3_comp: "{:.4}",
        w3_force: "{:.1}",
        score: "{}",
        combo: "{}",
        boosting: "{}",
    },
    prelude: |t| {
        let quat = Quat::from_array(t.rotation);
        let (yaw, pitch, roll) = quat.to_euler(EulerRot::YXZ);
        let camera_offset = t.camera_position - t.position;
        let camera_height = camera_offset.y;
        let camera_distance = Vec3::new(camera_offset.x, 0.0, camera_offset.z).length();
        let wheel = |i: usize| (u8::from(t.grounded[i]), t.compression[i], t.suspension_force[i]);
        let (w0g, w0c, w0f) = wheel(0);
        let (w1g, w1c, w1f) = wheel(1);
        let (w2g, w2c, w2f) = wheel(2);
        let (w3g, w3c, w3f) = wheel(3);
    },
    row_values: {
        t.elapsed,
        t.dt,
        t.steer,
        t.throttle,
        t.brake,
        u8::from(t.airborne),
        t.position.x,
        t.position.y,
        t.position.z,
        pitch.to_degrees(),
        yaw.to_degrees(),
        roll.to_degrees(),
        t.linear_vel.length(),
        t.linear_vel.x,
        t.linear_vel.y,
        t.linear_vel.z,
        t.angular_vel.x,
        t.angular_vel.y,
        t.angular_vel.z,
        camera_distance,
        camera_height,
        w0g,
        w0c,
        w0f,
        w1g,
        w1c,
        w1f,
        w2g,
        w2c,
        w2f,
        w3g,
        w3c,
        w3f,
        t.score,
        t.combo,
        u8::from(t.boosting),
    }
}
