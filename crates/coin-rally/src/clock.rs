//! Game loop clock.
//!
//! Turns host frame times into simulation steps. Fixed stepping accumulates
//! frame time and releases whole steps (bounded per frame so a stalled host
//! cannot trigger a catch-up spiral); variable stepping passes the frame time
//! straight through.

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::error::{Error, Result, require_positive};

/// How frame time becomes simulation steps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum StepMode {
    /// Constant step length (seconds).
    Fixed { step: f32 },
    /// One step per frame, as long as the frame.
    Variable,
}

impl Default for StepMode {
    fn default() -> Self {
        StepMode::Fixed { step: 1.0 / 60.0 }
    }
}

/// Clock tunables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Fixed or variable stepping.
    pub step_mode: StepMode,
    /// Longest frame time honoured; anything above is clamped.
    pub max_frame_time: f32,
    /// Most fixed steps run for a single frame.
    pub max_substeps: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            step_mode: StepMode::default(),
            max_frame_time: 0.25,
            max_substeps: 8,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<()> {
        if let StepMode::Fixed { step } = self.step_mode {
            require_positive("clock.step", step)?;
        }
        require_positive("clock.max_frame_time", self.max_frame_time)?;
        if self.max_substeps == 0 {
            return Err(Error::config("clock.max_substeps", "must be at least 1"));
        }
        Ok(())
    }
}

/// Steps released by one [`GameLoopClock::advance`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSteps {
    dt: f32,
    remaining: u32,
    seconds_changed: bool,
}

impl FrameSteps {
    /// Whether the whole-second counter moved during this frame.
    pub fn seconds_changed(&self) -> bool {
        self.seconds_changed
    }
}

impl Iterator for FrameSteps {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.dt)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for FrameSteps {}

/// Drives simulation ticking and tracks elapsed time.
pub struct GameLoopClock {
    config: ClockConfig,
    accumulator: f32,
    /// Simulated time in seconds.
    elapsed: f64,
    tick_count: u64,
    last_instant: Option<Instant>,
}

impl GameLoopClock {
    pub fn new(config: ClockConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            accumulator: 0.0,
            elapsed: 0.0,
            tick_count: 0,
            last_instant: None,
        })
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Feed one host frame of `frame_dt` seconds.
    pub fn advance(&mut self, frame_dt: f32) -> FrameSteps {
        let seconds_before = self.elapsed_seconds();
        let frame_dt = self.clamp_frame(frame_dt);

        let (dt, steps) = match self.config.step_mode {
            StepMode::Fixed { step } => {
                self.accumulator += frame_dt;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let due = (self.accumulator / step).floor() as u32;
                let steps = due.min(self.config.max_substeps);
                if due > steps {
                    tracing::warn!(
                        "Dropping {} simulation steps after a slow frame",
                        due - steps
                    );
                    self.accumulator = 0.0;
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let consumed = steps as f32 * step;
                    self.accumulator = (self.accumulator - consumed).max(0.0);
                }
                (step, steps)
            }
            StepMode::Variable => (frame_dt, u32::from(frame_dt > 0.0)),
        };

        self.elapsed += f64::from(dt) * f64::from(steps);
        self.tick_count += u64::from(steps);

        FrameSteps {
            dt,
            remaining: steps,
            seconds_changed: self.elapsed_seconds() != seconds_before,
        }
    }

    /// Feed the wall-clock time since the previous call. The first call
    /// releases no steps.
    pub fn advance_wall_clock(&mut self) -> FrameSteps {
        let now = Instant::now();
        let frame_dt = self
            .last_instant
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_instant = Some(now);
        self.advance(frame_dt)
    }

    fn clamp_frame(&self, frame_dt: f32) -> f32 {
        if !frame_dt.is_finite() || frame_dt <= 0.0 {
            return 0.0;
        }
        if frame_dt > self.config.max_frame_time {
            tracing::warn!(
                "Frame took {:.3}s, clamping to {:.3}s",
                frame_dt,
                self.config.max_frame_time
            );
            return self.config.max_frame_time;
        }
        frame_dt
    }

    /// Simulated time in seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Whole simulated seconds, for display.
    pub fn elapsed_seconds(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seconds = self.elapsed.floor() as u64;
        seconds
    }

    /// Simulation steps run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Fraction of a fixed step left in the accumulator, for render
    /// interpolation. Always zero for variable stepping.
    pub fn alpha(&self) -> f32 {
        match self.config.step_mode {
            StepMode::Fixed { step } => (self.accumulator / step).clamp(0.0, 1.0),
            StepMode::Variable => 0.0,
        }
    }
}
