//! Score, combo and speed boost.
//!
//! A plain subscriber of [`CoinCollected`] events: the pickup field knows
//! nothing about it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, require_non_negative, require_positive};
use crate::pickup::CoinCollected;

/// Boost tunables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    /// How long a boost lasts after the latest coin (seconds).
    pub duration: f32,
    /// Engine force multiplier while boosting.
    pub multiplier: f32,
    /// Coins collected within this many seconds of each other extend the combo.
    pub combo_window: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            duration: 1.5,
            multiplier: 2.0,
            combo_window: 2.0,
        }
    }
}

impl BoostConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("boost.duration", self.duration)?;
        require_positive("boost.multiplier", self.multiplier)?;
        require_non_negative("boost.combo_window", self.combo_window)
    }
}

/// Running score and boost timer fed by collection events.
pub struct BoostState {
    config: BoostConfig,
    events: async_channel::Receiver<CoinCollected>,
    score: u32,
    combo: u32,
    best_combo: u32,
    remaining: f32,
    since_last: Option<f32>,
}

impl BoostState {
    pub fn new(
        config: BoostConfig,
        events: async_channel::Receiver<CoinCollected>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            events,
            score: 0,
            combo: 0,
            best_combo: 0,
            remaining: 0.0,
            since_last: None,
        })
    }

    /// Drain pending events and run the timers. Returns the coins seen this call.
    pub fn tick(&mut self, dt: f32) -> Vec<CoinCollected> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        if self.remaining > 0.0 {
            self.remaining = (self.remaining - dt).max(0.0);
            if self.remaining == 0.0 {
                tracing::debug!("Boost expired");
            }
        }
        if let Some(since) = self.since_last.as_mut() {
            *since += dt;
        }

        let collected: Vec<CoinCollected> =
            std::iter::from_fn(|| self.events.try_recv().ok()).collect();
        for event in &collected {
            self.on_collected(*event);
        }
        collected
    }

    fn on_collected(&mut self, event: CoinCollected) {
        self.score += 1;
        self.combo = match self.since_last {
            Some(since) if since <= self.config.combo_window => self.combo + 1,
            _ => 1,
        };
        self.best_combo = self.best_combo.max(self.combo);
        self.since_last = Some(0.0);
        self.remaining = self.config.duration;
        tracing::debug!(
            "Coin {} boosts for {}s (score {}, combo {})",
            event.coin_id,
            self.config.duration,
            self.score,
            self.combo
        );
    }

    /// Engine multiplier to apply this tick.
    pub fn engine_multiplier(&self) -> f32 {
        if self.is_boosting() {
            self.config.multiplier
        } else {
            1.0
        }
    }

    pub fn is_boosting(&self) -> bool {
        self.remaining > 0.0
    }

    /// Seconds of boost left.
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Current combo length; drops back to zero once the window passes.
    pub fn combo(&self) -> u32 {
        match self.since_last {
            Some(since) if since <= self.config.combo_window => self.combo,
            _ => 0,
        }
    }

    pub fn best_combo(&self) -> u32 {
        self.best_combo
    }
}
