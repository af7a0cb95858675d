use std::time::Duration;

use crate::error::ArcError;

pub const DEFAULT_MINUTES: u32 = 25;
pub const MAX_MINUTES: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Paused,
    Running,
    /// The countdown just reached zero; the timer stopped itself
    Completed,
}

/// Focus countdown. Time only advances through [`Pomodoro::tick`], one
/// second per call, so the caller owns the clock.
#[derive(Debug, Clone)]
pub struct Pomodoro {
    minutes: u32,
    remaining: u32,
    running: bool,
    reason: Option<String>,
}

impl Default for Pomodoro {
    fn default() -> Self {
        Self::new(DEFAULT_MINUTES)
    }
}

impl Pomodoro {
    pub fn new(minutes: u32) -> Self {
        let minutes = minutes.clamp(1, MAX_MINUTES);
        Self {
            minutes,
            remaining: minutes * 60,
            running: false,
            reason: None,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start or pause. A finished countdown cannot be restarted without a
    /// reset. Returns whether the timer now runs.
    pub fn toggle(&mut self) -> bool {
        self.running = !self.running && self.remaining > 0;
        self.running
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.remaining = self.minutes * 60;
    }

    /// Change the session length; this stops and resets the countdown
    pub fn set_duration(&mut self, minutes: u32) -> Result<(), ArcError> {
        if minutes == 0 || minutes > MAX_MINUTES {
            return Err(ArcError::validation(format!(
                "Duration must be between 1 and {} minutes",
                MAX_MINUTES
            )));
        }
        self.minutes = minutes;
        self.reset();
        Ok(())
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        self.reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Advance one second
    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Paused;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            return Tick::Completed;
        }
        Tick::Running
    }

    /// Elapsed share of the session, 0 to 100
    pub fn progress(&self) -> f64 {
        let total = f64::from(self.minutes * 60);
        (total - f64::from(self.remaining)) / total * 100.0
    }

    /// Remaining time as `MM:SS`
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }

    /// Run the countdown to completion on the tokio clock, calling
    /// `on_tick` after every second.
    pub async fn run(&mut self, mut on_tick: impl FnMut(&Pomodoro)) {
        if !self.running {
            self.toggle();
        }
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let state = self.tick();
            on_tick(self);
            if state != Tick::Running {
                break;
            }
        }
    }
}
