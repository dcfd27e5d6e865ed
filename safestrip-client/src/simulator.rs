//! Simulated outlet readings for the device detail view.
//!
//! Nothing here touches the backend. The bank is reset whenever a detail
//! view is opened and discarded when it closes.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

pub const TICK_INTERVAL: Duration = Duration::from_secs(3);

const TEMPERATURE_RANGE: RangeInclusive<f64> = 20.0..=45.0;
const CURRENT_RANGE: RangeInclusive<f64> = 0.0..=10.0;
const TEMPERATURE_STEP: f64 = 0.3;
const CURRENT_STEP: f64 = 0.1;

const TEMPERATURE_DANGER: f64 = 40.0;
const TEMPERATURE_WARNING: f64 = 35.0;
const CURRENT_DANGER: f64 = 8.0;
const CURRENT_WARNING: f64 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Outlet {
    pub id: u8,
    pub name: String,
    pub power_on: bool,
    /// Degrees Celsius
    pub temperature: f64,
    /// Amperes
    pub current: f64,
    pub smoke_detected: bool,
    pub water_detected: bool,
}

impl Outlet {
    fn new(id: u8, power_on: bool, temperature: f64, current: f64) -> Self {
        Self {
            id,
            name: format!("Outlet {id}"),
            power_on,
            temperature,
            current,
            smoke_detected: false,
            water_detected: false,
        }
    }

    pub fn temperature_level(&self) -> ReadingLevel {
        ReadingLevel::grade(self.temperature, TEMPERATURE_WARNING, TEMPERATURE_DANGER)
    }

    pub fn current_level(&self) -> ReadingLevel {
        ReadingLevel::grade(self.current, CURRENT_WARNING, CURRENT_DANGER)
    }

    pub fn smoke_level(&self) -> ReadingLevel {
        ReadingLevel::flag(self.smoke_detected)
    }

    pub fn water_level(&self) -> ReadingLevel {
        ReadingLevel::flag(self.water_detected)
    }

    fn is_risky(&self) -> bool {
        self.smoke_detected || self.water_detected
    }

    fn is_hot(&self) -> bool {
        self.temperature > TEMPERATURE_DANGER || self.current > CURRENT_DANGER
    }

    fn tick<R: Rng>(&mut self, rng: &mut R) {
        if !self.power_on {
            self.current = 0.0;
            return;
        }

        let dt = (rng.gen_range(0.0..1.0) - 0.5) * TEMPERATURE_STEP;
        let dc = (rng.gen_range(0.0..1.0) - 0.5) * CURRENT_STEP;

        self.temperature =
            (self.temperature + dt).clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end());
        self.current = (self.current + dc).clamp(*CURRENT_RANGE.start(), *CURRENT_RANGE.end());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadingLevel {
    Normal,
    Warning,
    Danger,
}

impl ReadingLevel {
    fn grade(value: f64, warning: f64, danger: f64) -> Self {
        if value > danger {
            ReadingLevel::Danger
        } else if value > warning {
            ReadingLevel::Warning
        } else {
            ReadingLevel::Normal
        }
    }

    fn flag(detected: bool) -> Self {
        match detected {
            true => ReadingLevel::Danger,
            false => ReadingLevel::Normal,
        }
    }
}

/// Summary over the powered outlets of a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripStatus {
    AllPowerOff,
    RiskDetected,
    Warning,
    AllSafe,
}

impl StripStatus {
    pub fn title(&self) -> &'static str {
        match self {
            StripStatus::AllPowerOff => "All Power Off",
            StripStatus::RiskDetected => "Risk Detected",
            StripStatus::Warning => "Warning",
            StripStatus::AllSafe => "All Systems Safe",
        }
    }
}

pub fn default_outlets() -> Vec<Outlet> {
    vec![
        Outlet::new(1, true, 24.5, 2.3),
        Outlet::new(2, true, 26.8, 4.1),
        Outlet::new(3, false, 23.2, 0.0),
        Outlet::new(4, true, 25.1, 1.8),
    ]
}

#[derive(Debug, Clone)]
pub struct OutletBank {
    outlets: Vec<Outlet>,
    last_update: OffsetDateTime,
}

impl Default for OutletBank {
    fn default() -> Self {
        Self::new()
    }
}

impl OutletBank {
    pub fn new() -> Self {
        Self {
            outlets: default_outlets(),
            last_update: OffsetDateTime::now_utc(),
        }
    }

    pub fn outlets(&self) -> &[Outlet] {
        &self.outlets
    }

    pub fn outlet(&self, id: u8) -> Option<&Outlet> {
        self.outlets.iter().find(|outlet| outlet.id == id)
    }

    pub fn last_update(&self) -> OffsetDateTime {
        self.last_update
    }

    /// Whole seconds since the last tick, for the "Updated N seconds ago" footer.
    pub fn seconds_since_update(&self, now: OffsetDateTime) -> i64 {
        (now - self.last_update).whole_seconds().max(0)
    }

    pub fn tick<R: Rng>(&mut self, rng: &mut R, now: OffsetDateTime) {
        for outlet in &mut self.outlets {
            outlet.tick(rng);
        }
        self.last_update = now;
    }

    /// Flips the power of an outlet. Returns the new state, or `None` for
    /// an unknown id.
    pub fn toggle_power(&mut self, id: u8) -> Option<bool> {
        let outlet = self.outlets.iter_mut().find(|outlet| outlet.id == id)?;
        outlet.power_on = !outlet.power_on;

        tracing::debug!("{} power {}", outlet.name, if outlet.power_on { "on" } else { "off" });
        Some(outlet.power_on)
    }

    pub fn active_count(&self) -> usize {
        self.outlets.iter().filter(|outlet| outlet.power_on).count()
    }

    pub fn status(&self) -> StripStatus {
        let mut powered = self.outlets.iter().filter(|outlet| outlet.power_on).peekable();

        if powered.peek().is_none() {
            return StripStatus::AllPowerOff;
        }

        let powered: Vec<&Outlet> = powered.collect();
        if powered.iter().any(|outlet| outlet.is_risky()) {
            StripStatus::RiskDetected
        } else if powered.iter().any(|outlet| outlet.is_hot()) {
            StripStatus::Warning
        } else {
            StripStatus::AllSafe
        }
    }
}

fn lock(bank: &Mutex<OutletBank>) -> MutexGuard<'_, OutletBank> {
    bank.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the periodic tick task. Dropping the handle stops the task.
pub struct SimulatorHandle {
    bank: Arc<Mutex<OutletBank>>,
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    pub fn start() -> Self {
        Self::with_interval(TICK_INTERVAL)
    }

    pub fn with_interval(period: Duration) -> Self {
        let bank = Arc::new(Mutex::new(OutletBank::new()));

        let task = tokio::spawn({
            let bank = bank.clone();
            async move {
                let mut rng = StdRng::from_entropy();
                let mut interval = tokio::time::interval(period);
                // The first tick completes immediately.
                interval.tick().await;

                loop {
                    interval.tick().await;
                    lock(&bank).tick(&mut rng, OffsetDateTime::now_utc());
                }
            }
        });

        tracing::debug!("outlet simulator started");
        Self { bank, task }
    }

    pub fn snapshot(&self) -> OutletBank {
        lock(&self.bank).clone()
    }

    pub fn toggle_power(&self, id: u8) -> Option<bool> {
        lock(&self.bank).toggle_power(id)
    }

    pub fn status(&self) -> StripStatus {
        lock(&self.bank).status()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("outlet simulator stopped");
    }
}
