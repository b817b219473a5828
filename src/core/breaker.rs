//! Circuit breaker guarding the quote provider.
//!
//! The breaker is in-memory and scoped to one engine instance:
//!
//! - **Closed**: calls go through, consecutive failures accumulate.
//! - **Open**: the failure threshold was reached; calls are short-circuited
//!   until the cooldown elapses.
//!
//! Once the cooldown has elapsed the breaker lets calls through again. There
//! is no distinguished half-open probe: the next attempt runs normally, a
//! success closes the circuit and a failure opens it for another cooldown.

use crate::core::clock::Clock;
use chrono::{Duration, NaiveDateTime};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BreakerState {
    Closed,
    Open { until: NaiveDateTime },
}

#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Default)]
struct Circuit {
    failure_count: u32,
    open_until: Option<NaiveDateTime>,
}

pub struct CircuitBreaker {
    circuit: Mutex<Circuit>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            circuit: Mutex::new(Circuit::default()),
            config,
            clock,
        }
    }

    /// Lock the circuit, recovering from poison. A poisoned breaker at worst
    /// carries a stale failure count.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// True while the cooldown window is running. Checking never mutates state.
    pub fn is_open(&self) -> bool {
        let circuit = self.lock_circuit();
        circuit
            .open_until
            .is_some_and(|until| self.clock.now() < until)
    }

    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();
        if circuit.failure_count > 0 || circuit.open_until.is_some() {
            debug!(
                failures = circuit.failure_count,
                "Circuit breaker: success, failure count reset"
            );
        }
        circuit.failure_count = 0;
        circuit.open_until = None;
    }

    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();
        let now = self.clock.now();

        // Requests already in flight when the circuit opened do not count.
        if circuit.open_until.is_some_and(|until| now < until) {
            debug!("Circuit breaker: failure while open ignored");
            return;
        }

        // The count survives an expired cooldown, so one more failure re-opens.
        circuit.failure_count += 1;
        if circuit.failure_count >= self.config.failure_threshold {
            let until = now + self.config.cooldown;
            info!(
                failures = circuit.failure_count,
                %until,
                "Circuit breaker: opening circuit"
            );
            circuit.open_until = Some(until);
        } else {
            debug!(
                "Circuit breaker: failure ({}/{})",
                circuit.failure_count, self.config.failure_threshold
            );
        }
    }

    pub fn state(&self) -> BreakerState {
        let circuit = self.lock_circuit();
        match circuit.open_until {
            Some(until) if self.clock.now() < until => BreakerState::Open { until },
            _ => BreakerState::Closed,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_circuit().failure_count
    }
}
