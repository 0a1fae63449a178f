//! Break timer: a wall-clock state machine driven by periodic ticks.

mod engine;

pub use engine::{
    clamp_interval, TimerPhase, TimerState, COMPLETION_DEBOUNCE_MS, DEFAULT_INTERVAL_MIN,
    MAX_INTERVAL_MIN, MIN_INTERVAL_MIN, PAUSE_GUARD_MS,
};
