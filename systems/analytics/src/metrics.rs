use oee_sim_core::{ProductionEvent, Segment, WasteEvent, MILLIS_PER_HOUR};

/// Total running time across the provided segments, in milliseconds.
#[must_use]
pub fn running_ms(segments: &[Segment]) -> u64 {
    segments
        .iter()
        .filter(|segment| segment.running())
        .map(Segment::length_ms)
        .sum()
}

/// Units counted by the production stream.
#[must_use]
pub fn total_production(events: &[ProductionEvent]) -> u64 {
    events.iter().map(|event| u64::from(event.increase)).sum()
}

/// Units marked as rejected by the waste stream.
#[must_use]
pub fn total_waste(events: &[WasteEvent]) -> u64 {
    events.iter().map(|event| u64::from(event.v)).sum()
}

/// Share of the window spent running.
#[must_use]
pub fn availability(running_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    running_ms as f64 / duration_ms as f64
}

/// Produced units relative to what the hourly target allows during `running_ms`.
///
/// Returns `None` when the machine never ran.
#[must_use]
pub fn performance(produced: u64, running_ms: u64, hourly_target: f64) -> Option<f64> {
    let capacity = hourly_target * running_ms as f64 / MILLIS_PER_HOUR;
    (capacity > 0.0).then(|| produced as f64 / capacity)
}

/// Share of produced units that were not rejected.
///
/// Returns `None` when nothing was produced.
#[must_use]
pub fn quality(produced: u64, wasted: u64) -> Option<f64> {
    (produced > 0).then(|| produced.saturating_sub(wasted) as f64 / produced as f64)
}
