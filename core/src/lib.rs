#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the OEE simulator.
//!
//! This crate defines the values that flow between the generation stages.
//! The interval partitioner turns a [`TimeWindow`] and an availability
//! [`Ratio`] into a [`Partition`], the production synthesizer decorates those
//! segments and emits [`ProductionEvent`] values at the pace described by a
//! [`CycleTime`], and the waste sampler marks a subset of them with
//! [`WasteEvent`] values. Every input is validated once, at construction, so
//! stages downstream of the entry boundary never observe an invalid value.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Number of seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Number of milliseconds in one hour.
pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Upper bound (exclusive) of the delay between a production event and its waste marker.
pub const DEFAULT_WASTE_JITTER_MS: u32 = 5_000;

/// Label mixed into the seed when deriving the interval partitioner's random stream.
pub const RNG_STREAM_RUNTIMES: &str = "runtimes";

/// Label mixed into the seed when deriving the waste sampler's random stream.
pub const RNG_STREAM_WASTE: &str = "waste";

/// Errors reported when generation inputs violate their contracts.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GenerationError {
    /// The window does not end strictly after it starts.
    #[error("invalid window: end {end} must be after start {start}")]
    InvalidWindow {
        /// Requested start of the window.
        start: Timestamp,
        /// Requested end of the window.
        end: Timestamp,
    },
    /// A ratio lies outside `[0, 1]` or is not a number.
    #[error("invalid {kind} ratio {value}: expected a value between 0 and 1")]
    InvalidRatio {
        /// Which target the ratio was supplied for.
        kind: RatioKind,
        /// Rejected value.
        value: f64,
    },
    /// The effective production rate is not strictly positive.
    #[error(
        "invalid throughput: hourly target {hourly_target} at performance {performance} \
         yields no production cycle"
    )]
    InvalidThroughput {
        /// Requested pieces per hour.
        hourly_target: f64,
        /// Requested performance ratio.
        performance: f64,
    },
}

/// Absolute instant measured in whole milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp shifted forward by `millis`, saturating at the representable maximum.
    #[must_use]
    pub fn saturating_add_millis(self, millis: u64) -> Self {
        let delta = i64::try_from(millis).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(delta))
    }

    /// Milliseconds elapsed from `self` until `later`, or `None` when `later` is not after `self`.
    #[must_use]
    pub fn millis_until(self, later: Timestamp) -> Option<u64> {
        (later.0 > self.0).then(|| later.0.abs_diff(self.0))
    }

    /// Converts the timestamp into a UTC date-time when it lies inside chrono's supported range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Renders the timestamp as RFC 3339 with millisecond precision, falling back to raw millis.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        match self.to_datetime() {
            Some(datetime) => datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Closed-open interval `[start, end)` that a generation run covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    start: Timestamp,
    end: Timestamp,
}

impl TimeWindow {
    /// Creates a window, rejecting any `end` that is not strictly after `start`.
    pub fn new(
        start: impl Into<Timestamp>,
        end: impl Into<Timestamp>,
    ) -> Result<Self, GenerationError> {
        let start = start.into();
        let end = end.into();
        match start.millis_until(end) {
            Some(duration) if duration > 0 => Ok(Self { start, end }),
            _ => Err(GenerationError::InvalidWindow { start, end }),
        }
    }

    /// Inclusive start of the window.
    #[must_use]
    pub const fn start(&self) -> Timestamp {
        self.start
    }

    /// Exclusive end of the window.
    #[must_use]
    pub const fn end(&self) -> Timestamp {
        self.end
    }

    /// Length of the window in milliseconds; always positive.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.start.millis_until(self.end).unwrap_or(0)
    }
}

/// Names the OEE factor a [`Ratio`] was supplied for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    /// Share of the window the machine spends running.
    Availability,
    /// Share of the theoretical throughput achieved while running.
    Performance,
    /// Share of produced units that are not rejected.
    Quality,
}

impl fmt::Display for RatioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Availability => "availability",
            Self::Performance => "performance",
            Self::Quality => "quality",
        };
        f.write_str(name)
    }
}

/// Dimensionless value guaranteed to lie in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Ratio(f64);

impl Ratio {
    /// The ratio `0`.
    pub const ZERO: Self = Self(0.0);

    /// The ratio `1`.
    pub const ONE: Self = Self(1.0);

    /// Validates `value` as a ratio for the provided factor.
    pub fn new(kind: RatioKind, value: f64) -> Result<Self, GenerationError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GenerationError::InvalidRatio { kind, value })
        }
    }

    /// Underlying value.
    #[must_use]
    pub const fn get(&self) -> f64 {
        self.0
    }

    /// `1 - ratio`.
    #[must_use]
    pub fn complement(&self) -> f64 {
        1.0 - self.0
    }
}

/// Time needed to produce one unit at a given hourly target and performance ratio.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct CycleTime {
    hourly_target: f64,
    seconds: f64,
}

impl CycleTime {
    /// Derives `3600 / (hourly_target * performance)` seconds per unit.
    ///
    /// Fails with [`GenerationError::InvalidThroughput`] unless the hourly target is
    /// finite and positive and the effective rate yields a finite cycle.
    pub fn new(hourly_target: f64, performance: Ratio) -> Result<Self, GenerationError> {
        let rate = hourly_target * performance.get();
        let seconds = SECONDS_PER_HOUR / rate;
        if hourly_target.is_finite() && hourly_target > 0.0 && rate > 0.0 && seconds.is_finite()
        {
            Ok(Self {
                hourly_target,
                seconds,
            })
        } else {
            Err(GenerationError::InvalidThroughput {
                hourly_target,
                performance: performance.get(),
            })
        }
    }

    /// Seconds per produced unit.
    #[must_use]
    pub const fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Pieces per hour at full performance.
    #[must_use]
    pub const fn hourly_target(&self) -> f64 {
        self.hourly_target
    }

    /// Units the hourly target allows over `length_ms`, ignoring performance.
    #[must_use]
    pub fn theoretical_output(&self, length_ms: u64) -> f64 {
        self.hourly_target * length_ms as f64 / MILLIS_PER_HOUR
    }

    /// Units the effective cycle allows over `length_ms`, including partial cycles.
    #[must_use]
    pub fn expected_output(&self, length_ms: u64) -> f64 {
        length_ms as f64 / MILLIS_PER_SECOND / self.seconds
    }

    /// Number of whole cycles that fit into `length_ms` of running time.
    #[must_use]
    pub fn cycles_in(&self, length_ms: u64) -> u64 {
        self.expected_output(length_ms).floor() as u64
    }

    /// Offset in whole milliseconds of the `cycle`-th completion, truncated toward zero.
    #[must_use]
    pub fn completion_offset_ms(&self, cycle: u64) -> u64 {
        (cycle as f64 * self.seconds * MILLIS_PER_SECOND) as u64
    }
}

/// Validated targets describing the OEE a generated run should approximate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OeeTargets {
    availability: Ratio,
    performance: Ratio,
    quality: Ratio,
    hourly_target: f64,
    #[serde(skip)]
    cycle_time: CycleTime,
}

impl OeeTargets {
    /// Validates every target eagerly and derives the cycle time.
    pub fn new(
        availability: f64,
        performance: f64,
        quality: f64,
        hourly_target: f64,
    ) -> Result<Self, GenerationError> {
        let availability = Ratio::new(RatioKind::Availability, availability)?;
        let performance = Ratio::new(RatioKind::Performance, performance)?;
        let quality = Ratio::new(RatioKind::Quality, quality)?;
        let cycle_time = CycleTime::new(hourly_target, performance)?;
        Ok(Self {
            availability,
            performance,
            quality,
            hourly_target,
            cycle_time,
        })
    }

    /// Target availability ratio.
    #[must_use]
    pub const fn availability(&self) -> Ratio {
        self.availability
    }

    /// Target performance ratio.
    #[must_use]
    pub const fn performance(&self) -> Ratio {
        self.performance
    }

    /// Target quality ratio.
    #[must_use]
    pub const fn quality(&self) -> Ratio {
        self.quality
    }

    /// Theoretical pieces per hour at full performance.
    #[must_use]
    pub const fn hourly_target(&self) -> f64 {
        self.hourly_target
    }

    /// Cycle time implied by the hourly target and performance ratio.
    #[must_use]
    pub const fn cycle_time(&self) -> CycleTime {
        self.cycle_time
    }
}

/// Running state reported by the machine's state signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MachineState {
    /// The machine is stopped; encoded as `0`.
    Stopped,
    /// The machine is running; encoded as `1`.
    Running,
}

impl MachineState {
    /// Maps a running flag onto the corresponding state.
    #[must_use]
    pub const fn from_running(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }

    /// Returns `true` for [`MachineState::Running`].
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<MachineState> for u8 {
    fn from(state: MachineState) -> Self {
        match state {
            MachineState::Stopped => 0,
            MachineState::Running => 1,
        }
    }
}

/// Raised when decoding a state value other than `0` or `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("machine state must be 0 or 1, got {0}")]
pub struct InvalidMachineState(pub u8);

impl TryFrom<u8> for MachineState {
    type Error = InvalidMachineState;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::Running),
            other => Err(InvalidMachineState(other)),
        }
    }
}

/// One contiguous interval of constant running or stopped state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    running: bool,
    length: u64,
    start: Timestamp,
    end: Timestamp,
    production: u64,
}

impl Segment {
    /// Creates an undecorated segment starting at `start` and lasting `length_ms`.
    #[must_use]
    pub fn new(running: bool, start: Timestamp, length_ms: u64) -> Self {
        Self {
            running,
            length: length_ms,
            start,
            end: start.saturating_add_millis(length_ms),
            production: 0,
        }
    }

    /// Returns a copy of the segment carrying the provided production count.
    #[must_use]
    pub const fn with_production(mut self, production: u64) -> Self {
        self.production = production;
        self
    }

    /// Whether the machine runs during the segment.
    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }

    /// State of the machine during the segment.
    #[must_use]
    pub const fn state(&self) -> MachineState {
        MachineState::from_running(self.running)
    }

    /// Length of the segment in milliseconds.
    #[must_use]
    pub const fn length_ms(&self) -> u64 {
        self.length
    }

    /// Start of the segment.
    #[must_use]
    pub const fn start(&self) -> Timestamp {
        self.start
    }

    /// End of the segment (`start + length`).
    #[must_use]
    pub const fn end(&self) -> Timestamp {
        self.end
    }

    /// Units produced during the segment; zero until decorated by the production stage.
    #[must_use]
    pub const fn production(&self) -> u64 {
        self.production
    }
}

/// Change of the running/stopped signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateEvent {
    /// Instant of the change.
    pub t: Timestamp,
    /// State entered at `t`.
    pub v: MachineState,
}

impl StateEvent {
    /// Creates a state change event.
    #[must_use]
    pub const fn new(t: Timestamp, v: MachineState) -> Self {
        Self { t, v }
    }
}

/// Increment of the total production counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionEvent {
    /// Instant the unit was completed.
    pub t: Timestamp,
    /// Counter value after the increment.
    pub v: u64,
    /// Amount added to the counter by this event.
    pub increase: u32,
}

impl ProductionEvent {
    /// Creates a single-unit counter increment reaching `counter` at `t`.
    #[must_use]
    pub const fn new(t: Timestamp, counter: u64) -> Self {
        Self {
            t,
            v: counter,
            increase: 1,
        }
    }
}

/// Marker for one rejected unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasteEvent {
    /// Instant the rejection was recorded.
    pub t: Timestamp,
    /// Number of rejected units; always `1`.
    pub v: u32,
}

impl WasteEvent {
    /// Creates a single-unit waste marker at `t`.
    #[must_use]
    pub const fn new(t: Timestamp) -> Self {
        Self { t, v: 1 }
    }
}

/// Output of the interval partitioner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Running/stopped transitions in chronological order.
    #[serde(rename = "tag")]
    pub state_events: Vec<StateEvent>,
    /// Alternating segments tiling the window.
    #[serde(rename = "parts")]
    pub segments: Vec<Segment>,
}

/// Output of the production synthesizer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRun {
    /// Segments decorated with their production counts.
    #[serde(rename = "parts")]
    pub segments: Vec<Segment>,
    /// Counter increments in chronological order.
    #[serde(rename = "tag")]
    pub events: Vec<ProductionEvent>,
}

/// The three synchronized tag streams handed to downstream consumers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStreams {
    /// Running/stopped state changes.
    #[serde(rename = "r")]
    pub runtime: Vec<StateEvent>,
    /// Production counter updates.
    #[serde(rename = "p")]
    pub production: Vec<ProductionEvent>,
    /// Waste markers in sampling order.
    #[serde(rename = "w")]
    pub waste: Vec<WasteEvent>,
}

/// Complete result of a generation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Decorated segments tiling the window.
    pub segments: Vec<Segment>,
    /// Emitted tag streams.
    pub streams: EventStreams,
}

impl Generation {
    /// Consumes the generation, yielding only the tag streams.
    #[must_use]
    pub fn into_streams(self) -> EventStreams {
        self.streams
    }
}

/// OEE factors realized by a generated run.
///
/// A factor is `None` when its denominator is zero: performance without any
/// running time, quality without any produced unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OeeReport {
    /// Length of the window in milliseconds.
    pub duration_ms: u64,
    /// Total running time in milliseconds.
    pub running_ms: u64,
    /// Number of segments the window was split into.
    pub segment_count: usize,
    /// Units produced.
    pub produced: u64,
    /// Units rejected.
    pub wasted: u64,
    /// `running_ms / duration_ms`.
    pub availability: f64,
    /// Produced units relative to the hourly target over the running time.
    pub performance: Option<f64>,
    /// Share of produced units that were not rejected.
    pub quality: Option<f64>,
    /// Product of the three factors.
    pub oee: Option<f64>,
}
