#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative composition of the OEE generation stages.
//!
//! The [`Generator`] validates raw inputs at the entry boundary and then runs
//! the interval partitioner, the production synthesizer and the waste sampler
//! in that order, each consuming the previous stage's output. Randomness is
//! always supplied by the caller, either as an explicit [`rand::Rng`] or as a
//! `u64` seed from which one independent stream per stage is derived.

mod seed;

pub use seed::derive_stream_seed;

use oee_sim_core::{
    CycleTime, EventStreams, Generation, GenerationError, OeeTargets, Partition, ProductionEvent,
    ProductionRun, Ratio, RatioKind, Segment, TimeWindow, Timestamp, WasteEvent,
    RNG_STREAM_RUNTIMES, RNG_STREAM_WASTE,
};
use oee_sim_system_production::Production;
use oee_sim_system_runtimes::Runtimes;
use oee_sim_system_waste::Waste;
use rand::Rng;
use tracing::{debug, info, info_span};

/// Tuning knobs for every stage that has any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Interval partitioner settings.
    pub runtimes: oee_sim_system_runtimes::Config,
    /// Waste sampler settings.
    pub waste: oee_sim_system_waste::Config,
}

/// Validated description of one generation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Request {
    window: TimeWindow,
    targets: OeeTargets,
    counter_start: u64,
}

impl Request {
    /// Validates the window and every target eagerly.
    ///
    /// The production counter starts at zero; see [`Request::with_counter_start`].
    pub fn new(
        start: impl Into<Timestamp>,
        end: impl Into<Timestamp>,
        availability: f64,
        performance: f64,
        quality: f64,
        hourly_target: f64,
    ) -> Result<Self, GenerationError> {
        let window = TimeWindow::new(start, end)?;
        let targets = OeeTargets::new(availability, performance, quality, hourly_target)?;
        Ok(Self::from_parts(window, targets))
    }

    /// Assembles a request from already validated parts.
    #[must_use]
    pub const fn from_parts(window: TimeWindow, targets: OeeTargets) -> Self {
        Self {
            window,
            targets,
            counter_start: 0,
        }
    }

    /// Continues the production counter from `counter_start`.
    #[must_use]
    pub const fn with_counter_start(mut self, counter_start: u64) -> Self {
        self.counter_start = counter_start;
        self
    }

    /// Window covered by the run.
    #[must_use]
    pub const fn window(&self) -> TimeWindow {
        self.window
    }

    /// Targets the run approximates.
    #[must_use]
    pub const fn targets(&self) -> &OeeTargets {
        &self.targets
    }

    /// Counter value preceding the first production event.
    #[must_use]
    pub const fn counter_start(&self) -> u64 {
        self.counter_start
    }
}

/// Runs the generation stages in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Generator {
    runtimes: Runtimes,
    production: Production,
    waste: Waste,
}

impl Generator {
    /// Creates a generator whose stages use the supplied configuration.
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            runtimes: Runtimes::new(config.runtimes),
            production: Production,
            waste: Waste::new(config.waste),
        }
    }

    /// Partitions `[start, end)` into running and stopped segments.
    pub fn runtimes<R: Rng + ?Sized>(
        &self,
        start: impl Into<Timestamp>,
        end: impl Into<Timestamp>,
        availability: f64,
        rng: &mut R,
    ) -> Result<Partition, GenerationError> {
        let window = TimeWindow::new(start, end)?;
        let availability = Ratio::new(RatioKind::Availability, availability)?;
        Ok(self.runtimes.partition(window, availability, rng))
    }

    /// Derives production counter updates for `parts`; the counter starts at zero when omitted.
    pub fn production(
        &self,
        parts: &[Segment],
        start: impl Into<Timestamp>,
        end: impl Into<Timestamp>,
        hourly_target: f64,
        performance: f64,
        counter_start: Option<u64>,
    ) -> Result<ProductionRun, GenerationError> {
        let window = TimeWindow::new(start, end)?;
        let performance = Ratio::new(RatioKind::Performance, performance)?;
        let cycle_time = CycleTime::new(hourly_target, performance)?;
        Ok(self
            .production
            .synthesize(parts, window, cycle_time, counter_start.unwrap_or(0)))
    }

    /// Samples waste markers from a production stream.
    pub fn waste<R: Rng + ?Sized>(
        &self,
        production: &[ProductionEvent],
        quality: f64,
        rng: &mut R,
    ) -> Result<Vec<WasteEvent>, GenerationError> {
        let quality = Ratio::new(RatioKind::Quality, quality)?;
        Ok(self.waste.sample(production, quality, rng))
    }

    /// Runs every stage, drawing all randomness from `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, request: &Request, rng: &mut R) -> Generation {
        let _span = info_span!("generate", seeded = false).entered();
        let partition =
            self.runtimes
                .partition(request.window, request.targets.availability(), rng);
        self.finish(request, partition, rng)
    }

    /// Runs every stage with per-stage streams derived from `seed`.
    ///
    /// Identical seeds and requests always produce identical generations.
    #[must_use]
    pub fn generate_seeded(&self, request: &Request, seed: u64) -> Generation {
        let _span = info_span!("generate", seed).entered();
        let mut runtimes_rng = seed::stage_rng(seed, RNG_STREAM_RUNTIMES);
        let mut waste_rng = seed::stage_rng(seed, RNG_STREAM_WASTE);

        let partition = self.runtimes.partition(
            request.window,
            request.targets.availability(),
            &mut runtimes_rng,
        );
        self.finish(request, partition, &mut waste_rng)
    }

    fn finish<R: Rng + ?Sized>(
        &self,
        request: &Request,
        partition: Partition,
        rng: &mut R,
    ) -> Generation {
        let targets = &request.targets;
        debug!(
            availability = targets.availability().get(),
            performance = targets.performance().get(),
            quality = targets.quality().get(),
            hourly_target = targets.hourly_target(),
            "running production stages"
        );

        let run = self.production.synthesize(
            &partition.segments,
            request.window,
            targets.cycle_time(),
            request.counter_start,
        );
        let waste = self.waste.sample(&run.events, targets.quality(), rng);

        info!(
            start = %request.window.start(),
            end = %request.window.end(),
            segments = run.segments.len(),
            state_events = partition.state_events.len(),
            produced = run.events.len(),
            wasted = waste.len(),
            "generated event streams"
        );

        Generation {
            segments: run.segments,
            streams: EventStreams {
                runtime: partition.state_events,
                production: run.events,
                waste,
            },
        }
    }
}

/// Partitions `[start, end)` with the default configuration and an entropy-seeded generator.
pub fn runtimes(
    start: impl Into<Timestamp>,
    end: impl Into<Timestamp>,
    availability: f64,
) -> Result<Partition, GenerationError> {
    Generator::default().runtimes(start, end, availability, &mut rand::thread_rng())
}

/// Derives production counter updates for `parts` with the default configuration.
pub fn production(
    parts: &[Segment],
    start: impl Into<Timestamp>,
    end: impl Into<Timestamp>,
    hourly_target: f64,
    performance: f64,
    counter_start: Option<u64>,
) -> Result<ProductionRun, GenerationError> {
    Generator::default().production(parts, start, end, hourly_target, performance, counter_start)
}

/// Samples waste markers with the default configuration and an entropy-seeded generator.
pub fn waste(
    production: &[ProductionEvent],
    quality: f64,
) -> Result<Vec<WasteEvent>, GenerationError> {
    Generator::default().waste(production, quality, &mut rand::thread_rng())
}

/// Produces the running, production and waste streams for `[start, end)`.
///
/// A fresh seed is drawn from the thread-local generator and logged at `info`
/// level so that a run can be replayed with [`Generator::generate_seeded`].
pub fn generate(
    start: impl Into<Timestamp>,
    end: impl Into<Timestamp>,
    availability: f64,
    performance: f64,
    quality: f64,
    hourly_target: f64,
    counter_start: Option<u64>,
) -> Result<EventStreams, GenerationError> {
    let request = Request::new(start, end, availability, performance, quality, hourly_target)?
        .with_counter_start(counter_start.unwrap_or(0));
    let seed: u64 = rand::random();
    info!(seed, "drew generation seed");
    Ok(Generator::default()
        .generate_seeded(&request, seed)
        .into_streams())
}
