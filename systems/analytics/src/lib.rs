#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Analytics system that measures the OEE a generated run actually realizes.

mod metrics;

pub use metrics::{availability, performance, quality, running_ms, total_production, total_waste};

use oee_sim_core::{Generation, OeeReport, OeeTargets, TimeWindow};

/// Pure analytics system that condenses a generation into an [`OeeReport`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Analytics;

impl Analytics {
    /// Creates a new analytics system.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the realized availability, performance, quality and OEE of `generation`.
    ///
    /// Performance is measured against the hourly target in `targets`, since
    /// the performance ratio is what the run is being checked for.
    #[must_use]
    pub fn report(
        &self,
        generation: &Generation,
        window: TimeWindow,
        targets: &OeeTargets,
    ) -> OeeReport {
        let duration_ms = window.duration_ms();
        let running_ms = running_ms(&generation.segments);
        let produced = total_production(&generation.streams.production);
        let wasted = total_waste(&generation.streams.waste);

        let availability = availability(running_ms, duration_ms);
        let performance = performance(produced, running_ms, targets.hourly_target());
        let quality = quality(produced, wasted);
        let oee = performance
            .zip(quality)
            .map(|(performance, quality)| availability * performance * quality);

        OeeReport {
            duration_ms,
            running_ms,
            segment_count: generation.segments.len(),
            produced,
            wasted,
            availability,
            performance,
            quality,
            oee,
        }
    }
}
