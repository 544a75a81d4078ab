#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Production synthesizer that paces counter increments through running segments.

use oee_sim_core::{CycleTime, ProductionEvent, ProductionRun, Segment, TimeWindow};
use tracing::debug;

/// Pure system that derives production counter updates from running segments.
#[derive(Clone, Copy, Debug, Default)]
pub struct Production;

impl Production {
    /// Emits one counter increment per completed cycle inside every running segment.
    ///
    /// The counter continues from `counter_start`, so the first event carries
    /// `counter_start + 1`. The returned segments are copies of the input
    /// decorated with their production counts; stopped segments report zero.
    #[must_use]
    pub fn synthesize(
        &self,
        segments: &[Segment],
        window: TimeWindow,
        cycle_time: CycleTime,
        counter_start: u64,
    ) -> ProductionRun {
        let mut counter = counter_start;
        let mut events = Vec::new();

        let decorated: Vec<Segment> = segments
            .iter()
            .map(|segment| {
                if !segment.running() {
                    return segment.with_production(0);
                }

                let cycles = cycle_time.cycles_in(segment.length_ms());
                for cycle in 1..=cycles {
                    counter = counter.saturating_add(1);
                    let t = segment
                        .start()
                        .saturating_add_millis(cycle_time.completion_offset_ms(cycle));
                    events.push(ProductionEvent::new(t, counter));
                }
                segment.with_production(cycles)
            })
            .collect();

        let duration = window.duration_ms();
        debug!(
            cycle_seconds = cycle_time.seconds(),
            theoretical_target = cycle_time.theoretical_output(duration),
            actual_target = cycle_time.expected_output(duration),
            produced = events.len(),
            counter_end = counter,
            "synthesized production"
        );

        ProductionRun {
            segments: decorated,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oee_sim_core::{Ratio, Timestamp};

    #[test]
    fn stopped_segments_produce_nothing() {
        let window = TimeWindow::new(0_i64, 120_000_i64).expect("valid window");
        let cycle = CycleTime::new(60.0, Ratio::ONE).expect("valid throughput");
        let segments = [Segment::new(false, Timestamp::from_millis(0), 120_000)];

        let run = Production.synthesize(&segments, window, cycle, 0);
        assert!(run.events.is_empty());
        assert_eq!(run.segments[0].production(), 0);
    }

    #[test]
    fn partial_cycles_are_not_counted() {
        let window = TimeWindow::new(0_i64, 119_999_i64).expect("valid window");
        let cycle = CycleTime::new(60.0, Ratio::ONE).expect("valid throughput");
        let segments = [Segment::new(true, Timestamp::from_millis(0), 119_999)];

        let run = Production.synthesize(&segments, window, cycle, 0);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].t.as_millis(), 60_000);
        assert_eq!(run.segments[0].production(), 1);
    }
}
