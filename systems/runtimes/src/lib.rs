#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Interval partitioner that splits a window into alternating running and stopped segments.
//!
//! The window's duration is divided into a runtime total and a downtime total
//! according to the availability ratio. Each total is then cut into random
//! chunks, the chunk lists are shuffled and reconciled to equal length, and
//! finally interleaved as running/stopped pairs starting from the window start.

use oee_sim_core::{MachineState, Partition, Ratio, Segment, StateEvent, TimeWindow, Timestamp};
use rand::{seq::SliceRandom, Rng};
use tracing::debug;

/// Treatment of the duration left over once a chunk draw rounds down to zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RemainderPolicy {
    /// The leftover becomes a final chunk, so the segments tile the whole window.
    #[default]
    Absorb,
    /// The leftover is dropped and the segments may end before the window does.
    Discard,
}

/// Configuration parameters required to construct the partitioner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    remainder: RemainderPolicy,
}

impl Config {
    /// Creates a configuration using the provided remainder policy.
    #[must_use]
    pub const fn new(remainder: RemainderPolicy) -> Self {
        Self { remainder }
    }

    /// Remainder policy applied during chunk generation.
    #[must_use]
    pub const fn remainder(&self) -> RemainderPolicy {
        self.remainder
    }
}

/// Pure system that partitions a window into running and stopped segments.
#[derive(Clone, Copy, Debug, Default)]
pub struct Runtimes {
    config: Config,
}

impl Runtimes {
    /// Creates a partitioner using the supplied configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Splits `window` so that the running share approximates `availability`.
    ///
    /// With availability `1` the result is a single running segment, with
    /// availability `0` a single stopped segment whose only state event is a
    /// stop at the window start. Otherwise segments alternate starting with a
    /// running one, and the state events mark every boundary including a
    /// final restart where the last stopped segment ends.
    pub fn partition<R: Rng + ?Sized>(
        &self,
        window: TimeWindow,
        availability: Ratio,
        rng: &mut R,
    ) -> Partition {
        let duration = window.duration_ms();
        let runtime_total = ((duration as f64 * availability.get()).floor() as u64).min(duration);
        let downtime_total = duration - runtime_total;

        let mut downtimes = draw_chunks(downtime_total, self.config.remainder, rng);
        let mut runtimes = draw_chunks(runtime_total, self.config.remainder, rng);
        downtimes.shuffle(rng);
        runtimes.shuffle(rng);

        let drawn = (runtimes.len(), downtimes.len());
        let reconciliation = reconcile(&mut runtimes, &mut downtimes, rng);

        let partition = interleave(window.start(), &runtimes, &downtimes);
        debug!(
            duration_ms = duration,
            runtime_total,
            downtime_total,
            runtime_chunks = drawn.0,
            downtime_chunks = drawn.1,
            runtime_merges = reconciliation.runtime_merges,
            runtime_splits = reconciliation.runtime_splits,
            downtime_merges = reconciliation.downtime_merges,
            pairs = runtimes.len().min(downtimes.len()),
            segments = partition.segments.len(),
            "partitioned window"
        );
        partition
    }
}

/// Cuts `total` into chunks, each a uniform fraction of what is still left.
///
/// Chunks trend from large to small because every draw shrinks the remainder.
/// Drawing stops as soon as a chunk rounds down to zero.
fn draw_chunks<R: Rng + ?Sized>(total: u64, remainder: RemainderPolicy, rng: &mut R) -> Vec<u64> {
    let mut chunks = Vec::new();
    let mut remaining = total;

    while remaining > 0 {
        let chunk = ((remaining as f64 * rng.gen::<f64>()).floor() as u64).min(remaining);
        if chunk == 0 {
            break;
        }
        chunks.push(chunk);
        remaining -= chunk;
    }

    if remaining > 0 && remainder == RemainderPolicy::Absorb {
        chunks.push(remaining);
    }
    chunks
}

/// Steps [`reconcile`] took to equalise the chunk lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Reconciliation {
    runtime_merges: usize,
    runtime_splits: usize,
    downtime_merges: usize,
}

/// Brings both chunk lists to the same length without changing either total.
///
/// Lists that are empty are left alone; [`interleave`] resolves those as boundary cases.
fn reconcile<R: Rng + ?Sized>(
    runtimes: &mut Vec<u64>,
    downtimes: &mut Vec<u64>,
    rng: &mut R,
) -> Reconciliation {
    let mut steps = Reconciliation::default();
    if runtimes.is_empty() || downtimes.is_empty() {
        return steps;
    }

    while runtimes.len() > downtimes.len() {
        merge_random_pair(runtimes, rng);
        steps.runtime_merges += 1;
    }

    while runtimes.len() < downtimes.len() {
        if split_random_chunk(runtimes, rng) {
            steps.runtime_splits += 1;
        } else {
            merge_random_pair(downtimes, rng);
            steps.downtime_merges += 1;
        }
    }
    steps
}

/// Folds one uniformly chosen chunk into another, distinct one.
fn merge_random_pair<R: Rng + ?Sized>(chunks: &mut Vec<u64>, rng: &mut R) {
    debug_assert!(chunks.len() >= 2, "merging requires two chunks");
    let source = rng.gen_range(0..chunks.len());
    let mut target = rng.gen_range(0..chunks.len() - 1);
    if target >= source {
        target += 1;
    }

    chunks[target] = chunks[target].saturating_add(chunks[source]);
    let _ = chunks.remove(source);
}

/// Splits a random chunk of at least 2 ms into two positive parts.
///
/// Returns `false` when no chunk is long enough to split.
fn split_random_chunk<R: Rng + ?Sized>(chunks: &mut Vec<u64>, rng: &mut R) -> bool {
    let splittable = chunks.iter().filter(|chunk| **chunk >= 2).count();
    if splittable == 0 {
        return false;
    }

    let pick = rng.gen_range(0..splittable);
    let Some(index) = chunks
        .iter()
        .enumerate()
        .filter(|(_, chunk)| **chunk >= 2)
        .nth(pick)
        .map(|(index, _)| index)
    else {
        return false;
    };

    let value = chunks[index];
    let kept = rng.gen_range(1..value);
    chunks[index] = kept;
    chunks.push(value - kept);
    true
}

fn interleave(start: Timestamp, runtimes: &[u64], downtimes: &[u64]) -> Partition {
    match (runtimes.is_empty(), downtimes.is_empty()) {
        (true, true) => Partition {
            state_events: vec![StateEvent::new(start, MachineState::Running)],
            segments: Vec::new(),
        },
        (false, true) => single_state(start, MachineState::Running, runtimes.iter().sum()),
        (true, false) => single_state(start, MachineState::Stopped, downtimes.iter().sum()),
        (false, false) => {
            let pairs = runtimes.len().min(downtimes.len());
            let mut state_events = Vec::with_capacity(2 * pairs + 1);
            let mut segments = Vec::with_capacity(2 * pairs);
            let mut cursor = start;
            state_events.push(StateEvent::new(cursor, MachineState::Running));

            for (&runtime, &downtime) in runtimes.iter().zip(downtimes) {
                segments.push(Segment::new(true, cursor, runtime));
                cursor = cursor.saturating_add_millis(runtime);
                state_events.push(StateEvent::new(cursor, MachineState::Stopped));

                segments.push(Segment::new(false, cursor, downtime));
                cursor = cursor.saturating_add_millis(downtime);
                state_events.push(StateEvent::new(cursor, MachineState::Running));
            }

            Partition {
                state_events,
                segments,
            }
        }
    }
}

fn single_state(start: Timestamp, state: MachineState, length: u64) -> Partition {
    Partition {
        state_events: vec![StateEvent::new(start, state)],
        segments: vec![Segment::new(state.is_running(), start, length)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn absorbed_chunks_sum_to_total() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for total in [1, 2, 17, 3_600_000, 86_400_000] {
            let chunks = draw_chunks(total, RemainderPolicy::Absorb, &mut rng);
            assert_eq!(chunks.iter().sum::<u64>(), total);
            assert!(chunks.iter().all(|chunk| *chunk > 0));
        }
    }

    #[test]
    fn discarded_chunks_never_exceed_total() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..64 {
            let chunks = draw_chunks(10_000, RemainderPolicy::Discard, &mut rng);
            assert!(chunks.iter().sum::<u64>() <= 10_000);
            assert!(chunks.iter().all(|chunk| *chunk > 0));
        }
    }

    #[test]
    fn zero_total_yields_no_chunks() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(draw_chunks(0, RemainderPolicy::Absorb, &mut rng).is_empty());
        assert!(draw_chunks(0, RemainderPolicy::Discard, &mut rng).is_empty());
    }

    #[test]
    fn merge_preserves_total() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut chunks = vec![5, 10, 20, 40];
        merge_random_pair(&mut chunks, &mut rng);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().sum::<u64>(), 75);
    }

    #[test]
    fn split_keeps_both_parts_positive() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut chunks = vec![1, 2];
        assert!(split_random_chunk(&mut chunks, &mut rng));
        assert_eq!(chunks, vec![1, 1, 1]);
        assert!(!split_random_chunk(&mut chunks, &mut rng));
    }

    #[test]
    fn reconcile_falls_back_to_merging_downtime() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut runtimes = vec![1];
        let mut downtimes = vec![4, 3, 2];
        let steps = reconcile(&mut runtimes, &mut downtimes, &mut rng);
        assert_eq!(runtimes, vec![1]);
        assert_eq!(downtimes, vec![9]);
        assert_eq!(
            steps,
            Reconciliation {
                runtime_merges: 0,
                runtime_splits: 0,
                downtime_merges: 2,
            }
        );
    }

    #[test]
    fn reconcile_equalises_lengths_and_totals() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut runtimes = vec![100, 50, 25, 12, 6, 3];
        let mut downtimes = vec![70];
        let steps = reconcile(&mut runtimes, &mut downtimes, &mut rng);
        assert_eq!(steps.runtime_merges, 5);
        assert_eq!(runtimes.len(), 1);
        assert_eq!(runtimes.iter().sum::<u64>(), 196);

        let mut runtimes = vec![300];
        let mut downtimes = vec![40, 20, 10, 5];
        let steps = reconcile(&mut runtimes, &mut downtimes, &mut rng);
        assert_eq!(steps.runtime_splits, 3);
        assert_eq!(steps.downtime_merges, 0);
        assert_eq!(runtimes.len(), downtimes.len());
        assert_eq!(runtimes.iter().sum::<u64>(), 300);
        assert_eq!(downtimes.iter().sum::<u64>(), 75);
    }

    #[test]
    fn interleave_alternates_from_running() {
        let start = Timestamp::from_millis(1_000);
        let partition = interleave(start, &[10, 20], &[5, 15]);
        let lengths: Vec<(bool, u64)> = partition
            .segments
            .iter()
            .map(|segment| (segment.running(), segment.length_ms()))
            .collect();
        assert_eq!(lengths, vec![(true, 10), (false, 5), (true, 20), (false, 15)]);

        let events: Vec<(i64, MachineState)> = partition
            .state_events
            .iter()
            .map(|event| (event.t.as_millis(), event.v))
            .collect();
        assert_eq!(
            events,
            vec![
                (1_000, MachineState::Running),
                (1_010, MachineState::Stopped),
                (1_015, MachineState::Running),
                (1_035, MachineState::Stopped),
                (1_050, MachineState::Running),
            ]
        );
    }
}
