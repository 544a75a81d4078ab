use oee_sim_core::{CycleTime, Ratio, RatioKind, Segment, TimeWindow, Timestamp};
use oee_sim_system_production::Production;
use proptest::prelude::*;

fn alternating_segments(lengths: &[u64]) -> Vec<Segment> {
    let mut cursor = Timestamp::from_millis(0);
    lengths
        .iter()
        .enumerate()
        .map(|(index, length)| {
            let segment = Segment::new(index % 2 == 0, cursor, *length);
            cursor = segment.end();
            segment
        })
        .collect()
}

#[test]
fn full_hour_at_sixty_per_hour_yields_minute_spacing() {
    let window = TimeWindow::new(0_i64, 3_600_000_i64).expect("valid window");
    let cycle = CycleTime::new(60.0, Ratio::ONE).expect("valid throughput");
    let segments = alternating_segments(&[3_600_000]);

    let run = Production.synthesize(&segments, window, cycle, 0);

    assert_eq!(run.events.len(), 60);
    assert_eq!(run.segments[0].production(), 60);
    for (index, event) in run.events.iter().enumerate() {
        let cycle_number = index as i64 + 1;
        assert_eq!(event.t.as_millis(), cycle_number * 60_000);
        assert_eq!(event.v, cycle_number as u64);
        assert_eq!(event.increase, 1);
    }
}

#[test]
fn counter_continues_across_segments_from_start_value() {
    let window = TimeWindow::new(0_i64, 700_000_i64).expect("valid window");
    let cycle = CycleTime::new(120.0, Ratio::ONE).expect("valid throughput");
    let segments = alternating_segments(&[300_000, 100_000, 300_000]);

    let run = Production.synthesize(&segments, window, cycle, 1_000);

    let values: Vec<u64> = run.events.iter().map(|event| event.v).collect();
    assert_eq!(values, (1_001..=1_020).collect::<Vec<_>>());
    assert_eq!(run.events[10].t.as_millis(), 400_000 + 30_000);
    let productions: Vec<u64> = run.segments.iter().map(Segment::production).collect();
    assert_eq!(productions, vec![10, 0, 10]);
}

#[test]
fn fractional_cycles_truncate_to_whole_milliseconds() {
    let window = TimeWindow::new(0_i64, 10_000_i64).expect("valid window");
    let performance = Ratio::new(RatioKind::Performance, 0.9).expect("valid ratio");
    let cycle = CycleTime::new(3_000.0, performance).expect("valid throughput");
    let segments = alternating_segments(&[10_000]);

    let run = Production.synthesize(&segments, window, cycle, 0);

    assert_eq!(run.events.len(), 7);
    assert_eq!(run.events[0].t.as_millis(), 1_333);
    assert!((3_999..=4_000).contains(&run.events[2].t.as_millis()));
}

#[test]
fn input_segments_are_not_modified() {
    let window = TimeWindow::new(0_i64, 600_000_i64).expect("valid window");
    let cycle = CycleTime::new(60.0, Ratio::ONE).expect("valid throughput");
    let segments = alternating_segments(&[600_000]);
    let snapshot = segments.clone();

    let run = Production.synthesize(&segments, window, cycle, 0);

    assert_eq!(segments, snapshot);
    assert_eq!(segments[0].production(), 0);
    assert_eq!(run.segments[0].production(), 10);
}

proptest! {
    #[test]
    fn event_count_matches_cycles_in_running_segments(
        lengths in proptest::collection::vec(1_u64..5_000_000, 1..12),
        hourly_target in 1.0_f64..5_000.0,
        performance in 0.05_f64..=1.0,
        counter_start in 0_u64..1_000_000,
    ) {
        let total: u64 = lengths.iter().sum();
        let window = TimeWindow::new(0_i64, total as i64).expect("valid window");
        let performance = Ratio::new(RatioKind::Performance, performance).expect("valid ratio");
        let cycle = CycleTime::new(hourly_target, performance).expect("valid throughput");
        let segments = alternating_segments(&lengths);

        let run = Production.synthesize(&segments, window, cycle, counter_start);

        let expected: u64 = segments
            .iter()
            .filter(|segment| segment.running())
            .map(|segment| (segment.length_ms() as f64 / 1_000.0 / cycle.seconds()).floor() as u64)
            .sum();
        prop_assert_eq!(run.events.len() as u64, expected);

        for (index, event) in run.events.iter().enumerate() {
            prop_assert_eq!(event.v, counter_start + index as u64 + 1);
        }
        for pair in run.events.windows(2) {
            prop_assert!(pair[0].t <= pair[1].t);
        }
        for (segment, decorated) in segments.iter().zip(&run.segments) {
            prop_assert_eq!(segment.start(), decorated.start());
            prop_assert_eq!(segment.length_ms(), decorated.length_ms());
            if !segment.running() {
                prop_assert_eq!(decorated.production(), 0);
            }
        }
    }
}
