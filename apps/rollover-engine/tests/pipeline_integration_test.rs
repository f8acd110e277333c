//! Full-pass behaviour through the in-memory adapters: policy variants,
//! failure isolation and expiry-history reuse.

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use rollover_engine::application::ports::{SeriesKind, SeriesSink};
use rollover_engine::application::use_cases::{
    GapFillPersistedUseCase, PassOptions, RunPassUseCase,
};
use rollover_engine::domain::reconciliation::ReconciliationMode;
use rollover_engine::domain::record::RawRecord;
use rollover_engine::domain::rollover::RolloverPolicy;
use rollover_engine::infrastructure::memory::{InMemoryRecordSource, InMemorySeriesSink};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

const DAYS: [&str; 8] = [
    "2020-02-25", "2020-02-26", "2020-02-27", "2020-02-28",
    "2020-03-02", "2020-03-03", "2020-03-04", "2020-03-05",
];

/// Two symbols, three monthly expiries, every contract trading every day
/// until it expires.
fn source() -> InMemoryRecordSource {
    let mut records = Vec::new();
    for symbol in ["GOLDM", "SILVERM"] {
        for day in DAYS {
            for expiry in ["2020-02-28", "2020-03-31", "2020-04-30"] {
                if date(expiry) >= date(day) {
                    records.push(
                        RawRecord::new(symbol, date(day), date(expiry), dec!(100))
                            .with_activity(10, 10),
                    );
                }
            }
        }
    }
    InMemoryRecordSource::from_records(records)
}

fn expiries(sink: &InMemorySeriesSink, label: &str) -> Vec<NaiveDate> {
    sink.series(label, SeriesKind::Continuous)
        .unwrap()
        .iter()
        .map(|r| r.expiry_date)
        .collect()
}

#[test]
fn test_offsets_produce_suffixed_variants() {
    let source = source();
    let mut sink = InMemorySeriesSink::new();
    let options = PassOptions {
        policies: vec![
            RolloverPolicy::FixedOffset { delta: 0 },
            RolloverPolicy::FixedOffset { delta: 2 },
        ],
        ..PassOptions::default()
    };

    let report = RunPassUseCase::new(&source, &mut sink).execute(&options).unwrap();

    assert_eq!(report.labels_persisted, 4);
    assert_eq!(
        sink.series_labels(SeriesKind::Continuous).unwrap(),
        vec!["GOLDM-0", "GOLDM-II", "SILVERM-0", "SILVERM-II"]
    );
    assert_eq!(
        sink.series_labels(SeriesKind::RatioAdjusted).unwrap().len(),
        4
    );

    // The larger offset leaves the expiring contract a day earlier.
    let front = expiries(&sink, "GOLDM-0");
    let early = expiries(&sink, "GOLDM-II");
    assert_eq!(front[2], date("2020-02-28"));
    assert_eq!(early[2], date("2020-03-31"));
    assert!(front.windows(2).all(|w| w[0] <= w[1]));
    assert!(early.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_bad_day_is_skipped_and_counted() {
    let mut source = source();
    source.fail_on(date("2020-03-03"));
    let mut sink = InMemorySeriesSink::new();

    let report = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();

    assert_eq!(report.load.days_listed, DAYS.len());
    assert_eq!(report.load.days_failed, 1);
    assert!(!report.is_clean());
    assert_eq!(report.labels_persisted, 2);
    assert_eq!(
        sink.series("GOLDM", SeriesKind::Continuous).unwrap().len(),
        DAYS.len() - 1
    );
}

#[test]
fn test_failed_label_does_not_block_others() {
    let source = source();
    let mut sink = InMemorySeriesSink::new();
    sink.reject_label("GOLDM");

    let report = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();

    assert_eq!(report.failed_labels, vec!["GOLDM".to_string()]);
    assert_eq!(report.labels_persisted, 1);
    assert!(sink.series("SILVERM", SeriesKind::Continuous).is_some());
    assert!(sink.series("GOLDM", SeriesKind::Continuous).is_none());
    assert!(sink.audit().is_some());
}

#[test]
fn test_expiry_history_is_reused_until_stale() {
    let mut source = source();
    let mut sink = InMemorySeriesSink::new();

    let first = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();
    let second = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();
    assert!(first.index_rebuilt);
    assert!(!second.index_rebuilt);
    assert_eq!(sink.history_writes(), 1);

    source.add(RawRecord::new("GOLDM", date("2020-03-06"), date("2020-03-31"), dec!(100)));
    let third = RunPassUseCase::new(&source, &mut sink)
        .execute(&PassOptions::default())
        .unwrap();
    assert!(third.index_rebuilt);
    assert_eq!(sink.history_writes(), 2);
}

#[test]
fn test_volume_crossover_takes_effect_next_day() {
    let volumes = [(100, 10), (90, 50), (50, 80), (40, 120), (30, 150)];
    let days = ["2020-03-02", "2020-03-03", "2020-03-04", "2020-03-05", "2020-03-06"];
    let mut records = Vec::new();
    for (day, (near, far)) in days.iter().zip(volumes) {
        records.push(
            RawRecord::new("GOLDM", date(day), date("2020-03-31"), dec!(100))
                .with_activity(near, 0),
        );
        records.push(
            RawRecord::new("GOLDM", date(day), date("2020-04-30"), dec!(102))
                .with_activity(far, 0),
        );
    }
    let source = InMemoryRecordSource::from_records(records);
    let mut sink = InMemorySeriesSink::new();
    let options = PassOptions {
        policies: vec![RolloverPolicy::VolumeCrossover],
        reconciliation: None,
        ..PassOptions::default()
    };

    RunPassUseCase::new(&source, &mut sink).execute(&options).unwrap();

    assert_eq!(
        expiries(&sink, "GOLDM"),
        vec![
            date("2020-03-31"),
            date("2020-03-31"),
            date("2020-03-31"),
            date("2020-04-30"),
            date("2020-04-30"),
        ]
    );

    let audit = sink.audit().unwrap();
    let roll = audit
        .rollover_events
        .iter()
        .find(|e| e.from_expiry.is_some())
        .unwrap();
    assert_eq!(roll.date, date("2020-03-04"));
    assert_eq!(roll.to_expiry, date("2020-04-30"));
    let ratio = roll.observed_ratio.unwrap();
    assert!((ratio - 100.0 / 102.0).abs() < 1e-9);
}

#[test]
fn test_gap_fill_over_persisted_series() {
    let source = source();
    let mut sink = InMemorySeriesSink::new();
    let options = PassOptions {
        reconciliation: Some(ReconciliationMode::GapFill),
        ..PassOptions::default()
    };
    RunPassUseCase::new(&source, &mut sink).execute(&options).unwrap();
    let before = sink.series("GOLDM", SeriesKind::Continuous).unwrap().to_vec();

    let report = GapFillPersistedUseCase::new(&source, &mut sink)
        .execute(&["GOLDM".to_string()])
        .unwrap();

    assert_eq!(report.changes, 0);
    assert!(report.failed_labels.is_empty());
    assert_eq!(sink.series("GOLDM", SeriesKind::Continuous).unwrap(), before.as_slice());
}
