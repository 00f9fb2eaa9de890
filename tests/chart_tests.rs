use chrono::{NaiveDate, NaiveTime};

use peakflow_bot::chart::{aggregate, available_months, month_label, parse_month_label, render_png};
use peakflow_bot::models::{Measurement, Period};

fn row(date: &str, period: Period, reading: i64) -> Measurement {
    Measurement {
        seq: 0,
        date: NaiveDate::parse_from_str(date, "%d.%m.%Y").unwrap(),
        time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        period,
        reading,
        breathing: "Нет".to_string(),
        cough: "Нет".to_string(),
        sputum: "Нет".to_string(),
        medication: "Нет".to_string(),
        age: "5 лет".to_string(),
        sex: "женский".to_string(),
    }
}

/// Two morning rows on the same day keep the maximum, not the last value.
#[test]
fn test_day_aggregation_takes_maximum() {
    let rows = vec![
        row("05.05.2024", Period::Morning, 300),
        row("05.05.2024", Period::Morning, 280),
        row("05.05.2024", Period::Evening, 290),
    ];
    let series = aggregate(&rows, 2024, 5).unwrap();
    assert_eq!(series.morning[4], Some(300));
    assert_eq!(series.evening[4], Some(290));
}

/// A day with no rows is a gap, never zero.
#[test]
fn test_empty_days_are_gaps() {
    let rows = vec![row("05.05.2024", Period::Morning, 300)];
    let series = aggregate(&rows, 2024, 5).unwrap();
    for day in 0..31 {
        if day == 4 {
            continue;
        }
        assert_eq!(series.morning[day], None, "day {} must be a gap", day + 1);
        assert_eq!(series.evening[day], None);
    }
}

/// A month without any rows produces no chart at all.
#[test]
fn test_month_without_rows_yields_none() {
    let rows = vec![row("05.04.2024", Period::Morning, 300)];
    assert!(aggregate(&rows, 2024, 5).is_none());
}

#[test]
fn test_month_keyboard_labels_round_trip() {
    let rows = vec![
        row("05.05.2024", Period::Morning, 300),
        row("01.03.2024", Period::Evening, 250),
    ];
    let labels: Vec<String> = available_months(&rows)
        .into_iter()
        .map(|(year, month)| month_label(year, month))
        .collect();
    assert_eq!(labels, vec!["Май 2024", "Март 2024"]);
    assert_eq!(parse_month_label(&labels[0]), Some((2024, 5)));
    assert_eq!(parse_month_label(&labels[1]), Some((2024, 3)));
}

#[test]
fn test_rendering_an_aggregated_month() {
    let rows = vec![
        row("05.05.2024", Period::Morning, 300),
        row("06.05.2024", Period::Morning, 320),
        row("08.05.2024", Period::Evening, 280),
    ];
    let series = aggregate(&rows, 2024, 5).unwrap();
    let png = render_png(&series).unwrap();
    assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
}
