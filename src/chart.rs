//! Monthly chart data selection and PNG rendering.
//!
//! The selection semantics matter to two callers (the chart dialog and the
//! monthly report dispatcher): per-day maximum reading, split into morning
//! and evening series, with days lacking rows left as gaps rather than
//! zeros. The rendering itself is a deliberately simple line plot.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgb, RgbImage};

use crate::models::{Measurement, Period};

pub const MONTH_NAMES: [&str; 12] = [
    "Январь",
    "Февраль",
    "Март",
    "Апрель",
    "Май",
    "Июнь",
    "Июль",
    "Август",
    "Сентябрь",
    "Октябрь",
    "Ноябрь",
    "Декабрь",
];

/// Keyboard label for a month, e.g. "Май 2024".
pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", MONTH_NAMES[(month - 1) as usize], year)
}

/// Parses a month-selection label back into (year, month).
pub fn parse_month_label(input: &str) -> Option<(i32, u32)> {
    let lower = input.trim().to_lowercase();
    let mut parts = lower.split_whitespace();
    let name = parts.next()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = MONTH_NAMES
        .iter()
        .position(|candidate| candidate.to_lowercase() == name)? as u32
        + 1;
    Some((year, month))
}

/// Distinct (year, month) pairs present in the diary, newest first.
pub fn available_months(rows: &[Measurement]) -> Vec<(i32, u32)> {
    let mut months: Vec<(i32, u32)> = Vec::new();
    for row in rows {
        let key = (row.date.year(), row.date.month());
        if !months.contains(&key) {
            months.push(key);
        }
    }
    months.sort_unstable();
    months.reverse();
    months
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(31)
}

/// Per-day maxima for one calendar month. Index 0 is day 1; `None` is a day
/// without measurements for that period (a gap, never 0).
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSeries {
    pub year: i32,
    pub month: u32,
    pub morning: Vec<Option<i64>>,
    pub evening: Vec<Option<i64>>,
}

/// Groups the month's rows by (day, period) and keeps the maximum reading
/// per group. Returns `None` when the month has no rows at all.
pub fn aggregate(rows: &[Measurement], year: i32, month: u32) -> Option<MonthSeries> {
    let days = days_in_month(year, month) as usize;
    let mut morning: Vec<Option<i64>> = vec![None; days];
    let mut evening: Vec<Option<i64>> = vec![None; days];

    for row in rows {
        if row.date.year() != year || row.date.month() != month {
            continue;
        }
        let index = (row.date.day() - 1) as usize;
        let slot = match row.period {
            Period::Morning => &mut morning[index],
            Period::Evening => &mut evening[index],
        };
        *slot = Some(slot.map_or(row.reading, |current| current.max(row.reading)));
    }

    if morning.iter().all(Option::is_none) && evening.iter().all(Option::is_none) {
        return None;
    }
    Some(MonthSeries {
        year,
        month,
        morning,
        evening,
    })
}

// --- Rendering ---

const WIDTH: u32 = 900;
const HEIGHT: u32 = 400;
const MARGIN_LEFT: i64 = 40;
const MARGIN_RIGHT: i64 = 20;
const MARGIN_TOP: i64 = 20;
const MARGIN_BOTTOM: i64 = 30;
const Y_MIN: i64 = 50;
const Y_MAX: i64 = 500;

const MORNING_COLOR: Rgb<u8> = Rgb([54, 162, 235]);
const EVENING_COLOR: Rgb<u8> = Rgb([255, 99, 132]);
const GRID_COLOR: Rgb<u8> = Rgb([220, 220, 220]);
const AXIS_COLOR: Rgb<u8> = Rgb([120, 120, 120]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Renders the month series as PNG bytes.
pub fn render_png(series: &MonthSeries) -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let days = series.morning.len() as i64;

    let x_of = |day: i64| -> i64 {
        let span = (WIDTH as i64) - MARGIN_LEFT - MARGIN_RIGHT;
        MARGIN_LEFT + (day - 1) * span / (days - 1).max(1)
    };
    let y_of = |value: i64| -> i64 {
        let span = (HEIGHT as i64) - MARGIN_TOP - MARGIN_BOTTOM;
        let clamped = value.clamp(Y_MIN, Y_MAX);
        MARGIN_TOP + span - (clamped - Y_MIN) * span / (Y_MAX - Y_MIN)
    };

    // Grid, then axes on top of it.
    for value in (Y_MIN..=Y_MAX).step_by(50) {
        let y = y_of(value);
        draw_line(&mut canvas, x_of(1), y, x_of(days), y, GRID_COLOR);
    }
    for day in 1..=days {
        let x = x_of(day);
        draw_line(&mut canvas, x, y_of(Y_MAX), x, y_of(Y_MIN), GRID_COLOR);
    }
    draw_line(&mut canvas, x_of(1), y_of(Y_MIN), x_of(days), y_of(Y_MIN), AXIS_COLOR);
    draw_line(&mut canvas, x_of(1), y_of(Y_MIN), x_of(1), y_of(Y_MAX), AXIS_COLOR);

    draw_series(&mut canvas, &series.morning, MORNING_COLOR, &x_of, &y_of);
    draw_series(&mut canvas, &series.evening, EVENING_COLOR, &x_of, &y_of);

    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(canvas.as_raw(), WIDTH, HEIGHT, ColorType::Rgb8)
        .context("Failed to encode chart PNG")?;
    Ok(bytes)
}

fn draw_series(
    canvas: &mut RgbImage,
    values: &[Option<i64>],
    color: Rgb<u8>,
    x_of: &dyn Fn(i64) -> i64,
    y_of: &dyn Fn(i64) -> i64,
) {
    // Connect consecutive measured days only; a gap in the data stays a gap
    // in the line.
    for day in 1..values.len() as i64 {
        if let (Some(a), Some(b)) = (values[(day - 1) as usize], values[day as usize]) {
            draw_line(canvas, x_of(day), y_of(a), x_of(day + 1), y_of(b), color);
        }
    }
    for (index, value) in values.iter().enumerate() {
        if let Some(value) = *value {
            let (x, y) = (x_of(index as i64 + 1), y_of(value));
            fill_circle(canvas, x, y, 4, color);
            fill_circle(canvas, x, y, 2, BACKGROUND);
        }
    }
}

fn put_pixel(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_circle(canvas: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

fn draw_line(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    // Bresenham.
    let (mut x, mut y) = (x0, y0);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(canvas, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
