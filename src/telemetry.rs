//! Live telemetry: a pure projection of `(track, index)` into the numbers
//! the info panel shows. Nothing here is cached; call [`project`] whenever
//! either input changes.

use crate::types::{GeoBounds, Track, MPS_TO_KMH, MPS_TO_MPH};
use serde::{Deserialize, Serialize};
use std::fmt;

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * MPS_TO_MPH
}

pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * MPS_TO_KMH
}

/// Instantaneous speed in every unit the panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Speed {
    pub mps: f64,
    pub mph: f64,
    pub kmh: f64,
}

impl Speed {
    pub fn from_mps(mps: f64) -> Self {
        Self {
            mps,
            mph: mps_to_mph(mps),
            kmh: mps_to_kmh(mps),
        }
    }
}

/// Whole-track aggregates, with speeds already converted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub duration: f64,
    pub max_speed_mph: f64,
    pub avg_speed_mph: f64,
    pub total_points: usize,
    pub bounds: GeoBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Cursor position actually shown (clamped to the track)
    pub index: usize,
    pub point_count: usize,
    pub timestamp: f64,
    /// `(index + 1) / len * 100`
    pub progress_percent: f64,
    /// `index / (len - 1) * 100`, the scrubber fill
    pub scrub_percent: f64,
    pub speed: Speed,
    pub latitude: f64,
    pub longitude: f64,
    pub stats: TrackStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TelemetryView {
    NoData,
    Live(Telemetry),
}

impl TelemetryView {
    pub fn live(&self) -> Option<&Telemetry> {
        match self {
            TelemetryView::Live(t) => Some(t),
            TelemetryView::NoData => None,
        }
    }
}

pub fn project(track: &Track, index: usize) -> TelemetryView {
    let last = match track.last_index() {
        Some(last) => last,
        None => return TelemetryView::NoData,
    };
    let index = index.min(last);
    let sample = &track.points[index];
    let len = track.points.len();

    let scrub_percent = if last == 0 {
        100.0
    } else {
        index as f64 * 100.0 / last as f64
    };

    TelemetryView::Live(Telemetry {
        index,
        point_count: len,
        timestamp: sample.timestamp,
        progress_percent: (index + 1) as f64 * 100.0 / len as f64,
        scrub_percent,
        speed: Speed::from_mps(sample.speed),
        latitude: sample.latitude,
        longitude: sample.longitude,
        stats: TrackStats {
            duration: track.duration,
            max_speed_mph: mps_to_mph(track.max_speed),
            avg_speed_mph: mps_to_mph(track.avg_speed),
            total_points: track.total_points,
            bounds: track.bounds(),
        },
    })
}

/// `12345` → `"12,345"`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for TelemetryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = match self {
            TelemetryView::NoData => {
                writeln!(f, "Track Information")?;
                return writeln!(f, "  No track data available");
            }
            TelemetryView::Live(t) => t,
        };
        writeln!(f, "Live Telemetry")?;
        writeln!(f, "  Time:      {:.1} s", t.timestamp)?;
        writeln!(f, "  Progress:  {:.1}%", t.progress_percent)?;
        writeln!(f, "  Point:     {} / {}", t.index + 1, t.point_count)?;
        writeln!(
            f,
            "  Speed:     {:.1} m/s  {:.1} mph  {:.1} km/h",
            t.speed.mps, t.speed.mph, t.speed.kmh
        )?;
        writeln!(f, "  Latitude:  {:.8}°", t.latitude)?;
        writeln!(f, "  Longitude: {:.8}°", t.longitude)?;
        writeln!(f, "Track Statistics")?;
        writeln!(f, "  Duration:     {:.1} s", t.stats.duration)?;
        writeln!(f, "  Max Speed:    {:.1} mph", t.stats.max_speed_mph)?;
        writeln!(f, "  Avg Speed:    {:.1} mph", t.stats.avg_speed_mph)?;
        writeln!(f, "  Total Points: {}", group_thousands(t.stats.total_points))?;
        let b = &t.stats.bounds;
        writeln!(f, "  Lat Range: {:.6}° to {:.6}°", b.min_latitude, b.max_latitude)?;
        writeln!(f, "  Lon Range: {:.6}° to {:.6}°", b.min_longitude, b.max_longitude)
    }
}
