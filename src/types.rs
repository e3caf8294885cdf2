use serde::{Deserialize, Serialize};
use std::fmt;

// ─── GPS samples ────────────────────────────────────────────────────────────

/// One GPS fix: position, time since track start, instantaneous speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    /// Seconds since the first sample (monotonic non-decreasing)
    pub timestamp: f64,
    /// Meters per second, ≥ 0
    #[serde(default)]
    pub speed: f64,
}

impl Sample {
    pub fn new(latitude: f64, longitude: f64, timestamp: f64, speed: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            speed,
        }
    }

    pub fn position(&self) -> LatLng {
        [self.latitude, self.longitude]
    }
}

/// `[latitude, longitude]`, the order map libraries expect.
pub type LatLng = [f64; 2];

// ─── Track ──────────────────────────────────────────────────────────────────

/// Geographic extent of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBounds {
    pub fn center(&self) -> LatLng {
        [
            (self.min_latitude + self.max_latitude) / 2.0,
            (self.min_longitude + self.max_longitude) / 2.0,
        ]
    }
}

/// An ordered run of samples plus the aggregates the upload service
/// precomputes. Immutable for the lifetime of a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub points: Vec<Sample>,
    pub duration: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub total_points: usize,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Track {
    /// Build a track and derive every aggregate from the samples.
    /// Empty input yields an empty track with zeroed aggregates.
    pub fn from_samples(points: Vec<Sample>) -> Self {
        if points.is_empty() {
            return Self::empty();
        }

        let mut max_speed = f64::MIN;
        let mut speed_sum = 0.0;
        let mut bounds = GeoBounds {
            min_latitude: f64::MAX,
            max_latitude: f64::MIN,
            min_longitude: f64::MAX,
            max_longitude: f64::MIN,
        };
        for p in &points {
            max_speed = max_speed.max(p.speed);
            speed_sum += p.speed;
            bounds.min_latitude = bounds.min_latitude.min(p.latitude);
            bounds.max_latitude = bounds.max_latitude.max(p.latitude);
            bounds.min_longitude = bounds.min_longitude.min(p.longitude);
            bounds.max_longitude = bounds.max_longitude.max(p.longitude);
        }

        let total_points = points.len();
        let duration = points[total_points - 1].timestamp;
        Self {
            duration,
            max_speed,
            avg_speed: speed_sum / total_points as f64,
            total_points,
            min_latitude: bounds.min_latitude,
            max_latitude: bounds.max_latitude,
            min_longitude: bounds.min_longitude,
            max_longitude: bounds.max_longitude,
            points,
        }
    }

    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            duration: 0.0,
            max_speed: 0.0,
            avg_speed: 0.0,
            total_points: 0,
            min_latitude: 0.0,
            max_latitude: 0.0,
            min_longitude: 0.0,
            max_longitude: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Highest valid cursor position, or `None` for an empty track.
    pub fn last_index(&self) -> Option<usize> {
        self.points.len().checked_sub(1)
    }

    pub fn bounds(&self) -> GeoBounds {
        GeoBounds {
            min_latitude: self.min_latitude,
            max_latitude: self.max_latitude,
            min_longitude: self.min_longitude,
            max_longitude: self.max_longitude,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} points, {:.1}s, max {:.1} m/s, avg {:.1} m/s, lat [{:.6}, {:.6}] lon [{:.6}, {:.6}]",
            self.total_points,
            self.duration,
            self.max_speed,
            self.avg_speed,
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        )
    }
}

/// Identity of a loaded track. A fresh id is issued on every load, so two
/// uploads of byte-identical files are still distinct tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

// ─── Playback state ─────────────────────────────────────────────────────────

/// The playback cursor. Exactly one authoritative copy exists, owned by the
/// orchestrator; the clock only ever borrows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub index: usize,
    pub playing: bool,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.playing { "Playing" } else { "Stopped" };
        write!(f, "{}({})", mode, self.index)
    }
}

/// What to do with the `playing` flag when the user seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekPolicy {
    /// Keep playing (or stay stopped) at the new position
    #[default]
    Preserve,
    /// Dragging the scrubber always stops playback
    Pause,
}

// ─── Basemap ────────────────────────────────────────────────────────────────

/// Underlying map imagery. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Basemap {
    #[default]
    Street,
    Satellite,
}

impl Basemap {
    pub fn toggled(self) -> Self {
        match self {
            Basemap::Street => Basemap::Satellite,
            Basemap::Satellite => Basemap::Street,
        }
    }

    pub fn tile_url(self) -> &'static str {
        match self {
            Basemap::Street => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            Basemap::Satellite => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
        }
    }

    pub fn attribution(self) -> &'static str {
        match self {
            Basemap::Street => {
                "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
            }
            Basemap::Satellite => {
                "&copy; <a href=\"https://www.esri.com/\">Esri</a> &mdash; Source: Esri, Maxar, Earthstar Geographics"
            }
        }
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Playback advances one sample per tick, independent of sampling density.
pub const TICK_PERIOD_MS: u64 = 100;

/// Default skip-forward distance, in samples.
pub const DEFAULT_STEP: usize = 10;

pub const MPS_TO_MPH: f64 = 2.237;
pub const MPS_TO_KMH: f64 = 3.6;
