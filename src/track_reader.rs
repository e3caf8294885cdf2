//! Track document reader: loads the upload service's processed-track JSON.
//!
//! Accepts either the bare track object or the upload response envelope
//! (`{"track": {...}, "message": "..."}`). An `{"error": "..."}` envelope is
//! reported as [`TrackError::Rejected`]. Aggregates the document leaves out
//! or that disagree with the points are recomputed from them; a missing
//! speed counts as 0.

use crate::types::{Sample, Track};
use log::{info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Claimed duration and bounds may differ from the points by float noise only.
const AGGREGATE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("read track: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse track: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("timestamps go backwards at point {index} ({prev}s → {next}s)")]
    NonMonotonic { index: usize, prev: f64, next: f64 },
}

#[derive(Debug, Deserialize)]
struct PointDocument {
    latitude: f64,
    longitude: f64,
    timestamp: Option<f64>,
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrackDocument {
    #[serde(default)]
    name: Option<String>,
    points: Vec<PointDocument>,
    duration: Option<f64>,
    max_speed: Option<f64>,
    avg_speed: Option<f64>,
    total_points: Option<usize>,
    min_latitude: Option<f64>,
    max_latitude: Option<f64>,
    min_longitude: Option<f64>,
    max_longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Envelope {
        track: TrackDocument,
        #[serde(default)]
        message: Option<String>,
    },
    Failure {
        error: String,
    },
    Bare(TrackDocument),
}

pub fn read_track<R: Read>(reader: R) -> Result<Track, TrackError> {
    let doc: Document = serde_json::from_reader(reader)?;
    let doc = match doc {
        Document::Envelope { track, message } => {
            if let Some(message) = message {
                info!("Upload service: {}", message);
            }
            track
        }
        Document::Failure { error } => return Err(TrackError::Rejected(error)),
        Document::Bare(track) => track,
    };
    into_track(doc)
}

pub fn load_track(path: &Path) -> Result<Track, TrackError> {
    let file = File::open(path)?;
    let track = read_track(BufReader::new(file))?;
    info!("Read {} points from {}", track.len(), path.display());
    Ok(track)
}

fn into_track(doc: TrackDocument) -> Result<Track, TrackError> {
    let mut points = Vec::with_capacity(doc.points.len());
    for (i, p) in doc.points.iter().enumerate() {
        let timestamp = p.timestamp.unwrap_or(0.0);
        if let Some(prev) = points.last().map(|s: &Sample| s.timestamp) {
            if timestamp < prev {
                return Err(TrackError::NonMonotonic {
                    index: i,
                    prev,
                    next: timestamp,
                });
            }
        }
        points.push(Sample::new(
            p.latitude,
            p.longitude,
            timestamp,
            p.speed.unwrap_or(0.0).max(0.0),
        ));
    }

    let n = points.len();
    let derived = Track::from_samples(points);
    if let Some(claimed) = doc.total_points.filter(|&c| c != n) {
        warn!(
            "Document claims {} points but holds {}; recomputing aggregates",
            claimed, n
        );
        return Ok(derived);
    }

    let track = match (
        doc.duration,
        doc.max_speed,
        doc.avg_speed,
        doc.min_latitude,
        doc.max_latitude,
        doc.min_longitude,
        doc.max_longitude,
    ) {
        (
            Some(duration),
            Some(max_speed),
            Some(avg_speed),
            Some(min_latitude),
            Some(max_latitude),
            Some(min_longitude),
            Some(max_longitude),
        ) if doc.total_points.is_some() => {
            let claimed = [duration, min_latitude, max_latitude, min_longitude, max_longitude];
            let actual = [
                derived.duration,
                derived.min_latitude,
                derived.max_latitude,
                derived.min_longitude,
                derived.max_longitude,
            ];
            if claimed.iter().zip(actual).all(|(c, a)| (c - a).abs() <= AGGREGATE_TOLERANCE) {
                Track {
                    points: derived.points,
                    duration,
                    max_speed,
                    avg_speed,
                    total_points: n,
                    min_latitude,
                    max_latitude,
                    min_longitude,
                    max_longitude,
                }
            } else {
                warn!(
                    "Document duration/bounds {:?} disagree with its points {:?}; recomputing aggregates",
                    claimed, actual
                );
                derived
            }
        }
        _ => derived,
    };

    if let Some(name) = doc.name {
        info!("Track \"{}\"", name);
    }
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BARE: &str = r#"{
        "id": 3, "name": "endurance", "processed": true,
        "points": [
            {"latitude": 42.1, "longitude": -83.2, "timestamp": 0.0, "speed": 0.0, "altitude": null},
            {"latitude": 42.2, "longitude": -83.1, "timestamp": 1.0, "speed": 12.5, "altitude": null}
        ],
        "duration": 1.0, "max_speed": 12.5, "avg_speed": 6.25, "total_points": 2,
        "min_latitude": 42.1, "max_latitude": 42.2, "min_longitude": -83.2, "max_longitude": -83.1,
        "points_count": 2
    }"#;

    #[test]
    fn test_bare_document() {
        let track = read_track(Cursor::new(BARE)).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.max_speed, 12.5);
        assert_eq!(track.avg_speed, 6.25);
        assert_eq!(track.points[1].speed, 12.5);
    }

    #[test]
    fn test_upload_envelope() {
        let doc = format!(r#"{{"track": {}, "message": "ok"}}"#, BARE);
        let track = read_track(Cursor::new(doc)).unwrap();
        assert_eq!(track.total_points, 2);
    }

    #[test]
    fn test_error_envelope() {
        let doc = r#"{"error": "Need at least 2 valid GPS coordinate pairs"}"#;
        match read_track(Cursor::new(doc)) {
            Err(TrackError::Rejected(msg)) => assert!(msg.contains("at least 2")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_aggregates_are_recomputed() {
        let doc = r#"{"points": [
            {"latitude": 1.0, "longitude": 2.0, "timestamp": 0.0, "speed": 4.0},
            {"latitude": 3.0, "longitude": 0.5, "timestamp": 2.0, "speed": null}
        ]}"#;
        let track = read_track(Cursor::new(doc)).unwrap();
        assert_eq!(track.total_points, 2);
        assert_eq!(track.duration, 2.0);
        assert_eq!(track.max_speed, 4.0);
        assert_eq!(track.points[1].speed, 0.0);
        assert_eq!(track.min_longitude, 0.5);
    }

    #[test]
    fn test_wrong_point_count_is_recomputed() {
        let doc = r#"{"points": [{"latitude": 1.0, "longitude": 2.0, "timestamp": 0.0, "speed": 1.0}],
            "duration": 9.0, "max_speed": 9.0, "avg_speed": 9.0, "total_points": 40,
            "min_latitude": 0.0, "max_latitude": 0.0, "min_longitude": 0.0, "max_longitude": 0.0}"#;
        let track = read_track(Cursor::new(doc)).unwrap();
        assert_eq!(track.total_points, 1);
        assert_eq!(track.max_speed, 1.0);
    }

    #[test]
    fn test_stale_bounds_are_recomputed() {
        let doc = BARE.replace(r#""max_latitude": 42.2"#, r#""max_latitude": 50.0"#);
        let track = read_track(Cursor::new(doc)).unwrap();
        assert_eq!(track.max_latitude, 42.2);
        assert_eq!(track.bounds().max_latitude, 42.2);

        let doc = BARE.replace(r#""duration": 1.0"#, r#""duration": 600.0"#);
        let track = read_track(Cursor::new(doc)).unwrap();
        assert_eq!(track.duration, 1.0);
    }

    #[test]
    fn test_empty_points_is_empty_track() {
        let track = read_track(Cursor::new(r#"{"points": []}"#)).unwrap();
        assert!(track.is_empty());
    }

    #[test]
    fn test_backwards_timestamps_rejected() {
        let doc = r#"{"points": [
            {"latitude": 1.0, "longitude": 2.0, "timestamp": 5.0},
            {"latitude": 1.0, "longitude": 2.0, "timestamp": 4.0}
        ]}"#;
        assert!(matches!(
            read_track(Cursor::new(doc)),
            Err(TrackError::NonMonotonic { index: 1, .. })
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            read_track(Cursor::new("not json")),
            Err(TrackError::Parse(_))
        ));
    }
}
