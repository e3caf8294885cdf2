//! Speed → color mapping shared by the track renderer and the legend.
//!
//! Slow samples sit at the blue end of the hue wheel (240°), fast samples at
//! the red end (0°), with full saturation and mid lightness. A track whose
//! samples all move at the same speed gets a single neutral color.

use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hue used for the slowest sample in a track.
pub const SLOW_HUE: f64 = 240.0;
/// Hue used for the fastest sample in a track.
pub const FAST_HUE: f64 = 0.0;

/// Uniform-speed tracks are drawn in this color.
pub const NEUTRAL: Color = Color::Rgb(0x66, 0x7e, 0xea);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Color {
    Rgb(u8, u8, u8),
    Hsl { hue: f64, saturation: u8, lightness: u8 },
}

impl Color {
    pub fn to_css(&self) -> String {
        match *self {
            Color::Rgb(r, g, b) => format!("#{:02x}{:02x}{:02x}", r, g, b),
            Color::Hsl {
                hue,
                saturation,
                lightness,
            } => format!("hsl({}, {}%, {}%)", hue, saturation, lightness),
        }
    }

    /// Hue in degrees, if this is a gradient color.
    pub fn hue(&self) -> Option<f64> {
        match *self {
            Color::Hsl { hue, .. } => Some(hue),
            Color::Rgb(..) => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Map a speed onto the slow→fast gradient for a track whose speeds span
/// `[min_speed, max_speed]`. Pure: identical inputs give identical output.
pub fn color_of(speed: f64, min_speed: f64, max_speed: f64) -> Color {
    if max_speed == min_speed {
        return NEUTRAL;
    }
    let ratio = (speed - min_speed) / (max_speed - min_speed);
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    Color::Hsl {
        hue: SLOW_HUE + (FAST_HUE - SLOW_HUE) * ratio,
        saturation: 100,
        lightness: 50,
    }
}

/// Track-wide speed extremes, computed once per track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: f64,
    pub max: f64,
}

impl SpeedRange {
    pub fn of(points: &[Sample]) -> Option<Self> {
        let first = points.first()?;
        let mut range = Self {
            min: first.speed,
            max: first.speed,
        };
        for p in &points[1..] {
            range.min = range.min.min(p.speed);
            range.max = range.max.max(p.speed);
        }
        Some(range)
    }

    pub fn color_of(&self, speed: f64) -> Color {
        color_of(speed, self.min, self.max)
    }
}

// ─── Legend ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendStop {
    /// Position along the legend bar, 0.0 (slow) to 1.0 (fast)
    pub offset: f64,
    pub color: String,
}

/// Slow→fast gradient description for the map legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub stops: Vec<LegendStop>,
    pub slow_label: String,
    pub fast_label: String,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Legend {
    /// Sample the gradient at `steps` evenly spaced speeds (at least two).
    pub fn new(range: SpeedRange, steps: usize) -> Self {
        let steps = steps.max(2);
        let stops = (0..steps)
            .map(|i| {
                let offset = i as f64 / (steps - 1) as f64;
                let speed = range.min + (range.max - range.min) * offset;
                LegendStop {
                    offset,
                    color: range.color_of(speed).to_css(),
                }
            })
            .collect();
        Self {
            stops,
            slow_label: "Slow".to_string(),
            fast_label: "Fast".to_string(),
            min_speed: range.min,
            max_speed: range.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_speed_is_neutral() {
        for speed in [0.0, 3.0, 50.0, -1.0] {
            assert_eq!(color_of(speed, 7.5, 7.5), NEUTRAL);
        }
        assert_eq!(NEUTRAL.to_css(), "#667eea");
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(color_of(0.0, 0.0, 10.0).hue(), Some(SLOW_HUE));
        assert_eq!(color_of(10.0, 0.0, 10.0).hue(), Some(FAST_HUE));
        assert_eq!(color_of(5.0, 0.0, 10.0).hue(), Some(120.0));
        assert_eq!(color_of(10.0, 0.0, 10.0).to_css(), "hsl(0, 100%, 50%)");
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(color_of(-5.0, 0.0, 10.0), color_of(0.0, 0.0, 10.0));
        assert_eq!(color_of(99.0, 0.0, 10.0), color_of(10.0, 0.0, 10.0));
    }

    #[test]
    fn test_monotonic_in_speed() {
        let (min, max) = (1.5, 31.0);
        let mut prev_hue = f64::MAX;
        for i in 0..=200 {
            let speed = i as f64 * 0.2;
            let hue = color_of(speed, min, max).hue().unwrap();
            assert!(hue <= prev_hue, "speed {} went back toward slow hue", speed);
            prev_hue = hue;
        }
    }

    #[test]
    fn test_deterministic() {
        let a = color_of(3.3, 1.1, 9.9);
        let b = color_of(3.3, 1.1, 9.9);
        assert_eq!(a, b);
        assert_eq!(a.to_css(), b.to_css());
    }

    #[test]
    fn test_speed_range() {
        let pts = [
            Sample::new(0.0, 0.0, 0.0, 3.0),
            Sample::new(0.0, 0.0, 1.0, 1.0),
            Sample::new(0.0, 0.0, 2.0, 8.0),
        ];
        let range = SpeedRange::of(&pts).unwrap();
        assert_eq!(range, SpeedRange { min: 1.0, max: 8.0 });
        assert!(SpeedRange::of(&[]).is_none());
    }

    #[test]
    fn test_legend_matches_mapper() {
        let range = SpeedRange { min: 0.0, max: 20.0 };
        let legend = Legend::new(range, 5);
        assert_eq!(legend.stops.len(), 5);
        assert_eq!(legend.stops[0].color, color_of(0.0, 0.0, 20.0).to_css());
        assert_eq!(legend.stops[4].color, color_of(20.0, 0.0, 20.0).to_css());
        assert_eq!(legend.stops[2].offset, 0.5);
        assert_eq!(legend.slow_label, "Slow");
        assert_eq!(legend.fast_label, "Fast");
    }
}
