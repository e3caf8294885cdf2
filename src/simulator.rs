use crate::types::{LatLng, Sample, Track};
use log::info;
use std::f64::consts::PI;
use std::str::FromStr;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Faster than this between two fixes is a GPS glitch, not motion.
pub const MAX_PLAUSIBLE_SPEED: f64 = 134.0;

const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Built-in demo tracks for running without an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// Two laps of an oval circuit: slow through the ends, fast on the sides
    Oval,
    /// Straight-line launch, cruise, and brake to a stop
    Sprint,
    /// No samples at all
    Empty,
}

impl FromStr for Demo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oval" => Ok(Demo::Oval),
            "sprint" => Ok(Demo::Sprint),
            "empty" => Ok(Demo::Empty),
            other => Err(format!("unknown demo \"{}\" (oval, sprint, empty)", other)),
        }
    }
}

/// Great-circle distance between two fixes, in meters.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a[0].to_radians(), b[0].to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b[1] - a[1]).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Speed at each fix from distance over elapsed time since the previous
/// one. The first fix is 0; implausible values and zero time steps give 0.
pub fn derive_speeds(positions: &[(f64, LatLng)]) -> Vec<f64> {
    let mut speeds = Vec::with_capacity(positions.len());
    for (i, &(t, pos)) in positions.iter().enumerate() {
        if i == 0 {
            speeds.push(0.0);
            continue;
        }
        let (prev_t, prev_pos) = positions[i - 1];
        let dt = t - prev_t;
        let speed = if dt > 0.0 {
            haversine_m(prev_pos, pos) / dt
        } else {
            0.0
        };
        speeds.push(if speed > MAX_PLAUSIBLE_SPEED { 0.0 } else { speed });
    }
    speeds
}

/// Synthesizes GPS tracks around an origin at a fixed sample rate.
pub struct Simulator {
    origin: LatLng,
    rate_hz: f64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new([45.6189, 9.2811], 1.0)
    }
}

impl Simulator {
    pub fn new(origin: LatLng, rate_hz: f64) -> Self {
        Self {
            origin,
            rate_hz: if rate_hz > 0.0 { rate_hz } else { 1.0 },
        }
    }

    pub fn generate(&self, demo: Demo) -> Track {
        let positions = match demo {
            Demo::Oval => self.oval(400.0, 150.0, 2),
            Demo::Sprint => self.sprint(),
            Demo::Empty => Vec::new(),
        };
        let speeds = derive_speeds(&positions);
        let samples: Vec<Sample> = positions
            .iter()
            .zip(speeds)
            .map(|(&(t, [lat, lon]), speed)| Sample::new(lat, lon, t, speed))
            .collect();
        let track = Track::from_samples(samples);
        info!("Simulated {:?} demo: {}", demo, track);
        track
    }

    fn to_lat_lng(&self, east_m: f64, north_m: f64) -> LatLng {
        let lat = self.origin[0] + north_m / METERS_PER_DEG_LAT;
        let lon = self.origin[1] + east_m / (METERS_PER_DEG_LAT * self.origin[0].to_radians().cos());
        [lat, lon]
    }

    fn oval(&self, a: f64, b: f64, laps: u32) -> Vec<(f64, LatLng)> {
        let dt = 1.0 / self.rate_hz;
        let end = 2.0 * PI * laps as f64;
        let mut theta: f64 = 0.0;
        let mut t = 0.0;
        let mut out = Vec::new();
        while theta < end {
            out.push((t, self.to_lat_lng(a * theta.cos(), b * theta.sin())));
            let target = 12.0 + 18.0 * theta.sin().powi(2);
            let ds_dtheta = (a * a * theta.sin().powi(2) + b * b * theta.cos().powi(2)).sqrt();
            theta += target * dt / ds_dtheta;
            t += dt;
        }
        out
    }

    fn sprint(&self) -> Vec<(f64, LatLng)> {
        const ACCEL: f64 = 2.0;
        const TOP: f64 = 40.0;
        const CRUISE_S: f64 = 10.0;
        const BRAKE: f64 = 4.0;

        let dt = 1.0 / self.rate_hz;
        let t_accel = TOP / ACCEL;
        let t_brake = TOP / BRAKE;
        let total = t_accel + CRUISE_S + t_brake;
        let steps = (total * self.rate_hz).round() as usize;

        (0..=steps)
            .map(|i| {
                let t = i as f64 * dt;
                let x = if t <= t_accel {
                    0.5 * ACCEL * t * t
                } else if t <= t_accel + CRUISE_S {
                    0.5 * ACCEL * t_accel * t_accel + TOP * (t - t_accel)
                } else {
                    let tb = (t - t_accel - CRUISE_S).min(t_brake);
                    0.5 * ACCEL * t_accel * t_accel + TOP * CRUISE_S + TOP * tb
                        - 0.5 * BRAKE * tb * tb
                };
                (t, self.to_lat_lng(x, 0.0))
            })
            .collect()
    }
}
