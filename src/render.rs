use crate::color::{Legend, SpeedRange};
use crate::scene::{DrawCommand, MapSurface};
use crate::types::{Track, TrackId};
use log::{debug, trace};
use std::collections::BTreeSet;

pub const SEGMENT_WEIGHT: u32 = 6;
pub const SEGMENT_OPACITY: f64 = 0.8;
pub const MARKER_RADIUS: u32 = 8;
pub const MARKER_FILL: &str = "white";
pub const MARKER_STROKE: &str = "black";
pub const MARKER_WEIGHT: u32 = 2;
pub const FIT_PADDING_PX: u32 = 20;
pub const LEGEND_STEPS: usize = 7;
pub const NO_DATA_MESSAGE: &str = "No track data available";

/// What a render pass did to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub added: usize,
    pub removed: usize,
    /// The viewport was fitted to the track on this pass.
    pub fitted: bool,
    pub marker_moved: bool,
    /// Sample the marker sits on.
    pub cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    NoData,
    Drawn(RenderStats),
}

/// Draws a track up to the playback cursor, touching only what changed.
///
/// Segment `k` joins samples `k` and `k+1` and is colored by the speed at
/// sample `k`. After every call the segments on the surface are exactly
/// `{0, …, cursor-1}` where `cursor = min(index, len-1)`, and the marker
/// sits on sample `cursor`. Moving the cursor is a reconcile: compute the
/// target set, remove what lies beyond it, add what is missing below it.
///
/// Per-track work (speed range, legend, viewport fit) happens once, the
/// first time a given [`TrackId`] is rendered. Re-fitting on later passes
/// would undo the user's own pan and zoom.
#[derive(Debug, Default)]
pub struct IncrementalTrackRenderer {
    track_id: Option<TrackId>,
    speed_range: Option<SpeedRange>,
    drawn: BTreeSet<usize>,
    marker: Option<usize>,
    showing_placeholder: bool,
}

impl IncrementalTrackRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: TrackId,
        track: &Track,
        index: usize,
    ) -> RenderOutcome {
        let last = match track.last_index() {
            Some(last) => last,
            None => {
                if !self.showing_placeholder || self.track_id != Some(id) {
                    surface.apply(DrawCommand::Placeholder {
                        message: NO_DATA_MESSAGE.to_string(),
                    });
                    debug!("{} is empty, showing placeholder", id);
                }
                self.forget();
                self.track_id = Some(id);
                self.showing_placeholder = true;
                return RenderOutcome::NoData;
            }
        };

        let mut stats = RenderStats::default();

        if self.track_id != Some(id) {
            if !self.drawn.is_empty() || self.marker.is_some() || self.showing_placeholder {
                surface.apply(DrawCommand::Clear);
            }
            self.forget();
            self.track_id = Some(id);

            let range = SpeedRange::of(&track.points);
            self.speed_range = range;
            if let Some(range) = range {
                surface.apply(DrawCommand::Legend {
                    legend: Legend::new(range, LEGEND_STEPS),
                });
            }
            let bounds = track.bounds();
            surface.apply(DrawCommand::FitBounds {
                bounds: [
                    [bounds.min_latitude, bounds.min_longitude],
                    [bounds.max_latitude, bounds.max_longitude],
                ],
                padding_px: FIT_PADDING_PX,
            });
            stats.fitted = true;
            debug!("First render of {}: fitted viewport, speed range {:?}", id, range);
        }

        let cursor = index.min(last);
        stats.cursor = cursor;

        // Segments at or beyond the cursor are stale.
        let stale: Vec<usize> = self.drawn.range(cursor..).rev().copied().collect();
        for k in stale {
            surface.apply(DrawCommand::RemoveSegment { id: k });
            self.drawn.remove(&k);
            stats.removed += 1;
        }

        let range = self.speed_range.unwrap_or(SpeedRange { min: 0.0, max: 0.0 });
        // What remains is a prefix `{0, …, m-1}` with `m <= cursor`.
        for k in self.drawn.len()..cursor {
            let (a, b) = (&track.points[k], &track.points[k + 1]);
            surface.apply(DrawCommand::AddSegment {
                id: k,
                from: a.position(),
                to: b.position(),
                color: range.color_of(a.speed).to_css(),
                weight: SEGMENT_WEIGHT,
                opacity: SEGMENT_OPACITY,
            });
            self.drawn.insert(k);
            stats.added += 1;
        }

        if self.marker != Some(cursor) {
            surface.apply(DrawCommand::Marker {
                at: track.points[cursor].position(),
                radius: MARKER_RADIUS,
                fill: MARKER_FILL.to_string(),
                stroke: MARKER_STROKE.to_string(),
                weight: MARKER_WEIGHT,
            });
            self.marker = Some(cursor);
            stats.marker_moved = true;
        }

        trace!(
            "Rendered {} at {}: +{} -{} segments",
            id,
            cursor,
            stats.added,
            stats.removed
        );
        RenderOutcome::Drawn(stats)
    }

    fn forget(&mut self) {
        self.track_id = None;
        self.speed_range = None;
        self.drawn.clear();
        self.marker = None;
        self.showing_placeholder = false;
    }

    pub fn segment_count(&self) -> usize {
        self.drawn.len()
    }

    pub fn drawn_segments(&self) -> impl Iterator<Item = usize> + '_ {
        self.drawn.iter().copied()
    }

    pub fn marker(&self) -> Option<usize> {
        self.marker
    }

    pub fn speed_range(&self) -> Option<SpeedRange> {
        self.speed_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{color_of, NEUTRAL};
    use crate::scene::RecordingSurface;
    use crate::types::Sample;

    fn five_sample_track() -> Track {
        let speeds = [0.0, 1.0, 2.0, 1.0, 0.0];
        Track::from_samples(
            speeds
                .iter()
                .enumerate()
                .map(|(i, &s)| Sample::new(47.0 + i as f64 * 0.001, 8.0, i as f64, s))
                .collect(),
        )
    }

    fn linear_track(n: usize) -> Track {
        Track::from_samples(
            (0..n)
                .map(|i| Sample::new(0.0, i as f64 * 0.0001, i as f64, (i % 7) as f64))
                .collect(),
        )
    }

    #[test]
    fn test_five_samples_at_index_two() {
        let track = five_sample_track();
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 0);
        renderer.render(&mut surface, TrackId(1), &track, 1);
        renderer.render(&mut surface, TrackId(1), &track, 2);

        assert_eq!(surface.scene.segment_ids(), vec![0, 1]);
        assert_eq!(surface.scene.marker, Some(track.points[2].position()));
        assert_eq!(surface.scene.segments[&1].color, color_of(1.0, 0.0, 2.0).to_css());
        assert_eq!(renderer.segment_count(), 2);
    }

    #[test]
    fn test_seek_backward_removes_beyond_cursor() {
        let track = five_sample_track();
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 4);
        assert_eq!(surface.scene.segment_ids(), vec![0, 1, 2, 3]);

        let outcome = renderer.render(&mut surface, TrackId(1), &track, 1);
        assert_eq!(surface.scene.segment_ids(), vec![0]);
        assert_eq!(renderer.drawn_segments().collect::<Vec<_>>(), vec![0]);
        match outcome {
            RenderOutcome::Drawn(stats) => {
                assert_eq!(stats.removed, 3);
                assert_eq!(stats.added, 0);
            }
            RenderOutcome::NoData => panic!("expected a drawn track"),
        }
    }

    #[test]
    fn test_segment_count_matches_every_index() {
        let track = linear_track(30);
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        for index in [0, 5, 29, 12, 12, 3, 40, 0, 17] {
            renderer.render(&mut surface, TrackId(9), &track, index);
            let expected = index.min(29);
            assert_eq!(surface.scene.segment_ids(), (0..expected).collect::<Vec<_>>());
            assert_eq!(surface.scene.marker, Some(track.points[expected].position()));
        }
    }

    #[test]
    fn test_forward_step_only_adds_the_delta() {
        let track = linear_track(1000);
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(2), &track, 600);
        renderer.render(&mut surface, TrackId(2), &track, 250);
        surface.take_history();

        let outcome = renderer.render(&mut surface, TrackId(2), &track, 260);
        // Ten segments and one marker move, nothing for the drawn prefix.
        assert_eq!(surface.history.len(), 11);
        match outcome {
            RenderOutcome::Drawn(stats) => {
                assert_eq!((stats.added, stats.removed), (10, 0));
            }
            RenderOutcome::NoData => panic!("expected a drawn track"),
        }
        assert_eq!(renderer.drawn_segments().collect::<Vec<_>>(), (0..260).collect::<Vec<_>>());
    }

    #[test]
    fn test_index_past_end_clamps_marker() {
        let track = five_sample_track();
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 99);
        assert_eq!(surface.scene.segments.len(), 4);
        assert_eq!(surface.scene.marker, Some(track.points[4].position()));
    }

    #[test]
    fn test_render_is_idempotent() {
        let track = five_sample_track();
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 3);
        surface.take_history();
        let outcome = renderer.render(&mut surface, TrackId(1), &track, 3);
        assert!(surface.history.is_empty());
        assert_eq!(
            outcome,
            RenderOutcome::Drawn(RenderStats {
                cursor: 3,
                ..RenderStats::default()
            })
        );
    }

    #[test]
    fn test_viewport_fitted_once_per_track() {
        let track = five_sample_track();
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        for index in [0, 1, 2, 0, 3] {
            renderer.render(&mut surface, TrackId(1), &track, index);
        }
        assert_eq!(surface.scene.fit_count, 1);
        let bounds = track.bounds();
        assert_eq!(
            surface.scene.viewport,
            Some([
                [bounds.min_latitude, bounds.min_longitude],
                [bounds.max_latitude, bounds.max_longitude]
            ])
        );

        renderer.render(&mut surface, TrackId(2), &track, 0);
        assert_eq!(surface.scene.fit_count, 2);
    }

    #[test]
    fn test_new_track_rebuilds_from_scratch() {
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &linear_track(10), 8);
        assert_eq!(surface.scene.segments.len(), 8);

        let second = five_sample_track();
        renderer.render(&mut surface, TrackId(2), &second, 0);
        assert!(surface.scene.segments.is_empty());
        assert_eq!(surface.scene.marker, Some(second.points[0].position()));
        assert!(surface.history.contains(&DrawCommand::Clear));
    }

    #[test]
    fn test_empty_track_shows_placeholder() {
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &linear_track(4), 3);

        let empty = Track::empty();
        assert_eq!(renderer.render(&mut surface, TrackId(2), &empty, 0), RenderOutcome::NoData);
        assert_eq!(renderer.render(&mut surface, TrackId(2), &empty, 5), RenderOutcome::NoData);
        assert_eq!(surface.scene.placeholder.as_deref(), Some(NO_DATA_MESSAGE));
        assert!(surface.scene.segments.is_empty());
        assert!(surface.scene.marker.is_none());
        let placeholders = surface
            .history
            .iter()
            .filter(|c| matches!(c, DrawCommand::Placeholder { .. }))
            .count();
        assert_eq!(placeholders, 1);
    }

    #[test]
    fn test_single_sample_track() {
        let track = Track::from_samples(vec![Sample::new(1.0, 2.0, 0.0, 3.0)]);
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 0);
        assert!(surface.scene.segments.is_empty());
        assert_eq!(surface.scene.marker, Some([1.0, 2.0]));
    }

    #[test]
    fn test_uniform_speed_draws_neutral() {
        let track = Track::from_samples(
            (0..4).map(|i| Sample::new(0.0, i as f64, i as f64, 5.0)).collect(),
        );
        let mut surface = RecordingSurface::new();
        let mut renderer = IncrementalTrackRenderer::new();
        renderer.render(&mut surface, TrackId(1), &track, 3);
        for seg in surface.scene.segments.values() {
            assert_eq!(seg.color, NEUTRAL.to_css());
        }
    }
}
