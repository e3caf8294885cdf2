//! The drawing-surface boundary.
//!
//! The renderer talks to the map only through [`DrawCommand`]s. A surface
//! may draw them, forward them to a browser, or just remember them. The
//! [`Scene`] type folds a command stream into the picture it describes,
//! which is what tests assert against and what a late-joining viewer is
//! sent as its starting snapshot.

use crate::color::Legend;
use crate::types::{Basemap, LatLng};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One mutation of the map. Serialized with an `"op"` tag for the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Replace the map with a "no data" notice.
    Placeholder { message: String },
    /// Remove every segment, the marker, and the legend.
    Clear,
    /// Fit the view to `[[south, west], [north, east]]`.
    FitBounds { bounds: [LatLng; 2], padding_px: u32 },
    AddSegment {
        id: usize,
        from: LatLng,
        to: LatLng,
        color: String,
        weight: u32,
        opacity: f64,
    },
    RemoveSegment { id: usize },
    /// Place (or move) the single current-position marker.
    Marker {
        at: LatLng,
        radius: u32,
        fill: String,
        stroke: String,
        weight: u32,
    },
    Legend { legend: Legend },
    Basemap {
        basemap: Basemap,
        tile_url: String,
        attribution: String,
    },
}

impl DrawCommand {
    pub fn basemap(basemap: Basemap) -> Self {
        DrawCommand::Basemap {
            basemap,
            tile_url: basemap.tile_url().to_string(),
            attribution: basemap.attribution().to_string(),
        }
    }
}

pub trait MapSurface {
    fn apply(&mut self, cmd: DrawCommand);
}

impl<M: MapSurface + ?Sized> MapSurface for Box<M> {
    fn apply(&mut self, cmd: DrawCommand) {
        (**self).apply(cmd);
    }
}

// ─── Scene ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnSegment {
    pub from: LatLng,
    pub to: LatLng,
    pub color: String,
}

/// The picture a command stream has produced so far.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub segments: BTreeMap<usize, DrawnSegment>,
    pub marker: Option<LatLng>,
    pub viewport: Option<[LatLng; 2]>,
    pub fit_count: usize,
    pub legend: Option<Legend>,
    pub basemap: Option<Basemap>,
    pub placeholder: Option<String>,
    last_marker: Option<DrawCommand>,
    last_fit: Option<DrawCommand>,
    last_basemap: Option<DrawCommand>,
    segment_cmds: BTreeMap<usize, DrawCommand>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, cmd: &DrawCommand) {
        match cmd {
            DrawCommand::Placeholder { message } => {
                self.clear_track();
                self.placeholder = Some(message.clone());
            }
            DrawCommand::Clear => self.clear_track(),
            DrawCommand::FitBounds { bounds, .. } => {
                self.viewport = Some(*bounds);
                self.fit_count += 1;
                self.last_fit = Some(cmd.clone());
            }
            DrawCommand::AddSegment {
                id, from, to, color, ..
            } => {
                self.placeholder = None;
                self.segments.insert(
                    *id,
                    DrawnSegment {
                        from: *from,
                        to: *to,
                        color: color.clone(),
                    },
                );
                self.segment_cmds.insert(*id, cmd.clone());
            }
            DrawCommand::RemoveSegment { id } => {
                self.segments.remove(id);
                self.segment_cmds.remove(id);
            }
            DrawCommand::Marker { at, .. } => {
                self.placeholder = None;
                self.marker = Some(*at);
                self.last_marker = Some(cmd.clone());
            }
            DrawCommand::Legend { legend } => self.legend = Some(legend.clone()),
            DrawCommand::Basemap { basemap, .. } => {
                self.basemap = Some(*basemap);
                self.last_basemap = Some(cmd.clone());
            }
        }
    }

    fn clear_track(&mut self) {
        self.segments.clear();
        self.segment_cmds.clear();
        self.marker = None;
        self.last_marker = None;
        self.legend = None;
        self.placeholder = None;
    }

    /// Commands that rebuild this scene from nothing.
    pub fn snapshot(&self) -> Vec<DrawCommand> {
        let mut cmds = vec![DrawCommand::Clear];
        cmds.extend(self.last_basemap.clone());
        if let Some(message) = &self.placeholder {
            cmds.push(DrawCommand::Placeholder {
                message: message.clone(),
            });
            return cmds;
        }
        cmds.extend(self.last_fit.clone());
        if let Some(legend) = &self.legend {
            cmds.push(DrawCommand::Legend {
                legend: legend.clone(),
            });
        }
        cmds.extend(self.segment_cmds.values().cloned());
        cmds.extend(self.last_marker.clone());
        cmds
    }

    pub fn segment_ids(&self) -> Vec<usize> {
        self.segments.keys().copied().collect()
    }
}

// ─── Surfaces ───────────────────────────────────────────────────────────────

/// Keeps the resulting scene and every command it was sent.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub scene: Scene,
    pub history: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the command history, keeping the scene.
    pub fn take_history(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.history)
    }
}

impl MapSurface for RecordingSurface {
    fn apply(&mut self, cmd: DrawCommand) {
        self.scene.apply(&cmd);
        self.history.push(cmd);
    }
}

/// Forwards commands to another thread (the viewer server).
pub struct ChannelSurface {
    tx: Sender<DrawCommand>,
}

impl ChannelSurface {
    pub fn new(tx: Sender<DrawCommand>) -> Self {
        Self { tx }
    }
}

impl MapSurface for ChannelSurface {
    fn apply(&mut self, cmd: DrawCommand) {
        let _ = self.tx.send(cmd);
    }
}

/// Drops everything. For headless runs with no viewer attached.
pub struct NullSurface;

impl MapSurface for NullSurface {
    fn apply(&mut self, _cmd: DrawCommand) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: usize) -> DrawCommand {
        DrawCommand::AddSegment {
            id,
            from: [0.0, id as f64],
            to: [0.0, id as f64 + 1.0],
            color: "#667eea".into(),
            weight: 6,
            opacity: 0.8,
        }
    }

    #[test]
    fn test_scene_tracks_segments_and_marker() {
        let mut scene = Scene::new();
        scene.apply(&segment(0));
        scene.apply(&segment(1));
        scene.apply(&DrawCommand::RemoveSegment { id: 0 });
        scene.apply(&DrawCommand::Marker {
            at: [1.0, 2.0],
            radius: 8,
            fill: "white".into(),
            stroke: "black".into(),
            weight: 2,
        });
        assert_eq!(scene.segment_ids(), vec![1]);
        assert_eq!(scene.marker, Some([1.0, 2.0]));
    }

    #[test]
    fn test_placeholder_wipes_track() {
        let mut scene = Scene::new();
        scene.apply(&segment(0));
        scene.apply(&DrawCommand::Placeholder {
            message: "No track data available".into(),
        });
        assert!(scene.segments.is_empty());
        assert!(scene.marker.is_none());
        assert_eq!(scene.placeholder.as_deref(), Some("No track data available"));
    }

    #[test]
    fn test_snapshot_rebuilds_scene() {
        let mut scene = Scene::new();
        scene.apply(&DrawCommand::basemap(Basemap::Satellite));
        scene.apply(&DrawCommand::FitBounds {
            bounds: [[0.0, 0.0], [1.0, 1.0]],
            padding_px: 20,
        });
        for id in 0..4 {
            scene.apply(&segment(id));
        }
        scene.apply(&DrawCommand::RemoveSegment { id: 3 });

        let mut rebuilt = Scene::new();
        for cmd in scene.snapshot() {
            rebuilt.apply(&cmd);
        }
        assert_eq!(rebuilt.segment_ids(), vec![0, 1, 2]);
        assert_eq!(rebuilt.viewport, scene.viewport);
        assert_eq!(rebuilt.basemap, Some(Basemap::Satellite));
    }

    #[test]
    fn test_command_json_is_tagged() {
        let json = serde_json::to_value(DrawCommand::RemoveSegment { id: 5 }).unwrap();
        assert_eq!(json["op"], "remove_segment");
        assert_eq!(json["id"], 5);
    }
}
