use crate::orchestrator::ViewUpdate;
use crate::telemetry::TelemetryView;
use crate::types::Basemap;
use crossbeam_channel::Receiver;
use std::io::{self, Write};

/// Renders the playback panel and live telemetry in the terminal.
pub struct ConsoleDisplay {
    rx: Receiver<ViewUpdate>,
}

impl ConsoleDisplay {
    pub fn new(rx: Receiver<ViewUpdate>) -> Self {
        Self { rx }
    }

    pub fn run(&self) {
        let mut stdout = io::stdout();
        for update in self.rx.iter() {
            // Clear screen and move cursor home
            print!("\x1b[2J\x1b[H");
            print!("{}", render_panel(&update));
            let _ = stdout.flush();
        }
    }
}

pub fn render_panel(update: &ViewUpdate) -> String {
    let mut out = String::new();
    out.push_str("══ Track Playback ══════════════════════════════════════\n");
    match &update.telemetry {
        TelemetryView::NoData => {
            out.push_str("  Ready for GPS data\n\n");
        }
        TelemetryView::Live(t) => {
            let state = if update.playback.playing { "▶ playing" } else { "⏸ paused" };
            let map = match update.basemap {
                Basemap::Street => "street",
                Basemap::Satellite => "satellite",
            };
            out.push_str(&format!(
                "  Point {} of {}   Time: {:.1}s   {}   map: {}\n",
                t.index + 1,
                t.point_count,
                t.timestamp,
                state,
                map
            ));
            out.push_str(&format!("  {}\n\n", make_bar(t.scrub_percent / 100.0, 48)));
        }
    }
    out.push_str(&update.telemetry.to_string());
    out
}

fn make_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}
