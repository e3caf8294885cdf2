use crate::clock::{PlaybackClock, TickOutcome};
use crate::render::{IncrementalTrackRenderer, RenderOutcome};
use crate::scene::{DrawCommand, MapSurface};
use crate::telemetry::{self, TelemetryView};
use crate::ticker::Ticker;
use crate::types::*;
use crossbeam_channel::{never, select, Receiver, Sender};
use log::{debug, info};
use serde::Serialize;

/// Everything that can change the playback session. Commands are applied
/// one at a time, each to completion, so a tick can never land halfway
/// through a seek.
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the current track; playback resets to `Stopped(0)`.
    Load(Track),
    PlayPause,
    Play,
    Pause,
    Restart,
    Seek(usize),
    /// Skip forward by the configured step size.
    StepForward,
    Step(usize),
    ToggleBasemap,
    /// A tick from the ticker, tagged with the generation it was armed for.
    Tick(u64),
    Shutdown,
}

enum Inbox {
    Command(Option<Command>),
    Tick(Option<u64>),
}

/// Snapshot broadcast to views after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewUpdate {
    pub track: Option<TrackId>,
    pub playback: PlaybackState,
    pub basemap: Basemap,
    pub telemetry: TelemetryView,
}

/// Owns `(track, index, playing)` and nothing else of consequence: it
/// routes commands to the clock and fans the resulting cursor out to the
/// renderer and to telemetry subscribers.
pub struct Orchestrator<S: MapSurface> {
    surface: S,
    renderer: IncrementalTrackRenderer,
    clock: PlaybackClock,
    track: Option<(TrackId, Track)>,
    next_track_id: u64,
    state: PlaybackState,
    basemap: Basemap,
    basemap_sent: bool,
    step_size: usize,
    update_txs: Vec<Sender<ViewUpdate>>,
}

impl<S: MapSurface> Orchestrator<S> {
    pub fn new(surface: S, ticker: Box<dyn Ticker>) -> Self {
        Self {
            surface,
            renderer: IncrementalTrackRenderer::new(),
            clock: PlaybackClock::new(ticker),
            track: None,
            next_track_id: 1,
            state: PlaybackState::default(),
            basemap: Basemap::default(),
            basemap_sent: false,
            step_size: DEFAULT_STEP,
            update_txs: Vec::new(),
        }
    }

    pub fn with_step_size(mut self, step: usize) -> Self {
        self.step_size = step;
        self
    }

    pub fn with_seek_policy(mut self, policy: SeekPolicy) -> Self {
        self.clock = self.clock.with_seek_policy(policy);
        self
    }

    pub fn with_basemap(mut self, basemap: Basemap) -> Self {
        self.basemap = basemap;
        self
    }

    pub fn with_subscriber(mut self, tx: Sender<ViewUpdate>) -> Self {
        self.update_txs.push(tx);
        self
    }

    pub fn subscribe(&mut self, tx: Sender<ViewUpdate>) {
        self.update_txs.push(tx);
    }

    /// Process commands and ticks until `Shutdown` or until every command
    /// sender is gone. Ticks arrive on their own channel so a wall-clock
    /// ticker can coalesce them (see [`ThreadTicker::coalescing`]); pass
    /// [`crossbeam_channel::never`] when ticks come in as [`Command::Tick`].
    ///
    /// [`ThreadTicker::coalescing`]: crate::ticker::ThreadTicker::coalescing
    pub fn run(&mut self, rx: Receiver<Command>, ticks: Receiver<u64>) {
        info!("Orchestrator running");
        let mut ticks = ticks;
        let mut handled: u64 = 0;
        loop {
            let next = select! {
                recv(rx) -> msg => Inbox::Command(msg.ok()),
                recv(ticks) -> msg => Inbox::Tick(msg.ok()),
            };
            let cmd = match next {
                Inbox::Command(Some(cmd)) => cmd,
                Inbox::Command(None) => break,
                Inbox::Tick(Some(generation)) => Command::Tick(generation),
                Inbox::Tick(None) => {
                    ticks = never();
                    continue;
                }
            };
            handled += 1;
            if !self.handle(cmd) {
                break;
            }
        }
        self.clock.shutdown();
        info!("Orchestrator shutting down after {} commands", handled);
    }

    /// Apply one command. Returns `false` once the session should end.
    pub fn handle(&mut self, cmd: Command) -> bool {
        let len = self.track_len();
        let before = self.state;
        match cmd {
            Command::Load(track) => {
                self.load(track);
                return true;
            }
            Command::PlayPause => {
                self.clock.toggle(&mut self.state, len);
            }
            Command::Play => {
                self.clock.play(&mut self.state, len);
            }
            Command::Pause => {
                self.clock.pause(&mut self.state);
            }
            Command::Restart => {
                self.clock.restart(&mut self.state);
            }
            Command::Seek(target) => {
                self.clock.seek(&mut self.state, len, target);
            }
            Command::StepForward => {
                self.clock.step(&mut self.state, len, self.step_size);
            }
            Command::Step(k) => {
                self.clock.step(&mut self.state, len, k);
            }
            Command::ToggleBasemap => {
                self.basemap = self.basemap.toggled();
                self.surface.apply(DrawCommand::basemap(self.basemap));
                self.basemap_sent = true;
                info!("Basemap: {:?}", self.basemap);
                self.publish();
                return true;
            }
            Command::Tick(generation) => {
                if self.clock.tick(&mut self.state, len, generation) == TickOutcome::Stale {
                    return true;
                }
            }
            Command::Shutdown => {
                self.clock.shutdown();
                return false;
            }
        }
        if self.state != before {
            debug!("{} → {}", before, self.state);
            self.refresh();
        }
        true
    }

    fn load(&mut self, track: Track) {
        // Cancel any pending tick before the state it would advance is reset.
        self.clock.reset(&mut self.state);
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        info!("Loaded {}: {}", id, track);
        self.track = Some((id, track));
        self.refresh();
    }

    fn track_len(&self) -> usize {
        self.track.as_ref().map_or(0, |(_, t)| t.len())
    }

    /// Push the current `(track, index)` to the renderer and every view.
    fn refresh(&mut self) {
        if !self.basemap_sent {
            self.surface.apply(DrawCommand::basemap(self.basemap));
            self.basemap_sent = true;
        }
        if let Some((id, track)) = &self.track {
            if self.renderer.render(&mut self.surface, *id, track, self.state.index)
                == RenderOutcome::NoData
            {
                debug!("{} has no samples to draw", id);
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        let update = self.view_update();
        self.update_txs.retain(|tx| tx.send(update.clone()).is_ok());
    }

    pub fn view_update(&self) -> ViewUpdate {
        ViewUpdate {
            track: self.track_id(),
            playback: self.state,
            basemap: self.basemap,
            telemetry: self.telemetry(),
        }
    }

    pub fn telemetry(&self) -> TelemetryView {
        match &self.track {
            Some((_, track)) => telemetry::project(track, self.state.index),
            None => TelemetryView::NoData,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.track.as_ref().map(|(id, _)| *id)
    }

    pub fn basemap(&self) -> Basemap {
        self.basemap
    }

    pub fn renderer(&self) -> &IncrementalTrackRenderer {
        &self.renderer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
