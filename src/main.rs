use track_replay::console_display;
use track_replay::controls;
use track_replay::orchestrator::{Command, Orchestrator, ViewUpdate};
use track_replay::scene::{ChannelSurface, DrawCommand, MapSurface, NullSurface};
use track_replay::simulator::{Demo, Simulator};
use track_replay::ticker::ThreadTicker;
use track_replay::track_reader;
use track_replay::types::*;
use track_replay::ws_server;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info};
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "track-replay")]
#[command(about = "Replay a GPS track on a speed-colored map")]
struct Cli {
    /// Processed track document (JSON from the upload service)
    #[arg(long)]
    track: Option<PathBuf>,

    /// Built-in track to play when no --track is given: "oval", "sprint", or "empty"
    #[arg(long, default_value = "oval")]
    demo: String,

    /// Samples skipped by the step-forward control
    #[arg(long, default_value_t = DEFAULT_STEP)]
    step: usize,

    /// Stop playback whenever the cursor is moved with a seek
    #[arg(long)]
    pause_on_seek: bool,

    /// Start on satellite imagery instead of the street map
    #[arg(long)]
    satellite: bool,

    /// Start playing as soon as the track is loaded
    #[arg(long)]
    autoplay: bool,

    /// Show the telemetry panel in the terminal
    #[arg(long)]
    console: bool,

    /// Serve the browser map viewer
    #[arg(long)]
    ws: bool,

    /// Viewer server bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    ws_addr: String,

    /// Viewer page served at /
    #[arg(long, default_value = "viewer.html")]
    viewer: PathBuf,

    /// Do not read controls from stdin (run until interrupted)
    #[arg(long)]
    no_stdin: bool,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();

    let track = match &cli.track {
        Some(path) => match track_reader::load_track(path) {
            Ok(track) => track,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => match cli.demo.parse::<Demo>() {
            Ok(demo) => Simulator::default().generate(demo),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
    };

    info!("═══════════════════════════════════════════════");
    info!("  TRACK REPLAY v{}", env!("CARGO_PKG_VERSION"));
    info!("  Track: {}", track);
    info!("  Tick: {} ms, step: {} samples", TICK_PERIOD_MS, cli.step);
    if cli.ws { info!("  UI: browser viewer on http://{}", cli.ws_addr); }
    if cli.console { info!("  UI: console panel"); }
    info!("═══════════════════════════════════════════════");

    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    let mut handles = Vec::new();

    // One pending tick at most: a stalled orchestrator skips ticks instead
    // of replaying a backlog.
    let (tick_tx, tick_rx) = bounded::<u64>(1);
    let ticker = ThreadTicker::coalescing(Duration::from_millis(TICK_PERIOD_MS), tick_tx);

    let mut view_txs: Vec<crossbeam_channel::Sender<ViewUpdate>> = Vec::new();

    // ─── Console panel ──────────────────────────────────────────────
    if cli.console {
        let (tx, rx) = bounded::<ViewUpdate>(256);
        view_txs.push(tx);
        handles.push(thread::Builder::new().name("display".into()).spawn(move || {
            console_display::ConsoleDisplay::new(rx).run();
        }).unwrap());
    }

    // ─── Viewer server ──────────────────────────────────────────────
    let surface: Box<dyn MapSurface + Send> = if cli.ws {
        let (draw_tx, draw_rx) = unbounded::<DrawCommand>();
        let (tx, rx) = unbounded::<ViewUpdate>();
        view_txs.push(tx);
        let addr = cli.ws_addr.clone();
        let viewer = cli.viewer.clone();
        handles.push(thread::Builder::new().name("ws-server".into()).spawn(move || {
            ws_server::WsServer::new(draw_rx, rx, addr, viewer).run();
        }).unwrap());
        Box::new(ChannelSurface::new(draw_tx))
    } else {
        Box::new(NullSurface)
    };

    // ─── Orchestrator ───────────────────────────────────────────────
    let seek_policy = if cli.pause_on_seek { SeekPolicy::Pause } else { SeekPolicy::Preserve };
    let basemap = if cli.satellite { Basemap::Satellite } else { Basemap::Street };
    let step = cli.step;
    let orchestrator = thread::Builder::new().name("orchestrator".into()).spawn(move || {
        let mut orch = Orchestrator::new(surface, Box::new(ticker))
            .with_step_size(step)
            .with_seek_policy(seek_policy)
            .with_basemap(basemap);
        for tx in view_txs {
            orch.subscribe(tx);
        }
        orch.run(cmd_rx, tick_rx);
    }).unwrap();

    let _ = cmd_tx.send(Command::Load(track));
    if cli.autoplay {
        let _ = cmd_tx.send(Command::Play);
    }

    if cli.no_stdin {
        info!("Running without controls. Press Ctrl+C to stop.");
    } else {
        controls::run_controls(io::stdin().lock(), cmd_tx.clone());
        let _ = cmd_tx.send(Command::Shutdown);
    }

    let _ = orchestrator.join();
    // Views exit once the orchestrator drops their channels.
    for h in handles {
        let _ = h.join();
    }
    info!("Session ended");
}
