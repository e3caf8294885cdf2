pub mod clock;
pub mod color;
pub mod console_display;
pub mod controls;
pub mod orchestrator;
pub mod render;
pub mod scene;
pub mod simulator;
pub mod telemetry;
pub mod ticker;
pub mod track_reader;
pub mod types;
pub mod ws_server;
