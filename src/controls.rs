//! Text controls: one command per line, from a terminal or a pipe.
//!
//! ```text
//! p | space      play / pause
//! play, pause
//! r              restart
//! s <n>          seek to sample n
//! n [k]          step forward (k samples, default the configured step)
//! m              toggle street / satellite basemap
//! l <file>       load a track document
//! q              quit
//! ```

use crate::orchestrator::Command;
use crate::track_reader::load_track;
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Control {
    Command(Command),
    Load(PathBuf),
    Quit,
    Help,
}

pub const HELP: &str = "p=play/pause  r=restart  s <n>=seek  n [k]=step  m=basemap  l <file>=load  q=quit";

pub fn parse_control(line: &str) -> Result<Control, String> {
    // A bare space is the play/pause key.
    if line == " " {
        return Ok(Control::Command(Command::PlayPause));
    }
    let mut parts = line.split_whitespace();
    let verb = match parts.next() {
        Some(v) => v,
        None => return Err("empty command".into()),
    };
    let arg = parts.next();

    let parse_index = |what: &str| -> Result<usize, String> {
        arg.ok_or_else(|| format!("{} needs a sample number", what))?
            .parse::<usize>()
            .map_err(|e| format!("{}: {}", what, e))
    };

    match verb {
        "p" => Ok(Control::Command(Command::PlayPause)),
        "play" => Ok(Control::Command(Command::Play)),
        "pause" => Ok(Control::Command(Command::Pause)),
        "r" | "restart" => Ok(Control::Command(Command::Restart)),
        "s" | "seek" => Ok(Control::Command(Command::Seek(parse_index("seek")?))),
        "n" | "step" => match arg {
            Some(_) => Ok(Control::Command(Command::Step(parse_index("step")?))),
            None => Ok(Control::Command(Command::StepForward)),
        },
        "m" | "map" => Ok(Control::Command(Command::ToggleBasemap)),
        "l" | "load" => arg
            .map(|p| Control::Load(PathBuf::from(p)))
            .ok_or_else(|| "load needs a file path".to_string()),
        "q" | "quit" => Ok(Control::Quit),
        "h" | "help" | "?" => Ok(Control::Help),
        other => Err(format!("unknown command \"{}\"", other)),
    }
}

/// Read controls line by line and forward them. Returns at EOF, on `q`, or
/// once the orchestrator has gone away.
pub fn run_controls<R: BufRead>(input: R, tx: Sender<Command>) {
    info!("Controls: {}", HELP);
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Reading controls: {}", e);
                break;
            }
        };
        if line.trim().is_empty() && line != " " {
            continue;
        }
        let cmd = match parse_control(&line) {
            Ok(Control::Command(cmd)) => cmd,
            Ok(Control::Load(path)) => match load_track(&path) {
                Ok(track) => Command::Load(track),
                Err(e) => {
                    error!("{}: {}", path.display(), e);
                    continue;
                }
            },
            Ok(Control::Quit) => Command::Shutdown,
            Ok(Control::Help) => {
                info!("{}", HELP);
                continue;
            }
            Err(e) => {
                warn!("{} ({})", e, HELP);
                continue;
            }
        };
        let quit = matches!(cmd, Command::Shutdown);
        if tx.send(cmd).is_err() || quit {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_control("p"), Ok(Control::Command(Command::PlayPause))));
        assert!(matches!(parse_control(" "), Ok(Control::Command(Command::PlayPause))));
        assert!(matches!(parse_control("s 42"), Ok(Control::Command(Command::Seek(42)))));
        assert!(matches!(parse_control("n"), Ok(Control::Command(Command::StepForward))));
        assert!(matches!(parse_control("n 3"), Ok(Control::Command(Command::Step(3)))));
        assert!(matches!(parse_control("m"), Ok(Control::Command(Command::ToggleBasemap))));
        assert!(matches!(parse_control("r"), Ok(Control::Command(Command::Restart))));
        assert!(matches!(parse_control("q"), Ok(Control::Quit)));
        assert!(matches!(parse_control("l track.json"), Ok(Control::Load(p)) if p == PathBuf::from("track.json")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_control("s").is_err());
        assert!(parse_control("s -4").is_err());
        assert!(parse_control("warp 9").is_err());
        assert!(parse_control("l").is_err());
    }

    #[test]
    fn test_run_controls_forwards_until_quit() {
        let (tx, rx) = unbounded();
        let input = "p\n\nbogus\ns 7\nl /nonexistent/track.json\nq\nr\n";
        run_controls(Cursor::new(input), tx);
        let cmds: Vec<Command> = rx.try_iter().collect();
        assert_eq!(cmds.len(), 3);
        assert!(matches!(cmds[0], Command::PlayPause));
        assert!(matches!(cmds[1], Command::Seek(7)));
        assert!(matches!(cmds[2], Command::Shutdown));
    }
}
