//! Interactive control point.
//!
//! ```text
//! MEDIACP_LOG_MODE=development cargo run -p mediacp --example control_point [config.json]
//! ```
//!
//! Commands: `list`, `renderer <udn>`, `server <udn>`, `browse <id> [start]`,
//! `play <id>`, `toggle`, `stop`, `mute`, `up`, `down`, `fwd`, `back`,
//! `seek <seconds>`, `time`, `rescan`, `quit`.

use std::io::{self, BufRead, Write};

use mediacp::logging::init_logging_from_env;
use mediacp::{Action, ControlConfig, DeviceProxy, MediaControl, MediaHook};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let config = match std::env::args().nth(1) {
        Some(path) => ControlConfig::from_file(path)?,
        None => ControlConfig::default(),
    };

    let control = MediaControl::with_upnp(config)?;
    control.subscribe_hook(
        "console",
        MediaHook::new()
            .on_renderer_found(|r| println!("+ renderer {} [{}]", r.name(), r.udn()))
            .on_renderer_lost(|r| println!("- renderer {}", r.name()))
            .on_server_found(|s| println!("+ server {} [{}]", s.name(), s.udn()))
            .on_server_lost(|s| println!("- server {}", s.name()))
            .on_renderer_selected(|r| match r {
                Some(r) => println!("* renderer {}", r.name()),
                None => println!("* no renderer"),
            })
            .on_server_selected(|s| match s {
                Some(s) => println!("* server {}", s.name()),
                None => println!("* no server"),
            })
            .on_transport_state(|_, state| println!("  state {}", state))
            .on_current_track_meta_data(|_, item| {
                println!("  now playing {} - {}", item.object.artist, item.object.title)
            })
            .on_volume(|_, volume| println!("  volume {}", volume))
            .on_mute(|_, mute| println!("  mute {}", mute)),
    );
    control.start()?;

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("quit"), _, _) => break,
            (Some("list"), _, _) => {
                for r in control.renderers() {
                    println!("renderer {} [{}]", r.name(), r.udn());
                }
                for s in control.servers() {
                    println!("server   {} [{}]", s.name(), s.udn());
                }
            }
            (Some("renderer"), Some(udn), _) => control.set_renderer(udn),
            (Some("server"), Some(udn), _) => control.set_server(udn),
            (Some("browse"), id, start) => {
                let start = start.and_then(|s| s.parse().ok()).unwrap_or(0);
                match control.browse(id.unwrap_or("0"), start) {
                    Ok(page) => {
                        for c in &page.containers {
                            println!("[{}] {}/", c.object.id, c.object.title);
                        }
                        for i in &page.items {
                            println!("[{}] {}", i.object.id, i.object.title);
                        }
                        println!("{} of {}", page.number_returned, page.total_matches);
                    }
                    Err(e) => println!("browse failed: {}", e),
                }
            }
            (Some("play"), Some(id), _) => {
                if let Err(e) = control.browse_metadata(id) {
                    println!("play failed: {}", e);
                }
            }
            (Some("seek"), Some(seconds), _) => match seconds.parse() {
                Ok(seconds) => {
                    if let Err(e) = control.seek(seconds) {
                        println!("seek failed: {}", e);
                    }
                }
                Err(_) => println!("seek takes seconds"),
            },
            (Some("time"), _, _) => match control.current_time() {
                Some(seconds) => println!("{}", upnp_api::time_to_string(seconds)),
                None => println!("no renderer"),
            },
            (Some("toggle"), _, _) => control.action(Action::PlayPause),
            (Some("stop"), _, _) => control.action(Action::Stop),
            (Some("mute"), _, _) => control.action(Action::ToggleMute),
            (Some("up"), _, _) => control.action(Action::VolumeUp),
            (Some("down"), _, _) => control.action(Action::VolumeDown),
            (Some("fwd"), _, _) => control.action(Action::SeekForward),
            (Some("back"), _, _) => control.action(Action::SeekBackward),
            (Some("rescan"), _, _) => control.rescan(),
            (None, _, _) => {}
            (Some(other), _, _) => println!("unknown command {}", other),
        }
        prompt()?;
    }

    control.shutdown();
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
