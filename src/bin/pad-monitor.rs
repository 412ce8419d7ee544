// Terminal pad monitor
// Acts as the game display: shows every pad the relay reports (plus a
// keyboard pad), and can cycle the announced scene.
//
// Usage:
//   pad-monitor --url ws://192.168.1.20:3000/ws/game
//   pad-monitor --embedded            # run the relay in-process

use clap::Parser;
use crossterm::{
    event::KeyCode,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use padrelay::client::{scene, DisplayClient, DisplayEvent};
use padrelay::config::{self, Config};
use padrelay::network::{self, interfaces, DisplayInbound};
use padrelay::pad::{read_key_presses, KeyboardPad, LocalPadSource, PadManager};
use padrelay::relay::{self, HostLink};
use padrelay::ui::{self, MonitorView, OverlayMessage, OverlayStyle};
use padrelay::{logging, network::InputFrame};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_millis(1000 / TARGET_FPS);
const TOAST_DURATION: Duration = Duration::from_millis(1500);
const RECENT_EVENTS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "pad-monitor", version, about = "Terminal display for a padrelay server")]
struct Cli {
    /// Display endpoint of a running relay
    #[arg(long, conflicts_with = "embedded")]
    url: Option<String>,

    /// Start the relay inside this process and attach as its host
    #[arg(long)]
    embedded: bool,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Where relay messages come from
enum Feed {
    Remote(DisplayClient),
    Embedded(HostLink),
}

impl Feed {
    fn announce_scene(&self, scene: &str) {
        let result = match self {
            Feed::Remote(client) => client.broadcast_scene(scene).map_err(|e| e.to_string()),
            Feed::Embedded(host) => host
                .send(DisplayInbound::Scene {
                    scene: scene.to_string(),
                })
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            warn!("Scene announce failed: {}", e);
        }
    }

    fn link_status(&self) -> (&'static str, bool) {
        match self {
            Feed::Remote(client) if client.is_connected() => ("connected", true),
            Feed::Remote(_) => ("reconnecting...", false),
            Feed::Embedded(_) => ("embedded", true),
        }
    }
}

/// Keyboard pad shared between the key reader and the pad manager
struct SharedKeyboard(Arc<Mutex<KeyboardPad>>);

impl LocalPadSource for SharedKeyboard {
    fn slot(&self) -> usize {
        0
    }

    fn poll(&mut self, now: Instant) -> Option<InputFrame> {
        self.0.lock().ok().and_then(|mut pad| pad.poll(now))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    // stderr belongs to the TUI from here on
    logging::init_file(Path::new(logging::MONITOR_LOG_PATH), &config.server.log_level)?;
    info!("pad-monitor starting");

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let (feed, join_url) = if cli.embedded {
        let listener = runtime.block_on(network::bind(&config.server))?;
        let port = listener.local_addr()?.port();
        let (relay, _relay_task) = relay::spawn_relay(&config);
        let host = relay.attach_host()?;

        let server_config = config.server.clone();
        let server_relay = relay.clone();
        runtime.spawn(async move {
            let shutdown = std::future::pending::<()>();
            if let Err(e) = network::serve(listener, server_relay, &server_config, shutdown).await {
                warn!("Embedded server stopped: {}", e);
            }
        });

        let url = format!("http://{}:{}/controller/", interfaces::server_ip(), port);
        (Feed::Embedded(host), url)
    } else {
        let url = cli.url.unwrap_or_else(|| {
            format!(
                "ws://127.0.0.1:{}{}",
                config.server.port,
                network::protocol::WS_GAME_PATH
            )
        });
        let join = join_url_for(&url);
        let reconnect = Duration::from_millis(config.client.display_reconnect_ms);
        (Feed::Remote(DisplayClient::connect(url, reconnect)), join)
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_monitor(&mut terminal, feed, &config, &join_url);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// ws://host:port/ws/game -> http://host:port/controller/
fn join_url_for(ws_url: &str) -> String {
    let rest = ws_url
        .strip_prefix("ws://")
        .map(|rest| ("http", rest))
        .or_else(|| ws_url.strip_prefix("wss://").map(|rest| ("https", rest)));
    match rest {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{}://{}/controller/", scheme, host)
        }
        None => ws_url.to_string(),
    }
}

fn run_monitor<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut feed: Feed,
    config: &Config,
    join_url: &str,
) -> anyhow::Result<()> {
    let mut pads = PadManager::new(config.pads.clone());
    let keyboard = Arc::new(Mutex::new(KeyboardPad::new(
        0,
        Duration::from_millis(config.pads.keyboard_hold_ms),
    )));
    pads.add_local_source(Box::new(SharedKeyboard(keyboard.clone())));

    let recent: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
    let offset = config.pads.relay_slot_offset;
    {
        let recent = recent.clone();
        pads.on_connect(move |pad| {
            let (name, _) = ui::render::pad_identity(pad, offset);
            push_recent(&recent, format!("+ {} connected", name));
        });
    }
    {
        let recent = recent.clone();
        pads.on_disconnect(move |pad| {
            let (name, _) = ui::render::pad_identity(pad, offset);
            push_recent(&recent, format!("- {} disconnected", name));
        });
    }

    let mut scene: Option<String> = None;
    let mut toast: Option<OverlayMessage> = None;
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| warn!("Clipboard unavailable: {}", e))
        .ok();

    loop {
        let frame_start = Instant::now();

        for key in read_key_presses()? {
            match key {
                KeyCode::Char('q') | KeyCode::Esc => {
                    if let Feed::Remote(client) = &feed {
                        client.disconnect();
                    }
                    return Ok(());
                }
                KeyCode::Char('n') => {
                    let next = scene::next_scene(scene.as_deref());
                    feed.announce_scene(next);
                    scene = Some(next.to_string());
                    toast = Some(
                        OverlayMessage::new(vec![next.to_string()], OverlayStyle::Info, TOAST_DURATION)
                            .with_title("Scene"),
                    );
                }
                KeyCode::Char('c') => {
                    let copied = match clipboard.as_mut() {
                        Some(clipboard) => clipboard
                            .set_text(join_url.to_string())
                            .map_err(|e| e.to_string()),
                        None => Err("clipboard unavailable".to_string()),
                    };
                    toast = Some(match copied {
                        Ok(()) => OverlayMessage::success(
                            vec!["Join URL copied".to_string()],
                            TOAST_DURATION,
                        ),
                        Err(e) => OverlayMessage::error(vec![e], TOAST_DURATION),
                    });
                }
                other => {
                    if let Ok(mut pad) = keyboard.lock() {
                        pad.press(other, frame_start);
                    }
                }
            }
        }

        drain_feed(&mut feed, &mut pads, &recent);
        pads.poll_local(frame_start);

        if toast.as_ref().is_some_and(|t| t.is_expired(frame_start)) {
            toast = None;
        }

        let connected = pads.get_all_connected_pads();
        let recent_lines: Vec<String> = recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        let (link, linked) = feed.link_status();

        terminal.draw(|f| {
            ui::render(
                f,
                &MonitorView {
                    scene: scene.as_deref(),
                    link,
                    linked,
                    join_url,
                    pads: &connected,
                    relay_slot_offset: offset,
                    recent: &recent_lines,
                    toast: toast.as_ref(),
                },
            )
        })?;

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }
}

fn drain_feed(feed: &mut Feed, pads: &mut PadManager, recent: &Mutex<VecDeque<String>>) {
    match feed {
        Feed::Remote(client) => {
            while let Some(event) = client.try_recv_event() {
                match event {
                    DisplayEvent::Message(msg) => pads.handle_message(&msg),
                    DisplayEvent::Connected => push_recent(recent, "relay link up".to_string()),
                    DisplayEvent::Disconnected => {
                        // Phones will be re-announced after the reconnect
                        pads.clear_relay();
                        push_recent(recent, "relay link lost".to_string());
                    }
                }
            }
        }
        Feed::Embedded(host) => {
            while let Some(msg) = host.try_recv() {
                pads.handle_message(&msg);
            }
        }
    }
}

fn push_recent(recent: &Mutex<VecDeque<String>>, entry: String) {
    if let Ok(mut recent) = recent.lock() {
        if recent.len() == RECENT_EVENTS {
            recent.pop_front();
        }
        recent.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_from_display_url() {
        assert_eq!(
            join_url_for("ws://192.168.1.20:3000/ws/game"),
            "http://192.168.1.20:3000/controller/"
        );
        assert_eq!(
            join_url_for("wss://pads.example.com/ws/game"),
            "https://pads.example.com/controller/"
        );
        assert_eq!(join_url_for("garbage"), "garbage");
    }
}
