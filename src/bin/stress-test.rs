// Load generator: N bot controllers streaming synthetic input
//
// Usage: stress-test --bots 20 --url ws://localhost:3000/ws/controller --fire

use clap::Parser;
use padrelay::client::{ConnectionStatus, ControllerClient, ControllerOptions};
use padrelay::logging;
use padrelay::network::InputFrame;
use padrelay::pad::virtual_pad::{AXIS_LX, AXIS_LY, AXIS_RX, AXIS_RY, BUTTON_RT};
use rand::Rng;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stress-test", version, about = "Simulated phone controllers for load testing")]
struct Cli {
    /// Controller endpoint
    #[arg(long, default_value = "ws://localhost:3000/ws/controller")]
    url: String,

    /// Number of bots
    #[arg(short, long, default_value_t = 10)]
    bots: usize,

    /// Frames per second each bot sends
    #[arg(long, default_value_t = 60)]
    rate: u32,

    /// Randomly hold the fire button (~10% of frames)
    #[arg(long)]
    fire: bool,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(long)]
    duration: Option<u64>,
}

/// One bot's motion: each stick axis follows its own sine wave
struct Motion {
    freq_hz: [f64; 4],
    phase: [f64; 4],
}

impl Motion {
    fn random(rng: &mut impl Rng) -> Self {
        Self {
            freq_hz: std::array::from_fn(|_| rng.gen_range(0.3..1.5)),
            phase: std::array::from_fn(|_| rng.gen_range(0.0..TAU)),
        }
    }

    fn frame(&self, t: f64, fire: bool) -> InputFrame {
        let mut frame = InputFrame::neutral();
        for axis in [AXIS_LX, AXIS_LY, AXIS_RX, AXIS_RY] {
            let value = (TAU * self.freq_hz[axis] * t + self.phase[axis]).sin();
            // Three decimals is what a phone realistically sends
            frame.axes[axis] = (value * 1000.0).round() / 1000.0;
        }
        frame.buttons[BUTTON_RT] = fire;
        frame
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_stderr("info");

    info!("🤖 Starting {} bots against {}", cli.bots, cli.url);

    let options = ControllerOptions {
        reconnect_delay: None,
        send_rate_hz: cli.rate,
    };

    let mut rng = rand::thread_rng();
    let mut bots: Vec<(ControllerClient, Motion)> = (0..cli.bots)
        .map(|_| {
            (
                ControllerClient::connect(cli.url.clone(), options.clone()),
                Motion::random(&mut rng),
            )
        })
        .collect();

    let started = Instant::now();
    let deadline = cli.duration.map(|secs| started + Duration::from_secs(secs));

    let mut update = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(cli.rate.max(1))));
    update.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = tokio::time::interval(Duration::from_secs(1));
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_total = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = update.tick() => {
                let t = started.elapsed().as_secs_f64();
                for (bot, motion) in bots.iter_mut() {
                    let fire = cli.fire && rng.gen_bool(0.1);
                    bot.set_frame(motion.frame(t, fire));
                    // Keep the event queue from growing without bound
                    while bot.try_recv_event().is_some() {}
                }
            }
            _ = report.tick() => {
                let connected = bots
                    .iter()
                    .filter(|(bot, _)| {
                        bot.state().is_some_and(|s| s.status == ConnectionStatus::Connected)
                    })
                    .count();
                let total: u64 = bots.iter().map(|(bot, _)| bot.frames_sent()).sum();
                println!(
                    "connected {:>4}/{:<4} frames {:>10}  rate {:>7}/s  uptime {:>5}s",
                    connected,
                    bots.len(),
                    total,
                    total - last_total,
                    started.elapsed().as_secs()
                );
                last_total = total;

                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    for (bot, _) in &bots {
        bot.close();
    }
    // Let the close frames go out before the runtime shuts down
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("Stopped after {}s", started.elapsed().as_secs());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_stays_in_range_and_rounds() {
        let motion = Motion::random(&mut rand::thread_rng());
        for step in 0..200 {
            let frame = motion.frame(step as f64 * 0.05, false);
            for value in frame.axes {
                assert!((-1.0..=1.0).contains(&value));
                let scaled = value * 1000.0;
                assert!((scaled - scaled.round()).abs() < 1e-3);
            }
            assert!(!frame.buttons[BUTTON_RT]);
        }
    }

    #[test]
    fn test_fire_sets_trigger() {
        let motion = Motion::random(&mut rand::thread_rng());
        assert!(motion.frame(0.0, true).buttons[BUTTON_RT]);
    }
}
