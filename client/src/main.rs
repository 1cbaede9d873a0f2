use clap::Parser;
use client::agent::SyncAgent;
use client::game::Intent;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Vec2, CLIENT_TICK_MS};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Display name announced to the server
    #[arg(short, long)]
    name: Option<String>,

    /// Wander around and shoot instead of standing still
    #[arg(short, long)]
    bot: bool,
}

/// Picks a new heading every second and fires twice a second.
struct Wanderer {
    rng: StdRng,
    heading: Vec2,
    turn_timer: f32,
    shot_timer: f32,
}

impl Wanderer {
    fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            heading: Vec2::ZERO,
            turn_timer: 0.0,
            shot_timer: 0.0,
        }
    }

    fn next(&mut self, dt: f32) -> Intent {
        self.turn_timer -= dt;
        if self.turn_timer <= 0.0 {
            self.turn_timer = 1.0;
            self.heading = Vec2::new(self.rng.gen_range(-1.0..=1.0), self.rng.gen_range(-1.0..=1.0));
        }

        self.shot_timer -= dt;
        let shoot = self.shot_timer <= 0.0;
        if shoot {
            self.shot_timer = 0.5;
        }

        Intent::new(self.heading, shoot)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    let mut agent = SyncAgent::with_display_name(args.name.clone());
    match agent.join_as_client(&args.host, args.port).await {
        Ok(session_id) => info!("Playing online as session {}", session_id),
        Err(_) => warn!("Server unavailable, playing offline"),
    }

    let mut wanderer = args.bot.then(Wanderer::new);
    let mut ticker = interval(Duration::from_millis(CLIENT_TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_step = Instant::now();
    let mut since_report = 0.0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = (now - last_step).as_secs_f32().min(0.1);
                last_step = now;

                let intent = wanderer
                    .as_mut()
                    .map(|w| w.next(dt))
                    .unwrap_or_default();
                agent.step(dt, intent);

                if !agent.player().alive && wanderer.is_some() {
                    agent.respawn();
                }

                since_report += dt;
                if since_report >= 1.0 {
                    since_report = 0.0;
                    let frame = agent.snapshot();
                    info!(
                        "{} | hp {} at ({:.0}, {:.0}) | {} enemies, {} ghosts, {} bullets",
                        if frame.connected { "online" } else { "offline" },
                        frame.local_player.health,
                        frame.local_player.position.x,
                        frame.local_player.position.y,
                        frame.enemies.len(),
                        frame.ghosts.len(),
                        frame.bullets.len(),
                    );
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}
