//! Headless arcade demo driving the lifecycle and collision core
//!
//! Runs a fixed-timestep session with no renderer attached: asteroids
//! drift in from the edges, an auto-turret at the origin fires at a fixed
//! cadence, and the final state snapshot is logged at the end.

use log::{info, warn};
use rand::Rng;

use sim_engine::config::Config;
use sim_engine::prelude::*;

// Demo tuning
const TICK_SECONDS: f32 = 1.0 / 60.0;
const TOTAL_TICKS: u32 = 600; // ten simulated seconds
const ASTEROID_WAVE_SIZE: usize = 6;
const ASTEROID_WAVE_INTERVAL: u32 = 120; // every two seconds
const FIRE_INTERVAL: u32 = 12; // five shots per second
const ASTEROID_MIN_SPEED: f32 = 30.0;
const ASTEROID_MAX_SPEED: f32 = 90.0;
const ASTEROID_RADII: [f32; 3] = [10.0, 20.0, 40.0];
const ASTEROID_SCORES: [u32; 3] = [100, 50, 20];
const SPAWN_RING_RADIUS: f32 = 600.0;

const CONFIG_PATH: &str = "meteor_app.toml";

fn load_config() -> SimConfig {
    if std::path::Path::new(CONFIG_PATH).exists() {
        match SimConfig::load_from_file(CONFIG_PATH) {
            Ok(config) => {
                info!("loaded configuration from {CONFIG_PATH}");
                return config;
            }
            Err(err) => warn!("failed to load {CONFIG_PATH}: {err}; using defaults"),
        }
    }
    SimConfig::default()
}

/// Spawn a wave of asteroids on a ring around the playfield, each drifting
/// roughly toward the origin.
fn spawn_wave(session: &GameSession, rng: &mut impl Rng) {
    for _ in 0..ASTEROID_WAVE_SIZE {
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let position = Vec3::new(
            SPAWN_RING_RADIUS * angle.cos(),
            SPAWN_RING_RADIUS * angle.sin(),
            0.0,
        );
        let speed = rng.gen_range(ASTEROID_MIN_SPEED..ASTEROID_MAX_SPEED);
        let size = rng.gen_range(0..ASTEROID_RADII.len());
        // Aim at the origin with a little scatter.
        let scatter = Vec3::new(rng.gen_range(-0.2..0.2), rng.gen_range(-0.2..0.2), 0.0);
        let velocity = (-position.normalize() + scatter) * speed;

        if let Err(err) =
            session.spawn_asteroid(position, velocity, ASTEROID_RADII[size], ASTEROID_SCORES[size])
        {
            warn!("asteroid wave truncated: {err}");
            break;
        }
    }
}

/// Fire one bullet from the origin in a random direction.
fn fire(session: &GameSession, rng: &mut impl Rng) {
    let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
    if let Err(err) = session.fire_bullet(Vec3::zeros(), direction) {
        // Hitting the bullet cap under rapid fire is expected, not fatal.
        log::debug!("shot suppressed: {err}");
    }
}

fn main() {
    sim_engine::foundation::logging::init();

    let config = load_config();
    let mut session = GameSession::new(config);
    let mut rng = rand::thread_rng();

    // Count collisions for the end-of-run report.
    let collisions = std::rc::Rc::new(std::cell::Cell::new(0u32));
    {
        let collisions = std::rc::Rc::clone(&collisions);
        session.bus().subscribe(EventKind::Collision, move |_| {
            collisions.set(collisions.get() + 1);
            Ok(())
        });
    }

    session.start();
    info!(
        "running {TOTAL_TICKS} ticks at {:.1} Hz",
        1.0 / TICK_SECONDS
    );

    for tick in 0..TOTAL_TICKS {
        if tick % ASTEROID_WAVE_INTERVAL == 0 {
            spawn_wave(&session, &mut rng);
        }
        if tick % FIRE_INTERVAL == 0 {
            fire(&session, &mut rng);
        }
        session.tick(TICK_SECONDS);

        if session.state().phase == GamePhase::GameOver {
            info!("game over at tick {tick}");
            break;
        }
    }

    let state = session.state();
    info!(
        "final state: phase {:?}, score {}, health {}, lives {}",
        state.phase, state.score, state.player.health, state.player.lives
    );
    info!(
        "entities live at shutdown: {} asteroids, {} bullets; {} collisions seen",
        session.active_count(Category::Asteroid),
        session.active_count(Category::Bullet),
        collisions.get()
    );

    session.teardown();
}
