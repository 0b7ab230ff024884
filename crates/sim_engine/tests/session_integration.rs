//! End-to-end scenarios through the public session API

use std::cell::Cell;
use std::rc::Rc;

use sim_engine::prelude::*;
use sim_engine::store::Action;

fn playing_session() -> GameSession {
    let mut session = GameSession::new(SimConfig::default());
    session.start();
    session
}

fn small_bullet_cap() -> SimConfig {
    let mut config = SimConfig::default();
    config.bullets.lifecycle.max_active = 5;
    config
}

#[test]
fn bullet_cap_rejects_sixth_shot_without_side_effects() {
    let mut session = GameSession::new(small_bullet_cap());
    session.start();

    let spawned = Rc::new(Cell::new(0));
    {
        let spawned = Rc::clone(&spawned);
        session.bus().subscribe(EventKind::EntitySpawned, move |event| {
            if let GameEvent::EntitySpawned {
                category: Category::Bullet,
                ..
            } = event
            {
                spawned.set(spawned.get() + 1);
            }
            Ok(())
        });
    }

    for _ in 0..5 {
        session
            .fire_bullet(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0))
            .expect("shot under cap");
    }
    let sixth = session.fire_bullet(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0));

    assert!(matches!(sixth, Err(SpawnError::AtCapacity { cap: 5, .. })));
    assert_eq!(spawned.get(), 5);
    assert_eq!(session.active_count(Category::Bullet), 5);
    assert_eq!(session.state().entity_counts[&Category::Bullet], 5);
}

#[test]
fn bullet_destroys_asteroid_and_scores() {
    let mut session = playing_session();

    let collisions = Rc::new(Cell::new(0));
    {
        let collisions = Rc::clone(&collisions);
        session.bus().subscribe(EventKind::Collision, move |event| {
            if let GameEvent::Collision(hit) = event {
                let (a, b) = hit.categories();
                assert_ne!(a, b, "same-kind pairs are not in the default matrix");
                collisions.set(collisions.get() + 1);
            }
            Ok(())
        });
    }

    // Deeply overlapping pair far from the player: exactly one collision.
    session
        .spawn_asteroid(Vec3::new(400.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
        .expect("asteroid spawn");
    session
        .fire_bullet(Vec3::new(404.0, 0.0, 0.0), Vec3::zeros())
        .expect("bullet spawn");

    session.tick(0.016);
    assert_eq!(collisions.get(), 1);
    // Destruction is deferred to the next tick's drain point.
    assert_eq!(session.active_count(Category::Asteroid), 1);
    assert_eq!(session.state().score, 0);

    session.tick(0.016);
    assert_eq!(session.active_count(Category::Asteroid), 0);
    assert_eq!(session.active_count(Category::Bullet), 0);
    assert_eq!(session.state().score, 100);
    assert_eq!(session.state().entity_counts[&Category::Asteroid], 0);
    assert_eq!(session.state().entity_counts[&Category::Bullet], 0);

    // No further collisions after both sides are gone.
    session.tick(0.016);
    assert_eq!(collisions.get(), 1);
}

#[test]
fn collision_impact_rides_on_the_destroyed_event() {
    // Asteroid r=20 at x=400, bullet r=5 at x=404: the surface points along
    // the center axis sit at 420 and 399, meeting at 409.5.
    let mut config = SimConfig::default();
    config.bullets.radius = 5.0;
    let mut session = GameSession::new(config);
    session.start();

    let impact = Rc::new(Cell::new(None));
    {
        let impact = Rc::clone(&impact);
        session
            .bus()
            .subscribe(EventKind::EntityDestroyed, move |event| {
                if let GameEvent::EntityDestroyed {
                    category: Category::Asteroid,
                    impact: Some(point),
                    ..
                } = event
                {
                    impact.set(Some(*point));
                }
                Ok(())
            });
    }

    session
        .spawn_asteroid(Vec3::new(400.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
        .expect("asteroid spawn");
    session
        .fire_bullet(Vec3::new(404.0, 0.0, 0.0), Vec3::zeros())
        .expect("bullet spawn");

    session.tick(0.016);
    session.tick(0.016);

    let point = impact.get().expect("asteroid destroyed by collision");
    assert!((point.x - 409.5).abs() < 1.0e-3);
    assert_eq!(point.y, 0.0);
    assert_eq!(point.z, 0.0);
}

#[test]
fn score_dispatched_after_game_over_is_ignored() {
    let session = playing_session();
    session.dispatch(Action::ScoreAdd(250)).expect("dispatch");
    session.dispatch(Action::GameOver).expect("dispatch");

    session.dispatch(Action::ScoreAdd(999)).expect("dispatch");
    let state = session.state();
    assert_eq!(state.phase, GamePhase::GameOver);
    assert_eq!(state.score, 250);
}

#[test]
fn game_over_stops_the_clock_but_teardown_still_balances_counts() {
    let mut session = playing_session();
    session
        .spawn_asteroid(Vec3::new(300.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
        .expect("asteroid spawn");
    session.dispatch(Action::GameOver).expect("dispatch");

    let before = session.frame();
    session.tick(0.016);
    assert_eq!(session.frame(), before, "tick is a no-op after game over");

    session.teardown();
    assert_eq!(session.active_count(Category::Asteroid), 0);
    assert_eq!(session.state().entity_counts[&Category::Asteroid], 0);
}

#[test]
fn expired_bullets_recycle_through_the_pool() {
    let mut session = GameSession::new(small_bullet_cap());
    session.start();

    // Fill to cap, expire everything, then fire again: the pool leases
    // recycled objects and the cap accepts new shots.
    for _ in 0..5 {
        session
            .fire_bullet(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0))
            .expect("shot under cap");
    }
    session.tick(2.0); // default lifetime is 1.5s
    assert_eq!(session.active_count(Category::Bullet), 0);

    session
        .fire_bullet(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0))
        .expect("cap freed after expiry");
    assert_eq!(session.active_count(Category::Bullet), 1);
}
