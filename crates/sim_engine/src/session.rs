//! Session composition root
//!
//! [`GameSession`] owns one of everything — bus, registry, store, one
//! lifecycle manager per entity kind, the player cell — and wires them
//! together through bus subscriptions so the subsystems never reference
//! each other directly. The tick order is fixed:
//!
//! 1. managers drain last tick's deferred destructions, then integrate
//!    and cull (expiry, bounds)
//! 2. the registry scans and emits this tick's collisions
//! 3. player hits gathered from those events are resolved into store
//!    actions
//!
//! Collision consequences therefore never mutate the registry mid-scan;
//! they land as dead flags and pending queues that the next tick drains.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::collision::CollisionRegistry;
use crate::config::SimConfig;
use crate::entity::{Category, DestroyCause, EntityCell, IdAllocator};
use crate::events::{EventBus, EventKind, GameEvent, HandlerError, SubscriptionId};
use crate::foundation::math::Vec3;
use crate::lifecycle::kinds::{
    Asteroid, AsteroidParams, Bullet, BulletParams, Powerup, PowerupParams,
};
use crate::lifecycle::{EntityKey, EntityLifecycleManager, SpawnError};
use crate::store::{Action, GamePhase, GameRules, GameState, StateStore, StoreError};

/// The assembled game world
pub struct GameSession {
    config: SimConfig,
    bus: Rc<EventBus>,
    registry: Rc<RefCell<CollisionRegistry>>,
    store: Rc<StateStore>,
    bullets: Rc<RefCell<EntityLifecycleManager<Bullet>>>,
    asteroids: Rc<RefCell<EntityLifecycleManager<Asteroid>>>,
    powerups: Rc<RefCell<EntityLifecycleManager<Powerup>>>,
    player: Rc<EntityCell>,
    player_hits: Rc<RefCell<Vec<Category>>>,
    subscriptions: Vec<SubscriptionId>,
    invuln_remaining: f32,
    frame: u64,
}

impl GameSession {
    /// Assemble a session from configuration
    pub fn new(config: SimConfig) -> Self {
        let bus = Rc::new(EventBus::new());
        let registry = Rc::new(RefCell::new(CollisionRegistry::new(config.matrix.clone())));
        let store = Rc::new(StateStore::new(
            GameState::new(config.player.health, config.player.lives),
            config.history_capacity,
            GameRules {
                starting_health: config.player.health,
                starting_lives: config.player.lives,
            },
        ));
        let ids = Rc::new(IdAllocator::new());

        let bullet_radius = config.bullets.radius;
        let bullet_lifetime = config.bullets.lifetime;
        let bullets = Rc::new(RefCell::new(EntityLifecycleManager::new(
            Category::Bullet,
            config.bullets.lifecycle.clone(),
            config.world,
            Rc::clone(&ids),
            move || Bullet::new(bullet_radius, bullet_lifetime),
        )));
        let asteroids = Rc::new(RefCell::new(EntityLifecycleManager::new(
            Category::Asteroid,
            config.asteroids.lifecycle.clone(),
            config.world,
            Rc::clone(&ids),
            Asteroid::new,
        )));
        let powerup_radius = config.powerups.radius;
        let powerup_lifetime = config.powerups.lifetime;
        let powerups = Rc::new(RefCell::new(EntityLifecycleManager::new(
            Category::Powerup,
            config.powerups.lifecycle.clone(),
            config.world,
            Rc::clone(&ids),
            move || Powerup::new(powerup_radius, powerup_lifetime),
        )));

        let player = Rc::new(EntityCell::new(Category::Player));
        player.set_id(ids.allocate());
        player.set_position(Vec3::zeros());
        player.set_radius(config.player.radius);
        player.set_alive(true);
        player.set_visible(true);
        if !registry.borrow_mut().register(&player, Category::Player) {
            warn!("player cell rejected by the collision registry");
        }

        let mut session = Self {
            config,
            bus,
            registry,
            store,
            bullets,
            asteroids,
            powerups,
            player,
            player_hits: Rc::new(RefCell::new(Vec::new())),
            subscriptions: Vec::new(),
            invuln_remaining: 0.0,
            frame: 0,
        };
        session.wire();
        session
    }

    /// Subscribe the collision consumers and the store bookkeeping.
    ///
    /// Handlers only flip cell flags, push into inboxes, or dispatch store
    /// actions; none of them touch the registry, so they are safe to run
    /// from inside the registry's emit loop.
    fn wire(&mut self) {
        for manager_rc in [
            Rc::clone(&self.bullets) as Rc<RefCell<dyn CollisionSink>>,
            Rc::clone(&self.asteroids) as Rc<RefCell<dyn CollisionSink>>,
            Rc::clone(&self.powerups) as Rc<RefCell<dyn CollisionSink>>,
        ] {
            let id = self.bus.subscribe(EventKind::Collision, move |event| {
                if let GameEvent::Collision(hit) = event {
                    manager_rc.borrow_mut().absorb_collision(hit);
                }
                Ok(())
            });
            self.subscriptions.push(id);
        }

        {
            let inbox = Rc::clone(&self.player_hits);
            let player = Rc::clone(&self.player);
            let id = self.bus.subscribe(EventKind::Collision, move |event| {
                if let GameEvent::Collision(hit) = event {
                    if let Some((member, other)) = hit.split(Category::Player) {
                        if Rc::ptr_eq(member, &player) {
                            inbox.borrow_mut().push(other.category());
                        }
                    }
                }
                Ok(())
            });
            self.subscriptions.push(id);
        }

        {
            let store = Rc::clone(&self.store);
            let bus = Rc::clone(&self.bus);
            let id = self.bus.subscribe(EventKind::EntitySpawned, move |event| {
                if let GameEvent::EntitySpawned { category, .. } = event {
                    store
                        .dispatch(Action::EntitySpawned(*category), &bus)
                        .map_err(to_handler_error)?;
                }
                Ok(())
            });
            self.subscriptions.push(id);
        }

        {
            let store = Rc::clone(&self.store);
            let bus = Rc::clone(&self.bus);
            let id = self
                .bus
                .subscribe(EventKind::EntityDestroyed, move |event| {
                    if let GameEvent::EntityDestroyed {
                        category,
                        cause,
                        score_value,
                        ..
                    } = event
                    {
                        store
                            .dispatch(Action::EntityDespawned(*category), &bus)
                            .map_err(to_handler_error)?;
                        if *cause == DestroyCause::Collision {
                            if let Some(points) = score_value {
                                if *points > 0 {
                                    store
                                        .dispatch(Action::ScoreAdd(u64::from(*points)), &bus)
                                        .map_err(to_handler_error)?;
                                }
                            }
                        }
                    }
                    Ok(())
                });
            self.subscriptions.push(id);
        }
    }

    /// Begin a fresh run
    pub fn start(&mut self) {
        self.invuln_remaining = 0.0;
        self.dispatch_logged(Action::StartGame);
        info!("session started");
    }

    /// Freeze the simulation
    pub fn pause(&self) {
        self.dispatch_logged(Action::Pause);
    }

    /// Unfreeze the simulation
    pub fn resume(&self) {
        self.dispatch_logged(Action::Resume);
    }

    /// Advance the world by `dt` seconds
    ///
    /// A no-op unless the phase is `Playing`.
    pub fn tick(&mut self, dt: f32) {
        if self.store.state().phase != GamePhase::Playing {
            return;
        }

        {
            let mut registry = self.registry.borrow_mut();
            self.bullets.borrow_mut().update(dt, &mut registry, &self.bus);
            self.asteroids
                .borrow_mut()
                .update(dt, &mut registry, &self.bus);
            self.powerups
                .borrow_mut()
                .update(dt, &mut registry, &self.bus);
        }

        self.registry.borrow().update(&self.bus);

        self.resolve_player_hits();
        self.tick_invulnerability(dt);
        self.frame += 1;
    }

    /// Fire a bullet from `position` along `direction`
    ///
    /// A zero or non-finite direction yields a stationary bullet that
    /// expires in place.
    pub fn fire_bullet(&self, position: Vec3, direction: Vec3) -> Result<EntityKey, SpawnError> {
        let velocity = direction
            .try_normalize(1.0e-6)
            .map_or_else(Vec3::zeros, |dir| dir * self.config.bullets.speed);
        self.bullets.borrow_mut().spawn(
            &BulletParams { position, velocity },
            &mut self.registry.borrow_mut(),
            &self.bus,
        )
    }

    /// Spawn an asteroid
    pub fn spawn_asteroid(
        &self,
        position: Vec3,
        velocity: Vec3,
        radius: f32,
        score_value: u32,
    ) -> Result<EntityKey, SpawnError> {
        self.asteroids.borrow_mut().spawn(
            &AsteroidParams {
                position,
                velocity,
                radius,
                score_value,
            },
            &mut self.registry.borrow_mut(),
            &self.bus,
        )
    }

    /// Spawn a powerup pickup
    pub fn spawn_powerup(&self, position: Vec3) -> Result<EntityKey, SpawnError> {
        self.powerups.borrow_mut().spawn(
            &PowerupParams { position },
            &mut self.registry.borrow_mut(),
            &self.bus,
        )
    }

    /// Dispatch an action against the store
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        self.store.dispatch(action, &self.bus)
    }

    /// Deep-copied snapshot of the current state
    pub fn state(&self) -> GameState {
        self.store.state()
    }

    /// The session's event bus
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// The session's state store
    pub fn store(&self) -> &Rc<StateStore> {
        &self.store
    }

    /// The player's shared cell
    pub fn player(&self) -> &Rc<EntityCell> {
        &self.player
    }

    /// Active entity count for a pooled kind (the player is not pooled)
    pub fn active_count(&self, category: Category) -> usize {
        match category {
            Category::Bullet => self.bullets.borrow().active_count(),
            Category::Asteroid => self.asteroids.borrow().active_count(),
            Category::Powerup => self.powerups.borrow().active_count(),
            _ => 0,
        }
    }

    /// Ticks advanced since the session was assembled
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Despawn everything, detach all subscriptions, clear the registry
    pub fn teardown(&mut self) {
        {
            let mut registry = self.registry.borrow_mut();
            self.bullets.borrow_mut().despawn_all(&mut registry, &self.bus);
            self.asteroids
                .borrow_mut()
                .despawn_all(&mut registry, &self.bus);
            self.powerups
                .borrow_mut()
                .despawn_all(&mut registry, &self.bus);
            registry.unregister(&self.player, Category::Player);
            registry.clear();
        }
        self.player.set_visible(false);
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        self.player_hits.borrow_mut().clear();
        info!("session torn down after {} frames", self.frame);
    }

    /// Resolve this tick's player contacts into store actions.
    ///
    /// Powerups grant a grace window; damaging contacts cost one health
    /// unless grace is active. Grace is refreshed, never stacked.
    fn resolve_player_hits(&mut self) {
        let hits: Vec<Category> = self.player_hits.borrow_mut().drain(..).collect();
        for other in hits {
            match other {
                Category::Powerup => {
                    self.dispatch_logged(Action::PlayerInvulnerable(true));
                    self.invuln_remaining = self.config.player.powerup_grace_secs;
                    debug!("powerup collected; grace {}s", self.invuln_remaining);
                }
                Category::Asteroid | Category::Enemy => {
                    if self.store.state().player.invulnerable {
                        debug!("player contact with {other:?} absorbed by grace");
                        continue;
                    }
                    self.dispatch_logged(Action::PlayerDamaged(1));
                    // The reducer set respawn/hit grace; run its timer.
                    self.invuln_remaining = self.config.player.hit_grace_secs;
                }
                _ => {}
            }
        }
    }

    fn tick_invulnerability(&mut self, dt: f32) {
        if self.invuln_remaining <= 0.0 {
            return;
        }
        self.invuln_remaining -= dt;
        if self.invuln_remaining <= 0.0 && self.store.state().player.invulnerable {
            self.dispatch_logged(Action::PlayerInvulnerable(false));
        }
    }

    fn dispatch_logged(&self, action: Action) {
        if let Err(err) = self.store.dispatch(action, &self.bus) {
            warn!("dispatch failed: {err}");
        }
    }
}

fn to_handler_error(err: StoreError) -> HandlerError {
    HandlerError(err.to_string())
}

/// Object-safe shim over per-kind managers for collision fan-out
trait CollisionSink {
    fn absorb_collision(&mut self, event: &crate::events::CollisionEvent);
}

impl<T: crate::lifecycle::Simulated> CollisionSink for EntityLifecycleManager<T> {
    fn absorb_collision(&mut self, event: &crate::events::CollisionEvent) {
        self.on_collision(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_session() -> GameSession {
        let mut session = GameSession::new(SimConfig::default());
        session.start();
        session
    }

    #[test]
    fn test_start_enters_playing_phase() {
        let session = playing_session();
        assert_eq!(session.state().phase, GamePhase::Playing);
        assert_eq!(session.frame(), 0);
    }

    #[test]
    fn test_tick_is_noop_outside_playing() {
        let mut session = GameSession::new(SimConfig::default());
        session.tick(0.016);
        assert_eq!(session.frame(), 0);

        session.start();
        session.pause();
        session.tick(0.016);
        assert_eq!(session.frame(), 0);

        session.resume();
        session.tick(0.016);
        assert_eq!(session.frame(), 1);
    }

    #[test]
    fn test_spawns_are_counted_in_state() {
        let session = playing_session();
        session
            .spawn_asteroid(Vec3::new(300.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
            .unwrap();
        session
            .fire_bullet(Vec3::new(200.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        let state = session.state();
        assert_eq!(state.entity_counts[&Category::Asteroid], 1);
        assert_eq!(state.entity_counts[&Category::Bullet], 1);
        assert_eq!(session.active_count(Category::Asteroid), 1);
    }

    #[test]
    fn test_powerup_pickup_grants_then_expires_grace() {
        let mut session = playing_session();
        // On the player: overlapping spheres collide on the first scan.
        session.spawn_powerup(Vec3::zeros()).unwrap();

        session.tick(0.1);
        assert!(session.state().player.invulnerable);

        // Pickup was consumed: queued destroy drains next tick.
        session.tick(0.1);
        assert_eq!(session.active_count(Category::Powerup), 0);

        // Default powerup grace is 5s.
        for _ in 0..60 {
            session.tick(0.1);
        }
        assert!(!session.state().player.invulnerable);
    }

    #[test]
    fn test_asteroid_contact_damages_player_once() {
        let mut session = playing_session();
        session
            .spawn_asteroid(Vec3::new(5.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
            .unwrap();

        session.tick(0.016);
        let state = session.state();
        assert_eq!(state.player.health, 2);
        assert!(state.player.invulnerable);
        // Destruction is deferred, so the kill has not been scored yet.
        assert_eq!(state.score, 0);

        session.tick(0.016);
        assert_eq!(session.active_count(Category::Asteroid), 0);
        // Collision destruction awards the asteroid's value even when the
        // player did the ramming; grace absorbed any further damage.
        let state = session.state();
        assert_eq!(state.score, 100);
        assert_eq!(state.player.health, 2);
    }

    #[test]
    fn test_stationary_bullet_expires_in_place() {
        let mut session = playing_session();
        session.fire_bullet(Vec3::zeros(), Vec3::zeros()).unwrap();
        assert_eq!(session.active_count(Category::Bullet), 1);

        // Default bullet lifetime is 1.5s.
        session.tick(2.0);
        assert_eq!(session.active_count(Category::Bullet), 0);
    }

    #[test]
    fn test_teardown_detaches_everything() {
        let mut session = playing_session();
        session
            .spawn_asteroid(Vec3::new(300.0, 0.0, 0.0), Vec3::zeros(), 20.0, 100)
            .unwrap();
        let bus = Rc::clone(session.bus());

        session.teardown();
        assert_eq!(session.active_count(Category::Asteroid), 0);
        assert_eq!(bus.subscriber_count(EventKind::Collision), 0);
        assert_eq!(bus.subscriber_count(EventKind::EntitySpawned), 0);
        assert!(!session.player().is_visible());
    }
}
