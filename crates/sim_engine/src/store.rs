//! Reducer-driven authoritative state store
//!
//! One immutable state tree, mutated only by dispatching actions through a
//! pure reducer. Every dispatch archives the previous snapshot in a bounded
//! history ring and re-broadcasts the change on the event bus: a generic
//! state-updated event plus a per-action-type event.
//!
//! Re-entrant dispatch (from a handler invoked synchronously by the same
//! dispatch) is a usage error and is rejected with a typed error rather
//! than silently interleaving state mutations.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::Category;
use crate::events::{EventBus, GameEvent};

/// Version tag carried by every snapshot for debug/persistence tooling
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Coarse game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Title screen, no simulation running
    Menu,
    /// Simulation ticking
    Playing,
    /// Simulation frozen, state retained
    Paused,
    /// Run over; gameplay actions are ignored until a new game starts
    GameOver,
}

/// Player health, lives, and damage grace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Hit points remaining on the current life
    pub health: u32,
    /// Lives remaining
    pub lives: u32,
    /// Damage is ignored while set (respawn/powerup grace)
    pub invulnerable: bool,
}

/// The authoritative state snapshot
///
/// A plain value tree: cloning it is the deep copy handed to readers, so
/// callers can never mutate the store's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Snapshot schema version (see [`SNAPSHOT_SCHEMA_VERSION`])
    pub schema_version: u32,
    /// Current phase
    pub phase: GamePhase,
    /// Player status
    pub player: PlayerState,
    /// Accumulated score
    pub score: u64,
    /// Live entity counts by kind
    pub entity_counts: HashMap<Category, usize>,
}

impl GameState {
    /// Initial menu-phase state
    pub fn new(starting_health: u32, starting_lives: u32) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            phase: GamePhase::Menu,
            player: PlayerState {
                health: starting_health,
                lives: starting_lives,
                invulnerable: false,
            },
            score: 0,
            entity_counts: HashMap::new(),
        }
    }
}

/// Fixed reducer parameters (respawn health and lives)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRules {
    /// Health each life starts with
    pub starting_health: u32,
    /// Lives a fresh game starts with
    pub starting_lives: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_health: 3,
            starting_lives: 3,
        }
    }
}

/// The fixed catalogue of dispatchable actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Begin a fresh run
    StartGame,
    /// Freeze the simulation
    Pause,
    /// Unfreeze the simulation
    Resume,
    /// End the run
    GameOver,
    /// Add points to the score
    ScoreAdd(u64),
    /// Apply damage to the player
    PlayerDamaged(u32),
    /// Set or clear the player's damage grace
    PlayerInvulnerable(bool),
    /// An entity of this kind went live
    EntitySpawned(Category),
    /// An entity of this kind was destroyed
    EntityDespawned(Category),
}

/// Fieldless discriminant of [`Action`], used for event routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// See [`Action::StartGame`]
    StartGame,
    /// See [`Action::Pause`]
    Pause,
    /// See [`Action::Resume`]
    Resume,
    /// See [`Action::GameOver`]
    GameOver,
    /// See [`Action::ScoreAdd`]
    ScoreAdd,
    /// See [`Action::PlayerDamaged`]
    PlayerDamaged,
    /// See [`Action::PlayerInvulnerable`]
    PlayerInvulnerable,
    /// See [`Action::EntitySpawned`]
    EntitySpawned,
    /// See [`Action::EntityDespawned`]
    EntityDespawned,
}

impl Action {
    /// The discriminant of this action
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::StartGame => ActionKind::StartGame,
            Self::Pause => ActionKind::Pause,
            Self::Resume => ActionKind::Resume,
            Self::GameOver => ActionKind::GameOver,
            Self::ScoreAdd(_) => ActionKind::ScoreAdd,
            Self::PlayerDamaged(_) => ActionKind::PlayerDamaged,
            Self::PlayerInvulnerable(_) => ActionKind::PlayerInvulnerable,
            Self::EntitySpawned(_) => ActionKind::EntitySpawned,
            Self::EntityDespawned(_) => ActionKind::EntityDespawned,
        }
    }
}

/// Errors surfaced by [`StateStore::dispatch`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// A dispatch arrived while another dispatch was still delivering
    #[error("re-entrant dispatch of {0:?} rejected; a dispatch is already in flight")]
    ReentrantDispatch(ActionKind),
}

/// The pure reducer: previous snapshot plus action yields the next snapshot
///
/// Gameplay actions (`ScoreAdd`, `PlayerDamaged`) are ignored outside the
/// `Playing` phase — in particular, score dispatched after game over leaves
/// the state unchanged. Entity count bookkeeping applies in every phase so
/// teardown during game over still balances the counters.
pub fn reduce(prev: &GameState, action: &Action, rules: &GameRules) -> GameState {
    let mut next = prev.clone();
    match action {
        Action::StartGame => {
            next = GameState::new(rules.starting_health, rules.starting_lives);
            next.phase = GamePhase::Playing;
        }
        Action::Pause => {
            if prev.phase == GamePhase::Playing {
                next.phase = GamePhase::Paused;
            }
        }
        Action::Resume => {
            if prev.phase == GamePhase::Paused {
                next.phase = GamePhase::Playing;
            }
        }
        Action::GameOver => {
            next.phase = GamePhase::GameOver;
        }
        Action::ScoreAdd(points) => {
            if prev.phase == GamePhase::Playing {
                next.score = prev.score.saturating_add(*points);
            }
        }
        Action::PlayerDamaged(amount) => {
            if prev.phase == GamePhase::Playing && !prev.player.invulnerable {
                let health = prev.player.health.saturating_sub(*amount);
                if health == 0 {
                    let lives = prev.player.lives.saturating_sub(1);
                    if lives == 0 {
                        next.phase = GamePhase::GameOver;
                        next.player.health = 0;
                        next.player.lives = 0;
                    } else {
                        // Respawn with grace so the same overlap cannot
                        // drain the next life on the following tick.
                        next.player.health = rules.starting_health;
                        next.player.lives = lives;
                        next.player.invulnerable = true;
                    }
                } else {
                    next.player.health = health;
                    next.player.invulnerable = true;
                }
            }
        }
        Action::PlayerInvulnerable(grace) => {
            if prev.phase == GamePhase::Playing {
                next.player.invulnerable = *grace;
            }
        }
        Action::EntitySpawned(category) => {
            *next.entity_counts.entry(*category).or_insert(0) += 1;
        }
        Action::EntityDespawned(category) => {
            let count = next.entity_counts.entry(*category).or_insert(0);
            *count = count.saturating_sub(1);
        }
    }
    next
}

/// Single authoritative state container
///
/// Interior-mutable so handlers can read it while the session holds it
/// behind an `Rc`; all mutation still funnels through [`dispatch`].
///
/// [`dispatch`]: Self::dispatch
pub struct StateStore {
    state: RefCell<GameState>,
    history: RefCell<VecDeque<GameState>>,
    history_capacity: usize,
    rules: GameRules,
    dispatching: Cell<bool>,
}

impl StateStore {
    /// Create a store with the given initial state and history capacity
    ///
    /// A capacity of 0 disables archiving entirely.
    pub fn new(initial: GameState, history_capacity: usize, rules: GameRules) -> Self {
        Self {
            state: RefCell::new(initial),
            history: RefCell::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            rules,
            dispatching: Cell::new(false),
        }
    }

    /// Apply an action through the reducer and broadcast the change
    ///
    /// Emits `StateUpdated { action, snapshot }` followed by the
    /// per-action-type event. Rejects re-entrant dispatch.
    pub fn dispatch(&self, action: Action, bus: &EventBus) -> Result<(), StoreError> {
        if self.dispatching.get() {
            return Err(StoreError::ReentrantDispatch(action.kind()));
        }
        self.dispatching.set(true);

        let next = reduce(&self.state.borrow(), &action, &self.rules);
        if self.history_capacity > 0 {
            let mut history = self.history.borrow_mut();
            if history.len() >= self.history_capacity {
                history.pop_front();
            }
            history.push_back(self.state.borrow().clone());
        }
        debug!("dispatch {:?}", action.kind());
        let snapshot = next.clone();
        *self.state.borrow_mut() = next;

        bus.emit(&GameEvent::StateUpdated {
            action: action.clone(),
            snapshot,
        });
        bus.emit(&GameEvent::ActionApplied(action));

        self.dispatching.set(false);
        Ok(())
    }

    /// Deep-copied snapshot of the current state
    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    /// Number of archived snapshots
    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }

    /// The oldest archived snapshot still in the ring
    pub fn oldest_archived(&self) -> Option<GameState> {
        self.history.borrow().front().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    use crate::events::EventKind;

    fn playing_store(history_capacity: usize) -> (StateStore, EventBus) {
        let rules = GameRules::default();
        let store = StateStore::new(GameState::new(3, 3), history_capacity, rules);
        let bus = EventBus::new();
        store.dispatch(Action::StartGame, &bus).unwrap();
        (store, bus)
    }

    #[test]
    fn test_score_accumulates_while_playing() {
        let (store, bus) = playing_store(8);
        store.dispatch(Action::ScoreAdd(100), &bus).unwrap();
        store.dispatch(Action::ScoreAdd(50), &bus).unwrap();
        assert_eq!(store.state().score, 150);
    }

    #[test]
    fn test_score_after_game_over_is_ignored() {
        let (store, bus) = playing_store(8);
        store.dispatch(Action::ScoreAdd(100), &bus).unwrap();
        store.dispatch(Action::GameOver, &bus).unwrap();
        assert_eq!(store.state().phase, GamePhase::GameOver);

        store.dispatch(Action::ScoreAdd(10), &bus).unwrap();
        assert_eq!(store.state().score, 100);
    }

    #[test]
    fn test_damage_sets_grace_and_grace_blocks_damage() {
        let (store, bus) = playing_store(8);
        store.dispatch(Action::PlayerDamaged(1), &bus).unwrap();
        let state = store.state();
        assert_eq!(state.player.health, 2);
        assert!(state.player.invulnerable);

        store.dispatch(Action::PlayerDamaged(1), &bus).unwrap();
        assert_eq!(store.state().player.health, 2);
    }

    #[test]
    fn test_losing_last_life_ends_the_game() {
        let rules = GameRules {
            starting_health: 1,
            starting_lives: 2,
        };
        let store = StateStore::new(GameState::new(1, 2), 8, rules);
        let bus = EventBus::new();
        store.dispatch(Action::StartGame, &bus).unwrap();

        store.dispatch(Action::PlayerDamaged(1), &bus).unwrap();
        let state = store.state();
        assert_eq!(state.player.lives, 1);
        assert_eq!(state.player.health, 1);
        assert!(state.player.invulnerable);

        store.dispatch(Action::PlayerInvulnerable(false), &bus).unwrap();
        store.dispatch(Action::PlayerDamaged(1), &bus).unwrap();
        let state = store.state();
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.player.lives, 0);
    }

    #[test]
    fn test_entity_counts_balance() {
        let (store, bus) = playing_store(8);
        store
            .dispatch(Action::EntitySpawned(Category::Bullet), &bus)
            .unwrap();
        store
            .dispatch(Action::EntitySpawned(Category::Bullet), &bus)
            .unwrap();
        store
            .dispatch(Action::EntityDespawned(Category::Bullet), &bus)
            .unwrap();
        assert_eq!(store.state().entity_counts[&Category::Bullet], 1);

        // Despawn below zero saturates instead of wrapping.
        store
            .dispatch(Action::EntityDespawned(Category::Asteroid), &bus)
            .unwrap();
        assert_eq!(store.state().entity_counts[&Category::Asteroid], 0);
    }

    #[test]
    fn test_history_ring_evicts_oldest() {
        let (store, bus) = playing_store(3);
        for points in [1, 2, 3, 4] {
            store.dispatch(Action::ScoreAdd(points), &bus).unwrap();
        }
        // StartGame plus four ScoreAdds archived five snapshots into a
        // ring of three; the survivors precede ScoreAdd(2..=4).
        assert_eq!(store.history_len(), 3);
        assert_eq!(store.oldest_archived().unwrap().score, 1);
    }

    #[test]
    fn test_zero_capacity_history_archives_nothing() {
        let (store, bus) = playing_store(0);
        for points in 1..=10 {
            store.dispatch(Action::ScoreAdd(points), &bus).unwrap();
        }
        assert_eq!(store.history_len(), 0);
        assert!(store.oldest_archived().is_none());
        // Dispatch itself is unaffected by the disabled archive.
        assert_eq!(store.state().score, 55);
    }

    #[test]
    fn test_dispatch_emits_state_updated_and_action_event() {
        let (store, bus) = playing_store(8);
        let updated = Rc::new(StdCell::new(0));
        let scored = Rc::new(StdCell::new(0));
        {
            let updated = Rc::clone(&updated);
            bus.subscribe(EventKind::StateUpdated, move |_| {
                updated.set(updated.get() + 1);
                Ok(())
            });
        }
        {
            let scored = Rc::clone(&scored);
            bus.subscribe(EventKind::Action(ActionKind::ScoreAdd), move |event| {
                if let GameEvent::ActionApplied(Action::ScoreAdd(points)) = event {
                    scored.set(scored.get() + points);
                }
                Ok(())
            });
        }

        store.dispatch(Action::ScoreAdd(25), &bus).unwrap();
        assert_eq!(updated.get(), 1);
        assert_eq!(scored.get(), 25);
    }

    #[test]
    fn test_reentrant_dispatch_is_rejected() {
        let rules = GameRules::default();
        let store = Rc::new(StateStore::new(GameState::new(3, 3), 8, rules));
        let bus = Rc::new(EventBus::new());

        let rejected = Rc::new(StdCell::new(false));
        {
            let store = Rc::clone(&store);
            let bus_inner = Rc::clone(&bus);
            let rejected = Rc::clone(&rejected);
            bus.subscribe(EventKind::StateUpdated, move |_| {
                let result = store.dispatch(Action::ScoreAdd(1), &bus_inner);
                rejected.set(matches!(result, Err(StoreError::ReentrantDispatch(_))));
                Ok(())
            });
        }

        store.dispatch(Action::StartGame, &bus).unwrap();
        assert!(rejected.get());
        // The guard resets once the outer dispatch completes.
        store.dispatch(Action::ScoreAdd(5), &bus).unwrap();
        assert_eq!(store.state().score, 5);
    }

    #[test]
    fn test_state_returns_detached_copy() {
        let (store, bus) = playing_store(8);
        store.dispatch(Action::ScoreAdd(10), &bus).unwrap();
        let mut copy = store.state();
        copy.score = 9999;
        assert_eq!(store.state().score, 10);
    }
}
