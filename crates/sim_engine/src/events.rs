//! Synchronous event bus following Game Engine Architecture Ch 16.8
//!
//! The bus decouples the collision registry, the lifecycle managers, and
//! the state store: none of them hold references to each other, they only
//! publish and subscribe here. Dispatch is fully synchronous — every event
//! emitted during a tick is delivered before the tick returns — and runs
//! over a snapshot of the subscriber list taken at emit time, so handlers
//! that subscribe or unsubscribe mid-dispatch never affect the in-flight
//! fan-out.
//!
//! Per-handler failure isolation is an explicit contract, not incidental
//! behavior: a handler returning an error is logged and the remaining
//! handlers still run.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use thiserror::Error;

use crate::entity::{Category, DestroyCause, EntityCell, EntityId};
use crate::foundation::math::Vec3;
use crate::store::{Action, ActionKind, GameState};

/// Error a subscriber may return from its handler
#[derive(Debug, Error)]
#[error("event handler failed: {0}")]
pub struct HandlerError(pub String);

/// Discriminant used to route subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An entity was leased from a pool and activated
    EntitySpawned,
    /// An entity was deactivated and returned to its pool
    EntityDestroyed,
    /// Two registered entities overlapped this tick
    Collision,
    /// The state store swapped in a new snapshot
    StateUpdated,
    /// A specific action type was applied by the store
    Action(ActionKind),
}

/// One collision between two registered entities
///
/// Carries shared references to both entity cells so consumers can read
/// category, position, and liveness without reaching into a manager.
#[derive(Debug, Clone)]
pub struct CollisionEvent {
    /// First member of the pair
    pub first: Rc<EntityCell>,
    /// Second member of the pair
    pub second: Rc<EntityCell>,
    /// Contact point on the axis connecting the two centers
    pub contact: Vec3,
}

impl CollisionEvent {
    /// The categories of both members, in pair order
    pub fn categories(&self) -> (Category, Category) {
        (self.first.category(), self.second.category())
    }

    /// If exactly one member has `category`, returns `(member, other)`
    pub fn split(&self, category: Category) -> Option<(&Rc<EntityCell>, &Rc<EntityCell>)> {
        match (
            self.first.category() == category,
            self.second.category() == category,
        ) {
            (true, false) => Some((&self.first, &self.second)),
            (false, true) => Some((&self.second, &self.first)),
            _ => None,
        }
    }
}

/// Payload dispatched through the bus
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A lifecycle manager activated an entity
    EntitySpawned {
        /// Lease id of the new entity
        id: EntityId,
        /// Kind of entity spawned
        category: Category,
        /// Spawn position
        position: Vec3,
    },
    /// A lifecycle manager destroyed an entity
    EntityDestroyed {
        /// Lease id of the destroyed entity
        id: EntityId,
        /// Kind of entity destroyed
        category: Category,
        /// Position at destruction time
        position: Vec3,
        /// What triggered the destruction
        cause: DestroyCause,
        /// Contact point, present when the cause is a collision
        impact: Option<Vec3>,
        /// Score awarded, present when the cause is a collision
        score_value: Option<u32>,
    },
    /// Broad-phase overlap between two registered entities
    Collision(CollisionEvent),
    /// The authoritative state snapshot changed
    StateUpdated {
        /// Action that produced the new snapshot
        action: Action,
        /// The new snapshot
        snapshot: GameState,
    },
    /// Per-action-type notification carrying only the action payload
    ActionApplied(Action),
}

impl GameEvent {
    /// The routing kind for this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::EntitySpawned { .. } => EventKind::EntitySpawned,
            Self::EntityDestroyed { .. } => EventKind::EntityDestroyed,
            Self::Collision(_) => EventKind::Collision,
            Self::StateUpdated { .. } => EventKind::StateUpdated,
            Self::ActionApplied(action) => EventKind::Action(action.kind()),
        }
    }
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = dyn FnMut(&GameEvent) -> Result<(), HandlerError>;

/// Synchronous publish/subscribe hub
///
/// Single-threaded by design; interior mutability lets the session and its
/// handlers share the bus behind an `Rc` without locks.
pub struct EventBus {
    subscribers: RefCell<HashMap<EventKind, Vec<(SubscriptionId, Rc<RefCell<Handler>>)>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Register a handler for one event kind
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl FnMut(&GameEvent) -> Result<(), HandlerError> + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let handler: Rc<RefCell<Handler>> = Rc::new(RefCell::new(handler));
        self.subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a subscription; unknown tokens are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers.borrow_mut();
        for list in subscribers.values_mut() {
            if let Some(index) = list.iter().position(|(sub_id, _)| *sub_id == id) {
                list.remove(index);
                return;
            }
        }
        debug!("unsubscribe of unknown subscription {id:?} ignored");
    }

    /// Deliver an event to every handler subscribed to its kind
    ///
    /// The subscriber list is snapshotted before the first handler runs.
    /// Handler errors are logged and do not stop delivery to the rest; a
    /// handler that is already executing (re-entrant delivery to itself) is
    /// skipped with a warning.
    pub fn emit(&self, event: &GameEvent) {
        let snapshot: Vec<(SubscriptionId, Rc<RefCell<Handler>>)> = {
            match self.subscribers.borrow().get(&event.kind()) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for (id, handler) in snapshot {
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    if let Err(err) = handler(event) {
                        warn!("handler {id:?} for {:?} failed: {err}", event.kind());
                    }
                }
                Err(_) => warn!("skipping re-entrant delivery to handler {id:?}"),
            }
        }
    }

    /// Number of live subscriptions for one event kind
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .borrow()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
