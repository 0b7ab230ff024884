//! Entity identity, categories, and the shared collidable core
//!
//! Every transient game object (bullet, asteroid, powerup) is split in two:
//! kinematic state (velocity, age) owned exclusively by its lifecycle
//! manager, and an [`EntityCell`] shared by reference with the collision
//! registry and event consumers. The cell is the read-only surface the
//! renderer sees and the only thing the collision scan ever touches.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Collision/gameplay category an entity is tagged with
///
/// The collision matrix is keyed by these categories; an entity belongs to
/// exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// The player ship
    Player,
    /// Drifting obstacles
    Asteroid,
    /// Player projectiles
    Bullet,
    /// Collectible pickups
    Powerup,
    /// Hostile ships
    Enemy,
    /// Static level geometry
    Environment,
}

/// Unique identity of one entity lease
///
/// Ids are allocated per spawn: a pooled object that is recycled receives a
/// fresh id, so a stale id from a previous lease never aliases the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw numeric value (stable within a session, for logs and tooling)
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Session-owned allocator for [`EntityId`]s
#[derive(Debug)]
pub struct IdAllocator {
    next: Cell<u64>,
}

impl IdAllocator {
    /// Create an allocator starting at id 1 (0 is reserved for unleased cells)
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    /// Hand out the next id
    pub fn allocate(&self) -> EntityId {
        let id = self.next.get();
        self.next.set(id + 1);
        EntityId(id)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Why an entity was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyCause {
    /// Lifetime ran out
    Expired,
    /// Left the world bounds
    OutOfBounds,
    /// Hit something listed in the collision matrix
    Collision,
    /// Explicit despawn (level reset, session teardown)
    Manual,
}

/// The shared core of a collidable entity
///
/// Interior-mutable so the owning lifecycle manager can update it while the
/// registry and event payloads hold `Rc` references to it. Registration with
/// the collision registry requires an `Rc<EntityCell>`, which makes the
/// position-plus-radius capability a compile-time guarantee instead of a
/// runtime duck-type check.
#[derive(Debug)]
pub struct EntityCell {
    id: Cell<EntityId>,
    category: Category,
    position: Cell<Vec3>,
    radius: Cell<f32>,
    alive: Cell<bool>,
    visible: Cell<bool>,
}

impl EntityCell {
    /// Create a dead, invisible cell for the given category
    ///
    /// Pool factories call this once; the lifecycle manager brings the cell
    /// to life on each spawn.
    pub fn new(category: Category) -> Self {
        Self {
            id: Cell::new(EntityId(0)),
            category,
            position: Cell::new(Vec3::zeros()),
            radius: Cell::new(0.0),
            alive: Cell::new(false),
            visible: Cell::new(false),
        }
    }

    /// Current lease id
    pub fn id(&self) -> EntityId {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: EntityId) {
        self.id.set(id);
    }

    /// Category this entity is tagged with
    pub fn category(&self) -> Category {
        self.category
    }

    /// Current world position
    pub fn position(&self) -> Vec3 {
        self.position.get()
    }

    pub(crate) fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }

    /// Collision sphere radius
    pub fn radius(&self) -> f32 {
        self.radius.get()
    }

    pub(crate) fn set_radius(&self, radius: f32) {
        self.radius.set(radius);
    }

    /// Whether this lease is still active
    ///
    /// Cleared the instant destruction is decided; collision consumers check
    /// it before acting so one entity is never processed twice in a tick.
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.set(alive);
    }

    /// Whether the renderer should draw this entity
    ///
    /// Pooled entities are hidden rather than torn down so their graphics
    /// resources survive recycling.
    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}
