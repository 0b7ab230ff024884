//! Entity lifecycle management
//!
//! One [`EntityLifecycleManager`] per entity kind owns that kind's pool,
//! its active set, and — critically — the single destroy path. Expiry,
//! out-of-bounds culling, and collision response all funnel through
//! [`EntityLifecycleManager::destroy`]; nothing else removes entities from
//! the active list, which is what keeps double-destroy bugs out even when
//! several code paths condemn the same entity in one tick.
//!
//! GEA 16.6: updates are performed once per frame; destruction decided by
//! collision handlers is deferred through an explicit pending queue drained
//! at a fixed point of the next tick, so every consumer of this tick's
//! collision events observes a consistent world.

pub mod kinds;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::collision::CollisionRegistry;
use crate::entity::{Category, DestroyCause, EntityCell, EntityId, IdAllocator};
use crate::events::{CollisionEvent, EventBus, GameEvent};
use crate::foundation::math::{Vec3, WorldBounds};
use crate::pool::{ObjectPool, PoolConfig, PoolError, Reusable};

new_key_type! {
    /// Opaque handle to a pooled entity's current lease
    ///
    /// Generational: once the entity is destroyed the key goes stale and
    /// every operation taking it becomes a guarded no-op.
    pub struct EntityKey;
}

/// Errors surfaced by [`EntityLifecycleManager::spawn`]
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The configured active cap for this kind is reached
    #[error("active entity cap of {cap} reached for {category:?}")]
    AtCapacity {
        /// Kind that hit its cap
        category: Category,
        /// The configured cap
        cap: usize,
    },
    /// The pool could not produce a usable object
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Per-kind lifecycle limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Maximum simultaneously active entities of this kind
    pub max_active: usize,
    /// Pool growth policy
    pub pool: PoolConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_active: 64,
            pool: PoolConfig::default(),
        }
    }
}

/// Kind capability required of managed entities
///
/// Implementors own their kinematic state (velocity, age) exclusively; the
/// shared [`EntityCell`] is the only surface other systems see.
pub trait Simulated: Reusable {
    /// The shared collidable core
    fn cell(&self) -> &Rc<EntityCell>;

    /// Advance kinematics by `dt` seconds, writing position to the cell
    fn integrate(&mut self, dt: f32);

    /// Whether this entity's lifetime has run out
    fn is_expired(&self) -> bool;

    /// Score awarded when this entity is destroyed by a collision
    fn score_value(&self) -> u32;
}

struct PendingDestroy {
    key: EntityKey,
    cause: DestroyCause,
    impact: Option<Vec3>,
}

/// Spawns, updates, and destroys one kind of pooled entity
pub struct EntityLifecycleManager<T: Simulated> {
    category: Category,
    config: LifecycleConfig,
    bounds: WorldBounds,
    pool: ObjectPool<T>,
    active: SlotMap<EntityKey, Rc<RefCell<T>>>,
    by_id: HashMap<EntityId, EntityKey>,
    pending: Vec<PendingDestroy>,
    ids: Rc<IdAllocator>,
}

impl<T: Simulated> EntityLifecycleManager<T> {
    /// Create a manager for `category` with a pre-warmed pool
    pub fn new(
        category: Category,
        config: LifecycleConfig,
        bounds: WorldBounds,
        ids: Rc<IdAllocator>,
        factory: impl FnMut() -> T + 'static,
    ) -> Self {
        let pool = ObjectPool::new(config.pool.clone(), factory);
        Self {
            category,
            config,
            bounds,
            pool,
            active: SlotMap::with_key(),
            by_id: HashMap::new(),
            pending: Vec::new(),
            ids,
        }
    }

    /// The kind this manager owns
    pub fn category(&self) -> Category {
        self.category
    }

    /// Lease an entity from the pool and bring it live
    ///
    /// Rejects with no side effects when the active cap is reached. On
    /// success the entity is reset from `params`, registered with the
    /// collision registry, added to the active set, and announced on the
    /// bus.
    pub fn spawn(
        &mut self,
        params: &T::SpawnParams,
        registry: &mut CollisionRegistry,
        bus: &EventBus,
    ) -> Result<EntityKey, SpawnError> {
        if self.active.len() >= self.config.max_active {
            return Err(SpawnError::AtCapacity {
                category: self.category,
                cap: self.config.max_active,
            });
        }

        let obj = self.pool.acquire(params)?;
        let (id, position) = {
            let entity = obj.borrow();
            let cell = entity.cell();
            cell.set_id(self.ids.allocate());
            cell.set_alive(true);
            cell.set_visible(true);
            if !registry.register(cell, self.category) {
                // Entity still spawns; it just cannot collide. The registry
                // already logged the reason.
                warn!(
                    "{:?} entity {} spawned without a collider",
                    self.category,
                    cell.id().raw()
                );
            }
            (cell.id(), cell.position())
        };

        let key = self.active.insert(Rc::clone(&obj));
        self.by_id.insert(id, key);
        bus.emit(&GameEvent::EntitySpawned {
            id,
            category: self.category,
            position,
        });
        Ok(key)
    }

    /// Advance every active entity by `dt`
    ///
    /// Order within the tick: first drain destructions deferred from last
    /// tick's collision events, then integrate kinematics, then destroy
    /// entities whose lifetime or bounds condition triggered — all through
    /// the single destroy path.
    pub fn update(&mut self, dt: f32, registry: &mut CollisionRegistry, bus: &EventBus) {
        self.flush_pending(registry, bus);

        let mut doomed: Vec<(EntityKey, DestroyCause)> = Vec::new();
        for (key, obj) in &self.active {
            let mut entity = obj.borrow_mut();
            if !entity.cell().is_alive() {
                continue;
            }
            entity.integrate(dt);
            if entity.is_expired() {
                doomed.push((key, DestroyCause::Expired));
            } else if !self.bounds.contains(entity.cell().position()) {
                doomed.push((key, DestroyCause::OutOfBounds));
            }
        }
        for (key, cause) in doomed {
            self.destroy(key, cause, None, registry, bus);
        }
    }

    /// The single authorized destroy path; idempotent
    ///
    /// A stale or already-destroyed key is a logged no-op: no duplicate
    /// event, no double release. Otherwise the entity is unregistered,
    /// announced, hidden, and returned to the pool.
    pub fn destroy(
        &mut self,
        key: EntityKey,
        cause: DestroyCause,
        impact: Option<Vec3>,
        registry: &mut CollisionRegistry,
        bus: &EventBus,
    ) {
        let Some(obj) = self.active.remove(key) else {
            debug!("destroy of inactive {:?} entity ignored", self.category);
            return;
        };

        let (id, position, score_value) = {
            let entity = obj.borrow();
            let cell = entity.cell();
            cell.set_alive(false);
            registry.unregister(cell, self.category);
            cell.set_visible(false);
            let score_value = (cause == DestroyCause::Collision).then(|| entity.score_value());
            (cell.id(), cell.position(), score_value)
        };
        self.by_id.remove(&id);

        bus.emit(&GameEvent::EntityDestroyed {
            id,
            category: self.category,
            position,
            cause,
            impact,
            score_value,
        });
        self.pool.release(&obj);
    }

    /// Collision response: the sole trigger for collision-caused destruction
    ///
    /// Marks the involved entity of this kind dead immediately (so no later
    /// consumer or pair acts on it again this tick) and queues the actual
    /// destruction for the next tick's drain point.
    pub fn on_collision(&mut self, event: &CollisionEvent) {
        for cell in [&event.first, &event.second] {
            if cell.category() != self.category {
                continue;
            }
            if !cell.is_alive() {
                debug!(
                    "collision for already-dead {:?} entity {} ignored",
                    self.category,
                    cell.id().raw()
                );
                continue;
            }
            let Some(&key) = self.by_id.get(&cell.id()) else {
                continue;
            };
            cell.set_alive(false);
            self.pending.push(PendingDestroy {
                key,
                cause: DestroyCause::Collision,
                impact: Some(event.contact),
            });
        }
    }

    /// Destroy every active entity (level reset, session teardown)
    pub fn despawn_all(&mut self, registry: &mut CollisionRegistry, bus: &EventBus) {
        self.pending.clear();
        let keys: Vec<EntityKey> = self.active.keys().collect();
        for key in keys {
            self.destroy(key, DestroyCause::Manual, None, registry, bus);
        }
    }

    /// Currently active entities of this kind
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Destructions queued for the next drain point
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Shared cell of an active entity, if the key is still live
    pub fn cell(&self, key: EntityKey) -> Option<Rc<EntityCell>> {
        self.active.get(key).map(|obj| Rc::clone(obj.borrow().cell()))
    }

    /// Read-only view of the pool (diagnostics and tests)
    pub fn pool(&self) -> &ObjectPool<T> {
        &self.pool
    }

    fn flush_pending(&mut self, registry: &mut CollisionRegistry, bus: &EventBus) {
        let pending = std::mem::take(&mut self.pending);
        for entry in pending {
            self.destroy(entry.key, entry.cause, entry.impact, registry, bus);
        }
    }
}
