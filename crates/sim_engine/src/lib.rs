//! # Sim Engine
//!
//! The entity lifecycle and collision core for an asteroids-style arcade
//! game. Rendering, audio, and input live elsewhere; this crate owns the
//! machinery they sit on top of:
//!
//! - **Object pools**: transient entities (bullets, asteroids, powerups)
//!   are recycled across frames instead of reallocated (GEA 6.2).
//! - **Collision registry**: category-tagged broad-phase sphere tests
//!   driven by a data-defined collision matrix (GEA 13.3).
//! - **Lifecycle managers**: one per entity kind, owning spawn, kinematic
//!   update, and the single authoritative destroy path.
//! - **Event bus**: synchronous publish/subscribe with per-handler failure
//!   isolation (GEA 16.8).
//! - **State store**: a reducer-driven state tree with a bounded history
//!   ring and re-entrancy protection.
//!
//! All of it is composed by [`session::GameSession`], the single world
//! object that replaces ambient singletons with explicitly owned instances.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sim_engine::prelude::*;
//!
//! fn main() {
//!     sim_engine::foundation::logging::init();
//!     let mut session = GameSession::new(SimConfig::default());
//!     session.start();
//!     session.spawn_asteroid(Vec3::new(200.0, 0.0, 0.0), Vec3::new(-40.0, 0.0, 0.0), 20.0, 100)
//!         .expect("asteroid spawn");
//!     for _ in 0..600 {
//!         session.tick(1.0 / 60.0);
//!     }
//!     session.teardown();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;

pub mod collision;
pub mod config;
pub mod entity;
pub mod events;
pub mod lifecycle;
pub mod pool;
pub mod session;
pub mod store;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        collision::{CollisionMatrix, CollisionRegistry},
        config::{Config, SimConfig},
        entity::{Category, DestroyCause, EntityCell, EntityId},
        events::{EventBus, EventKind, GameEvent, SubscriptionId},
        foundation::math::{Vec3, WorldBounds},
        lifecycle::{EntityKey, EntityLifecycleManager, SpawnError},
        pool::{ObjectPool, PoolConfig, PoolError},
        session::GameSession,
        store::{Action, GamePhase, GameState, StateStore},
    };
}
