//! Generic object pool for transient game entities
//!
//! Bullets and asteroids churn every frame; allocating them per spawn is
//! wasted work and fragments the heap (GEA 6.2: pool allocation for
//! same-sized objects). The pool keeps two disjoint sets, `available` and
//! `in_use`; every live object is in exactly one of them at all times.
//!
//! Failure policy: if re-initializing a recycled object fails, the pool
//! logs it, constructs one fresh instance and retries. If the retry also
//! fails the `acquire` call returns [`PoolError::ResetFailed`] — a
//! malformed object is never handed to the caller.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use thiserror::Error;

use serde::{Deserialize, Serialize};

/// Error returned by a [`Reusable::reset`] implementation
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResetError(pub String);

/// Errors surfaced by pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    /// Reset failed for a recycled object and again for a fresh one
    #[error("object reset failed after retry with a fresh instance: {0}")]
    ResetFailed(ResetError),
}

/// Re-initialization hook for pooled objects
///
/// Called every time an object is leased out, so a recycled object is
/// indistinguishable from a freshly constructed one.
pub trait Reusable {
    /// Spawn parameters applied on each lease
    type SpawnParams;

    /// Reset this object from fresh spawn parameters
    fn reset(&mut self, params: &Self::SpawnParams) -> Result<(), ResetError>;
}

/// Growth and capacity policy for an [`ObjectPool`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of objects constructed eagerly at pool creation
    pub initial: usize,
    /// Whether an empty pool grows itself on `acquire`
    pub auto_expand: bool,
    /// How many objects an automatic expansion constructs
    pub expand_amount: usize,
    /// Idle objects kept around; releases beyond this are discarded
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial: 8,
            auto_expand: true,
            expand_amount: 4,
            max_idle: 64,
        }
    }
}

/// A reuse container that amortizes construction cost across ticks
///
/// Objects are handed out as `Rc<RefCell<T>>` leases; the pool keeps a
/// second reference so `release` can verify the object actually belongs to
/// its `in_use` set (guarding against double release).
pub struct ObjectPool<T> {
    factory: Box<dyn FnMut() -> T>,
    available: Vec<Rc<RefCell<T>>>,
    in_use: Vec<Rc<RefCell<T>>>,
    config: PoolConfig,
}

impl<T: Reusable> ObjectPool<T> {
    /// Create a pool and pre-warm it with `config.initial` objects
    pub fn new(config: PoolConfig, factory: impl FnMut() -> T + 'static) -> Self {
        let mut pool = Self {
            factory: Box::new(factory),
            available: Vec::new(),
            in_use: Vec::new(),
            config,
        };
        let initial = pool.config.initial;
        pool.expand(initial);
        pool
    }

    /// Lease an object, resetting it from `params`
    ///
    /// Pops from `available`, auto-expanding first when enabled; an empty
    /// pool with expansion disabled constructs a single object ad hoc. The
    /// returned object is never simultaneously referenced by `available`.
    pub fn acquire(&mut self, params: &T::SpawnParams) -> Result<Rc<RefCell<T>>, PoolError> {
        if self.available.is_empty() && self.config.auto_expand {
            let amount = self.config.expand_amount.max(1);
            debug!("pool empty, auto-expanding by {amount}");
            self.expand(amount);
        }
        let obj = match self.available.pop() {
            Some(obj) => obj,
            None => Rc::new(RefCell::new((self.factory)())),
        };

        if let Err(err) = obj.borrow_mut().reset(params) {
            // The recycled object may be in a bad state; discard it and try
            // once more with a brand new instance.
            warn!("pool reset failed ({err}), retrying with a fresh instance");
            let fresh = Rc::new(RefCell::new((self.factory)()));
            fresh
                .borrow_mut()
                .reset(params)
                .map_err(PoolError::ResetFailed)?;
            self.in_use.push(Rc::clone(&fresh));
            return Ok(fresh);
        }

        self.in_use.push(Rc::clone(&obj));
        Ok(obj)
    }

    /// Return a leased object to the pool
    ///
    /// A no-op (logged at debug level) if the object is not currently in
    /// `in_use`, so double release cannot corrupt the sets. Objects released
    /// while `available` already holds `max_idle` entries are discarded for
    /// good.
    pub fn release(&mut self, obj: &Rc<RefCell<T>>) {
        let Some(index) = self.in_use.iter().position(|o| Rc::ptr_eq(o, obj)) else {
            debug!("release of an object not leased from this pool ignored");
            return;
        };
        let obj = self.in_use.swap_remove(index);
        if self.available.len() >= self.config.max_idle {
            debug!("pool idle capacity reached, discarding released object");
        } else {
            self.available.push(obj);
        }
    }

    /// Eagerly construct `n` objects; returns the new available count
    ///
    /// Used internally by auto-expansion and externally as a pre-warm call.
    pub fn expand(&mut self, n: usize) -> usize {
        for _ in 0..n {
            self.available.push(Rc::new(RefCell::new((self.factory)())));
        }
        self.available.len()
    }

    /// Objects currently waiting in the pool
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Objects currently leased out
    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }
}
