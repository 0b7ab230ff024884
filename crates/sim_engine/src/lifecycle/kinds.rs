//! Concrete pooled entity kinds: bullets, asteroids, powerups
//!
//! Each kind pairs a shared [`EntityCell`] with the kinematic state its
//! manager owns exclusively. Spawn parameters are validated in `reset` so
//! a bad spawn surfaces as a pool error instead of a NaN drifting through
//! the collision scan.

use std::rc::Rc;

use crate::entity::{Category, EntityCell};
use crate::foundation::math::{is_finite, Vec3};
use crate::pool::{ResetError, Reusable};

use super::Simulated;

fn validate_finite(name: &str, v: Vec3) -> Result<(), ResetError> {
    if is_finite(v) {
        Ok(())
    } else {
        Err(ResetError(format!("non-finite spawn {name}: {v:?}")))
    }
}

/// Spawn parameters for a bullet
#[derive(Debug, Clone)]
pub struct BulletParams {
    /// Muzzle position
    pub position: Vec3,
    /// Full velocity vector (direction times speed)
    pub velocity: Vec3,
}

/// A player projectile: fixed radius, straight flight, short lifetime
#[derive(Debug)]
pub struct Bullet {
    cell: Rc<EntityCell>,
    radius: f32,
    lifetime: f32,
    velocity: Vec3,
    age: f32,
}

impl Bullet {
    /// Construct a pooled bullet; brought live by `reset`
    pub fn new(radius: f32, lifetime: f32) -> Self {
        Self {
            cell: Rc::new(EntityCell::new(Category::Bullet)),
            radius,
            lifetime,
            velocity: Vec3::zeros(),
            age: 0.0,
        }
    }
}

impl Reusable for Bullet {
    type SpawnParams = BulletParams;

    fn reset(&mut self, params: &BulletParams) -> Result<(), ResetError> {
        validate_finite("position", params.position)?;
        validate_finite("velocity", params.velocity)?;
        self.cell.set_position(params.position);
        self.cell.set_radius(self.radius);
        self.velocity = params.velocity;
        self.age = 0.0;
        Ok(())
    }
}

impl Simulated for Bullet {
    fn cell(&self) -> &Rc<EntityCell> {
        &self.cell
    }

    fn integrate(&mut self, dt: f32) {
        self.cell
            .set_position(self.cell.position() + self.velocity * dt);
        self.age += dt;
    }

    fn is_expired(&self) -> bool {
        self.lifetime > 0.0 && self.age >= self.lifetime
    }

    fn score_value(&self) -> u32 {
        0
    }
}

/// Spawn parameters for an asteroid
#[derive(Debug, Clone)]
pub struct AsteroidParams {
    /// Spawn position
    pub position: Vec3,
    /// Drift velocity
    pub velocity: Vec3,
    /// Collision radius (asteroids come in sizes)
    pub radius: f32,
    /// Points awarded when shot down
    pub score_value: u32,
}

/// A drifting obstacle; lives until something destroys it
#[derive(Debug)]
pub struct Asteroid {
    cell: Rc<EntityCell>,
    velocity: Vec3,
    score_value: u32,
}

impl Asteroid {
    /// Construct a pooled asteroid; brought live by `reset`
    pub fn new() -> Self {
        Self {
            cell: Rc::new(EntityCell::new(Category::Asteroid)),
            velocity: Vec3::zeros(),
            score_value: 0,
        }
    }
}

impl Default for Asteroid {
    fn default() -> Self {
        Self::new()
    }
}

impl Reusable for Asteroid {
    type SpawnParams = AsteroidParams;

    fn reset(&mut self, params: &AsteroidParams) -> Result<(), ResetError> {
        validate_finite("position", params.position)?;
        validate_finite("velocity", params.velocity)?;
        if !params.radius.is_finite() || params.radius <= 0.0 {
            return Err(ResetError(format!(
                "invalid asteroid radius: {}",
                params.radius
            )));
        }
        self.cell.set_position(params.position);
        self.cell.set_radius(params.radius);
        self.velocity = params.velocity;
        self.score_value = params.score_value;
        Ok(())
    }
}

impl Simulated for Asteroid {
    fn cell(&self) -> &Rc<EntityCell> {
        &self.cell
    }

    fn integrate(&mut self, dt: f32) {
        self.cell
            .set_position(self.cell.position() + self.velocity * dt);
    }

    fn is_expired(&self) -> bool {
        // Asteroids never time out; only bounds or collisions remove them.
        false
    }

    fn score_value(&self) -> u32 {
        self.score_value
    }
}

/// Spawn parameters for a powerup
#[derive(Debug, Clone)]
pub struct PowerupParams {
    /// Where the pickup appears
    pub position: Vec3,
}

/// A stationary pickup that despawns if nobody collects it
#[derive(Debug)]
pub struct Powerup {
    cell: Rc<EntityCell>,
    radius: f32,
    lifetime: f32,
    age: f32,
}

impl Powerup {
    /// Construct a pooled powerup; brought live by `reset`
    pub fn new(radius: f32, lifetime: f32) -> Self {
        Self {
            cell: Rc::new(EntityCell::new(Category::Powerup)),
            radius,
            lifetime,
            age: 0.0,
        }
    }
}

impl Reusable for Powerup {
    type SpawnParams = PowerupParams;

    fn reset(&mut self, params: &PowerupParams) -> Result<(), ResetError> {
        validate_finite("position", params.position)?;
        self.cell.set_position(params.position);
        self.cell.set_radius(self.radius);
        self.age = 0.0;
        Ok(())
    }
}

impl Simulated for Powerup {
    fn cell(&self) -> &Rc<EntityCell> {
        &self.cell
    }

    fn integrate(&mut self, dt: f32) {
        self.age += dt;
    }

    fn is_expired(&self) -> bool {
        self.lifetime > 0.0 && self.age >= self.lifetime
    }

    fn score_value(&self) -> u32 {
        0
    }
}
