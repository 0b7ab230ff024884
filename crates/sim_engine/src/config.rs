//! Configuration system
//!
//! All tunables for a session — world bounds, per-kind pool and cap
//! settings, player rules, the collision matrix — in one serializable
//! tree, loadable from TOML or RON.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::collision::CollisionMatrix;
use crate::foundation::math::WorldBounds;
use crate::lifecycle::LifecycleConfig;
use crate::pool::PoolConfig;

/// Configuration trait
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        // Reject unknown formats before touching the filesystem.
        if !path.ends_with(".toml") && !path.ends_with(".ron") {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        }

        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Player tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Collision radius of the ship
    pub radius: f32,
    /// Health per life
    pub health: u32,
    /// Lives per game
    pub lives: u32,
    /// Damage grace after taking a hit, in seconds
    pub hit_grace_secs: f32,
    /// Damage grace granted by a powerup, in seconds
    pub powerup_grace_secs: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            health: 3,
            lives: 3,
            hit_grace_secs: 2.0,
            powerup_grace_secs: 5.0,
        }
    }
}

/// Bullet tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletConfig {
    /// Lifecycle cap and pool policy
    pub lifecycle: LifecycleConfig,
    /// Collision radius
    pub radius: f32,
    /// Muzzle speed, units per second
    pub speed: f32,
    /// Flight time before expiry, in seconds
    pub lifetime: f32,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig {
                max_active: 64,
                pool: PoolConfig {
                    initial: 32,
                    auto_expand: true,
                    expand_amount: 8,
                    max_idle: 64,
                },
            },
            radius: 2.0,
            speed: 600.0,
            lifetime: 1.5,
        }
    }
}

/// Asteroid tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsteroidConfig {
    /// Lifecycle cap and pool policy
    pub lifecycle: LifecycleConfig,
}

impl Default for AsteroidConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig {
                max_active: 32,
                pool: PoolConfig {
                    initial: 16,
                    auto_expand: true,
                    expand_amount: 4,
                    max_idle: 32,
                },
            },
        }
    }
}

/// Powerup tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerupConfig {
    /// Lifecycle cap and pool policy
    pub lifecycle: LifecycleConfig,
    /// Pickup radius
    pub radius: f32,
    /// Seconds an uncollected pickup stays in the world
    pub lifetime: f32,
}

impl Default for PowerupConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig {
                max_active: 4,
                pool: PoolConfig {
                    initial: 4,
                    auto_expand: false,
                    expand_amount: 0,
                    max_idle: 4,
                },
            },
            radius: 8.0,
            lifetime: 10.0,
        }
    }
}

/// Top-level session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Playfield bounds for out-of-bounds culling
    pub world: WorldBounds,
    /// Player tunables
    pub player: PlayerConfig,
    /// Bullet tunables
    pub bullets: BulletConfig,
    /// Asteroid tunables
    pub asteroids: AsteroidConfig,
    /// Powerup tunables
    pub powerups: PowerupConfig,
    /// Snapshots kept in the state store's history ring
    pub history_capacity: usize,
    /// Which categories are tested against which
    pub matrix: CollisionMatrix,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world: WorldBounds::default(),
            player: PlayerConfig::default(),
            bullets: BulletConfig::default(),
            asteroids: AsteroidConfig::default(),
            powerups: PowerupConfig::default(),
            history_capacity: 32,
            matrix: CollisionMatrix::classic(),
        }
    }
}

impl Config for SimConfig {}
