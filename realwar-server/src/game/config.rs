//! Arena Configuration
//!
//! Every tunable of the simulation lives here. `Default` values reproduce
//! the classic RealWar rules; any subset can be overridden from JSON.

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::geometry::Wall;
use crate::game::state::BonusKind;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for `ArenaConfig`
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values parsed but are unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// SUB-CONFIGS
// =============================================================================

/// What happens to a navigation target when the next step is blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedMovePolicy {
    /// Keep the target; the player presses against the wall
    #[default]
    Hold,
    /// Drop the target
    Abort,
}

/// Player movement tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Distance travelled toward the target per tick
    pub speed: f32,
    /// Distance covered by one nudge
    pub nudge_step: f32,
    /// Handling of wall-blocked target moves
    pub blocked_policy: BlockedMovePolicy,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 4.0,
            nudge_step: 4.0,
            blocked_policy: BlockedMovePolicy::Hold,
        }
    }
}

/// Safe-position sampling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Samples drawn before falling back
    pub attempts: u32,
    /// Distance kept from the arena edge
    pub margin: f32,
    /// Radius used for the wall test while sampling
    pub probe_radius: f32,
    /// Returned when every sample hit a wall
    pub fallback: Vec2,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            attempts: 100,
            margin: 20.0,
            probe_radius: 25.0,
            fallback: Vec2::new(100.0, 100.0),
        }
    }
}

/// Wall layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Generate walls from the RNG instead of using `fixed`
    pub procedural: bool,
    /// Seed for the procedural layout (round seed when absent)
    pub seed: Option<u64>,
    /// Number of procedural walls
    pub count: u32,
    /// Range of the left edge
    pub x_range: (f32, f32),
    /// Range of the top edge
    pub y_range: (f32, f32),
    /// Range of width and height
    pub size_range: (f32, f32),
    /// Layout used when `procedural` is false
    pub fixed: Vec<Wall>,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            procedural: true,
            seed: None,
            count: 20,
            x_range: (50.0, 1650.0),
            y_range: (50.0, 750.0),
            size_range: (80.0, 200.0),
            fixed: crate::game::geometry::default_fixed_layout(),
        }
    }
}

/// One row of the weighted bonus table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BonusTier {
    /// Bonus kind
    pub kind: BonusKind,
    /// Relative weight
    pub weight: u32,
    /// Units granted on pickup
    pub amount: u32,
}

/// Bonus spawning and pickup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    /// Ticks between spawns
    pub interval_ticks: u32,
    /// Live bonus cap
    pub max_live: u32,
    /// Pickup distance from the player's center
    pub pickup_radius: f32,
    /// Weighted kind table
    pub table: Vec<BonusTier>,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 15,
            max_live: 200,
            pickup_radius: 20.0,
            table: vec![
                BonusTier { kind: BonusKind::Gold, weight: 1, amount: 50 },
                BonusTier { kind: BonusKind::Brown, weight: 7, amount: 25 },
                BonusTier { kind: BonusKind::Red, weight: 12, amount: 5 },
                BonusTier { kind: BonusKind::Blue, weight: 30, amount: 2 },
                BonusTier { kind: BonusKind::Green, weight: 50, amount: 1 },
            ],
        }
    }
}

/// Projectile tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Distance travelled per tick
    pub speed: f32,
    /// Units paid by the firer
    pub cost: u32,
    /// Firer needs strictly more units than this
    pub min_units: u32,
    /// Units granted to the firer on hit
    pub hit_reward: u32,
    /// Units removed from the target on hit
    pub hit_damage: u32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            cost: 1,
            min_units: 1,
            hit_reward: 5,
            hit_damage: 5,
        }
    }
}

/// Mine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MineConfig {
    /// Units paid by the placer
    pub cost: u32,
    /// Placer needs at least this many units
    pub min_units: u32,
    /// Ticks before an untriggered mine expires
    pub lifetime_ticks: u32,
    /// Trigger distance from the mine's center
    pub trigger_radius: f32,
    /// Units moved from victim to owner
    pub damage: u32,
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            cost: 2,
            min_units: 3,
            lifetime_ticks: 900,
            trigger_radius: 20.0,
            damage: 20,
        }
    }
}

// =============================================================================
// ARENA CONFIG
// =============================================================================

/// Complete arena configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena width
    pub width: f32,
    /// Arena height
    pub height: f32,
    /// Simulation rate (Hz)
    pub tick_rate: u32,
    /// Lobby countdown once everyone is ready
    pub countdown_secs: u32,
    /// Units given on join
    pub starting_units: u32,
    /// Units needed to win
    pub win_units: u32,
    /// Radius at zero units
    pub base_radius: f32,
    /// Radius growth per unit
    pub growth_factor: f32,
    /// Share of the loser's units taken on absorption
    pub absorption_fraction: f32,
    /// Players at or below this many units are eliminated
    pub lethal_floor: u32,
    /// Movement tuning
    pub movement: MovementConfig,
    /// Safe-position sampling
    pub spawn: SpawnConfig,
    /// Wall layout
    pub walls: WallConfig,
    /// Bonuses
    pub bonus: BonusConfig,
    /// Projectiles
    pub projectile: ProjectileConfig,
    /// Mines
    pub mine: MineConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 960.0,
            tick_rate: crate::TICK_RATE,
            countdown_secs: 15,
            starting_units: 10,
            win_units: 500,
            base_radius: 10.0,
            growth_factor: 0.002,
            absorption_fraction: 0.25,
            lethal_floor: 0,
            movement: MovementConfig::default(),
            spawn: SpawnConfig::default(),
            walls: WallConfig::default(),
            bonus: BonusConfig::default(),
            projectile: ProjectileConfig::default(),
            mine: MineConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Radius of a player holding `units`.
    #[inline]
    pub fn radius(&self, units: u32) -> f32 {
        self.base_radius * (1.0 + units as f32 * self.growth_factor)
    }

    /// Parse from a JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.width > 0.0 && self.height > 0.0) {
            return invalid("arena dimensions must be positive");
        }
        if self.width <= 2.0 * self.spawn.margin || self.height <= 2.0 * self.spawn.margin {
            return invalid("spawn margin leaves no room in the arena");
        }
        if self.tick_rate == 0 {
            return invalid("tick_rate must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.absorption_fraction) {
            return invalid("absorption_fraction must be within [0, 1]");
        }
        if self.base_radius <= 0.0 || self.growth_factor < 0.0 {
            return invalid("radius parameters must be positive");
        }
        if self.movement.speed <= 0.0 || self.movement.nudge_step <= 0.0 {
            return invalid("movement distances must be positive");
        }
        if self.bonus.interval_ticks == 0 {
            return invalid("bonus interval must be non-zero");
        }
        if self.bonus.table.iter().map(|t| t.weight).sum::<u32>() == 0 {
            return invalid("bonus table needs a positive total weight");
        }
        if self.win_units <= self.starting_units {
            return invalid("win_units must exceed starting_units");
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
