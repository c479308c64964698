//! Static table definitions
//!
//! Field names follow the JSON tables (camelCase). Every optional field has
//! the default the simulation assumes when a table leaves it out.

use serde::{Deserialize, Serialize};

fn one() -> u32 {
    1
}

fn one_f32() -> f32 {
    1.0
}

fn default_max_hp() -> f32 {
    10.0
}

fn default_enemy_speed() -> f32 {
    50.0
}

fn default_collision_radius() -> f32 {
    12.0
}

fn default_spawn_area() -> String {
    "random".to_string()
}

fn default_adds_radius() -> f32 {
    140.0
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Bullet emission geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Ring,
    Fan,
    AimedSingle,
    AimedBurst,
    Spiral,
    Rain,
}

/// A named bullet pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PatternKind,
    #[serde(default = "one")]
    pub bullet_count: u32,
    /// Total fan spread (degrees)
    #[serde(default)]
    pub spread_angle: f32,
    /// Spiral step between consecutive bullets (degrees)
    #[serde(default)]
    pub angle_step: Option<f32>,
    /// Delay between burst shots (ms)
    #[serde(default)]
    pub burst_interval: Option<f32>,
    /// Bullet speed before multipliers (px/s)
    #[serde(default)]
    pub base_speed: Option<f32>,
    #[serde(default)]
    pub aim_at_player: bool,
    /// Per-bullet angular jitter bound (degrees)
    #[serde(default)]
    pub random_offset: f32,
}

impl PatternDef {
    /// Bullets per call, never zero
    pub fn count(&self) -> u32 {
        self.bullet_count.max(1)
    }
}

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// Raw modifier parameters; which ones matter depends on the modifier id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierParams {
    pub start_scale: Option<f32>,
    pub end_scale: Option<f32>,
    pub duration: Option<f32>,
    pub amplitude_deg: Option<f32>,
    pub period: Option<f32>,
    pub lifespan: Option<f32>,
    pub delay: Option<f32>,
    pub angle_offset_deg: Option<f32>,
    pub turn_interval: Option<f32>,
    pub turn_amount_deg: Option<f32>,
}

/// A named bullet modifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierDef {
    pub id: String,
    #[serde(default)]
    pub params: ModifierParams,
}

// ---------------------------------------------------------------------------
// Enemies and boss scripts
// ---------------------------------------------------------------------------

/// Enemy template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyType {
    #[default]
    Normal,
    Boss,
}

/// Base angle selection for a scripted boss attack
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AngleSpec {
    /// Pattern default (straight up)
    #[default]
    Default,
    Fixed {
        deg: f32,
    },
    /// Uniform in [0, 360] on each firing
    Random,
    /// Starts at `start`, advances by `step` after each firing (mod 360)
    Rotating {
        start: f32,
        step: f32,
    },
}

/// One pattern firing performed by a boss timer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAttack {
    pub pattern_id: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub angle: AngleSpec,
    #[serde(default)]
    pub speed_cap_factor: Option<f32>,
    #[serde(default)]
    pub tint: Option<u32>,
}

/// Attack performed each time a phase timer fires
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "attack", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Attack {
    Pattern(PatternAttack),
    /// Cycles through the list, one entry per firing
    Alternate { attacks: Vec<PatternAttack> },
    /// Reinforcements on a ring around the boss
    Adds {
        enemy_id: String,
        count: u32,
        #[serde(default = "default_adds_radius")]
        radius: f32,
    },
}

impl Attack {
    /// Pattern ids this attack may fire
    pub fn pattern_ids(&self) -> Vec<&str> {
        match self {
            Attack::Pattern(p) => vec![p.pattern_id.as_str()],
            Attack::Alternate { attacks } => attacks.iter().map(|a| a.pattern_id.as_str()).collect(),
            Attack::Adds { .. } => Vec::new(),
        }
    }

    /// Enemy ids this attack may spawn
    pub fn enemy_ids(&self) -> Vec<&str> {
        match self {
            Attack::Adds { enemy_id, .. } => vec![enemy_id.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Step executed when a boss phase is entered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PhaseStep {
    /// Repeating attack timer
    Every { interval_ms: f32, attack: Attack },
    /// Reinforcements placed on a ring around the boss
    SpawnAdds {
        enemy_id: String,
        count: u32,
        #[serde(default = "default_adds_radius")]
        radius: f32,
        #[serde(default)]
        delay_ms: Option<f32>,
    },
    /// Presentation signal for the last phase of a fight
    FinalPhase,
}

/// Boss phase: hp-ratio band plus entry steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDef {
    pub id: String,
    #[serde(default)]
    pub min_ratio: f32,
    #[serde(default = "one_f32")]
    pub max_ratio: f32,
    #[serde(default)]
    pub on_enter: Vec<PhaseStep>,
}

/// Enemy (or boss) template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyTemplate {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: EnemyType,
    #[serde(default = "default_max_hp")]
    pub max_hp: f32,
    #[serde(default = "default_enemy_speed")]
    pub speed: f32,
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f32,
    #[serde(default = "one_f32")]
    pub exp_reward: f32,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub base_pattern_id: Option<String>,
    #[serde(default)]
    pub sub_pattern_id: Option<String>,
    #[serde(default = "one_f32")]
    pub bullet_speed_multiplier: f32,
    /// Regular enemies with an interval fire their next pattern on it
    #[serde(default)]
    pub fire_interval_ms: Option<f32>,
    /// Core currency granted when this enemy dies (bosses)
    #[serde(default)]
    pub core_reward: u32,
    #[serde(default)]
    pub phases: Vec<PhaseDef>,
}

impl EnemyTemplate {
    pub fn is_boss(&self) -> bool {
        self.kind == EnemyType::Boss
    }
}

// ---------------------------------------------------------------------------
// Waves
// ---------------------------------------------------------------------------

/// Wave clear condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveKind {
    /// Completes when the time limit runs out
    Survive,
    /// Completes when nothing is pending and nothing is alive
    KillAll,
}

/// One scheduled group inside a wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnEntry {
    pub enemy_id: String,
    /// Seconds after wave start
    #[serde(default)]
    pub delay: f32,
    #[serde(default = "one")]
    pub count: u32,
    /// Area token; `/` separates alternatives picked per spawn
    #[serde(default = "default_spawn_area")]
    pub spawn_area: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveDef {
    pub number: u32,
    #[serde(rename = "type")]
    pub kind: WaveKind,
    /// Seconds (survive waves)
    #[serde(default)]
    pub time_limit: f32,
    #[serde(default)]
    pub spawns: Vec<SpawnEntry>,
}

// ---------------------------------------------------------------------------
// Perks
// ---------------------------------------------------------------------------

/// Numeric effects of a perk; absent keys do nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkEffects {
    pub move_speed_multiplier: Option<f32>,
    pub dash_cooldown_multiplier: Option<f32>,
    pub dash_max_stock_delta: Option<u32>,
    pub slow_hitbox_scale: Option<f32>,
    pub dash_on_hit: Option<bool>,
    pub hp_increase: Option<u32>,
    pub attack_multiplier: Option<f32>,
    pub shot_spread_bonus: Option<f32>,
    pub exp_multiplier: Option<f32>,
    pub bullet_cap_scale: Option<f32>,
    pub modifier_candidate_bonus: Option<u32>,
    pub enemy_bullet_speed_multiplier: Option<f32>,
    pub enemy_bullet_life_delta: Option<f32>,
    pub homing_weakening: Option<f32>,
    pub split_child_delta: Option<f32>,
    pub rain_speed_multiplier: Option<f32>,
    pub core_bonus: Option<f32>,
}

/// Meta unlock group a perk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerkSet {
    A,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkDef {
    pub id: String,
    #[serde(default = "one")]
    pub max_stack: u32,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub requires_meta: Option<PerkSet>,
    #[serde(default)]
    pub effects: PerkEffects,
}

// ---------------------------------------------------------------------------
// Meta upgrades
// ---------------------------------------------------------------------------

/// Upgrade price: flat, or one entry per level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpgradeCost {
    Flat(u32),
    PerLevel(Vec<u32>),
}

impl UpgradeCost {
    /// Price of buying the level after `level`
    pub fn at_level(&self, level: u32) -> u32 {
        match self {
            UpgradeCost::Flat(cost) => *cost,
            UpgradeCost::PerLevel(costs) => costs
                .get(level as usize)
                .or(costs.last())
                .copied()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaUpgradeDef {
    pub id: String,
    pub cost: UpgradeCost,
    #[serde(default = "one")]
    pub max_level: u32,
    #[serde(default)]
    pub requires: Vec<String>,
}
