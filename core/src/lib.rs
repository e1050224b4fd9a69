#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Flag War engine.
//!
//! This crate defines the message surface that connects the host plugin
//! adapter, the authoritative attack registry, and pure systems. Adapters
//! submit [`Command`] values describing desired mutations, the world executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values for adapters and systems to react to. Collaborators owned by the
//! host (towns, economy, blocks, notifications) are reached only through the
//! traits in [`host`].

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod host;
#[cfg(any(test, feature = "memory_host"))]
pub mod memory;

/// Canonical banner logged when the plugin boots.
pub const STARTUP_BANNER: &str = "Flag War attack engine";

/// Commands that express all permissible registry mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replaces the rules that govern new and running attacks.
    ConfigureRules {
        /// Rules the world should adopt.
        rules: AttackRules,
    },
    /// Advances the attack clock by the provided delta time.
    Tick {
        /// Duration of time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Registers an admitted attack anchored at the flag base block.
    RegisterAttack {
        /// Player who placed the flag.
        attacker: PlayerName,
        /// Block the flag base occupies. The contested cell is derived from it.
        flag_base: BlockPos,
    },
    /// Resolves an active attack in favour of the defenders.
    DefendAttack {
        /// Cell whose timer marker was destroyed.
        cell: Cell,
        /// Player credited with the defence, if any.
        defender: Option<PlayerName>,
    },
    /// Cancels a single attack.
    CancelAttack {
        /// Cell whose attack should end.
        cell: Cell,
        /// Why the attack ends.
        reason: CancelReason,
    },
    /// Cancels every attack owned by a player.
    CancelAttacksBy {
        /// Player whose flags should be withdrawn.
        attacker: PlayerName,
        /// Why the attacks end.
        reason: CancelReason,
    },
    /// Cancels every live attack, draining the registry.
    CancelAllAttacks {
        /// Why the attacks end.
        reason: CancelReason,
    },
    /// Records that a town was flagged at the provided clock reading.
    RecordTownFlagged {
        /// Town that was flagged.
        town: TownId,
        /// Clock reading of the flagging.
        at: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the attack clock advanced.
    TimeAdvanced {
        /// Duration of time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that new rules are in effect.
    RulesConfigured,
    /// Confirms that an attack was registered and its countdown started.
    AttackStarted {
        /// Cell under attack.
        cell: Cell,
        /// Player who placed the flag.
        attacker: PlayerName,
        /// Block the flag base occupies.
        flag_base: BlockPos,
        /// Clock reading at which the attacker wins.
        deadline: Duration,
    },
    /// Reports that the countdown of an attack moved to its next phase.
    CountdownAdvanced {
        /// Cell under attack.
        cell: Cell,
        /// Zero-based countdown phase now displayed.
        phase: u32,
        /// Time left until the deadline.
        remaining: Duration,
    },
    /// Announces that the attacker held the flag until the deadline.
    AttackWon {
        /// Cell that was captured.
        cell: Cell,
        /// Player who placed the flag.
        attacker: PlayerName,
    },
    /// Announces that the defenders destroyed the timer marker.
    AttackDefended {
        /// Cell that was defended.
        cell: Cell,
        /// Player who placed the flag.
        attacker: PlayerName,
        /// Player credited with the defence, if any.
        defender: Option<PlayerName>,
    },
    /// Announces that an attack ended without a winner.
    AttackCanceled {
        /// Cell whose attack ended.
        cell: Cell,
        /// Player who placed the flag.
        attacker: PlayerName,
        /// Why the attack ended.
        reason: CancelReason,
    },
    /// Reports that a registration request was rejected.
    AttackRejected {
        /// Cell targeted by the request.
        cell: Cell,
        /// Player who requested the attack.
        attacker: PlayerName,
        /// Specific reason the registration failed.
        reason: AttackRejection,
    },
    /// Requests that marker blocks be placed or repainted in the host world.
    MarkersPlaced {
        /// Blocks to place.
        blocks: Vec<MarkerBlock>,
    },
    /// Requests that marker blocks be removed from the host world.
    MarkersCleared {
        /// Positions to clear.
        positions: Vec<BlockPos>,
    },
    /// Confirms that a town's last-flagged reading moved forward.
    TownFlagged {
        /// Town that was flagged.
        town: TownId,
        /// Stored clock reading.
        at: Duration,
    },
}

/// Name of a player, used as the key of the per-player attack index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerName(String);

impl PlayerName {
    /// Creates a new player name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a town owned by the host domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TownId(String);

impl TownId {
    /// Creates a new town identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a nation owned by the host domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NationId(String);

impl NationId {
    /// Creates a new nation identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a single block in the host world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    world: String,
    x: i32,
    y: i32,
    z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    #[must_use]
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Name of the world containing the block.
    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// East-west coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// North-south coordinate.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the position displaced by the provided offsets.
    #[must_use]
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Contestable region of the map, keyed by world and grid coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    world: String,
    x: i32,
    z: i32,
}

impl Cell {
    /// Creates a cell from explicit grid coordinates.
    #[must_use]
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// Quantizes a block position into the cell that contains it.
    ///
    /// Coordinates are floor-divided so that negative positions land in the
    /// cell to their west or north rather than collapsing onto cell zero. A
    /// `cell_size` of zero is treated as one.
    #[must_use]
    pub fn containing(pos: &BlockPos, cell_size: u32) -> Self {
        let size = i32::try_from(cell_size.max(1)).unwrap_or(i32::MAX);
        Self {
            world: pos.world().to_owned(),
            x: pos.x().div_euclid(size),
            z: pos.z().div_euclid(size),
        }
    }

    /// Name of the world containing the cell.
    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Grid column of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Grid row of the cell.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.world, self.x, self.z)
    }
}

/// Name of a block material as understood by the host world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Material(String);

impl Material {
    /// Creates a material from its host name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the material name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Part an individual marker block plays in an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    /// Anchor block placed by the attacker.
    FlagBase,
    /// Coloured block showing the countdown; destroying it defends the cell.
    FlagTimer,
    /// Light block crowning the flag.
    FlagLight,
    /// Edge of the beacon wireframe drawn in the sky.
    BeaconWireframe,
    /// Core of the beacon, painted with the countdown colour.
    BeaconCore,
}

impl MarkerRole {
    /// Reports whether destroying this marker defends the cell.
    #[must_use]
    pub const fn is_defendable(self) -> bool {
        matches!(self, Self::FlagTimer)
    }

    /// Reports whether nobody may alter this marker while the attack runs.
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        !self.is_defendable()
    }
}

/// Marker block owned by an attack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerBlock {
    /// Where the marker sits.
    pub pos: BlockPos,
    /// Material the marker is drawn with.
    pub material: Material,
    /// Part the marker plays in the attack.
    pub role: MarkerRole,
}

/// Why an attack ended without a winner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// The plugin is shutting down.
    Shutdown,
    /// The attacker disconnected or left.
    AttackerLeft,
    /// An administrator withdrew the flag.
    Administrative,
    /// The blocks underpinning the flag are no longer valid.
    BlockInvalidated,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Shutdown => "shutdown",
            Self::AttackerLeft => "attacker left",
            Self::Administrative => "administrative override",
            Self::BlockInvalidated => "flag blocks invalidated",
        };
        f.write_str(text)
    }
}

/// Materials used to draw the flag itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagMaterials {
    /// Material of the anchor block placed by the attacker.
    pub base: Material,
    /// Material of the light crowning the flag.
    pub light: Material,
    /// Colour ladder cycled through by the timer marker, one entry per phase.
    pub timer: Vec<Material>,
}

impl FlagMaterials {
    /// Timer material shown during the provided phase.
    #[must_use]
    pub fn timer_for_phase(&self, phase: u32) -> Material {
        if self.timer.is_empty() {
            return self.base.clone();
        }
        let index = usize::try_from(phase).unwrap_or(usize::MAX) % self.timer.len();
        self.timer[index].clone()
    }

    /// Reports whether the material is drawn by any flag marker.
    #[must_use]
    pub fn contains(&self, material: &Material) -> bool {
        self.base == *material || self.light == *material || self.timer.contains(material)
    }
}

impl Default for FlagMaterials {
    fn default() -> Self {
        Self {
            base: Material::new("OAK_FENCE"),
            light: Material::new("TORCH"),
            timer: [
                "LIME_WOOL",
                "GREEN_WOOL",
                "BLUE_WOOL",
                "CYAN_WOOL",
                "LIGHT_BLUE_WOOL",
                "GRAY_WOOL",
                "WHITE_WOOL",
                "PINK_WOOL",
                "ORANGE_WOOL",
                "RED_WOOL",
            ]
            .into_iter()
            .map(Material::new)
            .collect(),
        }
    }
}

/// Shape of the beacon drawn in the sky above an attacked cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeaconRules {
    /// Half-width of the beacon cube, excluding its core.
    pub radius: u32,
    /// Minimum gap between the flag light and the bottom of the beacon.
    pub min_height_above_flag: i32,
    /// Highest buildable layer; the beacon hangs just below it.
    pub sky_height: i32,
    /// Material of the wireframe edges.
    pub wireframe: Material,
}

impl Default for BeaconRules {
    fn default() -> Self {
        Self {
            radius: 1,
            min_height_above_flag: 3,
            sky_height: 255,
            wireframe: Material::new("GLOWSTONE"),
        }
    }
}

/// Rules governing registration limits, countdown pacing, and marker drawing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackRules {
    /// Edge length of a cell in blocks.
    pub cell_size: u32,
    /// Maximum number of live attacks a single player may own.
    pub max_active_flags_per_player: usize,
    /// Time an attacker must hold the flag to capture the cell.
    pub attack_duration: Duration,
    /// Time between countdown refreshes.
    pub refresh_interval: Duration,
    /// Materials of the flag markers.
    pub flag: FlagMaterials,
    /// Beacon drawing rules, or `None` to skip the beacon.
    pub beacon: Option<BeaconRules>,
}

impl AttackRules {
    /// Reports whether the material is drawn by any marker under these rules.
    #[must_use]
    pub fn is_marker_material(&self, material: &Material) -> bool {
        self.flag.contains(material)
            || self
                .beacon
                .as_ref()
                .is_some_and(|beacon| beacon.wireframe == *material)
    }
}

impl Default for AttackRules {
    fn default() -> Self {
        Self {
            cell_size: 16,
            max_active_flags_per_player: 10,
            attack_duration: Duration::from_secs(600),
            refresh_interval: Duration::from_secs(60),
            flag: FlagMaterials::default(),
            beacon: Some(BeaconRules::default()),
        }
    }
}

/// Which worst-case fine dominated a future-funds check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FineKind {
    /// Every attack is defended and the attacker pays the defenders.
    DefendedAttack,
    /// Every attack succeeds and the attacker pays rebuilding fines.
    Rebuilding,
}

impl fmt::Display for FineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefendedAttack => f.write_str("defended attack"),
            Self::Rebuilding => f.write_str("rebuilding"),
        }
    }
}

/// Reasons an attack request may be rejected.
///
/// Every variant is an expected, user-facing outcome. The display text is the
/// message delivered to the player who tried to attack.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AttackRejection {
    /// Another attack already holds the cell.
    #[error("this area is already under attack by {attacker}")]
    AlreadyUnderAttack {
        /// Owner of the existing attack.
        attacker: PlayerName,
    },
    /// The player already owns the maximum number of live attacks.
    #[error("you cannot place more than {limit} war flags at once")]
    PlayerFlagLimitExceeded {
        /// Configured per-player maximum.
        limit: usize,
    },
    /// The attacker is not a member of a town within a nation.
    #[error("you must belong to a nation to attack")]
    NotInNation,
    /// The attacker's town owns no land.
    #[error("your town needs at least one claim before it can attack")]
    LandlessAttacker,
    /// The target region does not belong to a town within a nation.
    #[error("this area does not belong to a nation")]
    TargetNotClaimed,
    /// The target land belongs to the attacker's own nation.
    #[error("you cannot attack land of your own nation")]
    FriendlyTarget,
    /// One of the nations involved is peaceful.
    #[error("{nation} is peaceful")]
    TargetIsPeaceful {
        /// The peaceful nation.
        nation: NationId,
    },
    /// A town or nation involved lacks online members.
    #[error("{name} needs at least {required} players online for war")]
    InsufficientOnlinePlayers {
        /// Configured minimum.
        required: usize,
        /// Town or nation falling short.
        name: String,
    },
    /// Border-only mode forbids attacking interior claims.
    #[error("you can only attack the border of a town")]
    BorderAttackOnly,
    /// The attacker cannot pay for the flag.
    #[error("you need {cost} to place a war flag")]
    InsufficientFunds {
        /// Formatted placement cost.
        cost: String,
    },
    /// The attacker cannot cover the worst-case fines of all live flags.
    #[error("you need {cost} in reserve to cover {fine} fines for {flags} war flags")]
    InsufficientFutureFunds {
        /// Formatted worst-case fine.
        cost: String,
        /// Number of flags the fine covers, including this one.
        flags: usize,
        /// Which scenario produced the fine.
        fine: FineKind,
    },
    /// The flag would be buried below the terrain surface.
    #[error("war flags must be placed above ground")]
    FlagNotAboveGround,
    /// A collaborator vetoed the attack with a reason.
    #[error("{0}")]
    AttackVetoed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_quantizes_with_floor_division() {
        let cell = Cell::containing(&BlockPos::new("world", 17, 64, -1), 16);
        assert_eq!(cell, Cell::new("world", 1, -1));

        let origin = Cell::containing(&BlockPos::new("world", 0, 64, 15), 16);
        assert_eq!(origin, Cell::new("world", 0, 0));
    }

    #[test]
    fn cell_quantization_tolerates_zero_size() {
        let cell = Cell::containing(&BlockPos::new("nether", -3, 10, 4), 0);
        assert_eq!(cell, Cell::new("nether", -3, 4));
    }

    #[test]
    fn only_timer_marker_is_defendable() {
        assert!(MarkerRole::FlagTimer.is_defendable());
        for role in [
            MarkerRole::FlagBase,
            MarkerRole::FlagLight,
            MarkerRole::BeaconWireframe,
            MarkerRole::BeaconCore,
        ] {
            assert!(role.is_immutable(), "{role:?} must be immutable");
        }
    }

    #[test]
    fn timer_ladder_wraps_around() {
        let flag = FlagMaterials::default();
        let ladder = flag.timer.len() as u32;
        assert_eq!(flag.timer_for_phase(0), Material::new("LIME_WOOL"));
        assert_eq!(flag.timer_for_phase(ladder), Material::new("LIME_WOOL"));
        assert_eq!(flag.timer_for_phase(ladder - 1), Material::new("RED_WOOL"));
    }

    #[test]
    fn marker_materials_include_beacon_wireframe() {
        let mut rules = AttackRules::default();
        assert!(rules.is_marker_material(&Material::new("GLOWSTONE")));
        assert!(rules.is_marker_material(&Material::new("OAK_FENCE")));
        assert!(!rules.is_marker_material(&Material::new("STONE")));

        rules.beacon = None;
        assert!(!rules.is_marker_material(&Material::new("GLOWSTONE")));
    }

    #[test]
    fn rejection_messages_name_the_offender() {
        let rejection = AttackRejection::InsufficientOnlinePlayers {
            required: 3,
            name: "Avalon".to_owned(),
        };
        assert_eq!(
            rejection.to_string(),
            "Avalon needs at least 3 players online for war"
        );
        assert_eq!(
            AttackRejection::AttackVetoed("siege truce".to_owned()).to_string(),
            "siege truce"
        );
    }
}
