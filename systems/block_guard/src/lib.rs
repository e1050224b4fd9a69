#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that protects attack markers from world changes.
//!
//! Only the flag timer may be destroyed, and destroying it defends the cell.
//! Every other marker block is immutable: breaking, burning, blasting and
//! pushing it are all denied. Callers supply a lookup that mirrors the
//! world's `query::marker_at` helper.

use std::collections::BTreeSet;

use flag_war_core::{AttackRules, BlockPos, Cell, Command, MarkerRole, Material, PlayerName};

/// Configuration parameters required to construct the guard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Materials any marker may be drawn with.
    pub marker_materials: BTreeSet<Material>,
}

impl Config {
    /// Collects every material the provided rules draw markers with.
    #[must_use]
    pub fn from_rules(rules: &AttackRules) -> Self {
        let mut marker_materials = BTreeSet::new();
        let _ = marker_materials.insert(rules.flag.base.clone());
        let _ = marker_materials.insert(rules.flag.light.clone());
        marker_materials.extend(rules.flag.timer.iter().cloned());
        if let Some(beacon) = &rules.beacon {
            let _ = marker_materials.insert(beacon.wireframe.clone());
        }
        Self { marker_materials }
    }
}

/// How a block is about to disappear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockChange {
    /// Broken, optionally by a player.
    Broken {
        /// Player breaking the block, if any.
        by: Option<PlayerName>,
    },
    /// Consumed by fire.
    Burned,
}

impl BlockChange {
    fn defender(&self) -> Option<PlayerName> {
        match self {
            Self::Broken { by } => by.clone(),
            Self::Burned => None,
        }
    }
}

/// Whether the host should let a block change go ahead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockVerdict {
    /// The change does not touch a protected marker.
    Allow,
    /// The change must be cancelled.
    Deny,
}

impl BlockVerdict {
    /// Reports whether the change was denied.
    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Deny)
    }
}

/// Marker protection system.
#[derive(Clone, Debug, Default)]
pub struct BlockGuard {
    config: Config,
}

impl BlockGuard {
    /// Creates a guard watching the configured marker materials.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Replaces the watched materials after the rules change.
    pub fn reconfigure(&mut self, config: Config) {
        self.config = config;
    }

    /// Reports whether blocks of this material can be attack markers.
    #[must_use]
    pub fn watches(&self, material: &Material) -> bool {
        self.config.marker_materials.contains(material)
    }

    /// Judges a single block about to be broken or burned.
    ///
    /// Destroying a flag timer emits [`Command::DefendAttack`] and is still
    /// denied so the world clears the markers itself. Any other marker is
    /// denied without a command.
    pub fn check_block<F>(
        &self,
        pos: &BlockPos,
        material: &Material,
        change: &BlockChange,
        mut marker_at: F,
        out: &mut Vec<Command>,
    ) -> BlockVerdict
    where
        F: FnMut(&BlockPos) -> Option<(Cell, MarkerRole)>,
    {
        if !self.watches(material) {
            return BlockVerdict::Allow;
        }
        let Some((cell, role)) = marker_at(pos) else {
            return BlockVerdict::Allow;
        };
        if role.is_defendable() {
            out.push(Command::DefendAttack {
                cell,
                defender: change.defender(),
            });
        }
        BlockVerdict::Deny
    }

    /// Returns the blocks of an explosion that must survive it.
    ///
    /// Explosions never defend a cell, so even the flag timer is spared.
    pub fn spared_by_explosion<'a, F>(
        &self,
        blocks: &'a [(BlockPos, Material)],
        mut marker_at: F,
    ) -> Vec<&'a BlockPos>
    where
        F: FnMut(&BlockPos) -> Option<(Cell, MarkerRole)>,
    {
        blocks
            .iter()
            .filter(|(pos, material)| self.watches(material) && marker_at(pos).is_some())
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Judges a piston about to move the provided blocks.
    pub fn check_piston<F>(&self, moved: &[(BlockPos, Material)], mut marker_at: F) -> BlockVerdict
    where
        F: FnMut(&BlockPos) -> Option<(Cell, MarkerRole)>,
    {
        let touches_marker = moved
            .iter()
            .any(|(pos, material)| self.watches(material) && marker_at(pos).is_some());
        if touches_marker {
            BlockVerdict::Deny
        } else {
            BlockVerdict::Allow
        }
    }
}
