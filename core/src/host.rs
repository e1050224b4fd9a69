//! Interfaces of the collaborators owned by the host server.
//!
//! The engine never reaches into the town domain, the economy, or the block
//! model directly. Adapters implement these traits over whatever the host
//! runtime provides, and the engine calls them inline on the tick thread.

use thiserror::Error;

use crate::{BlockPos, Cell, Event, Material, NationId, PlayerName, TownId};

/// Town membership and permissions of a player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resident {
    /// Town the player belongs to, if any.
    pub town: Option<TownId>,
    /// Whether the player holds administrator permissions.
    pub is_admin: bool,
}

/// Ownership record of a claimed cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TownBlock {
    /// Town that owns the cell.
    pub town: TownId,
    /// Whether the cell is the town's home block.
    pub is_home_block: bool,
}

/// Read and write access to the town and nation domain.
pub trait TownDirectory {
    /// Looks up the town membership of a player.
    fn resident(&self, player: &PlayerName) -> Option<Resident>;

    /// Returns the nation a town belongs to.
    fn nation_of(&self, town: &TownId) -> Option<NationId>;

    /// Number of cells a town has claimed.
    fn claim_count(&self, town: &TownId) -> usize;

    /// Resolves the claim covering a cell, if any.
    fn town_block(&self, cell: &Cell) -> Option<TownBlock>;

    /// Reports whether the cell lies on the edge of the town's claimed area.
    fn is_on_edge_of_claims(&self, town: &TownId, cell: &Cell) -> bool;

    /// Reports whether a nation is neutral.
    fn is_neutral(&self, nation: &NationId) -> bool;

    /// Number of a town's residents currently online.
    fn online_in_town(&self, town: &TownId) -> usize;

    /// Number of a nation's residents currently online.
    fn online_in_nation(&self, nation: &NationId) -> usize;

    /// Reports whether `nation` lists `other` as an enemy.
    fn has_enemy(&self, nation: &NationId, other: &NationId) -> bool;

    /// Adds `enemy` to the enemy list of `nation` and persists it.
    fn add_enemy(&mut self, nation: &NationId, enemy: &NationId);

    /// Marks a cell as a war zone.
    fn add_war_zone(&mut self, cell: &Cell);

    /// Invalidates cached permissions for a cell.
    fn refresh_cache(&mut self, cell: &Cell);
}

/// Errors reported by the economy ledger.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LedgerError {
    /// The account holds less than the requested amount.
    #[error("account of {player} holds {balance}, cannot withdraw {amount}")]
    InsufficientBalance {
        /// Account owner.
        player: PlayerName,
        /// Current balance.
        balance: f64,
        /// Requested amount.
        amount: f64,
    },
    /// The ledger refused the transaction.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Access to the economy ledger.
pub trait Ledger {
    /// Reports whether an economy is active at all.
    fn is_active(&self) -> bool;

    /// Current balance held by a player.
    fn balance(&self, player: &PlayerName) -> f64;

    /// Withdraws an amount from a player's account.
    fn withdraw(&mut self, player: &PlayerName, amount: f64, memo: &str)
        -> Result<(), LedgerError>;

    /// Renders an amount in the economy's currency format.
    fn format(&self, amount: f64) -> String;
}

/// Physical properties of a material relevant to marker drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialTraits {
    /// Whether the material can be placed as a block.
    pub is_block: bool,
    /// Whether the material is a kind of air.
    pub is_air: bool,
    /// Whether the block falls when unsupported.
    pub has_gravity: bool,
}

impl MaterialTraits {
    /// Reports whether a marker can safely be drawn with the material.
    #[must_use]
    pub const fn is_marker_capable(self) -> bool {
        self.is_block && !self.is_air && !self.has_gravity
    }
}

/// Access to the host's block model.
pub trait BlockWorld {
    /// Y coordinate of the highest non-air block in a column.
    fn highest_block_y(&self, world: &str, x: i32, z: i32) -> i32;

    /// Physical properties of a material, or `None` if it is unknown.
    fn material_traits(&self, material: &Material) -> Option<MaterialTraits>;

    /// Places a block.
    fn set_block(&mut self, pos: &BlockPos, material: &Material);

    /// Replaces a block with air.
    fn clear_block(&mut self, pos: &BlockPos);
}

/// Cancelable notification raised before an admitted attack starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackAttempt {
    attacker: PlayerName,
    flag_base: BlockPos,
    cell: Cell,
    cancelled: bool,
    reason: Option<String>,
}

impl AttackAttempt {
    /// Creates an uncancelled attempt.
    #[must_use]
    pub fn new(attacker: PlayerName, flag_base: BlockPos, cell: Cell) -> Self {
        Self {
            attacker,
            flag_base,
            cell,
            cancelled: false,
            reason: None,
        }
    }

    /// Player attempting the attack.
    #[must_use]
    pub fn attacker(&self) -> &PlayerName {
        &self.attacker
    }

    /// Block the flag base would occupy.
    #[must_use]
    pub fn flag_base(&self) -> &BlockPos {
        &self.flag_base
    }

    /// Cell the attack targets.
    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Cancels the attempt silently.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Cancels the attempt, surfacing the reason to the attacker.
    pub fn cancel_with_reason(&mut self, reason: impl Into<String>) {
        self.cancelled = true;
        self.reason = Some(reason.into());
    }

    /// Reports whether a collaborator cancelled the attempt.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Reason given for the cancellation, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Outbound notifications to the host's listeners and players.
pub trait NotificationSink {
    /// Offers the attempt to listeners that may veto it.
    fn attack_attempted(&mut self, attempt: &mut AttackAttempt);

    /// Publishes an engine event to listeners.
    fn publish(&mut self, event: &Event);

    /// Sends a message to every online player.
    fn broadcast(&mut self, message: &str);

    /// Sends a message to a single player.
    fn message(&mut self, player: &PlayerName, message: &str);
}

/// Every collaborator the plugin adapter needs, bundled for convenience.
pub trait Host: TownDirectory + Ledger + BlockWorld + NotificationSink {}

impl<T> Host for T where T: TownDirectory + Ledger + BlockWorld + NotificationSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_records_reasoned_cancellation() {
        let mut attempt = AttackAttempt::new(
            PlayerName::new("Ayla"),
            BlockPos::new("world", 1, 70, 1),
            Cell::new("world", 0, 0),
        );
        assert!(!attempt.is_cancelled());

        attempt.cancel_with_reason("ceasefire in effect");
        assert!(attempt.is_cancelled());
        assert_eq!(attempt.reason(), Some("ceasefire in effect"));
    }

    #[test]
    fn air_and_falling_blocks_cannot_draw_markers() {
        let solid = MaterialTraits {
            is_block: true,
            is_air: false,
            has_gravity: false,
        };
        assert!(solid.is_marker_capable());
        assert!(!MaterialTraits {
            is_air: true,
            ..solid
        }
        .is_marker_capable());
        assert!(!MaterialTraits {
            has_gravity: true,
            ..solid
        }
        .is_marker_capable());
    }
}
