//! Indexes of live attacks and town flagging history.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use flag_war_core::{AttackRejection, Cell, PlayerName, TownId};

use crate::attack::CellUnderAttack;

/// Registry that owns every live attack.
///
/// `cells` and the concatenation of all `players` lists always hold the same
/// set of attacks; the player lists store cell keys in registration order.
#[derive(Debug)]
pub(crate) struct AttackRegistry {
    cells: BTreeMap<Cell, CellUnderAttack>,
    players: HashMap<PlayerName, Vec<Cell>>,
    last_flagged: HashMap<TownId, Duration>,
}

impl AttackRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
            players: HashMap::new(),
            last_flagged: HashMap::new(),
        }
    }

    /// Verifies that a new attack on `cell` by `attacker` may be registered.
    pub(crate) fn check(
        &self,
        cell: &Cell,
        attacker: &PlayerName,
        limit: usize,
    ) -> Result<(), AttackRejection> {
        if let Some(existing) = self.cells.get(cell) {
            return Err(AttackRejection::AlreadyUnderAttack {
                attacker: existing.attacker().clone(),
            });
        }
        if self.count_for(attacker).saturating_add(1) > limit {
            return Err(AttackRejection::PlayerFlagLimitExceeded { limit });
        }
        Ok(())
    }

    /// Inserts an attack into both indexes. Callers run [`Self::check`] first.
    pub(crate) fn insert(&mut self, attack: CellUnderAttack) {
        let cell = attack.cell().clone();
        self.players
            .entry(attack.attacker().clone())
            .or_default()
            .push(cell.clone());
        let _ = self.cells.insert(cell, attack);
    }

    /// Removes an attack from both indexes, dropping emptied player lists.
    ///
    /// Removing an absent cell is a no-op.
    pub(crate) fn remove(&mut self, cell: &Cell) -> Option<CellUnderAttack> {
        let attack = self.cells.remove(cell)?;
        if let Some(cells) = self.players.get_mut(attack.attacker()) {
            cells.retain(|owned| owned != cell);
            if cells.is_empty() {
                let _ = self.players.remove(attack.attacker());
            }
        }
        Some(attack)
    }

    pub(crate) fn get(&self, cell: &Cell) -> Option<&CellUnderAttack> {
        self.cells.get(cell)
    }

    pub(crate) fn get_mut(&mut self, cell: &Cell) -> Option<&mut CellUnderAttack> {
        self.cells.get_mut(cell)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CellUnderAttack> {
        self.cells.values()
    }

    /// Cells under attack in deterministic order.
    pub(crate) fn cells(&self) -> Vec<Cell> {
        self.cells.keys().cloned().collect()
    }

    /// Cells attacked by a player in registration order.
    pub(crate) fn cells_of(&self, attacker: &PlayerName) -> Vec<Cell> {
        self.players.get(attacker).cloned().unwrap_or_default()
    }

    pub(crate) fn count_for(&self, attacker: &PlayerName) -> usize {
        self.players.get(attacker).map_or(0, Vec::len)
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Stores `at` unless a later reading is already present.
    ///
    /// Returns the new reading when it moved forward.
    pub(crate) fn record_flagged(&mut self, town: TownId, at: Duration) -> Option<Duration> {
        let stored = self.last_flagged.entry(town).or_insert(Duration::ZERO);
        if at > *stored {
            *stored = at;
            Some(at)
        } else {
            None
        }
    }

    pub(crate) fn last_flagged(&self, town: &TownId) -> Duration {
        self.last_flagged
            .get(town)
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flag_war_core::BlockPos;

    fn attack(attacker: &str, x: i32) -> CellUnderAttack {
        let flag_base = BlockPos::new("world", x, 64, 0);
        CellUnderAttack::new(
            Cell::containing(&flag_base, 16),
            PlayerName::new(attacker),
            flag_base,
        )
    }

    #[test]
    fn registry_starts_empty() {
        let registry = AttackRegistry::new();
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.count_for(&PlayerName::new("Ayla")), 0);
        assert_eq!(registry.last_flagged(&TownId::new("Avalon")), Duration::ZERO);
    }

    #[test]
    fn indexes_stay_in_lockstep() {
        let mut registry = AttackRegistry::new();
        registry.insert(attack("Ayla", 0));
        registry.insert(attack("Ayla", 16));
        registry.insert(attack("Bram", 32));

        let ayla = PlayerName::new("Ayla");
        assert_eq!(
            registry.cells_of(&ayla),
            vec![Cell::new("world", 0, 0), Cell::new("world", 1, 0)]
        );

        let removed = registry.remove(&Cell::new("world", 0, 0));
        assert!(removed.is_some());
        assert_eq!(registry.cells_of(&ayla), vec![Cell::new("world", 1, 0)]);

        let _ = registry.remove(&Cell::new("world", 1, 0));
        assert!(!registry.players.contains_key(&ayla), "emptied list is dropped");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_twice_is_harmless() {
        let mut registry = AttackRegistry::new();
        registry.insert(attack("Ayla", 0));
        registry.insert(attack("Ayla", 16));

        assert!(registry.remove(&Cell::new("world", 0, 0)).is_some());
        assert!(registry.remove(&Cell::new("world", 0, 0)).is_none());
        assert_eq!(registry.count_for(&PlayerName::new("Ayla")), 1);
    }

    #[test]
    fn check_reports_existing_owner_before_limit() {
        let mut registry = AttackRegistry::new();
        registry.insert(attack("Bram", 0));

        let result = registry.check(&Cell::new("world", 0, 0), &PlayerName::new("Ayla"), 0);
        assert_eq!(
            result,
            Err(AttackRejection::AlreadyUnderAttack {
                attacker: PlayerName::new("Bram"),
            })
        );
    }

    #[test]
    fn last_flagged_never_moves_backward() {
        let mut registry = AttackRegistry::new();
        let town = TownId::new("Avalon");

        assert_eq!(
            registry.record_flagged(town.clone(), Duration::from_secs(50)),
            Some(Duration::from_secs(50))
        );
        assert_eq!(registry.record_flagged(town.clone(), Duration::from_secs(20)), None);
        assert_eq!(registry.last_flagged(&town), Duration::from_secs(50));
    }
}
