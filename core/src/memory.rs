//! In-memory implementation of every host collaborator.
//!
//! Backs the demo binary and the test suites. Towns, residents and balances
//! are seeded through builder methods; everything the engine writes back
//! (enemies, war zones, blocks, notifications) is recorded for inspection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    host::{
        AttackAttempt, BlockWorld, Ledger, LedgerError, MaterialTraits, NotificationSink, Resident,
        TownBlock, TownDirectory,
    },
    AttackRules, BlockPos, Cell, Event, Material, NationId, PlayerName, TownId,
};

const DEFAULT_SURFACE_Y: i32 = 64;

#[derive(Clone, Debug)]
struct MemoryResident {
    town: Option<TownId>,
    is_admin: bool,
    online: bool,
}

/// Host whose collaborators all live in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
    residents: HashMap<PlayerName, MemoryResident>,
    nations: HashMap<TownId, NationId>,
    claims: HashMap<Cell, TownBlock>,
    neutral: BTreeSet<NationId>,
    enemies: BTreeSet<(NationId, NationId)>,
    war_zones: BTreeSet<Cell>,
    refreshed: Vec<Cell>,
    economy: bool,
    balances: HashMap<PlayerName, f64>,
    surfaces: HashMap<(String, i32, i32), i32>,
    materials: HashMap<Material, MaterialTraits>,
    blocks: BTreeMap<BlockPos, Material>,
    veto: Option<Option<String>>,
    attempts: usize,
    events: Vec<Event>,
    broadcasts: Vec<String>,
    messages: Vec<(PlayerName, String)>,
}

impl MemoryHost {
    /// Creates a host that knows the default marker materials, plus `AIR`
    /// and the falling `SAND`.
    #[must_use]
    pub fn new() -> Self {
        let mut host = Self::default();
        let solid = MaterialTraits {
            is_block: true,
            is_air: false,
            has_gravity: false,
        };
        let rules = AttackRules::default();
        let mut known = vec![rules.flag.base.clone(), rules.flag.light.clone()];
        known.extend(rules.flag.timer.iter().cloned());
        known.extend(rules.beacon.iter().map(|beacon| beacon.wireframe.clone()));
        known.push(Material::new("STONE"));
        for material in known {
            let _ = host.register_material(material, solid);
        }
        let _ = host.register_material(
            Material::new("AIR"),
            MaterialTraits {
                is_air: true,
                ..solid
            },
        );
        let _ = host.register_material(
            Material::new("SAND"),
            MaterialTraits {
                has_gravity: true,
                ..solid
            },
        );
        host
    }

    /// Creates a town in a nation owning the provided cells; the first cell
    /// becomes the home block.
    pub fn add_town(
        &mut self,
        town: TownId,
        nation: Option<NationId>,
        cells: impl IntoIterator<Item = Cell>,
    ) -> &mut Self {
        for (index, cell) in cells.into_iter().enumerate() {
            let _ = self.claims.insert(
                cell,
                TownBlock {
                    town: town.clone(),
                    is_home_block: index == 0,
                },
            );
        }
        if let Some(nation) = nation {
            let _ = self.nations.insert(town, nation);
        }
        self
    }

    /// Adds a resident of a town, or a townless player when `town` is `None`.
    pub fn add_resident(
        &mut self,
        player: PlayerName,
        town: Option<TownId>,
        online: bool,
    ) -> &mut Self {
        let _ = self.residents.insert(
            player,
            MemoryResident {
                town,
                is_admin: false,
                online,
            },
        );
        self
    }

    /// Adds `count` online residents named after the town.
    pub fn populate(&mut self, town: &TownId, count: usize) -> &mut Self {
        for index in 0..count {
            let _ = self.add_resident(
                PlayerName::new(format!("{town}-citizen-{index}")),
                Some(town.clone()),
                true,
            );
        }
        self
    }

    /// Grants administrator permissions to a player.
    pub fn make_admin(&mut self, player: &PlayerName) -> &mut Self {
        if let Some(resident) = self.residents.get_mut(player) {
            resident.is_admin = true;
        }
        self
    }

    /// Sets whether a player is online.
    pub fn set_online(&mut self, player: &PlayerName, online: bool) -> &mut Self {
        if let Some(resident) = self.residents.get_mut(player) {
            resident.online = online;
        }
        self
    }

    /// Marks a nation neutral.
    pub fn make_neutral(&mut self, nation: NationId) -> &mut Self {
        let _ = self.neutral.insert(nation);
        self
    }

    /// Activates the economy and seeds a balance.
    pub fn set_balance(&mut self, player: PlayerName, amount: f64) -> &mut Self {
        self.economy = true;
        let _ = self.balances.insert(player, amount);
        self
    }

    /// Sets the highest block of a column.
    pub fn set_surface(&mut self, world: &str, x: i32, z: i32, y: i32) -> &mut Self {
        let _ = self.surfaces.insert((world.to_owned(), x, z), y);
        self
    }

    /// Teaches the host the properties of a material.
    pub fn register_material(&mut self, material: Material, traits: MaterialTraits) -> &mut Self {
        let _ = self.materials.insert(material, traits);
        self
    }

    /// Makes listeners cancel every attempt, with or without a reason.
    pub fn veto_attempts(&mut self, reason: Option<String>) -> &mut Self {
        self.veto = Some(reason);
        self
    }

    /// Reports whether `nation` lists `enemy` as an enemy.
    #[must_use]
    pub fn is_enemy(&self, nation: &NationId, enemy: &NationId) -> bool {
        self.enemies.contains(&(nation.clone(), enemy.clone()))
    }

    /// Cells marked as war zones.
    #[must_use]
    pub fn war_zones(&self) -> &BTreeSet<Cell> {
        &self.war_zones
    }

    /// Cells whose cache was invalidated, in order.
    #[must_use]
    pub fn refreshed(&self) -> &[Cell] {
        &self.refreshed
    }

    /// Material of a block placed through the block model.
    #[must_use]
    pub fn block_at(&self, pos: &BlockPos) -> Option<&Material> {
        self.blocks.get(pos)
    }

    /// Number of blocks currently placed through the block model.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of attempt notifications raised.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    /// Events published by the engine, in order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Global broadcasts, in order.
    #[must_use]
    pub fn broadcasts(&self) -> &[String] {
        &self.broadcasts
    }

    /// Direct messages, in order.
    #[must_use]
    pub fn messages(&self) -> &[(PlayerName, String)] {
        &self.messages
    }

    fn online_where(&self, mut belongs: impl FnMut(&TownId) -> bool) -> usize {
        self.residents
            .values()
            .filter(|resident| resident.online)
            .filter(|resident| resident.town.as_ref().is_some_and(&mut belongs))
            .count()
    }
}

impl TownDirectory for MemoryHost {
    fn resident(&self, player: &PlayerName) -> Option<Resident> {
        self.residents.get(player).map(|resident| Resident {
            town: resident.town.clone(),
            is_admin: resident.is_admin,
        })
    }

    fn nation_of(&self, town: &TownId) -> Option<NationId> {
        self.nations.get(town).cloned()
    }

    fn claim_count(&self, town: &TownId) -> usize {
        self.claims
            .values()
            .filter(|block| block.town == *town)
            .count()
    }

    fn town_block(&self, cell: &Cell) -> Option<TownBlock> {
        self.claims.get(cell).cloned()
    }

    fn is_on_edge_of_claims(&self, town: &TownId, cell: &Cell) -> bool {
        let owned = |x: i32, z: i32| {
            self.claims
                .get(&Cell::new(cell.world(), x, z))
                .is_some_and(|block| block.town == *town)
        };
        owned(cell.x(), cell.z())
            && [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .any(|(dx, dz)| !owned(cell.x() + dx, cell.z() + dz))
    }

    fn is_neutral(&self, nation: &NationId) -> bool {
        self.neutral.contains(nation)
    }

    fn online_in_town(&self, town: &TownId) -> usize {
        self.online_where(|candidate| candidate == town)
    }

    fn online_in_nation(&self, nation: &NationId) -> usize {
        self.online_where(|candidate| self.nations.get(candidate) == Some(nation))
    }

    fn has_enemy(&self, nation: &NationId, other: &NationId) -> bool {
        self.is_enemy(nation, other)
    }

    fn add_enemy(&mut self, nation: &NationId, enemy: &NationId) {
        let _ = self.enemies.insert((nation.clone(), enemy.clone()));
    }

    fn add_war_zone(&mut self, cell: &Cell) {
        let _ = self.war_zones.insert(cell.clone());
    }

    fn refresh_cache(&mut self, cell: &Cell) {
        self.refreshed.push(cell.clone());
    }
}

impl Ledger for MemoryHost {
    fn is_active(&self) -> bool {
        self.economy
    }

    fn balance(&self, player: &PlayerName) -> f64 {
        self.balances.get(player).copied().unwrap_or(0.0)
    }

    fn withdraw(
        &mut self,
        player: &PlayerName,
        amount: f64,
        _memo: &str,
    ) -> Result<(), LedgerError> {
        let balance = self.balance(player);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                player: player.clone(),
                balance,
                amount,
            });
        }
        let _ = self.balances.insert(player.clone(), balance - amount);
        Ok(())
    }

    fn format(&self, amount: f64) -> String {
        format!("{amount:.2} coins")
    }
}

impl BlockWorld for MemoryHost {
    fn highest_block_y(&self, world: &str, x: i32, z: i32) -> i32 {
        self.surfaces
            .get(&(world.to_owned(), x, z))
            .copied()
            .unwrap_or(DEFAULT_SURFACE_Y)
    }

    fn material_traits(&self, material: &Material) -> Option<MaterialTraits> {
        self.materials.get(material).copied()
    }

    fn set_block(&mut self, pos: &BlockPos, material: &Material) {
        let _ = self.blocks.insert(pos.clone(), material.clone());
    }

    fn clear_block(&mut self, pos: &BlockPos) {
        let _ = self.blocks.remove(pos);
    }
}

impl NotificationSink for MemoryHost {
    fn attack_attempted(&mut self, attempt: &mut AttackAttempt) {
        self.attempts += 1;
        match &self.veto {
            Some(Some(reason)) => attempt.cancel_with_reason(reason.clone()),
            Some(None) => attempt.cancel(),
            None => {}
        }
    }

    fn publish(&mut self, event: &Event) {
        self.events.push(event.clone());
    }

    fn broadcast(&mut self, message: &str) {
        self.broadcasts.push(message.to_owned());
    }

    fn message(&mut self, player: &PlayerName, message: &str) {
        self.messages.push((player.clone(), message.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_detection_uses_four_neighbours() {
        let mut host = MemoryHost::new();
        let town = TownId::new("Avalon");
        let cells = (-1..=1).flat_map(|x| (-1..=1).map(move |z| Cell::new("world", x, z)));
        let _ = host.add_town(town.clone(), None, cells);

        assert!(!host.is_on_edge_of_claims(&town, &Cell::new("world", 0, 0)));
        assert!(host.is_on_edge_of_claims(&town, &Cell::new("world", 1, 0)));
        assert!(!host.is_on_edge_of_claims(&town, &Cell::new("world", 5, 5)));
    }

    #[test]
    fn online_counts_follow_nation_membership() {
        let mut host = MemoryHost::new();
        let nation = NationId::new("Albion");
        let _ = host
            .add_town(TownId::new("Avalon"), Some(nation.clone()), [Cell::new("world", 0, 0)])
            .add_town(TownId::new("Camelot"), Some(nation.clone()), [Cell::new("world", 9, 9)])
            .populate(&TownId::new("Avalon"), 2)
            .populate(&TownId::new("Camelot"), 1)
            .add_resident(PlayerName::new("Idle"), Some(TownId::new("Avalon")), false);

        assert_eq!(host.online_in_town(&TownId::new("Avalon")), 2);
        assert_eq!(host.online_in_nation(&nation), 3);
    }

    #[test]
    fn overdrawn_withdrawal_leaves_balance() {
        let mut host = MemoryHost::new();
        let player = PlayerName::new("Ayla");
        let _ = host.set_balance(player.clone(), 5.0);

        assert!(host.withdraw(&player, 7.5, "test").is_err());
        assert!(host.withdraw(&player, 2.0, "test").is_ok());
        assert!((host.balance(&player) - 3.0).abs() < f64::EPSILON);
    }
}
