#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative attack registry for Flag War.

use std::time::Duration;

use flag_war_core::{AttackRules, CancelReason, Cell, Command, Event};
use tracing::{debug, info};

mod attack;
mod registry;

pub use attack::{AttackState, CellUnderAttack};

use attack::{Countdown, Resolution};
use registry::AttackRegistry;

/// Represents the authoritative Flag War state: every live attack, the
/// attack clock, and the rules in force.
#[derive(Debug)]
pub struct World {
    rules: AttackRules,
    clock: Duration,
    registry: AttackRegistry,
}

impl World {
    /// Creates an empty world governed by the default rules.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(AttackRules::default())
    }

    /// Creates an empty world governed by the provided rules.
    #[must_use]
    pub fn with_rules(rules: AttackRules) -> Self {
        Self {
            rules,
            clock: Duration::ZERO,
            registry: AttackRegistry::new(),
        }
    }

    fn resolve(&mut self, cell: &Cell, resolution: Resolution, out_events: &mut Vec<Event>) {
        let Some(attack) = self.registry.get_mut(cell) else {
            return;
        };
        let Some(cleared) = attack.finish(&resolution) else {
            return;
        };
        let Some(attack) = self.registry.remove(cell) else {
            return;
        };
        let attacker = attack.attacker().clone();

        info!(
            target: "flag_war::world",
            %cell,
            %attacker,
            state = ?attack.state(),
            "attack resolved"
        );

        out_events.push(match resolution {
            Resolution::Won => Event::AttackWon {
                cell: cell.clone(),
                attacker,
            },
            Resolution::Defended(defender) => Event::AttackDefended {
                cell: cell.clone(),
                attacker,
                defender,
            },
            Resolution::Canceled(reason) => Event::AttackCanceled {
                cell: cell.clone(),
                attacker,
                reason,
            },
        });

        if !cleared.is_empty() {
            out_events.push(Event::MarkersCleared { positions: cleared });
        }
    }

    fn advance_countdowns(&mut self, out_events: &mut Vec<Event>) {
        for cell in self.registry.cells() {
            let Some(attack) = self.registry.get_mut(&cell) else {
                continue;
            };
            match attack.poll(self.clock, &self.rules) {
                Countdown::Idle => {}
                Countdown::Advanced {
                    phase,
                    remaining,
                    repaint,
                } => {
                    out_events.push(Event::CountdownAdvanced {
                        cell,
                        phase,
                        remaining,
                    });
                    out_events.push(Event::MarkersPlaced { blocks: repaint });
                }
                Countdown::Expired => self.resolve(&cell, Resolution::Won, out_events),
            }
        }
    }

    fn cancel_all(&mut self, cells: Vec<Cell>, reason: CancelReason, out_events: &mut Vec<Event>) {
        for cell in cells {
            self.resolve(&cell, Resolution::Canceled(reason), out_events);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureRules { rules } => {
            world.rules = rules;
            out_events.push(Event::RulesConfigured);
        }
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
            world.advance_countdowns(out_events);
        }
        Command::RegisterAttack {
            attacker,
            flag_base,
        } => {
            let cell = Cell::containing(&flag_base, world.rules.cell_size);
            let limit = world.rules.max_active_flags_per_player;
            if let Err(reason) = world.registry.check(&cell, &attacker, limit) {
                debug!(
                    target: "flag_war::world",
                    %cell,
                    %attacker,
                    %reason,
                    "attack registration rejected"
                );
                out_events.push(Event::AttackRejected {
                    cell,
                    attacker,
                    reason,
                });
                return;
            }

            let mut attack = CellUnderAttack::new(cell.clone(), attacker.clone(), flag_base.clone());
            let markers = attack.begin(world.clock, &world.rules);
            let deadline = attack.deadline();
            world.registry.insert(attack);

            info!(
                target: "flag_war::world",
                %cell,
                %attacker,
                deadline_secs = deadline.as_secs(),
                "attack started"
            );
            out_events.push(Event::AttackStarted {
                cell,
                attacker,
                flag_base,
                deadline,
            });
            out_events.push(Event::MarkersPlaced { blocks: markers });
        }
        Command::DefendAttack { cell, defender } => {
            world.resolve(&cell, Resolution::Defended(defender), out_events);
        }
        Command::CancelAttack { cell, reason } => {
            world.resolve(&cell, Resolution::Canceled(reason), out_events);
        }
        Command::CancelAttacksBy { attacker, reason } => {
            let cells = world.registry.cells_of(&attacker);
            world.cancel_all(cells, reason, out_events);
        }
        Command::CancelAllAttacks { reason } => {
            let cells = world.registry.cells();
            world.cancel_all(cells, reason, out_events);
        }
        Command::RecordTownFlagged { town, at } => {
            if let Some(at) = world.registry.record_flagged(town.clone(), at) {
                out_events.push(Event::TownFlagged { town, at });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::{CellUnderAttack, World};
    use flag_war_core::{AttackRejection, AttackRules, BlockPos, Cell, MarkerRole, PlayerName, TownId};

    /// Rules currently in force.
    #[must_use]
    pub fn rules(world: &World) -> &AttackRules {
        &world.rules
    }

    /// Current reading of the attack clock.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Returns the live attack on a cell, if any.
    #[must_use]
    pub fn attack<'world>(world: &'world World, cell: &Cell) -> Option<&'world CellUnderAttack> {
        world.registry.get(cell)
    }

    /// Reports whether a cell is under attack.
    #[must_use]
    pub fn is_under_attack(world: &World, cell: &Cell) -> bool {
        world.registry.get(cell).is_some()
    }

    /// Iterator over every live attack in deterministic cell order.
    pub fn attacks(world: &World) -> impl Iterator<Item = &CellUnderAttack> {
        world.registry.iter()
    }

    /// Number of live attacks.
    #[must_use]
    pub fn attack_count(world: &World) -> usize {
        world.registry.len()
    }

    /// Live attacks owned by a player in registration order.
    #[must_use]
    pub fn attacks_by<'world>(
        world: &'world World,
        attacker: &PlayerName,
    ) -> Vec<&'world CellUnderAttack> {
        world
            .registry
            .cells_of(attacker)
            .iter()
            .filter_map(|cell| world.registry.get(cell))
            .collect()
    }

    /// Number of live attacks owned by a player.
    #[must_use]
    pub fn active_flag_count(world: &World, attacker: &PlayerName) -> usize {
        world.registry.count_for(attacker)
    }

    /// Live attacks whose cell resolves to the provided town.
    ///
    /// The `town_of` closure should mirror the host's claim lookup. Cells it
    /// cannot resolve are skipped.
    pub fn attacks_in_town<'world, F>(
        world: &'world World,
        town: &TownId,
        mut town_of: F,
    ) -> Vec<&'world CellUnderAttack>
    where
        F: FnMut(&Cell) -> Option<TownId>,
    {
        world
            .registry
            .iter()
            .filter(|attack| town_of(attack.cell()).as_ref() == Some(town))
            .collect()
    }

    /// Reports whether any live attack resolves to the provided town.
    pub fn is_town_under_attack<F>(world: &World, town: &TownId, mut town_of: F) -> bool
    where
        F: FnMut(&Cell) -> Option<TownId>,
    {
        world
            .registry
            .iter()
            .any(|attack| town_of(attack.cell()).as_ref() == Some(town))
    }

    /// Clock reading of the town's most recent flagging, zero if never flagged.
    #[must_use]
    pub fn last_flagged(world: &World, town: &TownId) -> Duration {
        world.registry.last_flagged(town)
    }

    /// Identifies the attack marker occupying a block, if any.
    ///
    /// The attack on the block's own cell is consulted first; beacons that
    /// overhang a cell boundary are found by scanning the remaining attacks.
    #[must_use]
    pub fn marker_at<'world>(
        world: &'world World,
        pos: &BlockPos,
    ) -> Option<(&'world CellUnderAttack, MarkerRole)> {
        let cell = Cell::containing(pos, world.rules.cell_size);
        if let Some(attack) = world.registry.get(&cell) {
            if let Some(role) = attack.marker_at(pos) {
                return Some((attack, role));
            }
        }
        world
            .registry
            .iter()
            .find_map(|attack| attack.marker_at(pos).map(|role| (attack, role)))
    }

    /// Checks whether a registration would be accepted, returning its cell.
    pub fn registration_check(
        world: &World,
        attacker: &PlayerName,
        flag_base: &BlockPos,
    ) -> Result<Cell, AttackRejection> {
        let cell = Cell::containing(flag_base, world.rules.cell_size);
        world
            .registry
            .check(&cell, attacker, world.rules.max_active_flags_per_player)?;
        Ok(cell)
    }
}
