#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Plugin adapter that wires the Flag War engine to a host server.
//!
//! [`FlagWar`] owns the authoritative world and the pure systems. Inbound
//! host notifications are translated into commands, the world applies them,
//! and the resulting events are forwarded to the host's collaborators.

use std::time::Duration;

use flag_war_core::{
    host::Host, AttackRejection, AttackRules, BlockPos, CancelReason, Cell, Command, Event,
    MarkerRole, Material, PlayerName, TownId,
};
use flag_war_system_admission::{Admission, AttackRequest, Config as AdmissionConfig, Verdict};
use flag_war_system_block_guard::{
    BlockChange, BlockGuard, BlockVerdict, Config as BlockGuardConfig,
};
use flag_war_world::{self as world, query, CellUnderAttack, World};
use tracing::{debug, info};

mod config;
mod startup;

pub use config::{
    AttackSection, BeaconSection, ConfigError, EconomySection, FlagSection, FlagWarConfig,
    LimitsSection, MIN_CONFIG_VERSION,
};
pub use startup::{check_host_version, resolve_materials, StartupError, MIN_HOST_VERSION};

/// Block and player notifications raised by the host server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostNotification {
    /// A player placed a block.
    BlockPlaced {
        /// Player placing the block.
        player: PlayerName,
        /// Where the block was placed.
        pos: BlockPos,
        /// Material of the placed block.
        material: Material,
    },
    /// A block is about to be broken.
    BlockBroken {
        /// Player breaking the block, if any.
        player: Option<PlayerName>,
        /// Block position.
        pos: BlockPos,
        /// Current material of the block.
        material: Material,
    },
    /// A block is about to burn away.
    BlockBurned {
        /// Block position.
        pos: BlockPos,
        /// Current material of the block.
        material: Material,
    },
    /// An explosion is about to destroy the listed blocks.
    Exploded {
        /// Blocks in the blast.
        blocks: Vec<(BlockPos, Material)>,
    },
    /// A piston is about to move the listed blocks.
    PistonMoved {
        /// Blocks the piston pushes or pulls.
        blocks: Vec<(BlockPos, Material)>,
    },
    /// A player left the server.
    PlayerQuit {
        /// Player who left.
        player: PlayerName,
    },
    /// An administrator ended the attack on a cell.
    AdminCancel {
        /// Cell whose attack should end.
        cell: Cell,
    },
}

/// What the host should do with the notified change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Let the change go ahead.
    Allow,
    /// Cancel the change.
    Deny,
    /// Let the explosion go ahead but keep these blocks intact.
    Spare(Vec<BlockPos>),
}

/// The running plugin.
#[derive(Debug)]
pub struct FlagWar<H: Host> {
    world: World,
    admission: Admission,
    guard: BlockGuard,
    host: H,
}

impl<H: Host> FlagWar<H> {
    /// Creates the plugin with explicit rules.
    pub fn new(rules: AttackRules, admission: AdmissionConfig, host: H) -> Self {
        let guard = BlockGuard::new(BlockGuardConfig::from_rules(&rules));
        Self {
            world: World::with_rules(rules),
            admission: Admission::new(admission),
            guard,
            host,
        }
    }

    /// Boots the plugin from its configuration file.
    ///
    /// Refuses to start against an outdated town domain. Marker materials the
    /// host cannot draw are replaced before any attack exists.
    pub fn start(config: &FlagWarConfig, host_version: &str, host: H) -> Result<Self, StartupError> {
        check_host_version(host_version)?;
        let rules = resolve_materials(config.attack_rules(), &host);
        startup::announce(config.show_startup_marquee);
        info!(
            target: "flag_war::plugin",
            host_version,
            cell_size = rules.cell_size,
            max_flags = rules.max_active_flags_per_player,
            "flag war enabled"
        );
        Ok(Self::new(rules, config.admission(), host))
    }

    /// Replaces the rules in force; running deadlines are untouched.
    pub fn reconfigure(&mut self, rules: AttackRules) {
        self.guard.reconfigure(BlockGuardConfig::from_rules(&rules));
        let _ = self.execute(Command::ConfigureRules { rules });
    }

    /// The host collaborators.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host collaborators.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The authoritative registry.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Rules in force, after any material fallbacks.
    pub fn rules(&self) -> &AttackRules {
        query::rules(&self.world)
    }

    /// Runs admission and, when granted, starts an attack at `flag_base`.
    ///
    /// Returns the contested cell, or `None` when a listener silently
    /// withdrew the attempt. Rejections are also messaged to the attacker.
    pub fn attempt_attack(
        &mut self,
        attacker: &PlayerName,
        flag_base: &BlockPos,
    ) -> Result<Option<Cell>, AttackRejection> {
        match self.admit(attacker, flag_base) {
            Ok(Some(cell)) => Ok(Some(cell)),
            Ok(None) => {
                debug!(target: "flag_war::plugin", %attacker, "attack withdrawn by listener");
                Ok(None)
            }
            Err(reason) => {
                debug!(target: "flag_war::plugin", %attacker, %reason, "attack rejected");
                self.host.message(attacker, &reason.to_string());
                Err(reason)
            }
        }
    }

    fn admit(
        &mut self,
        attacker: &PlayerName,
        flag_base: &BlockPos,
    ) -> Result<Option<Cell>, AttackRejection> {
        let cell = query::registration_check(&self.world, attacker, flag_base)?;
        let request = AttackRequest {
            attacker: attacker.clone(),
            flag_base: flag_base.clone(),
            cell,
        };
        let active_flags = query::active_flag_count(&self.world, attacker);
        let grant = match self
            .admission
            .evaluate(&request, active_flags, &mut self.host)?
        {
            Verdict::Granted(grant) => grant,
            Verdict::Withdrawn => return Ok(None),
        };
        self.admission.commit(&grant, &mut self.host)?;

        let cell = self.register(attacker, flag_base)?;
        let now = query::clock(&self.world);
        let _ = self.execute(Command::RecordTownFlagged {
            town: grant.defending_town,
            at: now,
        });
        Ok(Some(cell))
    }

    /// Registers an attack without admission checks.
    ///
    /// Only the registry's own limits apply: one attack per cell and the
    /// per-player maximum. A rejection is messaged to the attacker.
    pub fn register_attack(
        &mut self,
        attacker: &PlayerName,
        flag_base: &BlockPos,
    ) -> Result<Cell, AttackRejection> {
        self.register(attacker, flag_base).map_err(|reason| {
            self.host.message(attacker, &reason.to_string());
            reason
        })
    }

    fn register(
        &mut self,
        attacker: &PlayerName,
        flag_base: &BlockPos,
    ) -> Result<Cell, AttackRejection> {
        let cell = Cell::containing(flag_base, query::rules(&self.world).cell_size);
        let events = self.execute(Command::RegisterAttack {
            attacker: attacker.clone(),
            flag_base: flag_base.clone(),
        });
        let rejection = events.into_iter().find_map(|event| match event {
            Event::AttackRejected { reason, .. } => Some(reason),
            _ => None,
        });
        match rejection {
            Some(reason) => Err(reason),
            None => Ok(cell),
        }
    }

    /// Cancels every attack owned by the player.
    pub fn remove_attacker_flags(&mut self, attacker: &PlayerName) {
        let _ = self.execute(Command::CancelAttacksBy {
            attacker: attacker.clone(),
            reason: CancelReason::AttackerLeft,
        });
    }

    /// Ends the attack on a cell with the provided reason.
    pub fn cancel_attack(&mut self, cell: &Cell, reason: CancelReason) {
        let _ = self.execute(Command::CancelAttack {
            cell: cell.clone(),
            reason,
        });
    }

    /// Reports whether the cell holds a live attack.
    pub fn is_cell_under_attack(&self, cell: &Cell) -> bool {
        query::is_under_attack(&self.world, cell)
    }

    /// Reports whether any live attack targets land of the town.
    pub fn is_town_under_attack(&self, town: &TownId) -> bool {
        query::is_town_under_attack(&self.world, town, |cell| {
            self.host.town_block(cell).map(|block| block.town)
        })
    }

    /// Cells under attack, optionally restricted to one town's land.
    pub fn cells_under_attack(&self, town: Option<&TownId>) -> Vec<Cell> {
        match town {
            Some(town) => query::attacks_in_town(&self.world, town, |cell| {
                self.host.town_block(cell).map(|block| block.town)
            })
            .into_iter()
            .map(|attack| attack.cell().clone())
            .collect(),
            None => query::attacks(&self.world)
                .map(|attack| attack.cell().clone())
                .collect(),
        }
    }

    /// The live attack on a cell.
    pub fn attack_data(&self, cell: &Cell) -> Option<&CellUnderAttack> {
        query::attack(&self.world, cell)
    }

    /// Clock reading of the town's most recent flagging, zero if never.
    pub fn last_flagged(&self, town: &TownId) -> Duration {
        query::last_flagged(&self.world, town)
    }

    /// Records that the town was flagged now.
    pub fn town_flagged(&mut self, town: &TownId) {
        let now = query::clock(&self.world);
        let _ = self.execute(Command::RecordTownFlagged {
            town: town.clone(),
            at: now,
        });
    }

    /// Judges a block about to be broken or burned.
    pub fn check_block(
        &mut self,
        pos: &BlockPos,
        material: &Material,
        change: &BlockChange,
    ) -> BlockVerdict {
        let mut commands = Vec::new();
        let verdict = self.guard.check_block(
            pos,
            material,
            change,
            |pos| marker_lookup(&self.world, pos),
            &mut commands,
        );
        for command in commands {
            let _ = self.execute(command);
        }
        verdict
    }

    /// Advances every countdown by `dt`.
    pub fn tick(&mut self, dt: Duration) -> Vec<Event> {
        self.execute(Command::Tick { dt })
    }

    /// Translates a host notification and reports what the host should do.
    pub fn handle(&mut self, notification: HostNotification) -> Response {
        match notification {
            HostNotification::BlockPlaced {
                player,
                pos,
                material,
            } => {
                if material != query::rules(&self.world).flag.base
                    || !self.is_foreign_claim(&player, &pos)
                {
                    return Response::Allow;
                }
                match self.attempt_attack(&player, &pos) {
                    Ok(_) => Response::Allow,
                    Err(_) => Response::Deny,
                }
            }
            HostNotification::BlockBroken {
                player,
                pos,
                material,
            } => verdict_response(self.check_block(
                &pos,
                &material,
                &BlockChange::Broken { by: player },
            )),
            HostNotification::BlockBurned { pos, material } => {
                verdict_response(self.check_block(&pos, &material, &BlockChange::Burned))
            }
            HostNotification::Exploded { blocks } => {
                let spared: Vec<BlockPos> = self
                    .guard
                    .spared_by_explosion(&blocks, |pos| marker_lookup(&self.world, pos))
                    .into_iter()
                    .cloned()
                    .collect();
                if spared.is_empty() {
                    Response::Allow
                } else {
                    Response::Spare(spared)
                }
            }
            HostNotification::PistonMoved { blocks } => verdict_response(
                self.guard
                    .check_piston(&blocks, |pos| marker_lookup(&self.world, pos)),
            ),
            HostNotification::PlayerQuit { player } => {
                self.remove_attacker_flags(&player);
                Response::Allow
            }
            HostNotification::AdminCancel { cell } => {
                self.cancel_attack(&cell, CancelReason::Administrative);
                Response::Allow
            }
        }
    }

    /// Cancels every live attack and hands the host back.
    pub fn shutdown(mut self) -> H {
        let live = query::attack_count(&self.world);
        let _ = self.execute(Command::CancelAllAttacks {
            reason: CancelReason::Shutdown,
        });
        info!(target: "flag_war::plugin", canceled = live, "flag war disabled");
        self.host
    }

    /// A flag base only starts an attack on land claimed by another town.
    fn is_foreign_claim(&self, player: &PlayerName, pos: &BlockPos) -> bool {
        let cell = Cell::containing(pos, query::rules(&self.world).cell_size);
        let Some(block) = self.host.town_block(&cell) else {
            return false;
        };
        let home = self.host.resident(player).and_then(|resident| resident.town);
        home.as_ref() != Some(&block.town)
    }

    fn execute(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        for event in &events {
            self.forward(event);
        }
        events
    }

    fn forward(&mut self, event: &Event) {
        match event {
            Event::MarkersPlaced { blocks } => {
                for block in blocks {
                    self.host.set_block(&block.pos, &block.material);
                }
            }
            Event::MarkersCleared { positions } => {
                for pos in positions {
                    self.host.clear_block(pos);
                }
            }
            _ => {}
        }
        self.host.publish(event);
    }
}

fn marker_lookup(world: &World, pos: &BlockPos) -> Option<(Cell, MarkerRole)> {
    query::marker_at(world, pos).map(|(attack, role)| (attack.cell().clone(), role))
}

fn verdict_response(verdict: BlockVerdict) -> Response {
    match verdict {
        BlockVerdict::Allow => Response::Allow,
        BlockVerdict::Deny => Response::Deny,
    }
}
