#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Admission control that decides whether a player may start an attack.
//!
//! The system is pure with respect to the attack registry: callers pass the
//! attacker's current live flag count and receive either a grant, a silent
//! withdrawal, or the first rejection reason. Registration itself stays with
//! the world.

use flag_war_core::{
    host::{AttackAttempt, Host, Resident},
    AttackRejection, BlockPos, Cell, NationId, PlayerName, TownId,
};

mod fees;

pub use fees::{Exposure, FeeSchedule};

/// Ledger memo attached to the placement charge.
pub const WAR_FLAG_MEMO: &str = "War - WarFlag Cost";

/// Configuration parameters required to construct the admission system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Minimum online residents each participating town needs.
    pub min_online_in_town: usize,
    /// Minimum online residents each participating nation needs.
    pub min_online_in_nation: usize,
    /// Restricts attacks to the edge of the defending town's claims.
    pub attacking_borders_only: bool,
    /// Placement cost and fines.
    pub fees: FeeSchedule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_online_in_town: 2,
            min_online_in_nation: 3,
            attacking_borders_only: false,
            fees: FeeSchedule::default(),
        }
    }
}

/// Request to start an attack by placing a flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackRequest {
    /// Player placing the flag.
    pub attacker: PlayerName,
    /// Block the flag base would occupy.
    pub flag_base: BlockPos,
    /// Cell containing the flag base.
    pub cell: Cell,
}

/// Everything established while admitting an attack.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackGrant {
    /// The admitted request.
    pub request: AttackRequest,
    /// Town of the attacker.
    pub attacking_town: TownId,
    /// Nation of the attacker.
    pub attacking_nation: NationId,
    /// Town owning the target cell.
    pub defending_town: TownId,
    /// Nation of the defending town.
    pub defending_nation: NationId,
    /// Amount to charge on commit; zero when no economy is active.
    pub placement_cost: f64,
}

/// Outcome of an admission evaluation that raised no rejection.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Every check passed.
    Granted(AttackGrant),
    /// A listener cancelled the attempt without a reason; nothing is reported.
    Withdrawn,
}

/// Admission system that evaluates attack requests against the host domain.
#[derive(Clone, Debug, Default)]
pub struct Admission {
    config: Config,
}

impl Admission {
    /// Creates a new admission system using the supplied configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Configuration in force.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluates a request; the first failed check is the one reported.
    ///
    /// `active_flags` is the attacker's live flag count before this request.
    /// The only mutation performed is raising the cancelable attempt
    /// notification, which happens after every other check passed.
    pub fn evaluate<H>(
        &self,
        request: &AttackRequest,
        active_flags: usize,
        host: &mut H,
    ) -> Result<Verdict, AttackRejection>
    where
        H: Host + ?Sized,
    {
        let base = &request.flag_base;
        let surface = host
            .highest_block_y(base.world(), base.x(), base.z())
            .saturating_sub(1);
        if base.y() < surface {
            return Err(AttackRejection::FlagNotAboveGround);
        }

        let Some(Resident {
            town: Some(attacking_town),
            is_admin,
        }) = host.resident(&request.attacker)
        else {
            return Err(AttackRejection::NotInNation);
        };
        let attacking_nation = host
            .nation_of(&attacking_town)
            .ok_or(AttackRejection::NotInNation)?;

        if host.claim_count(&attacking_town) == 0 {
            return Err(AttackRejection::LandlessAttacker);
        }

        let town_block = host
            .town_block(&request.cell)
            .ok_or(AttackRejection::TargetNotClaimed)?;
        let defending_town = town_block.town;
        let defending_nation = host
            .nation_of(&defending_town)
            .ok_or(AttackRejection::TargetNotClaimed)?;
        if defending_nation == attacking_nation {
            return Err(AttackRejection::FriendlyTarget);
        }

        if host.is_neutral(&defending_nation) {
            return Err(AttackRejection::TargetIsPeaceful {
                nation: defending_nation,
            });
        }
        if !is_admin && host.is_neutral(&attacking_nation) {
            return Err(AttackRejection::TargetIsPeaceful {
                nation: attacking_nation,
            });
        }

        self.check_online_town(host, &defending_town)?;
        self.check_online_nation(host, &defending_nation)?;
        self.check_online_town(host, &attacking_town)?;
        self.check_online_nation(host, &attacking_nation)?;

        if self.config.attacking_borders_only
            && !host.is_on_edge_of_claims(&defending_town, &request.cell)
        {
            return Err(AttackRejection::BorderAttackOnly);
        }

        let economy = host.is_active();
        if economy {
            let balance = host.balance(&request.attacker);
            fees::check_funds(
                &self.config.fees,
                balance,
                active_flags,
                town_block.is_home_block,
                |amount| host.format(amount),
            )?;
        }

        let mut attempt = AttackAttempt::new(
            request.attacker.clone(),
            request.flag_base.clone(),
            request.cell.clone(),
        );
        host.attack_attempted(&mut attempt);
        if attempt.is_cancelled() {
            return match attempt.reason() {
                Some(reason) => Err(AttackRejection::AttackVetoed(reason.to_owned())),
                None => Ok(Verdict::Withdrawn),
            };
        }

        Ok(Verdict::Granted(AttackGrant {
            request: request.clone(),
            attacking_town,
            attacking_nation,
            defending_town,
            defending_nation,
            placement_cost: if economy {
                self.config.fees.cost_to_place_war_flag
            } else {
                0.0
            },
        }))
    }

    /// Applies the side effects of a granted attack to the host domain.
    ///
    /// Charges the placement cost, declares the attacking nation an enemy of
    /// the defenders, marks the cell a war zone, and announces the attack. A
    /// failed charge aborts before anything else changes, and a nation is
    /// never made its own enemy.
    pub fn commit<H>(&self, grant: &AttackGrant, host: &mut H) -> Result<(), AttackRejection>
    where
        H: Host + ?Sized,
    {
        let attacker = &grant.request.attacker;
        if grant.defending_nation == grant.attacking_nation {
            return Err(AttackRejection::FriendlyTarget);
        }
        if grant.placement_cost > 0.0 {
            if host
                .withdraw(attacker, grant.placement_cost, WAR_FLAG_MEMO)
                .is_err()
            {
                return Err(AttackRejection::InsufficientFunds {
                    cost: host.format(grant.placement_cost),
                });
            }
            let message = format!(
                "war flag purchased for {}",
                host.format(grant.placement_cost)
            );
            host.message(attacker, &message);
        }

        if !host.has_enemy(&grant.defending_nation, &grant.attacking_nation) {
            host.add_enemy(&grant.defending_nation, &grant.attacking_nation);
        }

        host.add_war_zone(&grant.request.cell);
        host.refresh_cache(&grant.request.cell);

        let announcement = format!(
            "{} is under attack at {} by {}",
            grant.defending_town, grant.request.cell, attacker
        );
        host.broadcast(&announcement);
        Ok(())
    }

    fn check_online_town<H>(&self, host: &H, town: &TownId) -> Result<(), AttackRejection>
    where
        H: Host + ?Sized,
    {
        let required = self.config.min_online_in_town;
        if host.online_in_town(town) < required {
            return Err(AttackRejection::InsufficientOnlinePlayers {
                required,
                name: town.to_string(),
            });
        }
        Ok(())
    }

    fn check_online_nation<H>(&self, host: &H, nation: &NationId) -> Result<(), AttackRejection>
    where
        H: Host + ?Sized,
    {
        let required = self.config.min_online_in_nation;
        if host.online_in_nation(nation) < required {
            return Err(AttackRejection::InsufficientOnlinePlayers {
                required,
                name: nation.to_string(),
            });
        }
        Ok(())
    }
}
