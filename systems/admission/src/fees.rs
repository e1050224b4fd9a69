//! Placement cost and worst-case fine exposure.

use flag_war_core::{AttackRejection, FineKind};

/// Prices and rewards that determine what an attacker may owe.
///
/// Negative won rewards are fines the attacker pays for rebuilding captured
/// land; positive ones are paid to the attacker and never count as exposure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeeSchedule {
    /// Flat cost charged when a flag is placed.
    pub cost_to_place_war_flag: f64,
    /// Amount paid to the defenders for every defended flag.
    pub defended_attack_reward: f64,
    /// Reward for capturing a home block; negative values are fines.
    pub won_home_block_reward: f64,
    /// Reward for capturing an ordinary claim; negative values are fines.
    pub won_town_block_reward: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            cost_to_place_war_flag: 10.0,
            defended_attack_reward: 10.0,
            won_home_block_reward: 100.0,
            won_town_block_reward: 10.0,
        }
    }
}

/// Worst-case totals an attacker could owe across all of their live flags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Exposure {
    /// Owed if every live flag, including the new one, is defended.
    pub defended_total: f64,
    /// Owed in rebuilding fines if every live flag succeeds.
    pub rebuilding_total: f64,
}

impl Exposure {
    /// Computes the exposure for an attacker holding `active_flags` flags who
    /// is about to place one more on a home block or an ordinary claim.
    #[must_use]
    pub fn compute(schedule: &FeeSchedule, active_flags: usize, target_is_home_block: bool) -> Self {
        let active = active_flags as f64;
        let home_fine = fine_from_reward(schedule.won_home_block_reward);
        let town_fine = fine_from_reward(schedule.won_town_block_reward);

        let rebuilding_total = if target_is_home_block {
            home_fine + active * town_fine
        } else {
            (active + 1.0) * town_fine
        };

        Self {
            defended_total: schedule.defended_attack_reward * (active + 1.0),
            rebuilding_total,
        }
    }

    /// The larger of the two totals and which scenario it is.
    ///
    /// There is no exposure unless both totals are positive. Only one future
    /// can happen, so the totals are compared, never summed. Ties go to the
    /// rebuilding scenario.
    #[must_use]
    pub fn worst_case(&self) -> Option<(f64, FineKind)> {
        if self.defended_total <= 0.0 || self.rebuilding_total <= 0.0 {
            return None;
        }
        if self.defended_total > self.rebuilding_total {
            Some((self.defended_total, FineKind::DefendedAttack))
        } else {
            Some((self.rebuilding_total, FineKind::Rebuilding))
        }
    }
}

fn fine_from_reward(reward: f64) -> f64 {
    if reward < 0.0 {
        -reward
    } else {
        0.0
    }
}

/// Verifies that `balance` covers the placement cost and the worst case.
pub(crate) fn check_funds(
    schedule: &FeeSchedule,
    balance: f64,
    active_flags: usize,
    target_is_home_block: bool,
    format: impl Fn(f64) -> String,
) -> Result<(), AttackRejection> {
    let cost = schedule.cost_to_place_war_flag;
    if balance < cost {
        return Err(AttackRejection::InsufficientFunds { cost: format(cost) });
    }

    let exposure = Exposure::compute(schedule, active_flags, target_is_home_block);
    if let Some((fine, kind)) = exposure.worst_case() {
        if balance < cost + fine {
            return Err(AttackRejection::InsufficientFutureFunds {
                cost: format(fine),
                flags: active_flags.saturating_add(1),
                fine: kind,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fined() -> FeeSchedule {
        FeeSchedule {
            cost_to_place_war_flag: 5.0,
            defended_attack_reward: 10.0,
            won_home_block_reward: -50.0,
            won_town_block_reward: -15.0,
        }
    }

    fn plain(amount: f64) -> String {
        format!("{amount:.0}")
    }

    #[test]
    fn home_block_fine_counts_once() {
        let exposure = Exposure::compute(&fined(), 2, true);
        assert!((exposure.rebuilding_total - (50.0 + 2.0 * 15.0)).abs() < 1e-9);
        assert!((exposure.defended_total - 30.0).abs() < 1e-9);
    }

    #[test]
    fn ordinary_claims_fine_every_flag() {
        let exposure = Exposure::compute(&fined(), 2, false);
        assert!((exposure.rebuilding_total - 45.0).abs() < 1e-9);
        assert_eq!(exposure.worst_case(), Some((45.0, FineKind::Rebuilding)));
    }

    #[test]
    fn positive_rewards_are_not_exposure() {
        let exposure = Exposure::compute(&FeeSchedule::default(), 3, true);
        assert_eq!(exposure.rebuilding_total, 0.0);
        assert!((exposure.defended_total - 40.0).abs() < 1e-9);
        assert_eq!(exposure.worst_case(), None, "no rebuilding fine means no reserve");
    }

    #[test]
    fn placement_cost_suffices_without_rebuilding_fines() {
        let schedule = FeeSchedule::default();
        assert_eq!(check_funds(&schedule, 10.0, 0, false, plain), Ok(()));
        assert_eq!(check_funds(&schedule, 15.0, 4, true, plain), Ok(()));
    }

    #[test]
    fn defended_total_wins_when_larger() {
        let schedule = FeeSchedule {
            defended_attack_reward: 40.0,
            ..fined()
        };
        assert_eq!(
            check_funds(&schedule, 84.0, 1, false, plain),
            Err(AttackRejection::InsufficientFutureFunds {
                cost: "80".to_owned(),
                flags: 2,
                fine: FineKind::DefendedAttack,
            })
        );
        assert_eq!(check_funds(&schedule, 85.0, 1, false, plain), Ok(()));
    }

    #[test]
    fn worst_case_is_the_larger_total_not_the_sum() {
        // defended 30 vs rebuilding 45: 5 + 45 = 50 suffices even though
        // 5 + 30 + 45 = 80 would not.
        assert_eq!(check_funds(&fined(), 50.0, 2, false, plain), Ok(()));
        assert_eq!(
            check_funds(&fined(), 49.0, 2, false, plain),
            Err(AttackRejection::InsufficientFutureFunds {
                cost: "45".to_owned(),
                flags: 3,
                fine: FineKind::Rebuilding,
            })
        );
    }

    #[test]
    fn placement_cost_is_checked_first() {
        assert_eq!(
            check_funds(&fined(), 4.0, 0, false, plain),
            Err(AttackRejection::InsufficientFunds {
                cost: "5".to_owned()
            })
        );
    }

    #[test]
    fn free_schedule_never_rejects() {
        let free = FeeSchedule {
            cost_to_place_war_flag: 0.0,
            defended_attack_reward: 0.0,
            won_home_block_reward: 0.0,
            won_town_block_reward: 0.0,
        };
        assert_eq!(check_funds(&free, 0.0, 9, true, plain), Ok(()));
    }
}
