//! State machine and marker geometry of a single contested cell.

use std::time::Duration;

use flag_war_core::{
    AttackRules, BeaconRules, BlockPos, CancelReason, Cell, MarkerBlock, MarkerRole, Material,
    PlayerName,
};

/// Lifecycle stage of an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttackState {
    /// Constructed but not yet counting down.
    Pending,
    /// Counting down with markers placed.
    Active,
    /// The attacker held the flag until the deadline.
    Won,
    /// The defenders destroyed the timer marker.
    Defended,
    /// The attack ended without a winner.
    Canceled,
}

impl AttackState {
    /// Reports whether the attack has not reached a terminal state.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

/// Terminal transition requested for an attack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    Won,
    Defended(Option<PlayerName>),
    Canceled(CancelReason),
}

impl Resolution {
    const fn state(&self) -> AttackState {
        match self {
            Self::Won => AttackState::Won,
            Self::Defended(_) => AttackState::Defended,
            Self::Canceled(_) => AttackState::Canceled,
        }
    }
}

/// Result of polling an attack's countdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Countdown {
    Idle,
    Advanced {
        phase: u32,
        remaining: Duration,
        repaint: Vec<MarkerBlock>,
    },
    Expired,
}

/// Live contest over a single cell.
#[derive(Clone, Debug)]
pub struct CellUnderAttack {
    cell: Cell,
    attacker: PlayerName,
    flag_base: BlockPos,
    flag_timer: BlockPos,
    flag_light: BlockPos,
    flag_materials: (Material, Material),
    beacon: Vec<MarkerBlock>,
    state: AttackState,
    started_at: Duration,
    deadline: Duration,
    next_refresh: Duration,
    phase: u32,
}

impl CellUnderAttack {
    pub(crate) fn new(cell: Cell, attacker: PlayerName, flag_base: BlockPos) -> Self {
        let flag_timer = flag_base.offset(0, 1, 0);
        let flag_light = flag_base.offset(0, 2, 0);
        Self {
            cell,
            attacker,
            flag_base,
            flag_timer,
            flag_light,
            flag_materials: (Material::new("AIR"), Material::new("AIR")),
            beacon: Vec::new(),
            state: AttackState::Pending,
            started_at: Duration::ZERO,
            deadline: Duration::ZERO,
            next_refresh: Duration::ZERO,
            phase: 0,
        }
    }

    /// Starts the countdown and returns the markers to place.
    ///
    /// Only a pending attack can begin; any other state yields no markers.
    pub(crate) fn begin(&mut self, now: Duration, rules: &AttackRules) -> Vec<MarkerBlock> {
        if self.state != AttackState::Pending {
            return Vec::new();
        }

        self.state = AttackState::Active;
        self.started_at = now;
        self.deadline = now.saturating_add(rules.attack_duration);
        self.next_refresh = self.refresh_after(now, rules.refresh_interval);
        self.phase = 0;
        self.flag_materials = (rules.flag.base.clone(), rules.flag.light.clone());
        let timer_material = rules.flag.timer_for_phase(self.phase);
        self.beacon = match &rules.beacon {
            Some(beacon) => beacon_blocks(&self.flag_light, beacon, &timer_material),
            None => Vec::new(),
        };

        self.markers_with(timer_material)
    }

    /// Checks the deadline and refresh schedule against the provided clock.
    pub(crate) fn poll(&mut self, now: Duration, rules: &AttackRules) -> Countdown {
        if self.state != AttackState::Active {
            return Countdown::Idle;
        }

        if now >= self.deadline {
            return Countdown::Expired;
        }

        if now < self.next_refresh {
            return Countdown::Idle;
        }

        while self.next_refresh <= now {
            self.phase = self.phase.saturating_add(1);
            self.next_refresh = self.refresh_after(self.next_refresh, rules.refresh_interval);
        }

        let timer_material = rules.flag.timer_for_phase(self.phase);
        let mut repaint = vec![MarkerBlock {
            pos: self.flag_timer.clone(),
            material: timer_material.clone(),
            role: MarkerRole::FlagTimer,
        }];
        for block in &mut self.beacon {
            if block.role == MarkerRole::BeaconCore {
                block.material = timer_material.clone();
                repaint.push(block.clone());
            }
        }

        Countdown::Advanced {
            phase: self.phase,
            remaining: self.deadline.saturating_sub(now),
            repaint,
        }
    }

    /// Applies a terminal transition and returns the marker positions to clear.
    ///
    /// Returns `None` when the attack already ended or the transition is not
    /// permitted from the current state, leaving the attack untouched.
    pub(crate) fn finish(&mut self, resolution: &Resolution) -> Option<Vec<BlockPos>> {
        let placed = match (self.state, resolution) {
            (AttackState::Active, _) => true,
            (AttackState::Pending, Resolution::Canceled(_)) => false,
            _ => return None,
        };

        self.state = resolution.state();
        if !placed {
            return Some(Vec::new());
        }

        let mut positions = vec![
            self.flag_base.clone(),
            self.flag_timer.clone(),
            self.flag_light.clone(),
        ];
        positions.extend(self.beacon.drain(..).map(|block| block.pos));
        Some(positions)
    }

    /// Identifies which marker, if any, occupies the provided position.
    #[must_use]
    pub fn marker_at(&self, pos: &BlockPos) -> Option<MarkerRole> {
        if self.state != AttackState::Active {
            return None;
        }
        if *pos == self.flag_timer {
            return Some(MarkerRole::FlagTimer);
        }
        if *pos == self.flag_base {
            return Some(MarkerRole::FlagBase);
        }
        if *pos == self.flag_light {
            return Some(MarkerRole::FlagLight);
        }
        self.beacon
            .iter()
            .find(|block| block.pos == *pos)
            .map(|block| block.role)
    }

    /// Reports whether the position holds this attack's defendable marker.
    #[must_use]
    pub fn is_flag_timer(&self, pos: &BlockPos) -> bool {
        self.marker_at(pos).is_some_and(MarkerRole::is_defendable)
    }

    /// Reports whether the position holds a marker nobody may alter.
    #[must_use]
    pub fn is_immutable_block(&self, pos: &BlockPos) -> bool {
        self.marker_at(pos).is_some_and(MarkerRole::is_immutable)
    }

    /// Snapshot of every marker currently placed for the attack.
    #[must_use]
    pub fn markers(&self, rules: &AttackRules) -> Vec<MarkerBlock> {
        if self.state != AttackState::Active {
            return Vec::new();
        }
        self.markers_with(rules.flag.timer_for_phase(self.phase))
    }

    /// Cell under attack.
    #[must_use]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Player who placed the flag.
    #[must_use]
    pub fn attacker(&self) -> &PlayerName {
        &self.attacker
    }

    /// Block the flag base occupies.
    #[must_use]
    pub fn flag_base(&self) -> &BlockPos {
        &self.flag_base
    }

    /// Block the timer marker occupies.
    #[must_use]
    pub fn flag_timer(&self) -> &BlockPos {
        &self.flag_timer
    }

    /// Block the flag light occupies.
    #[must_use]
    pub fn flag_light(&self) -> &BlockPos {
        &self.flag_light
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn state(&self) -> AttackState {
        self.state
    }

    /// Clock reading at which the countdown began.
    #[must_use]
    pub const fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Clock reading at which the attacker wins.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Countdown phase currently displayed.
    #[must_use]
    pub const fn phase(&self) -> u32 {
        self.phase
    }

    /// Time left until the deadline.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> Duration {
        self.deadline.saturating_sub(now)
    }

    fn refresh_after(&self, from: Duration, interval: Duration) -> Duration {
        if interval.is_zero() {
            self.deadline
        } else {
            from.saturating_add(interval)
        }
    }

    fn markers_with(&self, timer_material: Material) -> Vec<MarkerBlock> {
        let (base, light) = self.flag_materials.clone();
        let mut blocks = vec![
            MarkerBlock {
                pos: self.flag_base.clone(),
                material: base,
                role: MarkerRole::FlagBase,
            },
            MarkerBlock {
                pos: self.flag_timer.clone(),
                material: timer_material,
                role: MarkerRole::FlagTimer,
            },
            MarkerBlock {
                pos: self.flag_light.clone(),
                material: light,
                role: MarkerRole::FlagLight,
            },
        ];
        blocks.extend(self.beacon.iter().cloned());
        blocks
    }
}

/// Lays out a wireframe cube hanging in the sky above the flag light.
///
/// The cube's edges are drawn with the wireframe material and its centre
/// block carries the countdown colour. Faces and interior stay empty.
fn beacon_blocks(flag_light: &BlockPos, rules: &BeaconRules, core: &Material) -> Vec<MarkerBlock> {
    let radius = i32::try_from(rules.radius).unwrap_or(i32::MAX / 4);
    let lowest_centre = flag_light
        .y()
        .saturating_add(rules.min_height_above_flag)
        .saturating_add(radius);
    let centre_y = rules
        .sky_height
        .saturating_sub(radius)
        .saturating_sub(1)
        .max(lowest_centre);
    let centre = BlockPos::new(flag_light.world(), flag_light.x(), centre_y, flag_light.z());

    let mut blocks = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let on_boundary = [dx, dy, dz]
                    .iter()
                    .filter(|offset| offset.abs() == radius)
                    .count();
                let role = if dx == 0 && dy == 0 && dz == 0 {
                    MarkerRole::BeaconCore
                } else if on_boundary >= 2 {
                    MarkerRole::BeaconWireframe
                } else {
                    continue;
                };
                let material = match role {
                    MarkerRole::BeaconCore => core.clone(),
                    _ => rules.wireframe.clone(),
                };
                blocks.push(MarkerBlock {
                    pos: centre.offset(dx, dy, dz),
                    material,
                    role,
                });
            }
        }
    }
    blocks
}
