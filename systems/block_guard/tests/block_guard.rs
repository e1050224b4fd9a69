use flag_war_core::{AttackRules, BlockPos, Cell, Command, MarkerRole, Material, PlayerName};
use flag_war_system_block_guard::{BlockChange, BlockGuard, BlockVerdict, Config};

fn guard() -> BlockGuard {
    BlockGuard::new(Config::from_rules(&AttackRules::default()))
}

fn cell() -> Cell {
    Cell::new("world", 2, 3)
}

fn base() -> BlockPos {
    BlockPos::new("world", 36, 70, 50)
}

/// Lookup reporting a flag at `base()`: base, timer and light stacked upwards.
fn flag_lookup(pos: &BlockPos) -> Option<(Cell, MarkerRole)> {
    let base = base();
    let role = if *pos == base {
        MarkerRole::FlagBase
    } else if *pos == base.offset(0, 1, 0) {
        MarkerRole::FlagTimer
    } else if *pos == base.offset(0, 2, 0) {
        MarkerRole::FlagLight
    } else {
        return None;
    };
    Some((cell(), role))
}

#[test]
fn breaking_timer_defends_the_cell() {
    let mut commands = Vec::new();

    let verdict = guard().check_block(
        &base().offset(0, 1, 0),
        &Material::new("CYAN_WOOL"),
        &BlockChange::Broken {
            by: Some(PlayerName::new("Cato")),
        },
        flag_lookup,
        &mut commands,
    );

    assert_eq!(verdict, BlockVerdict::Deny);
    assert_eq!(
        commands,
        vec![Command::DefendAttack {
            cell: cell(),
            defender: Some(PlayerName::new("Cato")),
        }],
        "destroying the timer should request a defence",
    );
}

#[test]
fn burning_timer_defends_without_a_defender() {
    let mut commands = Vec::new();

    let verdict = guard().check_block(
        &base().offset(0, 1, 0),
        &Material::new("LIME_WOOL"),
        &BlockChange::Burned,
        flag_lookup,
        &mut commands,
    );

    assert!(verdict.is_denied());
    assert_eq!(
        commands,
        vec![Command::DefendAttack {
            cell: cell(),
            defender: None,
        }]
    );
}

#[test]
fn flag_base_and_light_are_immutable() {
    let mut commands = Vec::new();
    let guard = guard();

    for (pos, material) in [
        (base(), Material::new("OAK_FENCE")),
        (base().offset(0, 2, 0), Material::new("TORCH")),
    ] {
        let verdict = guard.check_block(
            &pos,
            &material,
            &BlockChange::Broken {
                by: Some(PlayerName::new("Cato")),
            },
            flag_lookup,
            &mut commands,
        );
        assert_eq!(verdict, BlockVerdict::Deny, "{material} at {pos} is protected");
    }
    assert!(commands.is_empty(), "immutable markers never defend");
}

#[test]
fn marker_material_away_from_attacks_is_allowed() {
    let mut commands = Vec::new();

    let verdict = guard().check_block(
        &BlockPos::new("world", 0, 64, 0),
        &Material::new("TORCH"),
        &BlockChange::Broken { by: None },
        flag_lookup,
        &mut commands,
    );

    assert_eq!(verdict, BlockVerdict::Allow);
    assert!(commands.is_empty());
}

#[test]
fn explosions_spare_every_marker() {
    let blast = vec![
        (base(), Material::new("OAK_FENCE")),
        (base().offset(0, 1, 0), Material::new("RED_WOOL")),
        (base().offset(1, 0, 0), Material::new("STONE")),
        (base().offset(0, -1, 0), Material::new("OAK_FENCE")),
    ];

    let spared = guard().spared_by_explosion(&blast, flag_lookup);

    assert_eq!(spared, vec![&blast[0].0, &blast[1].0]);
}

#[test]
fn pistons_cannot_push_markers() {
    let guard = guard();
    let untouched = [(base().offset(3, 0, 0), Material::new("STONE"))];
    let touching = [
        (base().offset(3, 0, 0), Material::new("STONE")),
        (base().offset(0, 2, 0), Material::new("TORCH")),
    ];

    assert_eq!(
        guard.check_piston(&untouched, flag_lookup),
        BlockVerdict::Allow
    );
    assert_eq!(guard.check_piston(&touching, flag_lookup), BlockVerdict::Deny);
}
