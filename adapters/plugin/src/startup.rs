//! Compatibility checks and material validation performed at boot.

use std::cmp::Ordering;

use flag_war_core::{host::BlockWorld, AttackRules, Material, STARTUP_BANNER};
use thiserror::Error;
use tracing::{info, warn};

/// Oldest town domain release the engine works with.
pub const MIN_HOST_VERSION: &str = "0.96.7.15";

const COPYRIGHT: &str = "Copyright \u{a9} 2021 TownyAdvanced";

/// Failure that prevents the plugin from enabling.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StartupError {
    /// The town domain is too old.
    #[error("town domain {found} is older than the required {required}")]
    HostOutdated {
        /// Version reported by the host.
        found: String,
        /// Minimum supported version.
        required: &'static str,
    },
    /// The host reported a version that is not dotted numbers.
    #[error("cannot read town domain version `{0}`")]
    UnreadableVersion(String),
}

/// Fails unless `version` is at least [`MIN_HOST_VERSION`].
pub fn check_host_version(version: &str) -> Result<(), StartupError> {
    let found = parse_version(version)?;
    let required = parse_version(MIN_HOST_VERSION)?;
    if compare_versions(&found, &required) == Ordering::Less {
        return Err(StartupError::HostOutdated {
            found: version.to_owned(),
            required: MIN_HOST_VERSION,
        });
    }
    Ok(())
}

/// Reads `0.96.7.15` style versions; a non-numeric suffix on a component,
/// such as `-SNAPSHOT`, is ignored.
fn parse_version(version: &str) -> Result<Vec<u32>, StartupError> {
    version
        .trim()
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits
                .parse::<u32>()
                .map_err(|_| StartupError::UnreadableVersion(version.to_owned()))
        })
        .collect()
}

fn compare_versions(left: &[u32], right: &[u32]) -> Ordering {
    let len = left.len().max(right.len());
    (0..len)
        .map(|index| {
            let a = left.get(index).copied().unwrap_or(0);
            let b = right.get(index).copied().unwrap_or(0);
            a.cmp(&b)
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Replaces marker materials the block model cannot draw with safe
/// fallbacks, logging each replacement.
pub fn resolve_materials<B>(mut rules: AttackRules, blocks: &B) -> AttackRules
where
    B: BlockWorld + ?Sized,
{
    rules.flag.base = usable_or(blocks, "flag.base_block", rules.flag.base, "OAK_FENCE");
    rules.flag.light = usable_or(blocks, "flag.light_block", rules.flag.light, "TORCH");
    rules.flag.timer = std::mem::take(&mut rules.flag.timer)
        .into_iter()
        .map(|material| usable_or(blocks, "flag.timer_blocks", material, "WHITE_WOOL"))
        .collect();
    if let Some(beacon) = rules.beacon.as_mut() {
        let wireframe = beacon.wireframe.clone();
        beacon.wireframe = usable_or(blocks, "beacon.wireframe_block", wireframe, "GLOWSTONE");
    }
    rules
}

fn usable_or<B>(blocks: &B, field: &str, material: Material, fallback: &str) -> Material
where
    B: BlockWorld + ?Sized,
{
    let usable = blocks
        .material_traits(&material)
        .is_some_and(|traits| traits.is_marker_capable());
    if usable {
        return material;
    }
    warn!(
        target: "flag_war::startup",
        field,
        %material,
        fallback,
        "material cannot be used for markers, falling back"
    );
    Material::new(fallback)
}

/// Logs the banner, optionally preceded by the marquee.
pub(crate) fn announce(show_marquee: bool) {
    if show_marquee {
        info!(target: "flag_war::startup", "=== {} ===", STARTUP_BANNER);
    }
    info!(target: "flag_war::startup", "{}", COPYRIGHT);
}
