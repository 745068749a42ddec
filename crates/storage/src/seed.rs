use anyhow::{Context, Result};
use rand::Rng;
use shared::domain::Owner;
use tracing::info;

use crate::OwnerRepository;

pub const DEFAULT_DEMO_OWNERS: usize = 150;
pub const DEMO_TELEPHONE: &str = "5555555555";
pub const DEMO_LAST_NAMES: [&str; 4] = ["Smith", "Wilson", "Jones", "Washington"];

pub fn demo_owner<R: Rng>(index: usize, rng: &mut R) -> Owner {
    Owner {
        id: None,
        first_name: format!("Guy{index}"),
        last_name: DEMO_LAST_NAMES[rng.gen_range(0..DEMO_LAST_NAMES.len())].to_string(),
        address: format!("Main Street #{}", rng.gen_range(0..1000)),
        city: format!("Town {}", rng.gen_range(0..200)),
        telephone: DEMO_TELEPHONE.to_string(),
        pets: Vec::new(),
    }
}

/// Saves `count` synthetic owners one at a time and returns them with their
/// assigned ids.
pub async fn seed_demo_owners<R>(
    owners: &dyn OwnerRepository,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Owner>>
where
    R: Rng + Send,
{
    let mut seeded = Vec::with_capacity(count);
    for index in 0..count {
        let mut owner = demo_owner(index, rng);
        owners
            .save(&mut owner)
            .await
            .with_context(|| format!("failed to seed demo owner {index}"))?;
        seeded.push(owner);
    }
    info!(count, "seeded demo owners");
    Ok(seeded)
}
