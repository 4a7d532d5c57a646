use rand::Rng;
use rand::seq::SliceRandom;

use crate::dataservice::types::ServiceId;
use crate::error::{DfsError, Result};

/// Picks `count` distinct services uniformly at random, without replacement.
pub fn choose_replicas<R: Rng + ?Sized>(
    fleet: &[ServiceId],
    count: usize,
    rng: &mut R,
) -> Result<Vec<ServiceId>> {
    if fleet.len() < count {
        return Err(DfsError::InsufficientReplicas {
            required: count,
            available: fleet.len(),
        });
    }

    Ok(fleet.choose_multiple(rng, count).cloned().collect())
}
