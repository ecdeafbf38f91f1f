//! Label selection for the next idea.
//!
//! The recent-window exclusion is advisory: when every label was used
//! recently the full set is drawn from again, so selection never blocks
//! a run.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use std::collections::BTreeSet;

use crate::config::LabelSpec;

/// Returned when no labels are configured at all.
pub const FALLBACK_LABEL: &str = "work";

/// The labels not used inside the window, in configuration order.
pub fn available_labels<'a>(
    all: &'a [LabelSpec],
    excluded: &BTreeSet<String>,
) -> Vec<&'a LabelSpec> {
    all.iter().filter(|l| !excluded.contains(&l.name)).collect()
}

/// Pick the next label.
///
/// Draws from `all − excluded`, or from `all` when that difference is
/// empty. The draw is weighted by [`LabelSpec::weight`]; when all
/// candidate weights are zero it is uniform.
pub fn select_label<R: Rng + ?Sized>(
    all: &[LabelSpec],
    excluded: &BTreeSet<String>,
    rng: &mut R,
) -> LabelSpec {
    let available = available_labels(all, excluded);
    let pool: Vec<&LabelSpec> = if available.is_empty() {
        all.iter().collect()
    } else {
        available
    };

    if pool.is_empty() {
        return LabelSpec::new(FALLBACK_LABEL, "");
    }

    let picked = match WeightedIndex::new(pool.iter().map(|l| l.weight)) {
        Ok(dist) => pool[dist.sample(rng)],
        Err(_) => pool.choose(rng).copied().unwrap_or(pool[0]),
    };
    picked.clone()
}
