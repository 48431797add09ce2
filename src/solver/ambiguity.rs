//! Filling ambiguous cells from their resolved neighbours
//!
//! Within a period row, a run of ambiguous cells is filled when the resolved
//! cells bracketing it agree, or when only one side exists. Runs between two
//! different strategies, and rows with nothing resolved, stay ambiguous.

use rayon::prelude::*;

use super::PolicyCell;

/// Resolve one row in place
pub fn resolve_row(row: &mut [PolicyCell]) {
    let mut i = 0;
    while i < row.len() {
        if row[i].is_determined() {
            i += 1;
            continue;
        }

        let run_start = i;
        let run_end = row[i..]
            .iter()
            .position(|c| c.is_determined())
            .map_or(row.len(), |k| i + k);

        let below = run_start.checked_sub(1).and_then(|k| row[k].strategy());
        let above = row.get(run_end).and_then(|c| c.strategy());

        let fill = match (below, above) {
            (Some(b), Some(a)) if a == b => Some(b),
            (Some(_), Some(_)) => None,
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        };

        if let Some(strategy) = fill {
            row[run_start..run_end].fill(PolicyCell::Determined(strategy));
        }
        i = run_end;
    }
}

/// Resolve every `bins`-wide row of `policy`; returns the cells left ambiguous
pub fn resolve_ambiguity(policy: &mut [PolicyCell], bins: usize, parallel: bool) -> usize {
    if bins == 0 {
        return 0;
    }

    if parallel {
        policy.par_chunks_mut(bins).for_each(resolve_row);
    } else {
        policy.chunks_mut(bins).for_each(resolve_row);
    }

    policy.iter().filter(|c| !c.is_determined()).count()
}
