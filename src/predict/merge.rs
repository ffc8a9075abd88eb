use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Duration;

use crate::predict::types::{Combined, OverPass};

const INDIVIDUAL_CUTOFF_MINUTES: i64 = 90;

/// Merge cutoffs in minutes, keyed by satellite name
pub type CutoffTable = HashMap<String, f64>;

/// Sort a batch and fold neighbouring overpasses together.
///
/// Individual mode groups by sector names and never unions distinct sector
/// sets; combined mode groups by satellite and unions sector sets of
/// overlapping windows. Within a group, newer windows come first.
///
/// A merge can widen a window until it reaches a record emitted earlier in the
/// same fold, so folding repeats until a pass merges nothing. The result is
/// therefore a fixed point: reducing it again returns it unchanged.
pub fn reduce(
    mut passes: Vec<OverPass>,
    cutoffs: Option<&CutoffTable>,
    individual: bool,
) -> Vec<OverPass> {
    loop {
        let before = passes.len();
        passes = fold_sorted(passes, cutoffs, individual);
        if passes.len() == before {
            return passes;
        }
    }
}

fn fold_sorted(
    mut passes: Vec<OverPass>,
    cutoffs: Option<&CutoffTable>,
    individual: bool,
) -> Vec<OverPass> {
    passes.sort_by(|a, b| {
        let group = if individual {
            a.sector_names().cmp(b.sector_names())
        } else {
            b.satellite_name().cmp(a.satellite_name())
        };
        group.then_with(|| b.base().cmp(&a.base()))
    });
    log::debug!("Sorted {} overpasses (individual: {})", passes.len(), individual);

    let mut sorted = passes.into_iter();
    let Some(mut current) = sorted.next() else {
        return Vec::new();
    };
    let mut reduced = Vec::new();

    for pass in sorted {
        let cutoff = cutoff_for(pass.satellite_name(), cutoffs, individual);
        match pass.combine(Some(&current), cutoff, individual) {
            Combined::Merged(merged) => current = merged,
            Combined::Unmerged(_, _) => {
                reduced.push(std::mem::replace(&mut current, pass));
            }
        }
    }
    reduced.push(current);

    reduced
}

fn cutoff_for(satellite: &str, cutoffs: Option<&CutoffTable>, individual: bool) -> Option<Duration> {
    match cutoffs {
        None if individual => Some(Duration::minutes(INDIVIDUAL_CUTOFF_MINUTES)),
        None => None,
        Some(table) => table
            .get(satellite)
            .map(|minutes| Duration::milliseconds((minutes * 60_000.0).round() as i64)),
    }
}

/// Order used when presenting a reduced batch: by window start, then satellite
pub fn chronological(a: &OverPass, b: &OverPass) -> Ordering {
    a.start()
        .cmp(&b.start())
        .then_with(|| a.satellite_name().cmp(b.satellite_name()))
}
