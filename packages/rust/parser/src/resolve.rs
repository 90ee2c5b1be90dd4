//! Duplicate resolution for A/B lunch splits.
//!
//! On A/B lunch days periods 3 and 4 are printed twice in the same column,
//! once per lunch block. Exactly one printing per (column, period) survives.

use std::collections::BTreeMap;

use bellgrid_shared::LunchRule;
use tracing::debug;

use crate::occurrence::{Evidence, RawOccurrence, ResolvedOccurrence};

/// Collapse raw occurrences to one per (column, period), ordered by column
/// then period. Groups whose chosen occurrence has no time are dropped.
pub fn resolve_duplicates(raw: Vec<RawOccurrence>, rules: &[LunchRule]) -> Vec<ResolvedOccurrence> {
    let mut groups: BTreeMap<(usize, u8), Vec<RawOccurrence>> = BTreeMap::new();
    for occurrence in raw {
        groups
            .entry((occurrence.column, occurrence.period))
            .or_default()
            .push(occurrence);
    }

    groups
        .into_iter()
        .filter_map(|((column, period), group)| {
            let rule = rules.iter().find(|r| r.period == period);
            let candidates = group.len();
            let chosen = select(group, rule)?;
            let Some(span) = chosen.span else {
                debug!(column, period, "chosen occurrence has no time, dropped");
                return None;
            };
            if candidates > 1 {
                debug!(column, period, candidates, %span, "resolved duplicate");
            }
            Some(ResolvedOccurrence {
                period,
                column,
                span,
            })
        })
        .collect()
}

/// Pick one occurrence from a non-empty group sharing (column, period).
fn select(group: Vec<RawOccurrence>, rule: Option<&LunchRule>) -> Option<RawOccurrence> {
    let from_layout = group
        .iter()
        .any(|o| matches!(o.evidence, Evidence::Layout { .. }));

    if from_layout {
        select_by_position(group, rule)
    } else {
        select_by_lunch_marker(group, rule)
    }
}

/// Rank printings top of page first and take the rule's rank, or the topmost
/// when there is no rule or too few printings.
fn select_by_position(mut group: Vec<RawOccurrence>, rule: Option<&LunchRule>) -> Option<RawOccurrence> {
    group.sort_by(|a, b| page_y(b).total_cmp(&page_y(a)));
    let rank = rule.map_or(0, |r| r.layout_rank);
    if rank < group.len() {
        Some(group.swap_remove(rank))
    } else {
        group.into_iter().next()
    }
}

/// Walk printings in text order keeping the first; a later printing takes
/// over only when it follows the lunch marker named by the rule.
fn select_by_lunch_marker(
    mut group: Vec<RawOccurrence>,
    rule: Option<&LunchRule>,
) -> Option<RawOccurrence> {
    group.sort_by_key(stream_offset);
    let mut printings = group.into_iter();
    let first = printings.next()?;

    Some(printings.fold(first, |kept, later| {
        let follows_marker = match (rule, later.evidence) {
            (Some(rule), Evidence::Stream { lunch, .. }) => lunch == Some(rule.marker),
            _ => false,
        };
        if follows_marker { later } else { kept }
    }))
}

fn page_y(occurrence: &RawOccurrence) -> f64 {
    match occurrence.evidence {
        Evidence::Layout { y, .. } => y,
        Evidence::Stream { .. } => f64::NEG_INFINITY,
    }
}

fn stream_offset(occurrence: &RawOccurrence) -> usize {
    match occurrence.evidence {
        Evidence::Stream { offset, .. } => offset,
        Evidence::Layout { .. } => usize::MAX,
    }
}
