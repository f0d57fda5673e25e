//! Diversification pass shared by every scoring method.
//!
//! The head of the list is purely score-ordered; once 70% of the
//! requested limit is filled, rooms from an already-represented property
//! or price bracket are passed over so a single building or bracket
//! cannot dominate the tail. Skipped rooms are reconsidered only when the
//! result set would otherwise come up short.

use std::collections::HashSet;

use uuid::Uuid;

use crate::scoring::ScoredRoom;
use crate::types::PriceBracket;

/// Fraction of the limit filled before diversity constraints kick in.
const DIVERSITY_THRESHOLD: f64 = 0.7;

/// Reduce a ranked list to exactly `limit` entries (fewer if candidates
/// run out), diversity-constrained in the tail.
pub fn apply(ranked: Vec<ScoredRoom>, limit: usize) -> Vec<ScoredRoom> {
    if limit == 0 {
        return Vec::new();
    }

    let unconstrained_slots = (limit as f64 * DIVERSITY_THRESHOLD).ceil() as usize;

    let mut selected: Vec<ScoredRoom> = Vec::with_capacity(limit);
    let mut skipped: Vec<ScoredRoom> = Vec::new();
    let mut seen_properties: HashSet<Uuid> = HashSet::new();
    let mut seen_brackets: HashSet<PriceBracket> = HashSet::new();

    for entry in ranked {
        if selected.len() >= limit {
            break;
        }

        let property = entry.room.property_id;
        let bracket = PriceBracket::from_price(entry.room.price);

        let constrained = selected.len() >= unconstrained_slots;
        if constrained && (seen_properties.contains(&property) || seen_brackets.contains(&bracket))
        {
            skipped.push(entry);
            continue;
        }

        seen_properties.insert(property);
        seen_brackets.insert(bracket);
        selected.push(entry);
    }

    // Backfill from the skipped pool rather than returning short.
    let mut refill = skipped.into_iter();
    while selected.len() < limit {
        match refill.next() {
            Some(entry) => selected.push(entry),
            None => break,
        }
    }

    selected
}
