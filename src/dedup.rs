//! Collapse overlapping detections of the same symbol
//!
//! A line like `export function UserCard() {` in a `.tsx` file matches both
//! the generic function pattern and the component pattern. Occurrences are
//! keyed by (file, line, name); the one whose kind has the higher catalog
//! precedence survives, and ties keep whichever was seen first.

use std::collections::HashMap;

use crate::models::SymbolOccurrence;

/// Keep exactly one occurrence per (file, line, name)
///
/// Output keeps the first-seen order of keys.
pub fn dedup(occurrences: Vec<SymbolOccurrence>) -> Vec<SymbolOccurrence> {
    let input_len = occurrences.len();
    let mut slots: HashMap<(String, usize, String), usize> = HashMap::with_capacity(input_len);
    let mut kept: Vec<SymbolOccurrence> = Vec::with_capacity(input_len);

    for occurrence in occurrences {
        let key = (occurrence.path.clone(), occurrence.line, occurrence.name.clone());
        match slots.get(&key) {
            Some(&slot) => {
                if occurrence.kind.precedence() > kept[slot].kind.precedence() {
                    kept[slot] = occurrence;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(occurrence);
            }
        }
    }

    log::debug!("Deduplicated {} occurrences down to {}", input_len, kept.len());
    kept
}
