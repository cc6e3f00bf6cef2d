// SPDX-License-Identifier: GPL-3.0-or-later

//! Alignment of a query fingerprint against a stored one.
//!
//! The query is slid across the reference one sub-fingerprint at a time. At each
//! offset, aligned sub-fingerprints count as matched when they differ in at most
//! `max_bit_errors` bits. Negative offsets mean the query starts before the
//! reference does.

/// Best alignment found between a query and a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Reference index the first query item lines up with.
    pub offset: isize,
    /// Aligned items within the bit-error tolerance.
    pub matched: usize,
}

impl Alignment {
    /// Fraction of the query that matched.
    pub fn input_confidence(&self, query_len: usize) -> f32 {
        ratio(self.matched, query_len)
    }

    /// Fraction of the reference that matched.
    pub fn fingerprinted_confidence(&self, reference_len: usize) -> f32 {
        ratio(self.matched, reference_len)
    }
}

fn ratio(matched: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        matched as f32 / total as f32
    }
}

/// Find the offset with the most matched items. Ties keep the earliest offset.
pub fn best_alignment(query: &[u32], reference: &[u32], max_bit_errors: u32) -> Option<Alignment> {
    if query.is_empty() || reference.is_empty() {
        return None;
    }

    let query_len = query.len() as isize;
    let reference_len = reference.len() as isize;
    let mut best: Option<Alignment> = None;

    for offset in (1 - query_len)..reference_len {
        let query_start = (-offset).max(0) as usize;
        let reference_start = offset.max(0) as usize;
        let overlap = (query.len() - query_start).min(reference.len() - reference_start);

        let matched = query[query_start..query_start + overlap]
            .iter()
            .zip(&reference[reference_start..reference_start + overlap])
            .filter(|(q, r)| (*q ^ *r).count_ones() <= max_bit_errors)
            .count();

        if matched > 0 && best.map_or(true, |b| matched > b.matched) {
            best = Some(Alignment { offset, matched });
        }
    }

    best
}
