//! Node splitting.
//!
//! The topological split chooses the axis whose candidate distributions have
//! the smallest total margin, then the distribution on that axis with the
//! least overlap (ties by least total volume). Candidate distributions come
//! from sorting the entries by lower and by upper bound and cutting at every
//! position that leaves at least `min` entries on both sides.

use std::cmp::Ordering;

use crate::geometry::{BoundingBox, SpatialComparable};

/// A chosen distribution of entries into two groups.
#[derive(Debug, Clone)]
pub(crate) struct Split {
    /// Axis the distribution was chosen on.
    pub(crate) axis: usize,
    order: Vec<usize>,
    size: usize,
    pub(crate) left_mbr: BoundingBox,
    pub(crate) right_mbr: BoundingBox,
    overlap: f64,
    volume: f64,
}

impl Split {
    /// Overlap of the two groups relative to their total volume.
    pub(crate) fn overlap_ratio(&self) -> f64 {
        if self.volume > 0.0 {
            self.overlap / self.volume
        } else {
            0.0
        }
    }

    /// Number of entries in the first group.
    pub(crate) const fn left_len(&self) -> usize {
        self.size
    }

    /// Partitions `entries`, which must be the slice the split was computed on.
    pub(crate) fn apply<E>(&self, entries: Vec<E>) -> (Vec<E>, Vec<E>) {
        debug_assert_eq!(entries.len(), self.order.len(), "split applied to different entries");
        let mut rank = vec![0; self.order.len()];
        for (position, &index) in self.order.iter().enumerate() {
            rank[index] = position;
        }
        let mut ranked: Vec<(usize, E)> = rank.into_iter().zip(entries).collect();
        ranked.sort_unstable_by_key(|(position, _)| *position);
        let mut left: Vec<E> = ranked.into_iter().map(|(_, e)| e).collect();
        let right = left.split_off(self.size);
        (left, right)
    }
}

fn sorted_by<E: SpatialComparable>(entries: &[E], axis: usize, by_upper: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    if by_upper {
        order.sort_by(|&a, &b| entries[a].max(axis).total_cmp(&entries[b].max(axis)));
    } else {
        order.sort_by(|&a, &b| entries[a].min(axis).total_cmp(&entries[b].min(axis)));
    }
    order
}

/// `prefix[i]` covers `order[..=i]`, `suffix[i]` covers `order[i..]`.
fn covers<E: SpatialComparable>(entries: &[E], order: &[usize]) -> (Vec<BoundingBox>, Vec<BoundingBox>) {
    let mut prefix: Vec<BoundingBox> = Vec::with_capacity(order.len());
    for &i in order {
        let next = match prefix.last() {
            Some(previous) => previous.union(&entries[i]),
            None => BoundingBox::of(&entries[i]),
        };
        prefix.push(next);
    }
    let mut suffix: Vec<BoundingBox> = Vec::with_capacity(order.len());
    for &i in order.iter().rev() {
        let next = match suffix.last() {
            Some(previous) => previous.union(&entries[i]),
            None => BoundingBox::of(&entries[i]),
        };
        suffix.push(next);
    }
    suffix.reverse();
    (prefix, suffix)
}

/// R* topological split.
///
/// `entries` holds `M + 1` entries and `2 * min <= entries.len()`.
pub(crate) fn topological_split<E: SpatialComparable>(entries: &[E], min: usize) -> Split {
    let n = entries.len();
    debug_assert!(min >= 1 && 2 * min <= n, "cannot split {n} entries with minimum {min}");
    let dim = entries[0].dimensionality();

    let mut best_axis = 0;
    let mut best_margin = f64::INFINITY;
    for axis in 0..dim {
        let mut margin = 0.0;
        for by_upper in [false, true] {
            let order = sorted_by(entries, axis, by_upper);
            let (prefix, suffix) = covers(entries, &order);
            for k in min..=n - min {
                margin += prefix[k - 1].margin() + suffix[k].margin();
            }
        }
        if margin < best_margin {
            best_margin = margin;
            best_axis = axis;
        }
    }
    minimum_overlap_split(entries, min, &[best_axis])
}

/// The distribution with the least overlap over the given axes, ties broken
/// by the least total volume. Axes are tried in the given order.
pub(crate) fn minimum_overlap_split<E: SpatialComparable>(entries: &[E], min: usize, axes: &[usize]) -> Split {
    let n = entries.len();
    debug_assert!(!axes.is_empty(), "no split axis");
    let mut best: Option<Split> = None;
    for &axis in axes {
        for by_upper in [false, true] {
            let order = sorted_by(entries, axis, by_upper);
            let (prefix, suffix) = covers(entries, &order);
            for k in min..=n - min {
                let (left, right) = (&prefix[k - 1], &suffix[k]);
                let overlap = left.overlap(right);
                let volume = left.volume() + right.volume();
                let better = best.as_ref().is_none_or(|b| {
                    match overlap.partial_cmp(&b.overlap) {
                        Some(Ordering::Less) => true,
                        Some(Ordering::Equal) => volume < b.volume,
                        _ => false,
                    }
                });
                if better {
                    best = Some(Split {
                        axis,
                        order: order.clone(),
                        size: k,
                        left_mbr: left.clone(),
                        right_mbr: right.clone(),
                        overlap,
                        volume,
                    });
                }
            }
        }
    }
    best.unwrap_or_else(|| panic!("no admissible split of {n} entries with minimum {min}"))
}
