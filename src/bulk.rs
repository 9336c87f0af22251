//! Bulk-load partitioning.
//!
//! `n` entries are packed into `g = ceil(n / capacity)` groups whose sizes
//! differ by at most one. For `n > capacity` every group therefore holds more
//! than `capacity / 2` entries, which satisfies any minimum fill the
//! configuration accepts.

use tracing::warn;

use crate::config::BulkLoadStrategy;
use crate::geometry::{BoundingBox, SpatialComparable};
use crate::hilbert::HilbertCurve;

/// Splits `entries` into groups of at most `capacity` entries.
pub(crate) fn partition<E: SpatialComparable>(
    entries: Vec<E>,
    capacity: usize,
    strategy: BulkLoadStrategy,
) -> Vec<Vec<E>> {
    if entries.is_empty() {
        return Vec::new();
    }
    let sizes = group_sizes(entries.len(), capacity);
    if sizes.len() == 1 {
        return vec![entries];
    }
    match strategy {
        BulkLoadStrategy::SortTileRecursive => sort_tile_recursive(entries, &sizes),
        BulkLoadStrategy::Hilbert => match hilbert_order(entries) {
            Ok(sorted) => chunk(sorted, &sizes),
            Err(entries) => {
                warn!(
                    dimensionality = entries[0].dimensionality(),
                    "too many dimensions for a 64-bit Hilbert key, using sort-tile-recursive"
                );
                sort_tile_recursive(entries, &sizes)
            }
        },
    }
}

/// Even group sizes: the first `n % g` groups get one extra entry.
fn group_sizes(n: usize, capacity: usize) -> Vec<usize> {
    let groups = n.div_ceil(capacity);
    let (base, extra) = (n / groups, n % groups);
    (0..groups).map(|i| base + usize::from(i < extra)).collect()
}

fn chunk<E>(mut entries: Vec<E>, sizes: &[usize]) -> Vec<Vec<E>> {
    let mut groups = Vec::with_capacity(sizes.len());
    for &size in sizes {
        let rest = entries.split_off(size);
        groups.push(entries);
        entries = rest;
    }
    debug_assert!(entries.is_empty(), "group sizes do not add up");
    groups
}

fn sort_by_center<E: SpatialComparable>(entries: &mut [E], axis: usize) {
    entries.sort_by(|a, b| a.center(axis).total_cmp(&b.center(axis)));
}

fn sort_tile_recursive<E: SpatialComparable>(entries: Vec<E>, sizes: &[usize]) -> Vec<Vec<E>> {
    let dim = entries[0].dimensionality();
    let mut groups = Vec::with_capacity(sizes.len());
    tile(entries, sizes, 0, dim, &mut groups);
    groups
}

/// Sorts along `axis`, cuts into slabs of whole groups and recurses on the
/// next axis; the last axis is cut directly into groups.
fn tile<E: SpatialComparable>(mut entries: Vec<E>, sizes: &[usize], axis: usize, dim: usize, out: &mut Vec<Vec<E>>) {
    if sizes.len() == 1 {
        out.push(entries);
        return;
    }
    sort_by_center(&mut entries, axis);
    let remaining = dim - axis;
    if remaining <= 1 {
        out.extend(chunk(entries, sizes));
        return;
    }
    #[expect(clippy::cast_possible_truncation, reason = "slab counts are small positive integers")]
    let slabs = ((sizes.len() as f64).powf(1.0 / remaining as f64).ceil() as usize).clamp(1, sizes.len());
    let per_slab = sizes.len().div_ceil(slabs);
    for slab in sizes.chunks(per_slab) {
        let count = slab.iter().sum();
        let rest = entries.split_off(count);
        tile(entries, slab, axis + 1, dim, out);
        entries = rest;
    }
}

/// Entries sorted by the Hilbert key of their centers, or the untouched
/// entries if the dimensionality does not fit a key.
fn hilbert_order<E: SpatialComparable>(entries: Vec<E>) -> Result<Vec<E>, Vec<E>> {
    let Some(bounds) = BoundingBox::covering(&entries) else {
        return Ok(entries);
    };
    let Some(curve) = HilbertCurve::new(&bounds) else {
        return Err(entries);
    };
    let mut keyed: Vec<(u64, E)> = entries.into_iter().map(|e| (curve.key(&e), e)).collect();
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, e)| e).collect())
}
