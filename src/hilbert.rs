//! Hilbert curve keys used to order entries for bulk loading.
//!
//! The two-dimensional case uses a branch-free prefix scan over 16-bit cell
//! coordinates. Other dimensionalities use Skilling's transpose algorithm
//! with as many bits per axis as fit in a 64-bit key.

use crate::geometry::{BoundingBox, SpatialComparable};

/// Upper limit on bits per axis for the general curve.
const MAX_BITS: u32 = 16;

/// Maps items to Hilbert keys relative to a fixed bounding box.
#[derive(Debug)]
pub(crate) struct HilbertCurve {
    bits: u32,
    lo: Box<[f64]>,
    scale: Box<[f64]>,
}

impl HilbertCurve {
    /// Creates a curve over `bounds`, or `None` if a 64-bit key cannot hold
    /// at least one bit per axis.
    pub(crate) fn new(bounds: &BoundingBox) -> Option<Self> {
        let dim = bounds.dimensionality();
        let bits = if dim == 2 { MAX_BITS } else { MAX_BITS.min(64 / u32::try_from(dim).ok()?) };
        if bits == 0 {
            return None;
        }
        let cells = f64::from((1u32 << bits) - 1);
        let scale = bounds
            .lo()
            .iter()
            .zip(bounds.hi())
            .map(|(lo, hi)| {
                let extent = hi - lo;
                if extent > 0.0 { cells / extent } else { 0.0 }
            })
            .collect();
        Some(Self { bits, lo: bounds.lo().into(), scale })
    }

    /// Hilbert key of the center of `item`.
    pub(crate) fn key<T: SpatialComparable + ?Sized>(&self, item: &T) -> u64 {
        let max_cell = f64::from((1u32 << self.bits) - 1);
        let mut cells: Vec<u32> = (0..self.lo.len())
            .map(|d| {
                let scaled = (item.center(d) - self.lo[d]) * self.scale[d];
                #[expect(clippy::cast_possible_truncation, reason = "clamped to the grid")]
                let cell = scaled.clamp(0.0, max_cell) as u32;
                cell
            })
            .collect();
        if cells.len() == 2 {
            u64::from(hilbert_xy_to_index(cells[0], cells[1]))
        } else {
            transpose_key(&mut cells, self.bits)
        }
    }
}

fn interleave(mut x: u32) -> u32 {
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// Hilbert index of a cell on the 2^16 x 2^16 grid.
#[expect(non_snake_case, reason = "prefix scan state follows the published algorithm")]
pub(crate) fn hilbert_xy_to_index(x: u32, y: u32) -> u32 {
    // prime with x and y
    let mut a = x ^ y;
    let mut b = 0xFFFF ^ a;
    let mut c = 0xFFFF ^ (x | y);
    let mut d = x & (y ^ 0xFFFF);
    let mut A = a | (b >> 1);
    let mut B = (a >> 1) ^ a;
    let mut C = ((c >> 1) ^ (b & (d >> 1))) ^ c;
    let mut D = ((a & (c >> 1)) ^ (d >> 1)) ^ d;

    for shift in [2, 4] {
        a = A;
        b = B;
        c = C;
        d = D;
        A = (a & (a >> shift)) ^ (b & (b >> shift));
        B = (a & (b >> shift)) ^ (b & ((a ^ b) >> shift));
        C ^= (a & (c >> shift)) ^ (b & (d >> shift));
        D ^= (b & (c >> shift)) ^ ((a ^ b) & (d >> shift));
    }

    a = A;
    b = B;
    c = C;
    d = D;
    C ^= (a & (c >> 8)) ^ (b & (d >> 8));
    D ^= (b & (c >> 8)) ^ ((a ^ b) & (d >> 8));

    // undo the prefix scan
    a = C ^ (C >> 1);
    b = D ^ (D >> 1);

    let i0 = x ^ y;
    let i1 = b | (0xFFFF ^ (i0 | a));

    (interleave(i1) << 1) | interleave(i0)
}

/// Hilbert index of a cell on a `dim`-dimensional grid of `2^bits` cells
/// per axis, `bits * dim <= 64`. Consumes `axes`.
pub(crate) fn transpose_key(axes: &mut [u32], bits: u32) -> u64 {
    let n = axes.len();
    debug_assert!(bits >= 1 && bits as usize * n <= 64, "key does not fit");
    if n == 0 {
        return 0;
    }
    let top = 1u32 << (bits - 1);

    // inverse undo
    let mut q = top;
    while q > 1 {
        let p = q - 1;
        for i in 0..n {
            if axes[i] & q != 0 {
                axes[0] ^= p;
            } else {
                let t = (axes[0] ^ axes[i]) & p;
                axes[0] ^= t;
                axes[i] ^= t;
            }
        }
        q >>= 1;
    }

    // gray encode
    for i in 1..n {
        axes[i] ^= axes[i - 1];
    }
    let mut t = 0;
    q = top;
    while q > 1 {
        if axes[n - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for axis in axes.iter_mut() {
        *axis ^= t;
    }

    let mut key = 0u64;
    for bit in (0..bits).rev() {
        for axis in axes.iter() {
            key = (key << 1) | u64::from((axis >> bit) & 1);
        }
    }
    key
}
