//! Fisher–Yates permutation generation and unison shuffling

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::sequence::Sequence;

/// Derives a deterministic generator from `seed`, or seeds from entropy.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(seed.unwrap_or_else(|| rand::rng().random()))
}

/// In-place Fisher–Yates: scan from the last position down to the second,
/// swapping each with a uniformly chosen earlier-or-equal position.
pub(crate) fn fisher_yates<T>(items: &mut [T], rng: &mut impl Rng) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Generates a uniform-random permutation of `[0, len)`.
///
/// A fixed `seed` reproduces the same permutation; `None` draws a
/// non-reproducible seed from entropy.
#[must_use]
pub fn permutation(len: usize, seed: Option<u64>) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    fisher_yates(&mut indices, &mut seeded_rng(seed));
    indices
}

/// Returns a shuffled copy of `sequence`; the original is untouched.
#[must_use]
pub fn shuffle<T: Clone + 'static>(sequence: &Sequence<T>, seed: Option<u64>) -> Sequence<T> {
    let mut shuffled = sequence.clone();
    fisher_yates(shuffled.data_mut(), &mut seeded_rng(seed));
    shuffled
}

/// Shuffles two equal-length sequences in unison.
///
/// The same swap positions are applied to both backing arrays in lock-step,
/// so elements that shared an index before the shuffle still do afterwards.
/// Fails with [`Error::LengthMismatch`] when the lengths differ.
pub fn shuffle_pair<T, U>(
    first: &Sequence<T>,
    second: &Sequence<U>,
    seed: Option<u64>,
) -> Result<(Sequence<T>, Sequence<U>)>
where
    T: Clone + 'static,
    U: Clone + 'static,
{
    if first.len() != second.len() {
        return Err(Error::LengthMismatch {
            left: first.len(),
            right: second.len(),
        });
    }

    let mut rng = seeded_rng(seed);
    let mut first_out = first.clone();
    let mut second_out = second.clone();
    for i in (1..first_out.len()).rev() {
        let j = rng.random_range(0..=i);
        first_out.data_mut().swap(i, j);
        second_out.data_mut().swap(i, j);
    }
    Ok((first_out, second_out))
}
