//! Immutable sequence wrapper with deferred element transforms

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A composed element transform applied at read time.
///
/// Composition wraps rather than chains: registering a new function on top of
/// an existing one produces a single closure `x ↦ new(old(x))`, so reading an
/// element stays a single call regardless of how many maps were registered.
pub type ElementFn<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// An immutable, lazily-mappable sequence of opaque elements.
///
/// A `Sequence` owns its backing data outright; the collection it was built
/// from cannot alias it, and every read hands back an independent clone so
/// callers cannot corrupt the stored values through what they were given.
/// All transforming operations (`map`, `lazy_map`, `filter`, `split`) return
/// a new, independently owned `Sequence` and leave the receiver untouched.
///
/// The backing data never reflects a pending transform. Only [`map`] folds
/// the transform into the data (and clears it); [`at`] applies it on the fly.
///
/// [`map`]: Sequence::map
/// [`at`]: Sequence::at
#[derive(Clone)]
pub struct Sequence<T> {
    data: Vec<T>,
    transform: Option<ElementFn<T>>,
}

impl<T: Clone + 'static> Sequence<T> {
    /// Creates a sequence that takes ownership of `data`.
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            transform: None,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the sequence holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether a deferred transform is registered.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Shared handle to the composed transform, if any.
    pub(crate) fn transform_fn(&self) -> Option<ElementFn<T>> {
        self.transform.clone()
    }

    /// Returns a clone of the raw (untransformed) element at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.data
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: self.data.len(),
            })
    }

    /// Returns clones of the raw elements in `range`, in order.
    pub fn get_range(&self, range: Range<usize>) -> Result<Vec<T>> {
        self.data
            .get(range.clone())
            .map(<[T]>::to_vec)
            .ok_or(Error::IndexOutOfBounds {
                index: range.end,
                len: self.data.len(),
            })
    }

    /// Returns the element at `index` with the deferred transform applied.
    ///
    /// Identical to [`get`](Sequence::get) when no transform is registered.
    pub fn at(&self, index: usize) -> Result<T> {
        let value = self.get(index)?;
        Ok(match &self.transform {
            Some(transform) => transform(value),
            None => value,
        })
    }

    /// Returns the elements in `range`, transformed element-wise in order.
    pub fn at_range(&self, range: Range<usize>) -> Result<Vec<T>> {
        let values = self.get_range(range)?;
        Ok(match &self.transform {
            Some(transform) => values.into_iter().map(|v| transform(v)).collect(),
            None => values,
        })
    }

    /// Registers `func` for deferred application and returns the new sequence.
    ///
    /// The newest function is applied last, after every previously registered
    /// one. Nothing is evaluated until an element is read through
    /// [`at`](Sequence::at); use lazy mapping to trade recomputation for the
    /// memory a fully materialized mapping would occupy.
    pub fn lazy_map<F>(&self, func: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let mut staged = self.clone();
        staged.push_transform(Arc::new(func));
        staged
    }

    fn push_transform(&mut self, func: ElementFn<T>) {
        self.transform = Some(match self.transform.take() {
            Some(prev) => Arc::new(move |x| func(prev(x))),
            None => func,
        });
    }

    /// Maps every element through `func` eagerly.
    ///
    /// Equivalent to [`lazy_map`](Sequence::lazy_map) followed by
    /// materializing all elements into new backing data; the result carries
    /// no pending transform. Any previously registered lazy maps are
    /// evaluated as part of this call.
    pub fn map<F>(&self, func: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        let staged = self.lazy_map(func);
        Self::new(staged.materialize())
    }

    fn materialize(&self) -> Vec<T> {
        match &self.transform {
            Some(transform) => self.data.iter().cloned().map(|v| transform(v)).collect(),
            None => self.data.clone(),
        }
    }

    /// Left-folds the transformed elements with `func`.
    ///
    /// A length-1 sequence returns a copy of its sole element without
    /// invoking `func`; an empty sequence is an [`Error::EmptyInput`].
    pub fn reduce<F>(&self, func: F) -> Result<T>
    where
        F: Fn(T, T) -> T,
    {
        if self.data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let mut acc = self.at(0)?;
        for index in 1..self.len() {
            acc = func(acc, self.at(index)?);
        }
        Ok(acc)
    }

    /// Keeps the transformed elements satisfying `predicate`, in order.
    ///
    /// Always eager: predicate results cannot be composed with a
    /// not-yet-evaluated transform chain, so every element is read through
    /// the transform here. The result carries no pending transform.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool,
    {
        let data = self
            .data
            .iter()
            .cloned()
            .map(|v| match &self.transform {
                Some(transform) => transform(v),
                None => v,
            })
            .filter(|v| predicate(v))
            .collect();
        Self::new(data)
    }

    /// Splits the raw backing data at `ceil(ratio * len)`.
    ///
    /// Both halves share the same transform handle (not re-composed), so lazy
    /// mapping keeps applying identically to each. `ratio` must lie strictly
    /// inside `(0, 1)`.
    pub fn split(&self, ratio: f64) -> Result<(Self, Self)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(Error::InvalidArgument(format!(
                "split ratio must lie in (0, 1), got {ratio}"
            )));
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mid = (ratio * self.len() as f64).ceil() as usize;
        let (left, right) = self.data.split_at(mid);
        Ok((
            Self {
                data: left.to_vec(),
                transform: self.transform.clone(),
            },
            Self {
                data: right.to_vec(),
                transform: self.transform.clone(),
            },
        ))
    }

    /// Direct read access to the raw backing data.
    ///
    /// The backing data does not reflect a registered lazy transform.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Direct mutable access to the raw backing data.
    ///
    /// Escape hatch outside the immutability contract; every other method on
    /// this type leaves the receiver unchanged.
    pub fn data_mut(&mut self) -> &mut Vec<T> {
        &mut self.data
    }
}

impl<T: Clone + 'static> From<Vec<T>> for Sequence<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T: Clone + 'static> From<&[T]> for Sequence<T> {
    fn from(data: &[T]) -> Self {
        Self::new(data.to_vec())
    }
}

impl<T: Clone + 'static, const N: usize> From<[T; N]> for Sequence<T> {
    fn from(data: [T; N]) -> Self {
        Self::new(data.to_vec())
    }
}

impl<T: Clone + 'static> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("data", &self.data)
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_reads_are_independent_copies() {
        let seq = Sequence::new(vec![vec![1, 2], vec![3, 4]]);
        let mut first = seq.get(0).unwrap();
        first.push(99);
        assert_eq!(seq.get(0).unwrap(), vec![1, 2]);
        assert_eq!(seq.at(0).unwrap(), vec![1, 2]);
    }

    #[test]
    fn get_rejects_out_of_bounds() {
        let seq = Sequence::new(vec![1, 2, 3]);
        assert!(matches!(
            seq.get(3),
            Err(Error::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(seq.get_range(1..4).is_err());
        assert_eq!(seq.get_range(1..3).unwrap(), vec![2, 3]);
    }

    #[test]
    fn lazy_map_composes_newest_last() {
        let seq = Sequence::new(vec![1, 2, 3])
            .lazy_map(|x| x + 1)
            .lazy_map(|x| x * 10);
        // (x + 1) * 10, not x * 10 + 1
        assert_eq!(seq.at(0).unwrap(), 20);
        assert_eq!(seq.at_range(0..3).unwrap(), vec![20, 30, 40]);
    }

    #[test]
    fn lazy_map_leaves_data_and_original_untouched() {
        let original = Sequence::new(vec![1, 2, 3]);
        let mapped = original.lazy_map(|x| x * 2);
        assert_eq!(original.at(1).unwrap(), 2);
        assert_eq!(mapped.data(), &[1, 2, 3]);
        assert_eq!(mapped.get(1).unwrap(), 2);
        assert_eq!(mapped.at(1).unwrap(), 4);
    }

    #[test]
    fn map_materializes_and_clears_transform() {
        let seq = Sequence::new(vec![1, 2, 3]).lazy_map(|x| x + 1).map(|x| x * 2);
        assert!(!seq.has_transform());
        assert_eq!(seq.data(), &[4, 6, 8]);
        // Mapping again transforms the materialized data, not the original.
        let again = seq.map(|x| x);
        assert_eq!(again.data(), &[4, 6, 8]);
    }

    #[test]
    fn reduce_folds_through_transform() {
        let seq = Sequence::new(vec![1, 2, 3, 4]).lazy_map(|x| x * 2);
        assert_eq!(seq.reduce(|a, b| a + b).unwrap(), 20);
    }

    #[test]
    fn reduce_single_element_skips_the_function() {
        let seq = Sequence::new(vec![7]);
        // The fold function would poison the result if invoked.
        assert_eq!(seq.reduce(|_, _| unreachable!()).unwrap(), 7);
    }

    #[test]
    fn reduce_empty_is_an_error() {
        let seq: Sequence<i32> = Sequence::new(vec![]);
        assert!(matches!(seq.reduce(|a, b| a + b), Err(Error::EmptyInput)));
    }

    #[test]
    fn filter_is_eager_and_sees_transformed_values() {
        let seq = Sequence::new(vec![1, 2, 3, 4]).lazy_map(|x| x * 10);
        let kept = seq.filter(|&x| x > 20);
        assert!(!kept.has_transform());
        assert_eq!(kept.data(), &[30, 40]);
    }

    #[test]
    fn split_partitions_raw_data_at_ceil() {
        let seq: Sequence<i32> = (0..10).collect();
        let (left, right) = seq.split(0.3).unwrap();
        assert_eq!(left.data(), &[0, 1, 2]);
        assert_eq!(right.data(), &[3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn split_halves_inherit_the_transform() {
        let seq = Sequence::new(vec![1, 2, 3, 4]).lazy_map(|x| x + 100);
        let (left, right) = seq.split(0.5).unwrap();
        assert_eq!(left.at(0).unwrap(), 101);
        assert_eq!(right.at(0).unwrap(), 103);
        // Raw halves stay untransformed.
        assert_eq!(left.data(), &[1, 2]);
        assert_eq!(right.data(), &[3, 4]);
    }

    #[test]
    fn split_rejects_ratio_outside_open_interval() {
        let seq = Sequence::new(vec![1, 2, 3]);
        for ratio in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                seq.split(ratio),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn data_mut_is_the_only_way_in() {
        let mut seq = Sequence::new(vec![1, 2, 3]);
        seq.data_mut()[0] = 9;
        assert_eq!(seq.get(0).unwrap(), 9);
    }
}
