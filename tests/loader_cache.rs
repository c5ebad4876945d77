//! Cache semantics: a cached index never re-invokes the transform, and
//! cached values are identical on every read.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batch_loader::{BatchLoader, LoaderConfig, Sequence};

/// A sequence of `len` integers whose transform counts its invocations.
fn counted_sequence(len: i64) -> (Sequence<i64>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sequence = Sequence::new((0..len).collect()).lazy_map(move |x| {
        counter.fetch_add(1, Ordering::SeqCst);
        x * 10
    });
    (sequence, calls)
}

fn cached_config() -> LoaderConfig {
    LoaderConfig::builder().shuffle(false).enable_cache(true).build()
}

#[test]
fn second_iteration_is_served_entirely_from_cache() {
    let (sequence, calls) = counted_sequence(10);
    let mut loader = BatchLoader::new(sequence, 3, cached_config()).unwrap();

    let first: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    let second: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10, "cached indices must not re-invoke");
    assert_eq!(first, second);
}

#[test]
fn shuffled_iterations_still_fill_each_slot_once() {
    let (sequence, calls) = counted_sequence(17);
    let config = LoaderConfig::builder().seed(3).enable_cache(true).build();
    let mut loader = BatchLoader::new(sequence, 4, config).unwrap();

    for _ in 0..3 {
        let batches: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
        let mut seen: Vec<i64> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..17).map(|x| x * 10).collect::<Vec<_>>());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 17);
}

#[test]
fn partial_consumption_caches_only_what_was_fetched() {
    let (sequence, calls) = counted_sequence(10);
    let mut loader = BatchLoader::new(sequence, 3, cached_config()).unwrap();

    {
        let mut batches = loader.iter().unwrap();
        let first = batches.next().unwrap().unwrap();
        assert_eq!(first, vec![0, 10, 20]);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // A full pass afterwards only fetches the nine uncached indices.
    let _: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[test]
fn cache_request_without_transform_changes_nothing() {
    // No deferred transform means the data is already resident; the loader
    // skips cache allocation and serves raw values.
    let sequence = Sequence::new((0..6).collect::<Vec<i64>>());
    let mut loader = BatchLoader::new(sequence, 2, cached_config()).unwrap();

    let batches: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(batches, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
}

#[test]
fn prefetch_and_cache_compose() {
    let (sequence, calls) = counted_sequence(10);
    let config = LoaderConfig::builder()
        .shuffle(false)
        .enable_cache(true)
        .prefetch(2)
        .build();
    let mut loader = BatchLoader::new(sequence, 3, config).unwrap();

    let batches: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        batches,
        vec![vec![0, 10, 20], vec![30, 40, 50], vec![60, 70, 80], vec![90]]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    let _: Vec<Vec<i64>> = loader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}
