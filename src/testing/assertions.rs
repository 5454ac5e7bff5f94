//! Assertion functions for aggregation outputs.

use crate::model::AggregationResult;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use aggrbeam::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert that two collections contain the same elements, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in content (ignoring order).
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    let actual_set: HashSet<_> = actual.iter().collect();
    let expected_set: HashSet<_> = expected.iter().collect();
    if actual_set != expected_set {
        let missing: Vec<_> = expected_set.difference(&actual_set).collect();
        let extra: Vec<_> = actual_set.difference(&expected_set).collect();
        panic!("Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}");
    }
}

/// Assert that two vectors have the same length and agree component-wise
/// within `tolerance`.
///
/// # Panics
///
/// Panics on a length mismatch or on the first component outside tolerance.
pub fn assert_vectors_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Vector length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "Vector mismatch at component {i}: expected {e}, got {a} (tolerance {tolerance})\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that a result's links agree with each other:
/// - the aggregation's components are exactly the result's measurements, in order,
/// - every parent of a produced measurement is one of the aggregation's sources,
/// - every parent is older than its child.
///
/// # Panics
///
/// Panics on the first inconsistency found.
pub fn assert_provenance_consistent(result: &AggregationResult) {
    let agg = &result.aggregation;
    let produced: Vec<_> = result.measurements.iter().map(|m| m.id()).collect();
    assert_eq!(
        agg.components(),
        produced.as_slice(),
        "components of aggregation {} do not match its measurements",
        agg.id()
    );
    for m in &result.measurements {
        for parent in m.parents() {
            assert!(
                agg.sources().contains(parent),
                "parent {parent} of {} is not a source of aggregation {}",
                m.id(),
                agg.id()
            );
            assert!(*parent < m.id(), "parent {parent} is not older than {}", m.id());
        }
    }
}
