//! Property-testing strategies for flows.

use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;
use waypoint_core::FormResponse;

/// Distinct step names, 1 to `max` of them, in a random order.
pub fn step_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    btree_set("[a-z][a-z_]{0,11}", 1..=max)
        .prop_map(|names| names.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Step names together with a random subset of their indices marked complete.
pub fn steps_with_completion(max: usize) -> impl Strategy<Value = (Vec<String>, BTreeSet<usize>)> {
    step_names(max)
        .prop_flat_map(|names| {
            let len = names.len();
            (Just(names), vec(any::<bool>(), len))
        })
        .prop_map(|(names, flags)| {
            let completed = flags
                .iter()
                .enumerate()
                .filter_map(|(i, done)| done.then_some(i))
                .collect();
            (names, completed)
        })
}

/// Arbitrary form responses: a success flag, a few per-field errors and
/// integer extras drawn from a small key space so that two responses overlap.
pub fn form_responses() -> impl Strategy<Value = FormResponse> {
    (
        any::<bool>(),
        vec(("[a-d]", "[a-z ]{1,12}"), 0..4),
        btree_map("[a-f]", any::<i64>(), 0..5),
    )
        .prop_map(|(success, errors, extra)| {
            let response = errors
                .into_iter()
                .fold(FormResponse::new(success), |response, (field, message)| {
                    response.with_error(field, message)
                });
            extra
                .into_iter()
                .fold(response, |response, (key, value)| response.with_extra(key, value))
        })
}
