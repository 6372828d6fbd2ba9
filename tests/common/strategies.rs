//! Proptest strategies for deployment models.

#![allow(dead_code)]

use mta_deployer::models::ApplicationStartupState;
use proptest::prelude::*;
use serde_json::{json, Value};

pub fn tag_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}"
}

pub fn tags_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(tag_strategy(), 0..6).prop_map(|tags| tags.into_iter().collect())
}

pub fn plan_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("small"), Just("medium"), Just("large")].prop_map(str::to_string)
}

/// Flat parameter objects mixing integers, floats, strings and booleans
pub fn parameters_strategy() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        "[a-z]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ];
    prop::collection::btree_map("[a-z_]{1,8}", scalar, 0..6)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

pub fn startup_state_strategy() -> impl Strategy<Value = ApplicationStartupState> {
    prop_oneof![
        Just(ApplicationStartupState::Started),
        Just(ApplicationStartupState::Stopped),
        Just(ApplicationStartupState::Inconsistent),
    ]
}

pub fn desired_state_strategy() -> impl Strategy<Value = ApplicationStartupState> {
    prop_oneof![
        Just(ApplicationStartupState::Started),
        Just(ApplicationStartupState::Stopped),
        Just(ApplicationStartupState::Executed),
    ]
}
