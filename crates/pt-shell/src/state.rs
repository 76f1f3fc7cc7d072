//! State slices
//!
//! Each module may contribute reducers keyed by slice name. The registry
//! merges them into one root reducer whose state is a JSON object with one
//! field per slice.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A dispatched state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Pure state transition for one slice
pub trait Reducer: Send + Sync {
    fn initial_state(&self) -> Value;

    fn reduce(&self, state: &Value, action: &Action) -> Value;
}

pub type SharedReducer = Arc<dyn Reducer>;

/// Reducer built from an initial value and a closure
pub struct FnReducer<F> {
    initial: Value,
    reduce: F,
}

impl<F> FnReducer<F>
where
    F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
{
    pub fn new(initial: Value, reduce: F) -> Self {
        Self { initial, reduce }
    }

    pub fn shared(initial: Value, reduce: F) -> SharedReducer {
        Arc::new(Self::new(initial, reduce))
    }
}

impl<F> Reducer for FnReducer<F>
where
    F: Fn(&Value, &Action) -> Value + Send + Sync,
{
    fn initial_state(&self) -> Value {
        self.initial.clone()
    }

    fn reduce(&self, state: &Value, action: &Action) -> Value {
        (self.reduce)(state, action)
    }
}

/// All slices combined
#[derive(Clone, Default)]
pub struct RootReducer {
    slices: IndexMap<String, SharedReducer>,
}

impl RootReducer {
    pub fn new(slices: IndexMap<String, SharedReducer>) -> Self {
        Self { slices }
    }

    pub fn slice_names(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn initial_state(&self) -> Value {
        let state: Map<String, Value> = self
            .slices
            .iter()
            .map(|(name, r)| (name.clone(), r.initial_state()))
            .collect();
        Value::Object(state)
    }

    /// Every slice sees every action. Missing slices start from their
    /// initial state; unknown fields in `state` are dropped.
    pub fn reduce(&self, state: &Value, action: &Action) -> Value {
        let next: Map<String, Value> = self
            .slices
            .iter()
            .map(|(name, r)| {
                let current = state
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| r.initial_state());
                (name.clone(), r.reduce(&current, action))
            })
            .collect();
        Value::Object(next)
    }
}
