//! In-memory index client and request context for tests.
//!
//! [`InMemoryClient`] implements [`IndexClient`] on top of a map of index names, recording every
//! call in order. It is [`Clone`] so tests can keep a handle for inspection while the code under
//! test borrows another one. Failures can be injected per index and operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use vectorbench_workload::{ClientError, IndexClient, RequestContext};

/// An index administration call observed by [`InMemoryClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// `delete_index` was called for the index.
    Delete(String),
    /// `create_index` was called for the index.
    Create(String),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Op {
    Delete,
    Create,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, Value>,
    calls: Vec<Call>,
    failures: HashMap<(Op, String), u16>,
}

/// An [`IndexClient`] backed by a map of index names to creation bodies.
#[derive(Clone, Debug, Default)]
pub struct InMemoryClient {
    state: Arc<Mutex<State>>,
}

impl InMemoryClient {
    /// Creates a client without any indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index as if it had been created earlier.
    pub fn with_index(self, index: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .indices
            .insert(index.to_owned(), Value::Null);
        self
    }

    /// Makes every deletion of `index` fail with the given status.
    pub fn fail_delete(self, index: &str, status: u16) -> Self {
        self.fail(Op::Delete, index, status)
    }

    /// Makes every creation of `index` fail with the given status.
    pub fn fail_create(self, index: &str, status: u16) -> Self {
        self.fail(Op::Create, index, status)
    }

    fn fail(self, op: Op, index: &str, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, index.to_owned()), status);
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Returns the body an index was created with, if it exists.
    pub fn index(&self, index: &str) -> Option<Value> {
        self.state.lock().unwrap().indices.get(index).cloned()
    }

    /// Names of all existing indices, in sorted order.
    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().unwrap().indices.keys().cloned().collect()
    }
}

fn injected(state: &State, op: Op, index: &str) -> Result<(), ClientError> {
    match state.failures.get(&(op, index.to_owned())) {
        Some(&status) => Err(ClientError::Status {
            status,
            body: "injected failure".to_owned(),
        }),
        None => Ok(()),
    }
}

#[async_trait::async_trait]
impl IndexClient for InMemoryClient {
    async fn delete_index(&self, index: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(index.to_owned()));
        injected(&state, Op::Delete, index)?;

        match state.indices.remove(index) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound(index.to_owned())),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(index.to_owned()));
        injected(&state, Op::Create, index)?;

        if state.indices.contains_key(index) {
            return Err(ClientError::Status {
                status: 400,
                body: format!("resource_already_exists_exception: {index}"),
            });
        }
        state.indices.insert(index.to_owned(), body.clone());
        Ok(())
    }
}

/// A [`RequestContext`] that counts how often each hook ran.
#[derive(Debug, Default)]
pub struct CountingContext {
    /// Number of `on_request_start` calls.
    pub started: usize,
    /// Number of `on_request_end` calls.
    pub ended: usize,
}

impl RequestContext for CountingContext {
    fn on_request_start(&mut self) {
        self.started += 1;
    }

    fn on_request_end(&mut self) {
        self.ended += 1;
    }
}
