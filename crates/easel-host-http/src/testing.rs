//! Deterministic [`Fetcher`] for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::fetcher::{FetchFuture, Fetcher};

/// A fetcher that answers from a table of canned responses.
///
/// Targets without a canned response fail as unreachable. A gated fetcher
/// holds every retrieval until the test calls [`ScriptedFetcher::release`]
/// for its target, which lets tests choose completion order.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
  responses: Mutex<HashMap<String, Result<String, TransportError>>>,
  calls: Mutex<HashMap<String, usize>>,
  gates: Option<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl ScriptedFetcher {
  /// Fetches complete as soon as they are polled.
  pub fn new() -> Self {
    Self::default()
  }

  /// Fetches wait until released.
  pub fn gated() -> Self {
    Self {
      gates: Some(Mutex::new(HashMap::new())),
      ..Self::default()
    }
  }

  /// Answer `target` with `body`.
  pub fn respond(self, target: impl Into<String>, body: impl Into<String>) -> Self {
    lock(&self.responses).insert(target.into(), Ok(body.into()));
    self
  }

  /// Answer `target` with a transport failure.
  pub fn fail(self, target: impl Into<String>, error: TransportError) -> Self {
    lock(&self.responses).insert(target.into(), Err(error));
    self
  }

  /// Let one held retrieval of `target` complete. No-op when not gated.
  pub fn release(&self, target: &str) {
    if let Some(gate) = self.gate(target) {
      gate.add_permits(1);
    }
  }

  /// Number of retrievals started for `target`.
  pub fn calls(&self, target: &str) -> usize {
    lock(&self.calls).get(target).copied().unwrap_or(0)
  }

  /// Number of retrievals started for any target.
  pub fn total_calls(&self) -> usize {
    lock(&self.calls).values().sum()
  }

  fn gate(&self, target: &str) -> Option<Arc<Semaphore>> {
    let gates = self.gates.as_ref()?;
    let mut gates = lock(gates);
    Some(
      gates
        .entry(target.to_string())
        .or_insert_with(|| Arc::new(Semaphore::new(0)))
        .clone(),
    )
  }
}

impl Fetcher for ScriptedFetcher {
  fn fetch(&self, target: &str) -> FetchFuture<'_> {
    let target = target.to_string();
    *lock(&self.calls).entry(target.clone()).or_insert(0) += 1;
    let gate = self.gate(&target);

    Box::pin(async move {
      if let Some(gate) = gate {
        gate
          .acquire()
          .await
          .map_err(|e| TransportError::request(&target, e))?
          .forget();
      }

      let response = lock(&self.responses).get(&target).cloned();
      response.unwrap_or_else(|| Err(TransportError::request(&target, "host unreachable")))
    })
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
