use std::collections::HashMap;
use std::fmt;

use easel_storage::Storage;

use crate::error::{DispatchError, HandlerError};
use crate::event::EventName;

/// A unit of script logic bound to one event.
///
/// Handlers take no event arguments. The storage facade is passed in so
/// native handlers do not have to capture it; script-backed handlers are free
/// to ignore it.
pub trait Handler: Send {
  fn handle(&mut self, storage: &Storage) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
  F: FnMut(&Storage) -> Result<(), HandlerError> + Send,
{
  fn handle(&mut self, storage: &Storage) -> Result<(), HandlerError> {
    self(storage)
  }
}

/// Event name to handler mapping, filled once when a script loads.
#[derive(Default)]
pub struct HandlerTable {
  handlers: HashMap<EventName, Box<dyn Handler>>,
}

impl HandlerTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bind `handler` to `event`. An event can only be bound once.
  pub fn register<H>(&mut self, event: impl Into<EventName>, handler: H) -> Result<(), DispatchError>
  where
    H: Handler + 'static,
  {
    let event = event.into();
    if self.handlers.contains_key(&event) {
      return Err(DispatchError::DuplicateRegistration { event });
    }
    self.handlers.insert(event, Box::new(handler));
    Ok(())
  }

  pub fn contains(&self, event: &str) -> bool {
    self.handlers.contains_key(event)
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }

  /// Registered event names, sorted.
  pub fn events(&self) -> Vec<&EventName> {
    let mut events: Vec<_> = self.handlers.keys().collect();
    events.sort();
    events
  }

  pub(crate) fn get_mut(&mut self, event: &str) -> Option<&mut (dyn Handler + 'static)> {
    self.handlers.get_mut(event).map(|handler| &mut **handler)
  }
}

impl fmt::Debug for HandlerTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HandlerTable")
      .field("events", &self.events())
      .finish()
  }
}
