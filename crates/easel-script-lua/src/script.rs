use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use easel_config::ScriptConfig;
use easel_dispatch::{EventName, Handler, HandlerError, HandlerTable};
use easel_storage::Storage;
use mlua::{FromLua, Function, Lua, Value};
use tracing::{debug, info, warn};

use crate::bindings::{install_console, install_storage};
use crate::error::ScriptError;

struct ScriptState {
  lua: Lua,
  entry: Function,
}

/// A loaded Lua script unit.
///
/// Each handler bound from the script holds a reference to the same Lua
/// state; calls are serialized by the dispatcher and by an internal lock.
pub struct LuaScript {
  name: String,
  state: Arc<Mutex<ScriptState>>,
  events: Vec<EventName>,
}

impl LuaScript {
  /// Read and load the script at `path`.
  pub fn from_file(
    path: impl AsRef<Path>,
    storage: Storage,
    config: &ScriptConfig,
  ) -> Result<Self, ScriptError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::load(&source, &path.display().to_string(), storage, config)
  }

  /// Install host globals, run the chunk, and find its handlers and entry
  /// function.
  pub fn load(
    source: &str,
    name: &str,
    storage: Storage,
    config: &ScriptConfig,
  ) -> Result<Self, ScriptError> {
    let lua = Lua::new();
    install_storage(&lua, storage)?;
    install_console(&lua, name.to_string())?;

    lua.load(source).set_name(name).exec()?;

    let globals = lua.globals();

    let handlers = match globals.get::<Value>(config.handlers_table.as_str())? {
      Value::Table(table) => table,
      _ => {
        return Err(ScriptError::MissingHandlers {
          name: config.handlers_table.clone(),
        });
      }
    };

    let entry = match globals.get::<Value>(config.entry_function.as_str())? {
      Value::Function(function) => function,
      _ => {
        return Err(ScriptError::MissingEntry {
          name: config.entry_function.clone(),
        });
      }
    };

    let mut events = Vec::new();
    for pair in handlers.pairs::<Value, Value>() {
      let (key, value) = pair?;
      match (key, value) {
        (Value::String(event), Value::Function(_)) => {
          events.push(EventName::new(event.to_str()?.to_string()));
        }
        (key, _) => {
          warn!(script = %name, key = ?key, "skipping handler table entry that is not a named function");
        }
      }
    }
    events.sort();

    info!(script = %name, handlers = events.len(), "loaded script");

    Ok(Self {
      name: name.to_string(),
      state: Arc::new(Mutex::new(ScriptState { lua, entry })),
      events,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Events the script declares handlers for, sorted.
  pub fn events(&self) -> &[EventName] {
    &self.events
  }

  /// Build a handler table with one entry per declared event. Each handler
  /// calls the script's entry function with its event name.
  pub fn handler_table(&self) -> Result<HandlerTable, ScriptError> {
    let mut table = HandlerTable::new();
    for event in &self.events {
      table.register(
        event.clone(),
        EntryHandler {
          state: self.state.clone(),
          event: event.clone(),
        },
      )?;
    }
    Ok(table)
  }

  /// Call the entry function directly with `event`.
  pub fn call_entry(&self, event: &EventName) -> Result<(), ScriptError> {
    let state = self.state.lock().map_err(|_| ScriptError::Poisoned)?;
    debug!(script = %self.name, event = %event, "calling script entry function");
    state.entry.call::<()>(event.as_str())?;
    Ok(())
  }

  /// Read a global from the script's environment.
  pub fn global<V: FromLua>(&self, name: &str) -> Result<V, ScriptError> {
    let state = self.state.lock().map_err(|_| ScriptError::Poisoned)?;
    Ok(state.lua.globals().get::<V>(name)?)
  }
}

impl fmt::Debug for LuaScript {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LuaScript")
      .field("name", &self.name)
      .field("events", &self.events)
      .finish()
  }
}

/// Handler bound to one event of a script unit.
struct EntryHandler {
  state: Arc<Mutex<ScriptState>>,
  event: EventName,
}

impl Handler for EntryHandler {
  fn handle(&mut self, _storage: &Storage) -> Result<(), HandlerError> {
    let state = self
      .state
      .lock()
      .map_err(|_| HandlerError::new(ScriptError::Poisoned.to_string()))?;

    state
      .entry
      .call::<()>(self.event.as_str())
      .map_err(|e| HandlerError::new(e.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use easel_dispatch::{DispatchError, DispatchOutcome, Dispatcher, Mailbox};
  use easel_host_http::testing::ScriptedFetcher;
  use easel_storage::NoopNotifier;
  use easel_task::TaskRunner;

  use super::*;

  const SCRIPT: &str = r#"
    methods = {
      init = function() end,
      ready = function() end,
      label = "not a function",
    }

    calls = {}

    function onEvent(event)
      table.insert(calls, event)
      if methods[event] and type(methods[event]) == "function" then
        methods[event]()
      end
    end
  "#;

  fn storage() -> Storage {
    Storage::new(
      Arc::new(ScriptedFetcher::new()),
      TaskRunner::current().unwrap(),
      NoopNotifier,
    )
  }

  #[tokio::test]
  async fn test_load_collects_function_entries() {
    let script = LuaScript::load(SCRIPT, "test", storage(), &ScriptConfig::default()).unwrap();

    assert_eq!(script.name(), "test");
    assert_eq!(
      script.events(),
      &[EventName::from("init"), EventName::from("ready")]
    );
  }

  #[tokio::test]
  async fn test_handler_table_invokes_entry_function() {
    let storage = storage();
    let script = LuaScript::load(SCRIPT, "test", storage.clone(), &ScriptConfig::default()).unwrap();
    let table = script.handler_table().unwrap();

    assert_eq!(table.len(), 2);
    assert!(!table.contains("label"));

    let mut dispatcher = Dispatcher::new(table, storage, Mailbox::new());
    assert_eq!(
      dispatcher.dispatch(&"ready".into()).unwrap(),
      DispatchOutcome::Handled
    );
    assert_eq!(
      dispatcher.dispatch(&"label".into()).unwrap(),
      DispatchOutcome::Unhandled
    );

    let calls: Vec<String> = script.global("calls").unwrap();
    assert_eq!(calls, vec!["ready".to_string()]);
  }

  #[tokio::test]
  async fn test_missing_handler_table() {
    let err = LuaScript::load(
      "function onEvent(e) end",
      "test",
      storage(),
      &ScriptConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ScriptError::MissingHandlers { ref name } if name == "methods"));
  }

  #[tokio::test]
  async fn test_missing_entry_function() {
    let err = LuaScript::load("methods = {}", "test", storage(), &ScriptConfig::default())
      .unwrap_err();
    assert!(matches!(err, ScriptError::MissingEntry { ref name } if name == "onEvent"));
  }

  #[tokio::test]
  async fn test_custom_names() {
    let config = ScriptConfig {
      handlers_table: "handlers".to_string(),
      entry_function: "dispatch".to_string(),
    };
    let script = LuaScript::load(
      "handlers = { go = function() end }\nfunction dispatch(e) handlers[e]() end",
      "test",
      storage(),
      &config,
    )
    .unwrap();

    assert_eq!(script.events(), &[EventName::from("go")]);
    script.call_entry(&"go".into()).unwrap();
  }

  #[tokio::test]
  async fn test_syntax_error() {
    let err = LuaScript::load("methods = {", "broken", storage(), &ScriptConfig::default())
      .unwrap_err();
    assert!(matches!(err, ScriptError::Lua(_)));
  }

  #[tokio::test]
  async fn test_runtime_error_becomes_handler_error() {
    let storage = storage();
    let script = LuaScript::load(
      r#"
        methods = { init = function() error("boom") end }
        function onEvent(e) methods[e]() end
      "#,
      "test",
      storage.clone(),
      &ScriptConfig::default(),
    )
    .unwrap();

    let mut dispatcher = Dispatcher::new(script.handler_table().unwrap(), storage, Mailbox::new());
    let err = dispatcher.dispatch(&EventName::init()).unwrap_err();
    assert!(
      matches!(err, DispatchError::Handler { ref source, .. } if source.message.contains("boom"))
    );

    // The script stays usable after a failing handler.
    assert!(script.call_entry(&"missing".into()).is_err());
    assert!(script.global::<Value>("methods").is_ok());
  }

  #[tokio::test]
  async fn test_from_file_missing() {
    let err = LuaScript::from_file("/no/such/script.lua", storage(), &ScriptConfig::default())
      .unwrap_err();
    assert!(matches!(err, ScriptError::Read { .. }));
  }
}
