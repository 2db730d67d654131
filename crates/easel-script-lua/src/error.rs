use std::path::PathBuf;

use easel_dispatch::DispatchError;

/// Errors raised while loading or calling into a Lua script unit.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
  /// The script file could not be read.
  #[error("failed to read script '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The Lua runtime reported an error (syntax, runtime or conversion).
  #[error("lua error: {0}")]
  Lua(#[from] mlua::Error),

  /// The handler table global is missing or not a table.
  #[error("script does not define a '{name}' handler table")]
  MissingHandlers { name: String },

  /// The entry function global is missing or not a function.
  #[error("script does not define an '{name}' entry function")]
  MissingEntry { name: String },

  /// Binding the script's handlers into a handler table failed.
  #[error(transparent)]
  Registration(#[from] DispatchError),

  /// A previous call into the script panicked while holding its state.
  #[error("script state is poisoned")]
  Poisoned,
}
