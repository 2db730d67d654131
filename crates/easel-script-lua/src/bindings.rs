//! Host globals installed into every script unit.

use easel_storage::Storage;
use mlua::{Function, Lua, Value, Variadic};
use tracing::info;

/// Install the `storage` table, backed by `storage`.
pub(crate) fn install_storage(lua: &Lua, storage: Storage) -> mlua::Result<()> {
  let table = lua.create_table()?;

  let handle = storage.clone();
  table.set(
    "fetch",
    lua.create_function(move |_, (target, key): (String, String)| {
      handle.fetch(&target, &key);
      Ok(())
    })?,
  )?;

  let handle = storage.clone();
  table.set(
    "get",
    lua.create_function(move |_, key: String| Ok(handle.get(&key)))?,
  )?;

  let handle = storage.clone();
  table.set(
    "status",
    lua.create_function(move |_, key: String| {
      Ok(handle.status(&key).map(|status| status.as_str().to_string()))
    })?,
  )?;

  let handle = storage;
  table.set(
    "error",
    lua.create_function(move |_, key: String| Ok(handle.error(&key)))?,
  )?;

  lua.globals().set("storage", table)
}

/// Install the `console` table. Output goes to the host log.
pub(crate) fn install_console(lua: &Lua, script: String) -> mlua::Result<()> {
  let table = lua.create_table()?;

  table.set(
    "log",
    lua.create_function(move |lua, args: Variadic<Value>| {
      let tostring: Function = lua.globals().get("tostring")?;
      let parts = args
        .iter()
        .map(|value| tostring.call::<String>(value.clone()))
        .collect::<mlua::Result<Vec<_>>>()?;

      info!(target: "easel::script", script = %script, "{}", parts.join(" "));
      Ok(())
    })?,
  )?;

  lua.globals().set("console", table)
}
