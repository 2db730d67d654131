//! Easel Script Lua
//!
//! Loads a Lua script unit and connects it to the host.
//!
//! Before the chunk runs, two globals are installed:
//! - `storage` with `fetch(target, key)`, `get(key)`, `status(key)` and
//!   `error(key)`
//! - `console` with `log(...)`
//!
//! The script must define a handler table (default `methods`) keyed by event
//! name and an entry function (default `onEvent`) that takes one event name
//! and runs the matching handler. The host only uses the table to learn which
//! events the script handles; every invocation goes through the entry
//! function.
//!
//! ```lua
//! methods = {
//!   init = function()
//!     storage.fetch("https://example.com/README.md", "read_me")
//!   end,
//!   read_me_fetch = function()
//!     console.log("Read me: " .. tostring(storage.get("read_me")))
//!   end,
//! }
//!
//! function onEvent(event)
//!   if methods[event] then methods[event]() end
//! end
//! ```

mod bindings;
mod error;
mod script;

pub use error::ScriptError;
pub use script::LuaScript;
