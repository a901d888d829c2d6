//! The compile-time evaluator: a long-lived, lazily initialized embedded Lua interpreter that
//! runs `$comp_time` bodies and `$include` module-resolution snippets.
//!
//! The host language is Lua/LuaJIT (see `original_source/`, a LuaJIT loader patch this spec was
//! distilled from); `mlua` is the idiomatic Rust analogue of hosting a `lua_State` in-process via
//! the C API the way the original C++ patch does.

use std::sync::Mutex;

use colored::Colorize;
use once_cell::sync::Lazy;

use crate::error::TransformError;

const PRELUDE: &str = r#"
local original_print = print

print = function(...)
    io.write("\27[35m[comp_time]\27[0m ")
    original_print(...)
end

printf = function(fmt, ...)
    io.write("\27[35m[comp_time]\27[0m ")
    io.write(string.format(fmt, ...))
end

env_vars = setmetatable({}, {
    __index = function(_, key)
        local value = os.getenv(key)
        if value == nil then
            io.stderr:write("\27[35m[comp_time]\27[0m warning: env var '" .. key .. "' is not set\n")
        end
        return value
    end,
})

local string_mt = getmetatable("")
string_mt.__index.render = function(template, vars)
    return (template:gsub("{{(%w+)}}", function(key)
        local value = vars[key]
        if value == nil then
            error("render: missing template variable '" .. key .. "'")
        end
        return tostring(value)
    end))
end
"#;

/// The process-wide singleton embedded interpreter. Guarded by a [`Mutex`] because the handle's
/// methods need `&mut Lua`; the spec itself requires callers to serialize access (§5), this just
/// makes that requirement type-checked instead of advisory.
static SESSION: Lazy<Mutex<mlua::Lua>> = Lazy::new(|| {
    let lua = mlua::Lua::new();
    lua.load(PRELUDE)
        .set_name("<comp_time prelude>")
        .exec()
        .expect("comp_time prelude failed to load");
    Mutex::new(lua)
});

/// Evaluate `chunk`, labeled `label` for diagnostics. Returns the chunk's final string result, or
/// the empty string if it didn't return a string. `verbose` additionally echoes the result to
/// stdout with the label, matching `LJP_VERBOSE_DO_STRING`.
pub fn eval(label: &str, chunk: &str, verbose: bool) -> Result<String, TransformError> {
    let lua = SESSION.lock().expect("comp_time session poisoned");

    let result: mlua::Value = lua
        .load(chunk)
        .set_name(label)
        .eval()
        .map_err(|err| TransformError::Eval {
            label: label.to_owned(),
            message: format!("{}", err).red().to_string(),
            chunk: chunk.to_owned(),
        })?;

    let text = match result {
        mlua::Value::String(s) => s.to_str().unwrap_or_default().to_owned(),
        _ => String::new(),
    };

    if verbose {
        println!("{} {label}: {text}", "[comp_time]".magenta());
    }

    Ok(text)
}
