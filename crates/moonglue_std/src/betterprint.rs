//! Pretty printing plugin
//!
//! Replaces the global `print` with one that renders tables, functions and
//! scalars through the value formatter, and exposes the formatter itself as
//! `betterprint.format`.

use moonglue_core::pretty::{FormatOptions, LuaValueSpace};
use moonglue_core::Result;
use mlua::{Lua, MultiValue, Table, Value};
use std::io::Write;

/// Write one `print` line to `out`: each argument rendered, joined by a
/// single space and terminated by a newline. String bytes are written as-is.
pub fn write_line<W: Write>(
    out: &mut W,
    lua: &Lua,
    args: &MultiValue,
    use_colors: bool,
) -> mlua::Result<()> {
    let space = LuaValueSpace::new(lua)?;
    let options = FormatOptions::new().with_colors(use_colors);
    let mut line = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(b' ');
        }
        line.extend(moonglue_core::format_bytes(&space, arg, options)?);
    }
    line.push(b'\n');
    out.write_all(&line)
        .and_then(|()| out.flush())
        .map_err(|e| mlua::Error::runtime(format!("IO error: {}", e)))
}

/// Install the global `print`.
pub fn register_print(lua: &Lua, use_colors: bool) -> Result<()> {
    let print_fn = lua.create_function(move |lua, args: MultiValue| {
        write_line(&mut std::io::stdout().lock(), lua, &args, use_colors)
    })?;
    lua.globals().set("print", print_fn)?;
    Ok(())
}

/// Register the `betterprint` module
pub fn register(lua: &Lua) -> Result<Table> {
    let betterprint = lua.create_table()?;

    // betterprint.format(value, quote_strings?, use_colors?) -> string
    betterprint.set("format", lua.create_function(betterprint_format)?)?;

    Ok(betterprint)
}

fn betterprint_format(
    lua: &Lua,
    (value, quote_strings, use_colors): (Value, Option<bool>, Option<bool>),
) -> mlua::Result<mlua::String> {
    let mut options = FormatOptions::new().with_colors(use_colors.unwrap_or(true));
    if quote_strings.unwrap_or(false) {
        options = options.quoted();
    }
    let space = LuaValueSpace::new(lua)?;
    lua.create_string(moonglue_core::format_bytes(&space, &value, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Lua {
        let lua = Lua::new();
        lua.globals().set("betterprint", register(&lua).unwrap()).unwrap();
        lua
    }

    #[test]
    fn test_format_defaults_to_colors() {
        let lua = setup();
        let text: String = lua.load("return betterprint.format(true)").eval().unwrap();
        assert_eq!(text, "\x1b[33mtrue\x1b[0m");
    }

    #[test]
    fn test_format_quoted_plain() {
        let lua = setup();
        let text: String = lua
            .load("return betterprint.format('a\\nb', true, false)")
            .eval()
            .unwrap();
        assert_eq!(text, "\"a\\nb\"");
    }

    #[test]
    fn test_format_table_plain() {
        let lua = setup();
        let text: String = lua
            .load("return betterprint.format({ name = 'moon' }, false, false)")
            .eval()
            .unwrap();
        assert_eq!(text, "{\n\tname = \"moon\";\n}");
    }

    fn printed(lua: &Lua, code: &str, use_colors: bool) -> Vec<u8> {
        let args: MultiValue = lua.load(code).eval().unwrap();
        let mut out = Vec::new();
        write_line(&mut out, lua, &args, use_colors).unwrap();
        out
    }

    #[test]
    fn test_line_joins_with_space() {
        let lua = Lua::new();
        assert_eq!(printed(&lua, "return 'x', 1, nil, {}", false), b"x 1 nil {}\n");
    }

    #[test]
    fn test_line_without_arguments() {
        let lua = Lua::new();
        assert_eq!(printed(&lua, "return", false), b"\n");
    }

    #[test]
    fn test_line_renders_tables() {
        let lua = Lua::new();
        assert_eq!(
            printed(&lua, "return 'list', {1, 2}, { name = 'moon' }", false),
            b"list {1, 2} {\n\tname = \"moon\";\n}\n"
        );
    }

    #[test]
    fn test_line_colors_non_strings() {
        let lua = Lua::new();
        assert_eq!(printed(&lua, "return 'n', 7", true), b"n \x1b[36m7\x1b[0m\n");
    }

    #[test]
    fn test_line_keeps_binary_strings() {
        let lua = Lua::new();
        assert_eq!(printed(&lua, "return '\\255\\0x'", false), b"\xff\0x\n");
    }

    #[test]
    fn test_print_is_replaced() {
        let lua = Lua::new();
        let builtin: mlua::Function = lua.globals().get("print").unwrap();
        register_print(&lua, false).unwrap();
        let installed: mlua::Function = lua.globals().get("print").unwrap();
        assert_ne!(builtin.to_pointer(), installed.to_pointer());
        lua.load("print('hello', {1, 2})").exec().unwrap();
    }
}
