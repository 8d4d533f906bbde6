//! mlua implementation of [`ValueSpace`]

use super::{format, FormatOptions, FunctionInfo, Kind, ValueSpace};
use mlua::{Function, Lua, Value};

/// Inspects values of one Lua state.
pub struct LuaValueSpace {
    tostring: Function,
}

impl LuaValueSpace {
    /// Capture the state's `tostring` for fallback conversions.
    pub fn new(lua: &Lua) -> mlua::Result<Self> {
        let tostring: Function = lua.globals().get("tostring")?;
        Ok(Self { tostring })
    }
}

impl ValueSpace for LuaValueSpace {
    type Value = Value;
    type Error = mlua::Error;

    fn type_of(&self, value: &Value) -> Kind {
        match value {
            Value::Nil => Kind::Nil,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) | Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Table(_) => Kind::Table,
            Value::Function(_) => Kind::Function,
            _ => Kind::Other,
        }
    }

    fn to_boolean(&self, value: &Value) -> bool {
        matches!(value, Value::Boolean(true))
    }

    fn to_number(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn to_raw_string(&self, value: &Value) -> mlua::Result<Vec<u8>> {
        match value {
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => self.default_to_string(other).map(String::into_bytes),
        }
    }

    fn default_to_string(&self, value: &Value) -> mlua::Result<String> {
        let text: mlua::String = self.tostring.call(value.clone())?;
        Ok(text.to_string_lossy().to_string())
    }

    fn container_identity(&self, value: &Value) -> usize {
        value.to_pointer() as usize
    }

    fn array_part_length(&self, value: &Value) -> mlua::Result<usize> {
        match value {
            Value::Table(table) => Ok(table.raw_len()),
            _ => Ok(0),
        }
    }

    fn entries(&self, value: &Value) -> mlua::Result<Vec<(Value, Value)>> {
        let mut entries = Vec::new();
        if let Value::Table(table) = value {
            table.for_each::<Value, Value>(|key, value| {
                entries.push((key, value));
                Ok(())
            })?;
        }
        Ok(entries)
    }

    fn debug_info(&self, value: &Value) -> Option<FunctionInfo> {
        let Value::Function(function) = value else {
            return None;
        };
        let info = function.info();
        Some(FunctionInfo {
            is_native: info.what == "C",
            name: info.name,
            line_defined: info.line_defined,
            address: value.to_pointer() as usize,
        })
    }
}

/// Format a Lua value living in `lua`.
pub fn format_lua(lua: &Lua, value: &Value, options: FormatOptions) -> mlua::Result<String> {
    let space = LuaValueSpace::new(lua)?;
    format(&space, value, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn eval(lua: &Lua, code: &str) -> Value {
        lua.load(code).eval().unwrap()
    }

    fn plain(lua: &Lua, code: &str) -> String {
        let value = eval(lua, code);
        format_lua(lua, &value, FormatOptions::new().with_colors(false)).unwrap()
    }

    #[test]
    fn test_numbers_use_lua_conversion() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return 42"), "42");
        assert_eq!(plain(&lua, "return 1.5"), "1.5");
        assert_eq!(plain(&lua, "return 3.0"), "3.0");
    }

    #[test]
    fn test_top_level_string_is_raw() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return 'say \"hi\"'"), "say \"hi\"");
    }

    fn quoted_round_trip(lua: &Lua, code: &str) -> (Vec<u8>, Vec<u8>) {
        let original: mlua::String = lua.load(code).eval().unwrap();
        let literal = format_lua(
            lua,
            &Value::String(original.clone()),
            FormatOptions::new().quoted().with_colors(false),
        )
        .unwrap();
        let reloaded: mlua::String = lua.load(format!("return {literal}")).eval().unwrap();
        (original.as_bytes().to_vec(), reloaded.as_bytes().to_vec())
    }

    #[test]
    fn test_quoted_nul_then_digit_reads_back() {
        let lua = Lua::new();
        let (original, reloaded) = quoted_round_trip(&lua, "return '\\0' .. '1'");
        assert_eq!(original, vec![0u8, b'1']);
        assert_eq!(reloaded, original);
    }

    #[test]
    fn test_quoted_binary_reads_back() {
        let lua = Lua::new();
        let (original, reloaded) = quoted_round_trip(&lua, "return '\\255\\254ok\\0\\r'");
        assert_eq!(original, vec![255u8, 254, b'o', b'k', 0, b'\r']);
        assert_eq!(reloaded, original);
    }

    #[test]
    fn test_raw_binary_string_keeps_bytes() {
        let lua = Lua::new();
        let value = eval(&lua, "return '\\255\\1'");
        let space = LuaValueSpace::new(&lua).unwrap();
        let bytes = crate::pretty::format_bytes(&space, &value, FormatOptions::new()).unwrap();
        assert_eq!(bytes, vec![255u8, 1]);
    }

    #[test]
    fn test_empty_table() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return {}"), "{}");
    }

    #[test]
    fn test_pure_array() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return {10, 20, 30}"), "{10, 20, 30}");
        assert_eq!(plain(&lua, "return {'a', {1, 2}, true}"), "{\"a\", {1, 2}, true}");
    }

    #[test]
    fn test_mixed_table() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return {1, 2, x = 3}"), "{\n\t1, 2, \n\tx = 3;\n}");
    }

    #[test]
    fn test_non_identifier_key() {
        let lua = Lua::new();
        assert_eq!(plain(&lua, "return {[1.5] = 'a'}"), "{\n\t[1.5] = \"a\";\n}");
        assert_eq!(plain(&lua, "return {['two words'] = 1}"), "{\n\t[\"two words\"] = 1;\n}");
    }

    #[test]
    fn test_cycle() {
        let lua = Lua::new();
        let text = plain(&lua, "local t = {} t.self = t return t");
        assert_eq!(text, "{\n\tself = <cyclic reference>;\n}");
    }

    #[test]
    fn test_shared_table_rendered_twice() {
        let lua = Lua::new();
        let text = plain(&lua, "local s = {1} return {s, s}");
        assert_eq!(text, "{{1}, {1}}");
    }

    #[test]
    fn test_depth_limit() {
        let lua = Lua::new();
        let text = plain(
            &lua,
            "local root = {} local cur = root for _ = 1, 9 do cur.n = {} cur = cur.n end return root",
        );
        assert_eq!(text.matches("<max depth>").count(), 1);
        assert_eq!(text.matches("n = ").count(), 5);
    }

    #[test]
    fn test_native_function() {
        let lua = Lua::new();
        let function = Value::Function(lua.create_function(|_, ()| Ok(())).unwrap());
        let text = format_lua(&lua, &function, FormatOptions::new().with_colors(false)).unwrap();
        let pattern = Regex::new(r"^function\[C\]:unnamed_[0-9a-f]+$").unwrap();
        assert!(pattern.is_match(&text), "{text}");
    }

    #[test]
    fn test_script_function() {
        let lua = Lua::new();
        let text = plain(&lua, "\nlocal function f() end\nreturn f");
        let pattern = Regex::new(r"^function\[Lua\]:2:[A-Za-z_][A-Za-z0-9_]*$").unwrap();
        assert!(pattern.is_match(&text), "{text}");
    }

    #[test]
    fn test_colors() {
        let lua = Lua::new();
        let value = eval(&lua, "return {1}");
        let text = format_lua(&lua, &value, FormatOptions::new()).unwrap();
        assert_eq!(text, "\x1b[37m{\x1b[0m\x1b[36m1\x1b[0m\x1b[37m}\x1b[0m");
    }

    #[test]
    fn test_formatting_leaves_table_untouched() {
        let lua = Lua::new();
        let value = eval(&lua, "t = {1, 2, k = 'v'} return t");
        let first = format_lua(&lua, &value, FormatOptions::new()).unwrap();
        let second = format_lua(&lua, &value, FormatOptions::new()).unwrap();
        assert_eq!(first, second);
        let check: bool = lua
            .load("return #t == 2 and t.k == 'v'")
            .eval()
            .unwrap();
        assert!(check);
    }
}
