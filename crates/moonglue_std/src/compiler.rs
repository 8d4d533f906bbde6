//! Bytecode compiler module
//!
//! `compiler.compile(source, options?)` compiles a chunk and returns its
//! bytecode as a string.

use moonglue_core::Result;
use mlua::{Lua, Table, Value};

const DEFAULT_DEBUG_LEVEL: u8 = 1;

/// Register the compiler module
pub fn register(lua: &Lua) -> Result<Table> {
    let compiler = lua.create_table()?;

    // compiler.compile(source, options?) -> string
    compiler.set("compile", lua.create_function(compile)?)?;

    Ok(compiler)
}

/// Settings accepted by `compile`.
///
/// `optimizationLevel` is validated but not stored: the Lua 5.4 compiler
/// has a single optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// 0 strips debug information from the output.
    pub debug_level: u8,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug_level: DEFAULT_DEBUG_LEVEL,
        }
    }
}

impl CompileOptions {
    fn from_table(table: Option<Table>) -> mlua::Result<Self> {
        let mut options = Self::default();
        let Some(table) = table else {
            return Ok(options);
        };
        level(&table, "optimizationLevel")?;
        if let Some(level) = level(&table, "debugLevel")? {
            options.debug_level = level;
        }
        Ok(options)
    }
}

/// Read an optional 0..=2 integer field.
fn level(table: &Table, field: &str) -> mlua::Result<Option<u8>> {
    let value: Value = table.get(field)?;
    let level = match value {
        Value::Nil => return Ok(None),
        Value::Integer(i) => Some(i),
        Value::Number(n) if n.fract() == 0.0 => Some(n as i64),
        _ => None,
    };
    match level {
        Some(l @ 0..=2) => Ok(Some(l as u8)),
        _ => Err(mlua::Error::runtime(format!(
            "When compiling, {} must be an integer from 0 to 2",
            field
        ))),
    }
}

/// Compile `source` to bytecode.
pub fn compile_source(lua: &Lua, source: &[u8], options: CompileOptions) -> mlua::Result<Vec<u8>> {
    let function = lua.load(source).set_name("=compiled").into_function()?;
    Ok(function.dump(options.debug_level == 0))
}

fn compile(
    lua: &Lua,
    (source, options): (mlua::String, Option<Table>),
) -> mlua::Result<mlua::String> {
    let options = CompileOptions::from_table(options)?;
    let bytecode = compile_source(lua, &source.as_bytes(), options)?;
    lua.create_string(&bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUA_SIGNATURE: &[u8] = b"\x1bLua";

    fn setup() -> Lua {
        let lua = Lua::new();
        lua.globals().set("compiler", register(&lua).unwrap()).unwrap();
        lua
    }

    #[test]
    fn test_compile_produces_bytecode() {
        let lua = setup();
        let bytecode: mlua::String = lua
            .load("return compiler.compile('return 1 + 1')")
            .eval()
            .unwrap();
        assert!(bytecode.as_bytes().starts_with(LUA_SIGNATURE));
    }

    #[test]
    fn test_debug_level_zero_strips() {
        let lua = Lua::new();
        let source = b"local function named(a) return a * 2 end return named(4)";
        let full = compile_source(&lua, source, CompileOptions::default()).unwrap();
        let stripped = compile_source(
            &lua,
            source,
            CompileOptions { debug_level: 0 },
        )
        .unwrap();
        assert!(stripped.len() < full.len());
    }

    #[test]
    fn test_options_parsed() {
        let lua = Lua::new();
        let table: Table = lua
            .load("return { optimizationLevel = 2, debugLevel = 0 }")
            .eval()
            .unwrap();
        let options = CompileOptions::from_table(Some(table)).unwrap();
        assert_eq!(options, CompileOptions { debug_level: 0 });
        assert_eq!(CompileOptions::from_table(None).unwrap(), CompileOptions::default());
    }

    #[test]
    fn test_optimization_level_does_not_change_output() {
        let lua = setup();
        let same: bool = lua
            .load(
                r#"
                local source = "local t = {} for i = 1, 3 do t[i] = i * 2 end return t"
                local a = compiler.compile(source, { optimizationLevel = 0 })
                local b = compiler.compile(source, { optimizationLevel = 2 })
                return a == b
            "#,
            )
            .eval()
            .unwrap();
        assert!(same);
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let lua = setup();
        let err = lua
            .load("compiler.compile('return 1', { optimizationLevel = 3 })")
            .exec()
            .unwrap_err()
            .to_string();
        assert!(err.contains("When compiling, optimizationLevel must be an integer from 0 to 2"));

        let err = lua
            .load("compiler.compile('return 1', { debugLevel = 'high' })")
            .exec()
            .unwrap_err()
            .to_string();
        assert!(err.contains("When compiling, debugLevel must be an integer from 0 to 2"));

        assert!(lua
            .load("compiler.compile('return 1', { debugLevel = 1.5 })")
            .exec()
            .is_err());
    }

    #[test]
    fn test_syntax_error_raised() {
        let lua = setup();
        assert!(lua.load("compiler.compile('return +')").exec().is_err());
    }
}
