//! Lua runtime management

use crate::pretty::{self, FormatOptions};
use crate::{Error, Result};
use mlua::{Lua, MultiValue, StdLib};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An embedded Lua state plus the path scripts and plugins resolve against
pub struct Runtime {
    lua: Lua,
    base_path: PathBuf,
}

impl Runtime {
    /// Create a new runtime instance
    pub fn new() -> Result<Self> {
        let lua = Lua::new();

        lua.load_std_libs(StdLib::ALL_SAFE)?;

        lua.set_app_data(crate::module::NativeLibStore::new());
        crate::scheduler::install(&lua);

        let base_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        debug!("moonglue runtime initialized");

        Ok(Self { lua, base_path })
    }

    /// Create a runtime with a specific base path
    pub fn with_base_path<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let mut runtime = Self::new()?;
        runtime.base_path = base_path.as_ref().to_path_buf();
        Ok(runtime)
    }

    /// Get a reference to the Lua state
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Execute a Lua script from a string
    pub fn exec(&self, code: &str) -> Result<()> {
        self.lua.load(code).exec()?;
        Ok(())
    }

    /// Evaluate code and render its results quoted, without colors
    pub fn eval(&self, code: &str) -> Result<String> {
        self.eval_with(code, FormatOptions::new().quoted().with_colors(false))
    }

    /// Evaluate code and render each result with `options`, tab separated
    pub fn eval_with(&self, code: &str, options: FormatOptions) -> Result<String> {
        let result: MultiValue = self.lua.load(code).eval()?;

        let formatted = result
            .iter()
            .map(|v| pretty::format_lua(&self.lua, v, options))
            .collect::<mlua::Result<Vec<_>>>()?
            .join("\t");

        Ok(formatted)
    }

    /// Execute a Lua file
    pub fn exec_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        };

        info!("Executing file: {}", absolute_path.display());

        let code = std::fs::read_to_string(&absolute_path).map_err(|e| {
            Error::Runtime(format!(
                "Failed to read file '{}': {}",
                absolute_path.display(),
                e
            ))
        })?;

        self.lua
            .load(&code)
            .set_name(absolute_path.to_string_lossy())
            .exec()?;

        Ok(())
    }

    /// Run queued tasks until none are left
    pub fn run_scheduler(&self) -> Result<()> {
        crate::scheduler::run_until_idle(&self.lua)
    }

    /// Set a global variable
    pub fn set_global<V: mlua::IntoLua>(&self, name: &str, value: V) -> Result<()> {
        self.lua.globals().set(name, value)?;
        Ok(())
    }

    /// Get a global variable
    pub fn get_global<V: mlua::FromLua>(&self, name: &str) -> Result<V> {
        let value = self.lua.globals().get(name)?;
        Ok(value)
    }

    /// Setup the custom module loader
    pub fn setup_module_loader(&self) -> Result<()> {
        crate::module::setup_loader(&self.lua, &self.base_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runtime_creation() {
        let runtime = Runtime::new();
        assert!(runtime.is_ok());
    }

    #[test]
    fn test_exec_simple() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.exec("x = 1 + 1");
        assert!(result.is_ok());

        let x: i64 = runtime.get_global("x").unwrap();
        assert_eq!(x, 2);
    }

    #[test]
    fn test_eval() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.eval("return 1 + 1").unwrap();
        assert_eq!(result, "2");
    }

    #[test]
    fn test_eval_string() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.eval("return 'hello'").unwrap();
        assert_eq!(result, "\"hello\"");
    }

    #[test]
    fn test_eval_multiple_values() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.eval("return 1, 2, 3").unwrap();
        assert_eq!(result, "1\t2\t3");
    }

    #[test]
    fn test_eval_table() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.eval("return {1, {2, 3}}").unwrap();
        assert_eq!(result, "{1, {2, 3}}");
    }

    #[test]
    fn test_exec_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::with_base_path(dir.path()).unwrap();
        let err = runtime.exec_file("missing.lua").unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[test]
    fn test_run_scheduler_drains_queue() {
        let runtime = Runtime::new().unwrap();
        runtime.exec("done = false").unwrap();
        let function: mlua::Function = runtime
            .lua()
            .load("return function() done = true end")
            .eval()
            .unwrap();
        let job = crate::scheduler::LuaJob::call(runtime.lua(), function).unwrap();
        crate::scheduler::schedule(runtime.lua(), Duration::from_millis(5), job).unwrap();

        runtime.run_scheduler().unwrap();
        let done: bool = runtime.get_global("done").unwrap();
        assert!(done);
    }
}
