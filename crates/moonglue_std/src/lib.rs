//! moonglue plugins
//!
//! The loadable plugin set: `betterprint`, `fs`, `os`, `task`,
//! `taskscheduler`, `net` and `compiler`.

pub mod betterprint;
pub mod fs;
pub mod os;
pub mod task;
pub mod taskscheduler;
pub mod net;
pub mod compiler;

use moonglue_core::Result;
use mlua::Lua;
use std::path::PathBuf;
use tracing::debug;

/// Runtime settings that change what the plugins expose.
#[derive(Debug, Clone)]
pub struct StdOptions {
    /// Color output of the global `print`.
    pub use_colors: bool,
    /// Root directory the `fs` plugin resolves paths against.
    pub sandbox_root: PathBuf,
    /// Merge shell and environment hooks into `os`.
    pub unsafe_os: bool,
}

impl Default for StdOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            sandbox_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            unsafe_os: false,
        }
    }
}

/// Register every plugin in the Lua state
pub fn register_all(lua: &Lua, options: &StdOptions) -> Result<()> {
    let globals = lua.globals();

    // print replacement plus betterprint.format
    betterprint::register_print(lua, options.use_colors)?;
    globals.set("betterprint", betterprint::register(lua)?)?;

    // fs module, confined to the sandbox root
    globals.set("fs", fs::register(lua, fs::Sandbox::new(&options.sandbox_root))?)?;

    // os hooks (merged into the built-in os table)
    if options.unsafe_os {
        os::register(lua)?;
        debug!("Unsafe os hooks enabled");
    }

    globals.set("task", task::register(lua)?)?;
    globals.set("taskscheduler", taskscheduler::register(lua)?)?;
    globals.set("net", net::register(lua)?)?;
    globals.set("compiler", compiler::register(lua)?)?;

    debug!("Plugins registered (sandbox: {})", options.sandbox_root.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_safe() {
        let lua = Lua::new();
        register_all(&lua, &StdOptions::default()).unwrap();
        let present: bool = lua
            .load(
                r#"return type(betterprint.format) == "function" and type(fs.readfile) == "function"
                    and type(task.wait) == "function" and type(taskscheduler.run_tasks) == "function"
                    and type(net.get) == "function" and type(compiler.compile) == "function""#,
            )
            .eval()
            .unwrap();
        assert!(present);
        let has_capture: bool = lua.load("return os.capture ~= nil").eval().unwrap();
        assert!(!has_capture);
    }

    #[test]
    fn test_register_all_unsafe() {
        let lua = Lua::new();
        let options = StdOptions {
            unsafe_os: true,
            ..StdOptions::default()
        };
        register_all(&lua, &options).unwrap();
        let has_capture: bool = lua.load("return os.capture ~= nil").eval().unwrap();
        assert!(has_capture);
    }
}
