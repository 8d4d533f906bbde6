//! Host process hooks
//!
//! Shell execution and environment access. These are merged into the
//! built-in `os` table only when the runtime is started with `--unsafe`.

use moonglue_core::Result;
use mlua::{Lua, Table};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Merge the hooks into the global `os` table, creating it if absent.
pub fn register(lua: &Lua) -> Result<Table> {
    let os_table = match lua.globals().get::<Option<Table>>("os")? {
        Some(table) => table,
        None => {
            let table = lua.create_table()?;
            lua.globals().set("os", table.clone())?;
            table
        }
    };

    // os.execute(cmd)
    os_table.set("execute", lua.create_function(os_execute)?)?;

    // os.capture(cmd) -> string
    os_table.set("capture", lua.create_function(os_capture)?)?;

    // os.getenv(name) -> string | nil
    os_table.set("getenv", lua.create_function(os_getenv)?)?;

    // os.setenv(name, value)
    os_table.set("setenv", lua.create_function(os_setenv)?)?;

    Ok(os_table)
}

fn shell(cmd: &str) -> Command {
    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", cmd]);
        command
    } else {
        let mut command = Command::new("sh");
        command.args(["-c", cmd]);
        command
    };
    command.stdin(Stdio::inherit());
    command
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn os_execute(_: &Lua, cmd: String) -> mlua::Result<()> {
    debug!("os.execute: {}", cmd);
    let status = shell(&cmd)
        .status()
        .map_err(|e| mlua::Error::runtime(format!("Failed to execute command: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(mlua::Error::runtime(format!(
            "Command failed with error code {}",
            exit_code(status)
        )))
    }
}

fn os_capture(lua: &Lua, cmd: String) -> mlua::Result<mlua::String> {
    debug!("os.capture: {}", cmd);
    let Output { status, stdout, .. } = shell(&cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| {
            mlua::Error::runtime(format!("Failed to execute command: {}. Unable to capture.", e))
        })?;

    if status.success() {
        lua.create_string(&stdout)
    } else {
        Err(mlua::Error::runtime(format!(
            "Command failed with error code {}. Captured:\n{}",
            exit_code(status),
            String::from_utf8_lossy(&stdout)
        )))
    }
}

fn os_getenv(_: &Lua, name: String) -> mlua::Result<Option<String>> {
    Ok(std::env::var(&name).ok())
}

fn os_setenv(_: &Lua, (name, value): (String, String)) -> mlua::Result<()> {
    if name.is_empty() || name.contains(['=', '\0']) || value.contains('\0') {
        return Err(mlua::Error::runtime(format!(
            "Failed to set environment variable '{}'",
            name
        )));
    }
    unsafe {
        std::env::set_var(&name, &value);
    }
    Ok(())
}
