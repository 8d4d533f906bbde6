//! Plugin and module loader
//!
//! Extends `require` with two searchers: one for Lua sources next to the
//! script (or under `plugins/`), one for native plugins built as shared
//! libraries exporting `luaopen_<name>`.

use crate::Result;
use mlua::{Function, Lua, Table, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Directory scanned for installed plugins, relative to the base path.
const PLUGIN_DIR: &str = "plugins";

/// Keeps loaded native libraries alive for the Lua state's lifetime.
///
/// Functions registered by a native plugin point into its code, so the
/// `Library` handle must outlive every one of them.
#[derive(Default)]
pub struct NativeLibStore {
    libs: Mutex<Vec<libloading::Library>>,
}

impl NativeLibStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn keep(&self, lib: libloading::Library) -> mlua::Result<()> {
        self.libs
            .lock()
            .map_err(|e| mlua::Error::runtime(format!("Lock error: {}", e)))?
            .push(lib);
        Ok(())
    }

    /// Number of native libraries loaded so far.
    pub fn len(&self) -> usize {
        self.libs.lock().map(|libs| libs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Setup the custom module loader
pub fn setup_loader(lua: &Lua, base_path: &Path) -> Result<()> {
    let base_path_for_lua = base_path.to_path_buf();
    let base_path_for_native = base_path.to_path_buf();

    let searcher = lua.create_function(move |lua, module_name: String| {
        let path = resolve_module_path(&base_path_for_lua, &module_name);

        debug!("Searching for module '{}' at {:?}", module_name, path);

        if !path.exists() {
            let err_msg = format!("\n\tno file '{}'", path.display());
            return Ok((Value::Nil, Value::String(lua.create_string(&err_msg)?)));
        }

        let code = std::fs::read_to_string(&path)
            .map_err(|e| mlua::Error::runtime(format!("Failed to read module: {}", e)))?;
        let loader: Function = lua
            .load(&code)
            .set_name(path.to_string_lossy())
            .into_function()?;
        let path_str = path.to_string_lossy().to_string();

        Ok((Value::Function(loader), Value::String(lua.create_string(&path_str)?)))
    })?;

    let native_searcher = lua.create_function(move |lua, module_name: String| {
        let Some(path) = resolve_native_path(&base_path_for_native, &module_name) else {
            let err_msg = format!("\n\tno native plugin '{}'", module_name);
            return Ok((Value::Nil, Value::String(lua.create_string(&err_msg)?)));
        };

        let symbol_name = entry_symbol(&module_name);
        let symbol_name_null = format!("{}\0", symbol_name);

        debug!("Loading native plugin '{}' from {:?}, symbol: {}", module_name, path, symbol_name);

        let loader = unsafe {
            let lib = libloading::Library::new(&path).map_err(|e| {
                mlua::Error::runtime(format!("Failed to load native plugin '{}': {}", module_name, e))
            })?;

            let func: libloading::Symbol<
                unsafe extern "C-unwind" fn(*mut mlua::ffi::lua_State) -> std::ffi::c_int,
            > = lib.get(symbol_name_null.as_bytes()).map_err(|e| {
                mlua::Error::runtime(format!(
                    "Symbol '{}' not found in '{}': {}",
                    symbol_name,
                    path.display(),
                    e
                ))
            })?;
            let func_ptr = *func;

            let store = lua
                .app_data_ref::<NativeLibStore>()
                .ok_or_else(|| mlua::Error::runtime("NativeLibStore not initialized"))?;
            store.keep(lib)?;

            lua.create_c_function(func_ptr)?
        };
        let path_str = path.to_string_lossy().to_string();

        Ok((Value::Function(loader), Value::String(lua.create_string(&path_str)?)))
    })?;

    let package: Table = lua.globals().get("package")?;
    let searchers: Table = package.get("searchers")?;

    // Position 1 stays the preload searcher; Lua sources win over native plugins.
    searchers.set(2, searcher)?;
    searchers.set(3, native_searcher)?;

    let lua_path = format!(
        "{0}/?.lua;{0}/?/init.lua;{0}/{1}/?.lua;{0}/{1}/?/init.lua",
        base_path.display(),
        PLUGIN_DIR
    );
    package.set("path", lua_path)?;

    Ok(())
}

/// Entry point exported by a native plugin: `luaopen_<name>`.
fn entry_symbol(module_name: &str) -> String {
    format!("luaopen_{}", module_name.replace(['.', '-'], "_"))
}

/// Resolve a module name to a Lua file path.
///
/// Falls back to `<name>.lua` so the searcher can report where it looked.
fn resolve_module_path(base_path: &Path, module_name: &str) -> PathBuf {
    let module_path = module_name.replace('.', "/");

    let patterns = [
        format!("{}.lua", module_path),
        format!("{}/init.lua", module_path),
        format!("{}/{}.lua", PLUGIN_DIR, module_path),
        format!("{}/{}/init.lua", PLUGIN_DIR, module_path),
    ];

    patterns
        .iter()
        .map(|pattern| base_path.join(pattern))
        .find(|path| path.exists())
        .unwrap_or_else(|| base_path.join(format!("{}.lua", module_path)))
}

/// Resolve a module name to a native library path
fn resolve_native_path(base_path: &Path, module_name: &str) -> Option<PathBuf> {
    let module_path = module_name.replace('.', "/");

    let (prefix, ext) = if cfg!(windows) {
        ("", "dll")
    } else if cfg!(target_os = "macos") {
        ("lib", "dylib")
    } else {
        ("lib", "so")
    };

    let leaf = module_name
        .rsplit('.')
        .next()
        .unwrap_or(module_name)
        .replace('-', "_");
    let lib_filename = format!("{}{}.{}", prefix, leaf, ext);

    let patterns = [
        format!("{}/{}/native/{}", PLUGIN_DIR, module_path, lib_filename),
        format!("{}/native/{}", module_path, lib_filename),
    ];

    patterns
        .iter()
        .map(|pattern| base_path.join(pattern))
        .find(|path| path.exists())
}
