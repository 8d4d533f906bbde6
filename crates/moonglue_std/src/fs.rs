//! Sandboxed file system module
//!
//! Every path is resolved against a sandbox root. Resolution is lexical:
//! `.` and `..` are folded without touching the disk, and anything that
//! lands outside the root is rejected. This guards against accidental
//! traversal, it is not a security boundary.

use moonglue_core::Result;
use mlua::{Lua, Table};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Resolves script paths inside a root directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root: normalize(&absolute),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a script path to a host path under the root.
    pub fn resolve(&self, path: &str) -> mlua::Result<PathBuf> {
        let resolved = normalize(&self.root.join(path));
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(mlua::Error::runtime(format!("Path escapes sandbox: {}", path)))
        }
    }
}

/// Fold `.` and `..` components without consulting the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Register the fs module
pub fn register(lua: &Lua, sandbox: Sandbox) -> Result<Table> {
    let fs_table = lua.create_table()?;
    let sandbox = Arc::new(sandbox);

    macro_rules! bind {
        ($name:expr, $func:ident) => {{
            let sandbox = Arc::clone(&sandbox);
            fs_table.set($name, lua.create_function(move |lua, args| $func(lua, &sandbox, args))?)?;
        }};
    }

    // ---- Read / Write ----
    bind!("readfile", fs_readfile);
    bind!("writefile", fs_writefile);
    bind!("appendfile", fs_appendfile);

    // ---- Existence / type checks ----
    bind!("exists", fs_exists);
    bind!("isfile", fs_isfile);
    bind!("isfolder", fs_isfolder);

    // ---- Directories ----
    bind!("listfiles", fs_listfiles);
    bind!("makefolder", fs_makefolder);

    // ---- Removal ----
    bind!("delfile", fs_delfile);
    bind!("delfolder", fs_delfolder);

    Ok(fs_table)
}

// ---------------------------------------------------------------------------
// Read / Write
// ---------------------------------------------------------------------------

fn fs_readfile(lua: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<mlua::String> {
    let path = sandbox.resolve(&path)?;
    let data = fs::read(&path)
        .map_err(|e| mlua::Error::runtime(format!("Failed to read file: {}", e)))?;
    lua.create_string(&data)
}

fn fs_writefile(
    _: &Lua,
    sandbox: &Sandbox,
    (path, content): (String, mlua::String),
) -> mlua::Result<()> {
    let path = sandbox.resolve(&path)?;
    fs::write(&path, &*content.as_bytes())
        .map_err(|e| mlua::Error::runtime(format!("Failed to write file: {}", e)))
}

fn fs_appendfile(
    _: &Lua,
    sandbox: &Sandbox,
    (path, content): (String, mlua::String),
) -> mlua::Result<()> {
    let path = sandbox.resolve(&path)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(&content.as_bytes()))
        .map_err(|e| mlua::Error::runtime(format!("Failed to append file: {}", e)))
}

// ---------------------------------------------------------------------------
// Existence / type checks
// ---------------------------------------------------------------------------

fn fs_exists(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<bool> {
    Ok(sandbox.resolve(&path)?.exists())
}

fn fs_isfile(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<bool> {
    Ok(sandbox.resolve(&path)?.is_file())
}

fn fs_isfolder(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<bool> {
    Ok(sandbox.resolve(&path)?.is_dir())
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

fn fs_listfiles(lua: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<Table> {
    let path = sandbox.resolve(&path)?;
    if !path.is_dir() {
        let reason = if path.exists() {
            "Expected folder, found file"
        } else {
            "Nothing found at path"
        };
        return Err(mlua::Error::runtime(format!("Failed to list files: {}", reason)));
    }

    let mut names: Vec<String> = fs::read_dir(&path)
        .map_err(|e| mlua::Error::runtime(format!("Failed to list files: {}", e)))?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    lua.create_sequence_from(names)
}

fn fs_makefolder(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<()> {
    let path = sandbox.resolve(&path)?;
    if path.exists() {
        return Err(mlua::Error::runtime("Failed to make folder: Folder already exists"));
    }
    fs::create_dir(&path)
        .map_err(|e| mlua::Error::runtime(format!("Failed to make folder: {}", e)))
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

fn fs_delfile(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<()> {
    let path = sandbox.resolve(&path)?;
    if !path.is_file() {
        return Err(mlua::Error::runtime("Failed to delete file: File not found"));
    }
    fs::remove_file(&path)
        .map_err(|e| mlua::Error::runtime(format!("Failed to delete file: {}", e)))
}

fn fs_delfolder(_: &Lua, sandbox: &Sandbox, path: String) -> mlua::Result<()> {
    let path = sandbox.resolve(&path)?;
    if !path.is_dir() {
        return Err(mlua::Error::runtime("Failed to delete folder: Folder not found"));
    }
    fs::remove_dir_all(&path)
        .map_err(|e| mlua::Error::runtime(format!("Failed to delete folder: {}", e)))
}
