//! Build script for moonglue

fn main() {
    // On Linux, export Lua symbols from the binary so that native plugins
    // (.so cdylib) loaded via dlopen can resolve lua_type, lua_pushstring, etc.
    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-arg=-Wl,--export-dynamic");
}
