//! Recursive value formatter
//!
//! Turns any host value into deterministic, human readable text. Tables are
//! rendered Lua-constructor style: pure arrays inline (`{1, 2, 3}`), anything
//! carrying named entries one entry per line. Self references render as
//! `<cyclic reference>` and nesting beyond [`MAX_DEPTH`] as `<max depth>`.

mod host;
mod lua;

pub use host::{FunctionInfo, Kind, ValueSpace};
pub use lua::{format_lua, LuaValueSpace};

use std::collections::HashSet;

/// Deepest container nesting that is still expanded.
pub const MAX_DEPTH: usize = 4;

/// ANSI reset sequence appended after every colored token.
pub const RESET: &str = "\x1b[0m";

const INDENT_UNIT: char = '\t';

/// Semantic color of a rendered token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Nil,
    Boolean,
    Number,
    String,
    Function,
    Table,
}

impl Color {
    /// ANSI escape that starts this color.
    pub const fn code(self) -> &'static str {
        match self {
            Color::Nil => "\x1b[35m",
            Color::Boolean => "\x1b[33m",
            Color::Number => "\x1b[36m",
            Color::String => "\x1b[32m",
            Color::Function => "\x1b[34m",
            Color::Table => "\x1b[37m",
        }
    }
}

/// Options for a top-level [`format`] call.
///
/// Nested values (array elements, keys, entry values) are always rendered
/// quoted and always inherit `use_colors` from the outermost call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub quote_strings: bool,
    pub use_colors: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            quote_strings: false,
            use_colors: true,
        }
    }
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render top-level strings quoted and escaped.
    #[must_use]
    pub fn quoted(mut self) -> Self {
        self.quote_strings = true;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Format `value` into a single string.
///
/// Bytes that are not valid UTF-8 are kept exactly in quoted output (as
/// `\ddd` escapes); raw top-level strings fall back to lossy decoding. Use
/// [`format_bytes`] when unquoted binary content must survive.
///
/// The only errors are the host's own inspection failures.
pub fn format<S: ValueSpace>(
    space: &S,
    value: &S::Value,
    options: FormatOptions,
) -> Result<String, S::Error> {
    let bytes = format_bytes(space, value, options)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Format `value` into raw bytes, passing string content through unchanged.
pub fn format_bytes<S: ValueSpace>(
    space: &S,
    value: &S::Value,
    options: FormatOptions,
) -> Result<Vec<u8>, S::Error> {
    let mut formatter = Formatter {
        space,
        colors: options.use_colors,
        visited: HashSet::new(),
    };
    let mut out = Vec::new();
    formatter.value(&mut out, value, options.quote_strings, "", 0)?;
    Ok(out)
}

/// Whether `name` can be written as a bare `name = value` key.
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first == b'_' || first.is_ascii_alphabetic() => {
            bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Escape `content` using Lua's string escape forms.
///
/// Invalid UTF-8 bytes become `\ddd`, and `\0` widens to `\000` when a digit
/// follows so the literal reads back byte for byte.
fn escape_into(out: &mut Vec<u8>, content: &[u8]) {
    for chunk in content.utf8_chunks() {
        let mut chars = chunk.valid().chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend_from_slice(b"\\\\"),
                '"' => out.extend_from_slice(b"\\\""),
                '\n' => out.extend_from_slice(b"\\n"),
                '\r' => out.extend_from_slice(b"\\r"),
                '\t' => out.extend_from_slice(b"\\t"),
                '\0' => match chars.peek() {
                    Some(next) if next.is_ascii_digit() => out.extend_from_slice(b"\\000"),
                    _ => out.extend_from_slice(b"\\0"),
                },
                c if c.is_ascii_control() => {
                    out.extend_from_slice(format!("\\{:03}", c as u32).as_bytes())
                }
                c => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        for byte in chunk.invalid() {
            out.extend_from_slice(format!("\\{:03}", byte).as_bytes());
        }
    }
}

struct Formatter<'s, S: ValueSpace> {
    space: &'s S,
    colors: bool,
    /// Containers on the current descent path.
    visited: HashSet<usize>,
}

impl<S: ValueSpace> Formatter<'_, S> {
    fn paint(&self, out: &mut Vec<u8>, color: Color, text: &str) {
        if self.colors {
            out.extend_from_slice(color.code().as_bytes());
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(RESET.as_bytes());
        } else {
            out.extend_from_slice(text.as_bytes());
        }
    }

    fn value(
        &mut self,
        out: &mut Vec<u8>,
        value: &S::Value,
        quote: bool,
        indent: &str,
        depth: usize,
    ) -> Result<(), S::Error> {
        match self.space.type_of(value) {
            Kind::Nil => self.paint(out, Color::Nil, "nil"),
            Kind::Boolean => {
                let text = if self.space.to_boolean(value) { "true" } else { "false" };
                self.paint(out, Color::Boolean, text);
            }
            Kind::Number => {
                let text = self.space.default_to_string(value)?;
                self.paint(out, Color::Number, &text);
            }
            Kind::String => {
                let content = self.space.to_raw_string(value)?;
                if quote {
                    let mut quoted = Vec::with_capacity(content.len() + 2);
                    quoted.push(b'"');
                    escape_into(&mut quoted, &content);
                    quoted.push(b'"');
                    // Escaping leaves only ASCII escapes and valid UTF-8.
                    self.paint(out, Color::String, &String::from_utf8_lossy(&quoted));
                } else {
                    out.extend_from_slice(&content);
                }
            }
            Kind::Table => self.table(out, value, indent, depth)?,
            Kind::Function => match self.space.debug_info(value) {
                Some(info) => self.paint(out, Color::Function, &describe_function(&info)),
                None => out.extend_from_slice(self.space.default_to_string(value)?.as_bytes()),
            },
            Kind::Other => out.extend_from_slice(self.space.default_to_string(value)?.as_bytes()),
        }
        Ok(())
    }

    fn table(
        &mut self,
        out: &mut Vec<u8>,
        table: &S::Value,
        indent: &str,
        depth: usize,
    ) -> Result<(), S::Error> {
        let identity = self.space.container_identity(table);
        if self.visited.contains(&identity) {
            self.paint(out, Color::Table, "<cyclic reference>");
            return Ok(());
        }
        if depth > MAX_DEPTH {
            self.paint(out, Color::Table, "<max depth>");
            return Ok(());
        }

        self.visited.insert(identity);
        let result = self.table_body(out, table, indent, depth);
        self.visited.remove(&identity);
        result
    }

    fn table_body(
        &mut self,
        out: &mut Vec<u8>,
        table: &S::Value,
        indent: &str,
        depth: usize,
    ) -> Result<(), S::Error> {
        let array_length = self.space.array_part_length(table)?;
        let entries = self.space.entries(table)?;

        self.paint(out, Color::Table, "{");
        if entries.is_empty() {
            self.paint(out, Color::Table, "}");
            return Ok(());
        }

        let positional: Vec<bool> = entries
            .iter()
            .map(|(key, _)| self.is_array_key(key, array_length))
            .collect();
        let array_count = positional.iter().filter(|&&p| p).count();
        let multi_line = array_length == 0 || array_count < entries.len();

        let mut inner = indent.to_string();
        if multi_line {
            inner.push(INDENT_UNIT);
            if array_length > 0 {
                out.push(b'\n');
                out.extend_from_slice(inner.as_bytes());
            }
        }

        let mut arrays_seen = 0;
        for ((key, value), is_array) in entries.iter().zip(positional) {
            if is_array {
                self.value(out, value, true, &inner, depth + 1)?;
                arrays_seen += 1;
                // The final array entry only keeps its separator when named
                // entries follow it.
                if multi_line || arrays_seen < array_count {
                    self.paint(out, Color::Table, ", ");
                }
                continue;
            }

            out.push(b'\n');
            out.extend_from_slice(inner.as_bytes());
            match self.identifier_key(key)? {
                Some(name) => {
                    out.extend_from_slice(name.as_bytes());
                    self.paint(out, Color::Table, " = ");
                }
                None => {
                    self.paint(out, Color::Table, "[");
                    self.value(out, key, true, &inner, depth + 1)?;
                    self.paint(out, Color::Table, "] = ");
                }
            }
            self.value(out, value, true, &inner, depth + 1)?;
            self.paint(out, Color::Table, ";");
        }

        if multi_line {
            self.paint(out, Color::Table, &format!("\n{indent}}}"));
        } else {
            self.paint(out, Color::Table, "}");
        }
        Ok(())
    }

    fn is_array_key(&self, key: &S::Value, array_length: usize) -> bool {
        if self.space.type_of(key) != Kind::Number {
            return false;
        }
        match self.space.to_number(key) {
            Some(n) => n.fract() == 0.0 && n >= 1.0 && n <= array_length as f64,
            None => false,
        }
    }

    fn identifier_key(&self, key: &S::Value) -> Result<Option<String>, S::Error> {
        if self.space.type_of(key) != Kind::String {
            return Ok(None);
        }
        let name = self.space.to_raw_string(key)?;
        Ok(String::from_utf8(name).ok().filter(|name| is_identifier(name)))
    }
}

fn describe_function(info: &FunctionInfo) -> String {
    let name = match &info.name {
        Some(name) => name.clone(),
        None => format!("unnamed_{:x}", info.address),
    };
    if info.is_native {
        format!("function[C]:{name}")
    } else {
        let line = info
            .line_defined
            .map(|line| line.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("function[Lua]:{line}:{name}")
    }
}
