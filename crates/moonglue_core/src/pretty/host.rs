//! Host value-space capabilities consumed by the formatter
//!
//! The formatter never touches a VM directly. Everything it needs to know
//! about a value goes through [`ValueSpace`], so the same algorithm can run
//! against mlua or against an in-memory double in tests.

/// The closed set of value kinds the formatter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    /// Anything else (userdata, threads, light userdata, ...).
    Other,
}

/// Debug information about a function value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    /// `true` for host-native functions, `false` for script-defined ones.
    pub is_native: bool,
    /// Declared name, when the host can resolve one.
    pub name: Option<String>,
    /// 1-based line where a script function was defined.
    pub line_defined: Option<usize>,
    /// Address used to synthesize `unnamed_<hex>` names.
    pub address: usize,
}

/// Read-only view over the values of a host runtime.
pub trait ValueSpace {
    /// Handle to a value living in the host.
    type Value;
    /// Failure raised by the host's inspection primitives.
    type Error;

    fn type_of(&self, value: &Self::Value) -> Kind;

    fn to_boolean(&self, value: &Self::Value) -> bool;

    /// Numeric value, if `value` is a number.
    fn to_number(&self, value: &Self::Value) -> Option<f64>;

    /// Raw string content as bytes, without quoting or escaping.
    fn to_raw_string(&self, value: &Self::Value) -> Result<Vec<u8>, Self::Error>;

    /// The host's own textual conversion (`tostring`).
    fn default_to_string(&self, value: &Self::Value) -> Result<String, Self::Error>;

    /// Stable identity of a container for the duration of one call.
    fn container_identity(&self, value: &Self::Value) -> usize;

    /// Length of the gap-free `1..=n` positional run.
    fn array_part_length(&self, value: &Self::Value) -> Result<usize, Self::Error>;

    /// All entries of a container, in the host's native iteration order.
    fn entries(&self, value: &Self::Value) -> Result<Vec<(Self::Value, Self::Value)>, Self::Error>;

    /// Debug information for a function, or `None` when unavailable.
    fn debug_info(&self, value: &Self::Value) -> Option<FunctionInfo>;
}
