#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Bounds applied by the backend when it loads a captured value out of the
/// target's memory. Every limit caps either cost (pointer chasing) or payload
/// size (strings, arrays, struct fields).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureLimits {
    /// Whether pointers are dereferenced when loading a value.
    pub follow_pointers: bool,
    /// How many levels of nested structs, slices and maps are loaded.
    pub max_variable_recurse: i64,
    /// Maximum number of bytes read from a string.
    pub max_string_len: i64,
    /// Maximum number of elements read from an array, slice or map.
    pub max_array_values: i64,
    /// Maximum number of fields read from a struct. `-1` means all of them.
    pub max_struct_fields: i64,
    /// Maximum number of frames walked per execution unit.
    pub max_stack_depth: i64,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            follow_pointers: true,
            max_variable_recurse: 1,
            max_string_len: 64,
            max_array_values: 64,
            max_struct_fields: -1,
            max_stack_depth: 500,
        }
    }
}

impl CaptureLimits {
    pub fn clamp(self) -> Self {
        Self {
            follow_pointers: self.follow_pointers,
            max_variable_recurse: self.max_variable_recurse.clamp(0, 16),
            max_string_len: self.max_string_len.clamp(0, 1 << 20),
            max_array_values: self.max_array_values.clamp(0, 1 << 16),
            max_struct_fields: self.max_struct_fields.clamp(-1, 1024),
            max_stack_depth: self.max_stack_depth.clamp(1, 10_000),
        }
    }
}
