use serde::{Deserialize, Serialize};

/// Limits for the type and variable listing passthroughs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Introspection {
    /// Maximum number of fields reported per struct type.
    pub max_fields_per_struct: i64,
    /// Maximum number of types reported alongside a variable listing. `-1`
    /// means no limit.
    pub max_types: i64,
}

impl Default for Introspection {
    fn default() -> Self {
        Self {
            max_fields_per_struct: 10,
            max_types: -1,
        }
    }
}
