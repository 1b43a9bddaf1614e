#![forbid(unsafe_code)]

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key expression sentinel meaning "bucket by execution unit".
pub const GOROUTINE_ID_KEY: &str = "goroutineID";

/// What a flight-recorder event buckets its rolling values by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FlightRecorderKey {
    #[default]
    ExecutionUnit,
    Expr(String),
}

impl FlightRecorderKey {
    pub fn parse(raw: &str) -> Self {
        if raw == GOROUTINE_ID_KEY {
            Self::ExecutionUnit
        } else {
            Self::Expr(raw.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ExecutionUnit => GOROUTINE_ID_KEY,
            Self::Expr(expr) => expr,
        }
    }
}

impl Serialize for FlightRecorderKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FlightRecorderKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A standing capture of `expr` at `frame`, bucketed by `key_expr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightRecorderEventSpec {
    /// Location spec understood by the backend, e.g. `pkg.Func` or
    /// `file.go:42`. Must resolve to exactly one address.
    pub frame: String,
    pub expr: String,
    #[serde(default)]
    pub key_expr: FlightRecorderKey,
}

impl FlightRecorderEventSpec {
    pub fn new(frame: impl Into<String>, expr: impl Into<String>, key_expr: &str) -> Self {
        Self {
            frame: frame.into(),
            expr: expr.into(),
            key_expr: FlightRecorderKey::parse(key_expr),
        }
    }

    /// Reconciliation identity, also used as the breakpoint name.
    pub fn name(&self) -> String {
        format!("{}-{}", self.frame, self.expr)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let reason = if self.frame.trim().is_empty() {
            "empty frame"
        } else if self.expr.trim().is_empty() {
            "empty expression"
        } else if self.key_expr.as_str().trim().is_empty() {
            "empty key expression"
        } else {
            return Ok(());
        };
        Err(Error::InvalidEvent {
            name: self.name(),
            reason: reason.to_owned(),
        })
    }
}

impl fmt::Display for FlightRecorderEventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.frame, self.expr, self.key_expr.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_joins_frame_and_expr() {
        let ev = FlightRecorderEventSpec::new("foo", "x", GOROUTINE_ID_KEY);
        assert_eq!(ev.name(), "foo-x");
        assert_eq!(ev.key_expr, FlightRecorderKey::ExecutionUnit);
    }

    #[test]
    fn validate_rejects_blank_parts() {
        assert!(FlightRecorderEventSpec::new("foo", "x", "k").validate().is_ok());
        assert!(FlightRecorderEventSpec::new(" ", "x", "k").validate().is_err());
        assert!(FlightRecorderEventSpec::new("foo", "", "k").validate().is_err());
        assert!(matches!(
            FlightRecorderEventSpec::new("foo", "x", "").validate(),
            Err(Error::InvalidEvent { ref name, .. }) if name == "foo-x"
        ));
    }

    #[test]
    fn key_sentinel_roundtrips_through_json() {
        let ev: FlightRecorderEventSpec =
            serde_json::from_str(r#"{"frame":"f","expr":"x","key_expr":"req.id"}"#).unwrap();
        assert_eq!(ev.key_expr, FlightRecorderKey::Expr("req.id".to_owned()));

        let ev: FlightRecorderEventSpec =
            serde_json::from_str(r#"{"frame":"f","expr":"x"}"#).unwrap();
        assert_eq!(ev.key_expr, FlightRecorderKey::ExecutionUnit);
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""key_expr":"goroutineID""#));
    }
}
