#![forbid(unsafe_code)]

//! Sources run inside the target's scripting sandbox.
//!
//! Parameters reach a script only as a data literal bound to a variable,
//! produced by [`starlark::literal`].

pub mod starlark;

use crate::backend::StackWalkRequest;
use crate::domain::{FlightRecorderEventSpec, FlightRecorderKey};
use crate::error::Error;

const WALK_STACKS: &str = include_str!("walk_stacks.star");

/// The stack walker with its `SPEC` bound to `request`.
pub fn stack_walk_script(request: &StackWalkRequest) -> Result<String, Error> {
    let spec = serde_json::to_value(request)?;
    Ok(format!("SPEC = {}\n\n{WALK_STACKS}", starlark::literal(&spec)))
}

/// Script attached to a flight-recorder breakpoint: evaluate the value
/// expression at the hit and record it under the event's key.
pub fn capture_script(event: &FlightRecorderEventSpec) -> String {
    let key = match &event.key_expr {
        FlightRecorderKey::ExecutionUnit => "str(cur_scope().GoroutineID)".to_owned(),
        FlightRecorderKey::Expr(expr) => {
            format!("eval(None, {}).Variable.Value", starlark::string(expr))
        }
    };
    format!(
        "value = eval(None, {}).Variable.Value\nflight_recorder({key}, value)\n",
        starlark::string(&event.expr)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FramesOfInterestSpec;
    use config::CaptureLimits;

    #[test]
    fn stack_walk_binds_spec_before_walker() {
        let request = StackWalkRequest::new(
            FramesOfInterestSpec::new().with("execStmt", &["stmt.SQL"]),
            CaptureLimits::default(),
        );
        let script = stack_walk_script(&request).unwrap();
        let (binding, body) = script.split_once("\n\n").unwrap();
        assert!(binding.starts_with("SPEC = {"));
        assert!(binding.contains(r#""frames_of_interest": {"execStmt": ["stmt.SQL"]}"#));
        assert!(binding.contains(r#""follow_pointers": True"#));
        assert!(body.contains("def main():"));
    }

    #[test]
    fn hostile_expressions_stay_inside_the_literal() {
        let request = StackWalkRequest::new(
            FramesOfInterestSpec::new().with("f", &["x\"]}\nprint(1)#"]),
            CaptureLimits::default(),
        );
        let script = stack_walk_script(&request).unwrap();
        let binding = script.lines().next().unwrap();
        assert!(binding.contains(r#"["x\"]}\nprint(1)#"]"#));
    }

    #[test]
    fn walker_escapes_every_json_control_character() {
        let json_string = WALK_STACKS
            .split("def json_string(s):")
            .nth(1)
            .and_then(|rest| rest.split("\ndef ").next())
            .unwrap();
        assert!(json_string.contains("s.codepoints()"));
        assert!(json_string.contains("n < 0x20 or n == 0x7f"));
        assert!(json_string.contains(r#""\\u%04x" % n"#));
    }

    #[test]
    fn capture_script_keys_by_goroutine() {
        let event = FlightRecorderEventSpec::new("foo", "x", "goroutineID");
        assert_eq!(
            capture_script(&event),
            "value = eval(None, \"x\").Variable.Value\nflight_recorder(str(cur_scope().GoroutineID), value)\n"
        );
    }

    #[test]
    fn capture_script_keys_by_expression() {
        let event = FlightRecorderEventSpec::new("foo", "req.Body", "req.ID");
        let script = capture_script(&event);
        assert!(script.contains("flight_recorder(eval(None, \"req.ID\").Variable.Value, value)"));
    }
}
