#![forbid(unsafe_code)]

use crate::domain::ExecutionUnit;
use std::fmt::Write;

/// Render a unit's stack the way a Go goroutine dump prints it.
///
/// ```text
/// goroutine 7 [halted]:
/// main.handler(...)
/// 	/src/main.go:42 +0x1f
/// ```
pub fn render(unit: &ExecutionUnit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "goroutine {} [halted]:", unit.id);
    for frame in &unit.frames {
        let _ = writeln!(out, "{}(...)", frame.function_name());
        let _ = writeln!(out, "\t{}:{} +0x{:x}", frame.file, frame.line, frame.pc_offset);
    }
    out
}
