//! Engine-facing collaborator interface.

use serde::{Deserialize, Serialize};

use crate::breakpoints::BreakpointStore;
use crate::value::Value;

/// Source position of the instruction about to execute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    #[must_use]
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }
}

/// One backtrace entry, innermost frame first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// What the debugger needs from the execution engine.
///
/// Frames are numbered from the innermost (`0`) outwards and are valid for
/// `frame < stack_depth()`.
pub trait DebugHost {
    fn current_location(&self) -> Location;

    fn stack_depth(&self) -> u32;

    fn build_backtrace(&self) -> Vec<StackFrame>;

    fn global_variables(&self) -> Value;

    fn local_variables(&self, frame: u32) -> Value;

    fn closure_variables(&self, frame: u32) -> Value;

    /// Whether the current instruction carries a breakpoint.
    ///
    /// Implementations re-resolve their cached tables when
    /// `breakpoints.dirty_counter()` differs from the stamp they hold, see
    /// [`crate::ResolvedBreakpoints`].
    fn check_breakpoint(&mut self, breakpoints: &BreakpointStore) -> bool;

    /// Thread id reported in stop events.
    fn thread_id(&self) -> u64 {
        1
    }
}
