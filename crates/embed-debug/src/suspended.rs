//! Per-pause variable reference cache.
//! - scope references: frame * 4 + scope code
//! - SuspendedState: object identity → reference, reference → value
//! - variables: materialize the children of a reference

use std::collections::HashMap;

use tracing::error;

use crate::error::{DebugError, Result};
use crate::host::DebugHost;
use crate::protocol::{Scope, Variable};
use crate::value::{ObjectId, Value};

const SCOPE_BITS: u32 = 2;
const SCOPE_MASK: u32 = (1 << SCOPE_BITS) - 1;

/// Variable visibility bucket of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Local,
    Closure,
}

impl ScopeKind {
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            ScopeKind::Global => 0,
            ScopeKind::Local => 1,
            ScopeKind::Closure => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ScopeKind::Global),
            1 => Some(ScopeKind::Local),
            2 => Some(ScopeKind::Closure),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ScopeKind::Global => "Global",
            ScopeKind::Local => "Local",
            ScopeKind::Closure => "Closure",
        }
    }

    /// Whether clients should fetch this scope only on demand.
    #[must_use]
    pub fn expensive(self) -> bool {
        matches!(self, ScopeKind::Global)
    }
}

/// Reference naming `scope` of `frame`.
#[must_use]
pub fn scope_reference(frame: u32, scope: ScopeKind) -> u32 {
    (frame << SCOPE_BITS).wrapping_add(scope.code())
}

/// Split a reference into `(frame, scope code)`.
#[must_use]
pub fn decode_scope_reference(reference: u32) -> (u32, u32) {
    (reference >> SCOPE_BITS, reference & SCOPE_MASK)
}

/// The scopes of `frame`, in the order clients display them.
#[must_use]
pub fn frame_scopes(frame: u32) -> Vec<Scope> {
    [ScopeKind::Local, ScopeKind::Closure, ScopeKind::Global]
        .into_iter()
        .map(|kind| Scope {
            name: kind.name().to_string(),
            reference: scope_reference(frame, kind),
            expensive: kind.expensive(),
        })
        .collect()
}

/// Values materialized while execution is paused.
///
/// Lives for exactly one drain loop. References handed out for objects
/// start above every scope reference of the current stack, and each
/// object identity gets one reference for the whole pause.
#[derive(Debug)]
pub struct SuspendedState {
    stack_depth: u32,
    next_reference: u32,
    by_identity: HashMap<ObjectId, u32>,
    values: HashMap<u32, Value>,
}

impl SuspendedState {
    #[must_use]
    pub fn new(stack_depth: u32) -> Self {
        // Reference 0 must stay free for leaves even with an empty stack.
        let first = stack_depth.max(1).saturating_mul(SCOPE_MASK + 1);
        Self {
            stack_depth,
            next_reference: first,
            by_identity: HashMap::new(),
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn stack_depth(&self) -> u32 {
        self.stack_depth
    }

    /// Number of objects interned so far.
    #[must_use]
    pub fn interned(&self) -> usize {
        self.by_identity.len()
    }

    /// Reference for `value`; `0` for leaves.
    pub fn reference_for(&mut self, value: &Value) -> u32 {
        let Value::Object(object) = value else {
            return 0;
        };
        if let Some(reference) = self.by_identity.get(&object.id()) {
            return *reference;
        }
        let reference = self.next_reference;
        self.next_reference = self.next_reference.saturating_add(1);
        self.by_identity.insert(object.id(), reference);
        self.values.insert(reference, value.clone());
        reference
    }

    /// Client record for one named value.
    pub fn get_variable(&mut self, name: &str, value: &Value) -> Variable {
        Variable {
            name: name.to_string(),
            value: value.to_string(),
            type_name: value.type_tag().map(str::to_string),
            variables_reference: self.reference_for(value),
        }
    }

    /// Value behind `reference`, memoized for the rest of the pause.
    pub fn resolve(&mut self, reference: u32, host: &dyn DebugHost) -> Result<Value> {
        if let Some(value) = self.values.get(&reference) {
            return Ok(value.clone());
        }
        let (frame, code) = decode_scope_reference(reference);
        let scope = ScopeKind::from_code(code).filter(|_| frame < self.stack_depth);
        let Some(scope) = scope else {
            error!(
                reference,
                stack_depth = self.stack_depth,
                "variables reference outside the paused stack"
            );
            return Err(DebugError::InvalidReference {
                reference,
                stack_depth: self.stack_depth,
            });
        };
        let value = match scope {
            ScopeKind::Global => host.global_variables(),
            ScopeKind::Local => host.local_variables(frame),
            ScopeKind::Closure => host.closure_variables(frame),
        };
        self.values.insert(reference, value.clone());
        Ok(value)
    }

    /// Children of `reference`, one record per own enumerable property.
    pub fn variables(&mut self, reference: u32, host: &dyn DebugHost) -> Result<Vec<Variable>> {
        let container = self.resolve(reference, host)?;
        Ok(container
            .enumerate()
            .into_iter()
            .map(|(name, value)| self.get_variable(&name, &value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::breakpoints::BreakpointStore;
    use crate::host::{Location, StackFrame};
    use crate::value::ObjectHandle;

    use super::*;

    struct Frames {
        depth: u32,
        globals: ObjectHandle,
        locals: Vec<ObjectHandle>,
        snapshots: Cell<u32>,
    }

    impl Frames {
        fn new(depth: u32) -> Self {
            Self {
                depth,
                globals: ObjectHandle::plain(),
                locals: (0..depth).map(|_| ObjectHandle::plain()).collect(),
                snapshots: Cell::new(0),
            }
        }
    }

    impl DebugHost for Frames {
        fn current_location(&self) -> Location {
            Location::default()
        }

        fn stack_depth(&self) -> u32 {
            self.depth
        }

        fn build_backtrace(&self) -> Vec<StackFrame> {
            Vec::new()
        }

        fn global_variables(&self) -> Value {
            self.snapshots.set(self.snapshots.get() + 1);
            self.globals.clone().into()
        }

        fn local_variables(&self, frame: u32) -> Value {
            self.snapshots.set(self.snapshots.get() + 1);
            self.locals[frame as usize].clone().into()
        }

        fn closure_variables(&self, _frame: u32) -> Value {
            self.snapshots.set(self.snapshots.get() + 1);
            ObjectHandle::plain().into()
        }

        fn check_breakpoint(&mut self, _breakpoints: &BreakpointStore) -> bool {
            false
        }
    }

    #[test]
    fn scope_references_roundtrip() {
        for frame in 0..64 {
            for scope in [ScopeKind::Global, ScopeKind::Local, ScopeKind::Closure] {
                let (decoded_frame, code) = decode_scope_reference(scope_reference(frame, scope));
                assert_eq!(decoded_frame, frame);
                assert_eq!(ScopeKind::from_code(code), Some(scope));
            }
        }
    }

    #[test]
    fn frame_scopes_order_and_flags() {
        let scopes = frame_scopes(3);
        let summary: Vec<_> = scopes
            .iter()
            .map(|scope| (scope.name.as_str(), scope.reference, scope.expensive))
            .collect();
        assert_eq!(
            summary,
            [("Local", 13, false), ("Closure", 14, false), ("Global", 12, true)]
        );
    }

    #[test]
    fn same_object_gets_same_reference() {
        let mut state = SuspendedState::new(2);
        let object: Value = ObjectHandle::plain().into();
        let first = state.get_variable("a", &object).variables_reference;
        let second = state.get_variable("b", &object.clone()).variables_reference;
        assert_eq!(first, 8);
        assert_eq!(first, second);
        assert_eq!(state.interned(), 1);
    }

    #[test]
    fn distinct_objects_get_distinct_references() {
        let mut state = SuspendedState::new(1);
        let first = state.reference_for(&ObjectHandle::plain().into());
        let second = state.reference_for(&ObjectHandle::plain().into());
        assert_ne!(first, second);
        assert!(first >= 4 && second >= 4);
    }

    #[test]
    fn leaves_are_not_expandable() {
        let mut state = SuspendedState::new(1);
        for value in [
            Value::Int(1),
            Value::from("s"),
            Value::Null,
            Value::Undefined,
            Value::Float(1.5),
            Value::Symbol("s".into()),
        ] {
            assert_eq!(state.get_variable("v", &value).variables_reference, 0);
        }
        assert_eq!(state.interned(), 0);
    }

    #[test]
    fn empty_stack_never_hands_out_reference_zero() {
        let mut state = SuspendedState::new(0);
        assert_ne!(state.reference_for(&ObjectHandle::plain().into()), 0);
    }

    #[test]
    fn scope_resolution_is_memoized() {
        let host = Frames::new(2);
        host.locals[1].set("x", 5);
        let mut state = SuspendedState::new(2);

        let reference = scope_reference(1, ScopeKind::Local);
        let first = state.variables(reference, &host).unwrap();
        let second = state.variables(reference, &host).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "x");
        assert_eq!(first[0].value, "5");
        assert_eq!(first[0].type_name.as_deref(), Some("integer"));
        assert_eq!(host.snapshots.get(), 1);
    }

    #[test]
    fn interned_object_expands_to_its_properties() {
        let host = Frames::new(1);
        let child = ObjectHandle::plain();
        child.set("leaf", "text");
        host.globals.set("child", child.clone()).set("again", child);
        let mut state = SuspendedState::new(1);

        let globals = state.variables(0, &host).unwrap();
        assert_eq!(globals.len(), 2);
        assert_eq!(globals[0].variables_reference, globals[1].variables_reference);
        assert_eq!(globals[0].type_name.as_deref(), Some("object"));

        let children = state
            .variables(globals[0].variables_reference, &host)
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].value, "text");
        assert_eq!(children[0].type_name.as_deref(), Some("string"));
    }

    #[test]
    fn out_of_range_frame_is_rejected() {
        let host = Frames::new(1);
        let mut state = SuspendedState::new(1);
        let err = state
            .resolve(scope_reference(1, ScopeKind::Local), &host)
            .unwrap_err();
        assert!(matches!(
            err,
            DebugError::InvalidReference {
                reference: 5,
                stack_depth: 1
            }
        ));
        assert!(state.resolve(3, &host).is_err());
    }
}
