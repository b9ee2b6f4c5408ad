//! Transition resolution between nodes
//!
//! Every node carries a [`Transition`] consulted *after* its execute, with
//! the merged state in hand. Two forms exist:
//!
//! - [`Transition::To`] - a literal successor. Semantically this is still a
//!   predicate (one that ignores its argument and returns a constant), but
//!   keeping it as a distinguishable variant lets load-time validation walk
//!   literal edges statically.
//! - [`Transition::Dynamic`] - an arbitrary predicate over the
//!   post-execution state. Its targets cannot be determined statically, so
//!   it is checked at runtime by [`resolve_transition`].
//!
//! The sentinels `END` and `ERROR` are always accepted as targets, whether
//! or not they appear in the schema name set.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::state::{WorkflowState, END, ERROR};

/// Predicate type for dynamic transitions.
pub type TransitionFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Successor declaration for a node
#[derive(Clone)]
pub enum Transition {
    /// Unconditional successor.
    To(String),

    /// State-dependent successor. Validated against the schema at runtime.
    Dynamic(TransitionFn),
}

impl Transition {
    /// Literal transition to `name`.
    pub fn to(name: impl Into<String>) -> Self {
        Transition::To(name.into())
    }

    /// Literal transition to the success sentinel.
    pub fn end() -> Self {
        Transition::To(END.to_string())
    }

    /// Dynamic transition from a predicate over the merged state.
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        Transition::Dynamic(Arc::new(f))
    }

    /// Evaluate against the post-execution state.
    pub fn resolve(&self, state: &WorkflowState) -> String {
        match self {
            Transition::To(name) => name.clone(),
            Transition::Dynamic(f) => f(state),
        }
    }

    /// The statically-known target, if this is a literal transition.
    pub fn literal_target(&self) -> Option<&str> {
        match self {
            Transition::To(name) => Some(name),
            Transition::Dynamic(_) => None,
        }
    }

    /// Whether the target can only be known at runtime.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Transition::Dynamic(_))
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::To(name) => f.debug_tuple("To").field(name).finish(),
            Transition::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<predicate>").finish(),
        }
    }
}

/// Whether `name` is one of the reserved terminal targets.
pub fn is_sentinel(name: &str) -> bool {
    name == END || name == ERROR
}

/// Resolve a node's transition and validate the result.
///
/// The returned name must be a schema name or a sentinel; anything else is
/// an [`EngineError::InvalidTransition`] carrying the offending value and
/// the accepted set.
pub fn resolve_transition(
    from: &str,
    then: &Transition,
    state: &WorkflowState,
    schema_names: &BTreeSet<String>,
) -> Result<String> {
    let next = then.resolve(state);
    if is_sentinel(&next) || schema_names.contains(&next) {
        return Ok(next);
    }

    let mut valid: Vec<String> = schema_names.iter().cloned().collect();
    valid.push(END.to_string());
    valid.push(ERROR.to_string());
    Err(EngineError::InvalidTransition {
        from: from.to_string(),
        returned: next,
        valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_literal_resolves_to_constant() {
        let state = WorkflowState::new("A");
        let t = Transition::to("B");
        assert_eq!(t.resolve(&state), "B");
        assert_eq!(t.literal_target(), Some("B"));
        assert!(!t.is_dynamic());
    }

    #[test]
    fn test_dynamic_reads_state() {
        let mut state = WorkflowState::new("A");
        state.context.insert("testsPassed".into(), json!(true));

        let t = Transition::when(|s: &WorkflowState| {
            if s.get_bool("testsPassed").unwrap_or(false) {
                "NEXT_TASK".to_string()
            } else {
                "INCREMENT_RETRY".to_string()
            }
        });
        assert_eq!(t.resolve(&state), "NEXT_TASK");
        assert!(t.literal_target().is_none());
    }

    #[test]
    fn test_resolve_accepts_schema_names() {
        let state = WorkflowState::new("A");
        let next =
            resolve_transition("A", &Transition::to("B"), &state, &names(&["A", "B"])).unwrap();
        assert_eq!(next, "B");
    }

    #[test]
    fn test_resolve_accepts_sentinels_outside_schema() {
        let state = WorkflowState::new("A");
        let schema = names(&["A"]);
        assert_eq!(
            resolve_transition("A", &Transition::end(), &state, &schema).unwrap(),
            END
        );
        assert_eq!(
            resolve_transition("A", &Transition::to(ERROR), &state, &schema).unwrap(),
            ERROR
        );
        // Same for dynamic transitions returning a sentinel.
        let t = Transition::when(|_| END.to_string());
        assert_eq!(resolve_transition("A", &t, &state, &schema).unwrap(), END);
    }

    #[test]
    fn test_resolve_rejects_unknown_name() {
        let state = WorkflowState::new("A");
        let err = resolve_transition("A", &Transition::to("GHOST"), &state, &names(&["A"]))
            .unwrap_err();
        match err {
            EngineError::InvalidTransition { from, returned, valid } => {
                assert_eq!(from, "A");
                assert_eq!(returned, "GHOST");
                assert!(valid.contains(&"A".to_string()));
                assert!(valid.contains(&END.to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sentinel_predicate() {
        assert!(is_sentinel(END));
        assert!(is_sentinel(ERROR));
        assert!(!is_sentinel("end"));
        assert!(!is_sentinel("ANALYZE"));
    }
}
