use super::{
    EmptyAction, ErrorAction, FailureAction, InvalidateAction, LogAction, RedirectAction,
    RotateAction, SessionAttributeAction,
};
use crate::config::ActionSpec;
use crate::error::{GuardError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds an action from its configured spec
pub type ActionFactory = Arc<dyn Fn(&ActionSpec) -> Result<Box<dyn FailureAction>> + Send + Sync>;

/// Maps action kinds to factories.
///
/// Kinds may be written as dotted class names
/// (`org.owasp.csrfguard.action.Log`); when the full name is not registered,
/// its last segment is looked up instead.
#[derive(Clone)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    /// Registry with no kinds at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in kinds
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("Log", |spec| Ok(Box::new(LogAction::from_spec(spec)?)));
        registry.register("Redirect", |spec| Ok(Box::new(RedirectAction::from_spec(spec)?)));
        registry.register("Error", |spec| Ok(Box::new(ErrorAction::from_spec(spec)?)));
        registry.register("Empty", |spec| Ok(Box::new(EmptyAction::from_spec(spec)?)));
        registry.register("Invalidate", |spec| {
            Ok(Box::new(InvalidateAction::from_spec(spec)?))
        });
        registry.register("Rotate", |spec| Ok(Box::new(RotateAction::from_spec(spec)?)));
        registry.register("SessionAttribute", |spec| {
            Ok(Box::new(SessionAttributeAction::from_spec(spec)?))
        });
        registry
    }

    /// Register (or replace) the factory for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ActionSpec) -> Result<Box<dyn FailureAction>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn with<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ActionSpec) -> Result<Box<dyn FailureAction>> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.lookup(kind).is_some()
    }

    pub fn build(&self, spec: &ActionSpec) -> Result<Box<dyn FailureAction>> {
        let factory = self.lookup(&spec.kind).ok_or_else(|| {
            GuardError::config(format!(
                "unknown kind '{}' for action '{}'",
                spec.kind, spec.name
            ))
        })?;
        factory(spec)
    }

    /// Build every action, keeping configured order
    pub fn build_all(&self, specs: &[ActionSpec]) -> Result<Vec<Box<dyn FailureAction>>> {
        specs.iter().map(|spec| self.build(spec)).collect()
    }

    fn lookup(&self, kind: &str) -> Option<&ActionFactory> {
        self.factories.get(kind).or_else(|| {
            let short = kind.rsplit_once('.').map(|(_, last)| last)?;
            self.factories.get(short)
        })
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("ActionRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::new();
        for kind in [
            "Log",
            "Redirect",
            "Error",
            "Empty",
            "Invalidate",
            "Rotate",
            "SessionAttribute",
        ] {
            assert!(registry.contains(kind), "{kind} missing");
        }
        assert!(!ActionRegistry::empty().contains("Log"));
    }

    #[test]
    fn test_dotted_kind_resolves_last_segment() {
        let registry = ActionRegistry::new();
        let action = registry
            .build(&ActionSpec::new("Audit", "org.owasp.csrfguard.action.Log"))
            .unwrap();
        assert_eq!(action.name(), "Audit");
    }

    #[test]
    fn test_unknown_kind() {
        let err = ActionRegistry::new()
            .build(&ActionSpec::of("Teleport"))
            .err()
            .unwrap();
        assert!(matches!(err, GuardError::Config(_)));
        assert!(err.to_string().contains("Teleport"));
    }

    #[test]
    fn test_parameter_errors_surface() {
        let result = ActionRegistry::new().build(&ActionSpec::of("Redirect"));
        assert!(matches!(result, Err(GuardError::Config(_))));
    }

    #[test]
    fn test_custom_kind() {
        let registry = ActionRegistry::empty()
            .with("Quiet", |spec| Ok(Box::new(EmptyAction::from_spec(spec)?)));
        let actions = registry
            .build_all(&[
                ActionSpec::new("First", "Quiet"),
                ActionSpec::new("Second", "com.example.Quiet"),
            ])
            .unwrap();
        let names: Vec<_> = actions.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, ["First", "Second"]);
    }
}
