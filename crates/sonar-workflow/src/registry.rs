//! Name-indexed registry of DSL translation rules and runtime operations.

use crate::error::{Result, WorkflowError};
use crate::operation::Operation;
use crate::plan::{DslCall, Invocation, TranslateRule};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Shared registry of workflow functions.
///
/// A DSL name maps to a translation rule; an operation name maps to its
/// implementation. Registering a name again replaces the earlier entry.
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    /// Translation rules, indexed by DSL name
    rules: Arc<RwLock<HashMap<String, TranslateRule>>>,
    /// Executable operations, indexed by operation name
    operations: Arc<RwLock<HashMap<String, Arc<dyn Operation>>>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DSL function together with the operation it runs.
    pub fn register(
        &self,
        dsl_name: &str,
        rule: TranslateRule,
        operation_name: &str,
        operation: Arc<dyn Operation>,
    ) {
        self.register_syntax(dsl_name, rule);
        self.register_operation(operation_name, operation);
    }

    /// Register only the DSL translation rule.
    ///
    /// Calls translate normally but fail at run time unless an operation with
    /// the translated name is registered separately.
    pub fn register_syntax(&self, dsl_name: &str, rule: TranslateRule) {
        let mut rules = self.rules.write().expect("acquire write lock on rules");
        if rules.insert(dsl_name.to_string(), rule).is_some() {
            debug!(name = dsl_name, "replaced translation rule");
        }
    }

    /// Register only the runtime operation.
    pub fn register_operation(&self, operation_name: &str, operation: Arc<dyn Operation>) {
        let mut operations = self
            .operations
            .write()
            .expect("acquire write lock on operations");
        if operations
            .insert(operation_name.to_string(), operation)
            .is_some()
        {
            debug!(name = operation_name, "replaced operation");
        }
    }

    /// Translate a parsed call with its registered rule.
    ///
    /// # Errors
    /// Returns [`WorkflowError::UnknownOperation`] for unregistered names and
    /// whatever the rule reports for bad arguments.
    pub fn translate(&self, call: &DslCall) -> Result<Invocation> {
        let rule = {
            let rules = self.rules.read().expect("acquire read lock on rules");
            rules
                .get(&call.name)
                .cloned()
                .ok_or_else(|| WorkflowError::UnknownOperation(call.name.clone()))?
        };
        rule(call)
    }

    /// Look up an executable operation.
    ///
    /// # Errors
    /// Returns [`WorkflowError::SyntaxOnly`] when the name only has a
    /// translation rule, [`WorkflowError::UnknownOperation`] otherwise.
    pub fn operation(&self, name: &str) -> Result<Arc<dyn Operation>> {
        let operations = self
            .operations
            .read()
            .expect("acquire read lock on operations");
        if let Some(operation) = operations.get(name) {
            return Ok(operation.clone());
        }
        drop(operations);

        if self.has_rule(name) {
            Err(WorkflowError::SyntaxOnly(name.to_string()))
        } else {
            Err(WorkflowError::UnknownOperation(name.to_string()))
        }
    }

    /// Whether a DSL name has a translation rule.
    #[must_use]
    pub fn has_rule(&self, dsl_name: &str) -> bool {
        self.rules
            .read()
            .expect("acquire read lock on rules")
            .contains_key(dsl_name)
    }

    /// Whether an operation name is executable.
    #[must_use]
    pub fn has_operation(&self, operation_name: &str) -> bool {
        self.operations
            .read()
            .expect("acquire read lock on operations")
            .contains_key(operation_name)
    }

    /// Registered DSL names, sorted.
    #[must_use]
    pub fn dsl_names(&self) -> Vec<String> {
        let rules = self.rules.read().expect("acquire read lock on rules");
        let mut names: Vec<String> = rules.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{StageContext, StageOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Noop;

    #[async_trait]
    impl Operation for Noop {
        async fn run(&self, _ctx: &StageContext<'_>, _params: &Value) -> Result<StageOutput> {
            Ok(StageOutput::default())
        }
    }

    fn rule_to(operation: &'static str) -> TranslateRule {
        Arc::new(move |call: &DslCall| {
            Ok(Invocation::new(operation, json!({ "args": call.args })))
        })
    }

    #[test]
    fn test_register_and_translate() {
        let registry = FunctionRegistry::new();
        registry.register("noop", rule_to("Noop"), "Noop", Arc::new(Noop));

        let invocation = registry
            .translate(&DslCall::new("noop", vec![json!(1)]))
            .unwrap();
        assert_eq!(invocation.operation, "Noop");
        assert_eq!(invocation.params, json!({ "args": [1] }));
        assert!(registry.operation("Noop").is_ok());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = FunctionRegistry::new();
        registry.register_syntax("noop", rule_to("First"));
        registry.register_syntax("noop", rule_to("Second"));

        let invocation = registry.translate(&DslCall::new("noop", vec![])).unwrap();
        assert_eq!(invocation.operation, "Second");
        assert_eq!(registry.dsl_names(), vec!["noop"]);
    }

    #[test]
    fn test_syntax_only_and_unknown() {
        let registry = FunctionRegistry::new();
        registry.register_syntax("sugar", rule_to("sugar"));

        assert!(registry.translate(&DslCall::new("sugar", vec![])).is_ok());
        assert!(matches!(
            registry.operation("sugar"),
            Err(WorkflowError::SyntaxOnly(_))
        ));
        assert!(matches!(
            registry.operation("missing"),
            Err(WorkflowError::UnknownOperation(_))
        ));
        assert!(matches!(
            registry.translate(&DslCall::new("missing", vec![])),
            Err(WorkflowError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_clones_share_tables() {
        let registry = FunctionRegistry::new();
        let clone = registry.clone();
        clone.register_operation("Noop", Arc::new(Noop));
        assert!(registry.has_operation("Noop"));
    }
}
