use super::{ActionRegistry, FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::Result;
use crate::log::LogLevel;
use csrfguard_core::{HttpRequest, HttpResponse};
use std::fmt;
use tracing::warn;

/// Ordered failure actions.
///
/// Every action runs, in order, even when an earlier one fails; failures
/// are reported to the guard's logger.
pub struct FailurePipeline {
    actions: Vec<Box<dyn FailureAction>>,
}

impl FailurePipeline {
    pub fn new(actions: Vec<Box<dyn FailureAction>>) -> Self {
        Self { actions }
    }

    pub fn from_specs(registry: &ActionRegistry, specs: &[ActionSpec]) -> Result<Self> {
        Ok(Self::new(registry.build_all(specs)?))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|action| action.name()).collect()
    }

    /// Run every action. Returns how many of them failed.
    pub async fn run(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
        failure: &ValidationFailure,
        context: &GuardContext<'_>,
    ) -> usize {
        let mut failed = 0;

        for action in &self.actions {
            if let Err(err) = action.execute(request, response, failure, context).await {
                failed += 1;
                warn!(action = %action.name(), error = %err, "Failure action errored");
                context.logger.log(
                    LogLevel::Error,
                    &format!("action {} failed: {err}", action.name()),
                );
            }
        }

        failed
    }
}

impl fmt::Debug for FailurePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailurePipeline")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::Fixture;
    use crate::error::ActionError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Recording {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl FailureAction for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(
            &self,
            _request: &HttpRequest,
            _response: &mut HttpResponse,
            _failure: &ValidationFailure,
            _context: &GuardContext<'_>,
        ) -> std::result::Result<(), ActionError> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                Err(ActionError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_runs_in_order_past_failures() {
        let fixture = Fixture::basic().await;
        let calls = Arc::new(Mutex::new(Vec::new()));
        let action = |name, fail| -> Box<dyn FailureAction> {
            Box::new(Recording {
                name,
                calls: calls.clone(),
                fail,
            })
        };
        let pipeline = FailurePipeline::new(vec![
            action("first", false),
            action("second", true),
            action("third", false),
        ]);

        let failed = pipeline
            .run(
                &fixture.request("/pay"),
                &mut HttpResponse::ok(),
                &ValidationFailure::missing(),
                &fixture.context(),
            )
            .await;

        assert_eq!(failed, 1);
        assert_eq!(*calls.lock().unwrap(), ["first", "second", "third"]);
        assert_eq!(
            fixture.logger.messages(),
            vec![(LogLevel::Error, "action second failed: boom".to_string())]
        );
    }

    #[test]
    fn test_from_specs_keeps_order() {
        let pipeline = FailurePipeline::from_specs(
            &ActionRegistry::new(),
            &[
                ActionSpec::of("Log"),
                ActionSpec::of("Redirect").with_parameter("Page", "/error"),
            ],
        )
        .unwrap();
        assert_eq!(pipeline.names(), ["Log", "Redirect"]);
        assert_eq!(pipeline.len(), 2);
    }
}
