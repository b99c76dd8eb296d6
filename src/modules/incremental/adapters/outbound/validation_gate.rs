use std::sync::Arc;

use async_graphql::extensions::{Extension, ExtensionContext, ExtensionFactory, NextExecute};
use async_graphql::{Response, Value};

/// Request data asking the engine to parse and validate the document, then
/// stop before any resolver runs.
pub struct ValidateOnly;

/// Engine extension honouring [`ValidateOnly`]. A validated request answers
/// with `data: null` and no errors; a rejected one carries the engine's
/// validation errors.
pub struct ValidationGate;

impl ExtensionFactory for ValidationGate {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(ValidationGateExtension)
    }
}

struct ValidationGateExtension;

#[async_trait::async_trait]
impl Extension for ValidationGateExtension {
    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        if ctx.data_opt::<ValidateOnly>().is_some() {
            tracing::trace!(?operation_name, "validated without executing");
            return Response::new(Value::Null);
        }
        next.run(ctx, operation_name).await
    }
}
