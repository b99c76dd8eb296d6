use async_graphql::Object;

use crate::modules::fields::use_cases::slow_field::handler::{answer_slow, wait_duration};

#[derive(Default)]
pub struct SlowFieldQuery;

#[Object]
impl SlowFieldQuery {
    /// Resolves after `waitFor` milliseconds.
    async fn slow_field(&self, wait_for: i32) -> String {
        answer_slow(wait_duration(wait_for)).await.to_string()
    }
}
