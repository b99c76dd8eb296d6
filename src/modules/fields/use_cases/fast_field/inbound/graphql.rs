use async_graphql::Object;

use crate::modules::fields::use_cases::fast_field::handler::answer_fast;

#[derive(Default)]
pub struct FastFieldQuery;

#[Object]
impl FastFieldQuery {
    async fn fast_field(&self) -> String {
        answer_fast().await.to_string()
    }
}
