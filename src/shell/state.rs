use crate::modules::fields::use_cases::stream_alphabet::inbound::graphql::STREAMABLE_FIELDS;
use crate::modules::incremental::use_cases::execute_incremental::handler::IncrementalExecutor;
use crate::shell::graphql::{AppSchema, build_schema};

#[derive(Clone)]
pub struct AppState {
    pub executor: IncrementalExecutor<AppSchema>,
    pub graphql_path: String,
}

impl AppState {
    pub fn new(graphql_path: impl Into<String>) -> Self {
        Self {
            executor: IncrementalExecutor::new(build_schema(), STREAMABLE_FIELDS),
            graphql_path: graphql_path.into(),
        }
    }
}
