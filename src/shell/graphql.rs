use async_graphql::{EmptyMutation, MergedObject, Schema};

use crate::modules::fields::use_cases::fast_field::inbound::graphql::FastFieldQuery;
use crate::modules::fields::use_cases::slow_field::inbound::graphql::SlowFieldQuery;
use crate::modules::fields::use_cases::stream_alphabet::inbound::graphql::{
    AlphabetQuery, AlphabetSubscription,
};
use crate::modules::incremental::adapters::outbound::validation_gate::ValidationGate;

#[derive(MergedObject, Default)]
#[graphql(name = "Query")]
pub struct QueryRoot(AlphabetQuery, FastFieldQuery, SlowFieldQuery);

pub type AppSchema = Schema<QueryRoot, EmptyMutation, AlphabetSubscription>;

pub fn build_schema() -> AppSchema {
    Schema::build(QueryRoot::default(), EmptyMutation, AlphabetSubscription)
        .extension(ValidationGate)
        .finish()
}

#[cfg(test)]
mod graphql_schema_tests {
    use super::*;

    #[test]
    fn it_should_expose_the_three_query_fields_and_the_alphabet_subscription() {
        let sdl = build_schema().sdl();

        assert!(sdl.contains("type Query {"));
        assert!(sdl.contains("alphabet: [String!]!"));
        assert!(sdl.contains("fastField: String!"));
        assert!(sdl.contains("slowField(waitFor: Int!): String!"));
        assert!(sdl.contains("type Subscription {"));
        assert!(sdl.contains("alphabet: String!"));
    }
}
