use async_graphql::{Object, Subscription};
use futures::{Stream, StreamExt};

use crate::modules::fields::core::alphabet::Alphabet;

/// Names of `Query` list fields that can be served with `@stream`. Each of them
/// has a `Subscription` field of the same name yielding one item per event.
pub const STREAMABLE_FIELDS: [&str; 1] = ["alphabet"];

#[derive(Default)]
pub struct AlphabetQuery;

#[Object]
impl AlphabetQuery {
    /// The letters `a` to `g`, one per second.
    async fn alphabet(&self) -> Vec<String> {
        Alphabet::new().map(String::from).collect().await
    }
}

#[derive(Default)]
pub struct AlphabetSubscription;

#[Subscription(name = "Subscription")]
impl AlphabetSubscription {
    /// The letters `a` to `g`, one event per second.
    async fn alphabet(&self) -> impl Stream<Item = String> {
        Alphabet::new().map(String::from)
    }
}
