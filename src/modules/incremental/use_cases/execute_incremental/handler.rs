use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::{Executor, Name, Request, Response, ServerError, Value};
use futures::future::{self, AbortHandle, join, join_all};
use futures::stream::{self, Abortable, BoxStream, StreamExt};

use crate::modules::incremental::adapters::outbound::validation_gate::ValidateOnly;
use crate::modules::incremental::core::payload::{
    DeferResult, ExecutionPayload, IncrementalResult, InitialPayload, PathSegment, StreamResult,
    SubsequentPayload,
};
use crate::modules::incremental::core::plan::{IncrementalPlan, StreamedField};

/// Runs GraphQL requests against an engine that has no notion of incremental
/// delivery, splitting `@defer` / `@stream` queries into parts the engine
/// executes concurrently.
///
/// The engine must install
/// [`ValidationGate`](crate::modules::incremental::adapters::outbound::validation_gate::ValidationGate):
/// a query is validated as a whole before any of its parts runs.
#[derive(Clone)]
pub struct IncrementalExecutor<E> {
    engine: E,
    streamable: Arc<HashSet<String>>,
}

impl<E> IncrementalExecutor<E>
where
    E: Executor,
{
    /// `streamable` names the root fields that also exist on the subscription
    /// type and can therefore be delivered item by item.
    pub fn new<S>(engine: E, streamable: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        Self {
            engine,
            streamable: Arc::new(streamable.into_iter().map(Into::into).collect()),
        }
    }

    pub fn plan(&self, request: &Request) -> Option<IncrementalPlan> {
        IncrementalPlan::from_request(request, &self.streamable)
    }

    /// Resolves everything into a single response, as for a client that cannot
    /// receive more than one payload.
    pub async fn execute_single(&self, request: Request) -> Response {
        match self.plan(&request) {
            Some(plan) => self.engine.execute(plan.collapsed_request()).await,
            None => self.engine.execute(request).await,
        }
    }

    /// Payloads in delivery order. The initial payload always comes first and
    /// the last one has `hasNext: false`. A document the engine rejects gets a
    /// single payload carrying its errors. Dropping the stream cancels every
    /// part still running.
    pub fn execute_incremental(&self, request: Request) -> BoxStream<'static, ExecutionPayload> {
        let plan = match self.plan(&request) {
            Some(plan) if plan.is_incremental() => plan,
            Some(plan) => return self.single_payload(plan.collapsed_request()),
            None => return self.single_payload(request),
        };

        let executor = self.clone();
        stream::once(async move {
            match executor.validate(&plan).await {
                Ok(()) => executor.incremental_payloads(&plan),
                Err(errors) => {
                    tracing::debug!(errors = errors.len(), "rejected incremental request");
                    let response = Response::from_errors(errors);
                    stream::once(future::ready(ExecutionPayload::Initial(
                        InitialPayload::from_response(response, false),
                    )))
                    .boxed()
                }
            }
        })
        .flatten()
        .boxed()
    }

    /// Runs the engine's validation over the collapsed document without
    /// resolving anything.
    async fn validate(&self, plan: &IncrementalPlan) -> Result<(), Vec<ServerError>> {
        let response = self
            .engine
            .execute(plan.collapsed_request().data(ValidateOnly))
            .await;
        if response.errors.is_empty() {
            Ok(())
        } else {
            Err(response.errors)
        }
    }

    fn incremental_payloads(&self, plan: &IncrementalPlan) -> BoxStream<'static, ExecutionPayload> {
        tracing::debug!(
            deferred = plan.deferred().len(),
            streamed = plan.streamed().len(),
            "executing incremental request"
        );

        let (abort, registration) = AbortHandle::new_pair();
        let primary = self.primary(plan, abort);
        let deferred = stream::select_all(plan.deferred().iter().map(|group| {
            let engine = self.engine.clone();
            let request = plan.deferred_request(group);
            let label = group.label.clone();
            stream::once(async move {
                let response = engine.execute(request).await;
                ExecutionPayload::Subsequent(SubsequentPayload::pending(IncrementalResult::Defer(
                    DeferResult {
                        data: response.data,
                        path: Vec::new(),
                        label,
                        errors: response.errors,
                    },
                )))
            })
            .boxed()
        }));

        stream::select(primary, Abortable::new(deferred, registration))
            .scan(HoldBack::default(), |hold_back, payload| {
                future::ready(Some(hold_back.admit(payload)))
            })
            .flat_map(stream::iter)
            .chain(stream::once(future::ready(ExecutionPayload::Subsequent(
                SubsequentPayload::completed(),
            ))))
            .boxed()
    }

    fn single_payload(&self, request: Request) -> BoxStream<'static, ExecutionPayload> {
        let engine = self.engine.clone();
        stream::once(async move {
            let response = engine.execute(request).await;
            ExecutionPayload::Initial(InitialPayload::from_response(response, false))
        })
        .boxed()
    }

    /// The initial payload, then the remaining items of every streamed field.
    ///
    /// A streamed field's first `initialCount` items belong to the initial
    /// payload, so it waits for them before it is sent. When the initial part
    /// resolves to `data: null` nothing else is delivered: `abort` stops the
    /// deferred parts and the streams are dropped.
    fn primary(
        &self,
        plan: &IncrementalPlan,
        abort: AbortHandle,
    ) -> BoxStream<'static, ExecutionPayload> {
        let engine = self.engine.clone();
        let initial_request = plan.initial_request();
        let streams: Vec<(StreamedField, BoxStream<'static, Response>)> = plan
            .streamed()
            .iter()
            .map(|field| {
                let events = self.engine.execute_stream(plan.stream_request(field), None);
                (field.clone(), events)
            })
            .collect();

        let initial = async move {
            let initial = async {
                match initial_request {
                    Some(request) => engine.execute(request).await,
                    None => Response::new(Value::Object(Default::default())),
                }
            };
            let heads = join_all(streams.into_iter().map(|(field, events)| take_head(field, events)));
            let (mut response, heads) = join(initial, heads).await;

            let mut tails = Vec::with_capacity(heads.len());
            if !matches!(response.data, Value::Object(_)) {
                tracing::debug!(errors = response.errors.len(), "initial part failed");
                abort.abort();
                return (InitialPayload::from_response(response, true), tails);
            }
            for head in heads {
                if let Value::Object(fields) = &mut response.data {
                    fields.insert(
                        Name::new(&head.field.response_key),
                        Value::List(head.items.clone()),
                    );
                }
                response.errors.extend(head.errors);
                if let Some(events) = head.rest {
                    tails.push(stream_tail(head.field, head.items.len(), events));
                }
            }
            (InitialPayload::from_response(response, true), tails)
        };

        stream::once(initial)
            .flat_map(|(initial, tails)| {
                stream::once(future::ready(ExecutionPayload::Initial(initial)))
                    .chain(stream::select_all(tails).map(ExecutionPayload::Subsequent))
            })
            .boxed()
    }
}

struct StreamHead {
    field: StreamedField,
    items: Vec<Value>,
    errors: Vec<ServerError>,
    rest: Option<BoxStream<'static, Response>>,
}

async fn take_head(field: StreamedField, mut events: BoxStream<'static, Response>) -> StreamHead {
    let mut items = Vec::new();
    let mut errors = Vec::new();
    while items.len() < field.initial_count {
        let Some(response) = events.next().await else {
            return StreamHead {
                field,
                items,
                errors,
                rest: None,
            };
        };
        let (item, item_errors) = take_item(response, &field.response_key);
        items.extend(item);
        errors.extend(item_errors);
    }
    StreamHead {
        field,
        items,
        errors,
        rest: Some(events),
    }
}

fn stream_tail(
    field: StreamedField,
    start: usize,
    events: BoxStream<'static, Response>,
) -> BoxStream<'static, SubsequentPayload> {
    events
        .scan(start, move |index, response| {
            let (item, errors) = take_item(response, &field.response_key);
            let path = vec![
                PathSegment::Key(field.response_key.clone()),
                PathSegment::Index(*index),
            ];
            let items: Vec<Value> = item.into_iter().collect();
            *index += items.len();
            let result = (!items.is_empty() || !errors.is_empty()).then(|| {
                SubsequentPayload::pending(IncrementalResult::Stream(StreamResult {
                    items,
                    path,
                    label: field.label.clone(),
                    errors,
                }))
            });
            future::ready(Some(result))
        })
        .filter_map(future::ready)
        .boxed()
}

/// One subscription event carries a single item under the field's key.
fn take_item(response: Response, key: &str) -> (Option<Value>, Vec<ServerError>) {
    let item = match response.data {
        Value::Object(fields) => fields.get(key).cloned(),
        _ => None,
    };
    (item, response.errors)
}

/// Keeps subsequent payloads back until the initial payload went out, and
/// drops them if it came back without data.
#[derive(Default)]
struct HoldBack {
    initial_sent: bool,
    held: Vec<ExecutionPayload>,
}

impl HoldBack {
    fn admit(&mut self, payload: ExecutionPayload) -> Vec<ExecutionPayload> {
        match payload {
            ExecutionPayload::Initial(ref initial) => {
                self.initial_sent = true;
                if initial.data == Value::Null {
                    self.held.clear();
                }
                std::iter::once(payload)
                    .chain(self.held.drain(..))
                    .collect()
            }
            _ if !self.initial_sent => {
                self.held.push(payload);
                Vec::new()
            }
            _ => vec![payload],
        }
    }
}
