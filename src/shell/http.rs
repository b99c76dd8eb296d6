use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::modules::incremental::adapters::inbound::accept::{Transport, negotiate};
use crate::modules::incremental::adapters::outbound::event_stream::event_stream;
use crate::modules::incremental::adapters::outbound::multipart::Multipart;
use crate::shell::state::AppState;

pub fn router(state: AppState) -> Router {
    let path = state.graphql_path.clone();
    Router::new()
        .route(&path, get(graphiql).post(graphql))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn graphql(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> Response {
    let request = request.into_inner();
    let transport = negotiate(&headers);
    tracing::debug!(?transport, "negotiated transport");

    match transport {
        Transport::Json => {
            GraphQLResponse::from(state.executor.execute_single(request).await).into_response()
        }
        Transport::Multipart => {
            Multipart::new(state.executor.execute_incremental(request)).into_response()
        }
        Transport::EventStream => {
            event_stream(state.executor.execute_incremental(request)).into_response()
        }
    }
}

async fn graphiql(State(state): State<AppState>) -> Html<String> {
    Html(
        GraphiQLSource::build()
            .endpoint(&state.graphql_path)
            .finish(),
    )
}
