use defer_stream_api::modules::consumer::adapters::outbound::http_client::IncrementalClient;
use defer_stream_api::shell::bootstrap;
use defer_stream_api::shell::config::ConsumerConfig;

const DEFER_QUERY: &str = "query { fastField ... on Query @defer { slowField(waitFor: 1000) } }";
const STREAM_QUERY: &str = "query { alphabet @stream }";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap();
    let config = ConsumerConfig::from_env();
    tracing::info!(url.full = %config.graphql_url, accept = %config.accept, "consuming");

    let client = IncrementalClient::new(&config.graphql_url, &config.accept);

    let deferred = client.execute(DEFER_QUERY, None).await?;
    tracing::info!(
        data = %deferred.data,
        errors = deferred.errors.len(),
        "final result for query containing defer"
    );

    let streamed = client.execute(STREAM_QUERY, None).await?;
    tracing::info!(
        data = %streamed.data,
        errors = streamed.errors.len(),
        "final result for query containing stream"
    );

    Ok(())
}
