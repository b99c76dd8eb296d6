use defer_stream_api::shell::bootstrap;
use defer_stream_api::shell::config::AppConfig;
use defer_stream_api::shell::http::router;
use defer_stream_api::shell::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap();
    let config = AppConfig::from_env()?;

    let app = router(AppState::new(&config.graphql_path));

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(
        "Server is running on http://localhost:{}{}",
        config.port,
        config.graphql_path
    );
    axum::serve(listener, app).await?;
    Ok(())
}
