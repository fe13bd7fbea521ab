mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("invalid PORT");

    let config = state::DispatchConfig::from_env()
        .expect("FIREBASE_PROJECT_ID, FIRESTORE_ACCESS_TOKEN and FCM_SERVER_KEY required");
    let state = state::AppState::from_config(&config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "nube dispatch listening");
    axum::serve(listener, app).await.expect("server failed");
}
