mod handlers;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::{DynAPI, API};
use crate::server::handlers::rides;

pub async fn serve<T: API + Sync + Send + 'static>(api: T) {
    let api = Arc::new(api) as DynAPI;

    let app = Router::new()
        .route("/rides", post(rides::create))
        .route("/rides/search", get(rides::search))
        .route(
            "/rides/:id",
            get(rides::find).patch(rides::update).delete(rides::cancel),
        )
        .route("/rides/:id/join", post(rides::join))
        .route("/rides/:id/leave", post(rides::leave))
        .route("/rides/:id/finish", patch(rides::finish))
        .route("/rides/:id/kick", post(rides::vote_kick))
        .route("/rides/:id/kick/:user_id", get(rides::kick_vote_status))
        .route("/rides/:id/transfer", patch(rides::transfer_ownership))
        .route("/rides/:id/participants", get(rides::participants))
        .layer(Extension(api));

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".into())
        .parse()
        .expect("invalid BIND_ADDR");

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
