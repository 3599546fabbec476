use axum::routing::get;
use axum::Router;

pub mod liveness;

pub fn router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/livez", get(liveness::handler))
}
