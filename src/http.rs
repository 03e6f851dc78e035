//! The thin HTTP boundary of spec.md 4.5/6.1: an advisory pre-check,
//! the WebSocket upgrade, and the ambient `/metrics` route. Everything
//! that matters happens once a socket is upgraded and handed to
//! `dispatcher::run`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::{Filter, Reply};

use crate::app::AppState;
use crate::id_types::{RoomId, UserName};

#[derive(Deserialize)]
struct InitiateQuery {
    name: Option<String>,
    #[serde(rename = "roomID")]
    room_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct InitiateResponse {
    name_success: bool,
    room_success: bool,
}

/// `GET /initiate?name=&roomID=`: advisory only (spec.md 4.5). The
/// authoritative checks happen in `initiation`/`roomInitiation`; this
/// exists purely so a client can pre-fill a form without an expensive
/// round trip through the full WebSocket handshake first.
async fn initiate(
    query: InitiateQuery,
    app: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let name_success = match &query.name {
        Some(name) => app
            .signaling
            .user_by_name(&UserName::from(name.as_str()))
            .await
            .is_none(),
        None => false,
    };
    let room_success = match &query.room_id {
        Some(room_id) => app.signaling.room_exists(&RoomId::from(room_id.as_str())).await,
        None => false,
    };

    Ok(warp::reply::json(&InitiateResponse {
        name_success,
        room_success,
    }))
}

fn into_response<R: warp::Reply>(reply: R) -> warp::reply::Response {
    reply.into_response()
}

fn with_app(
    app: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || app.clone())
}

/// All routes except `/healthz` (kept separate in `health.rs`, grounded
/// on the teacher's standalone health-service module).
pub fn routes(
    app: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let initiate_route = warp::path("initiate")
        .and(warp::get())
        .and(warp::query::<InitiateQuery>())
        .and(with_app(app.clone()))
        .and_then(initiate)
        .map(into_response);

    let websocket_route = warp::path("websocket")
        .and(warp::get())
        .and(warp::ws())
        .and(with_app(app))
        .map(|ws: warp::ws::Ws, app: Arc<AppState>| {
            ws.on_upgrade(move |socket| crate::dispatcher::run(socket, app))
                .into_response()
        });

    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(|| crate::metrics::render())
        .map(|body| warp::reply::with_header(body, "Content-Type", "text/plain; version=0.0.4").into_response());

    initiate_route.or(websocket_route).unify().or(metrics_route).unify()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initiate_reports_name_taken_and_room_missing() {
        let app = Arc::new(AppState::default());
        app.signaling
            .add_user(crate::id_types::ConnectionId(1), UserName::from("alice"))
            .await
            .unwrap();

        let filter = routes(app);
        let res = warp::test::request()
            .path("/initiate?name=alice&roomID=nope")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), 200);
        let body: InitiateResponse = serde_json::from_slice(res.body()).unwrap();
        assert!(!body.name_success);
        assert!(!body.room_success);
    }

    #[tokio::test]
    async fn initiate_reports_name_free_and_room_present() {
        let app = Arc::new(AppState::default());
        app.signaling
            .add_user(crate::id_types::ConnectionId(1), UserName::from("alice"))
            .await
            .unwrap();
        app.signaling
            .create_room(UserName::from("alice"), RoomId::from("r1"))
            .await
            .unwrap();

        let filter = routes(app);
        let res = warp::test::request()
            .path("/initiate?name=bob&roomID=r1")
            .reply(&filter)
            .await;

        let body: InitiateResponse = serde_json::from_slice(res.body()).unwrap();
        assert!(body.name_success);
        assert!(body.room_success);
    }

    #[tokio::test]
    async fn metrics_route_serves_prometheus_text() {
        let app = Arc::new(AppState::default());
        crate::metrics::register_metrics();
        let filter = routes(app);
        let res = warp::test::request().path("/metrics").reply(&filter).await;
        assert_eq!(res.status(), 200);
        assert!(String::from_utf8_lossy(res.body()).contains("signal_active_sessions"));
    }
}
