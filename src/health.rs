use serde::Serialize;
use warp::Filter;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

/// `GET /healthz` (spec.md 4.5): a plain liveness probe, independent of
/// registry state. Kubernetes-style probes only need to know the
/// process is accepting connections, not that any session exists.
pub fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("healthz")
        .and(warp::get())
        .map(|| warp::reply::json(&HealthBody { status: "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_returns_ok_status() {
        let filter = routes();
        let res = warp::test::request().path("/healthz").reply(&filter).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), r#"{"status":"ok"}"#);
    }
}
