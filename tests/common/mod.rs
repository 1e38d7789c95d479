//! Local change-stream server for the integration tests.
//!
//! Collections served under `/api/ambient/v1/{collection}`:
//! - `sessions`: four frames (one undecodable) then `[DONE]`
//! - `projects`: one event, then the body ends without `[DONE]`
//! - `quiet`: keep-alive comments only, never ends
//! - `ndjson`: newline-delimited JSON, then `[DONE]`
//! - `secret`: 401
//! - anything else: 404

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ambient_watch::WatchClient;
use ambient_watch::WatchClientBuilder;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use warp::http::HeaderMap;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::sse::Event;
use warp::Filter;
use warp::Reply;

pub const TOKEN: &str = "sha256~integration-token";
pub const PROJECT: &str = "team-a";

#[derive(Clone, Debug, Default)]
pub struct RecordedRequest {
    pub collection: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub project: Option<String>,
    pub last_event_id: Option<String>,
    pub accept: Option<String>,
}

pub struct TestServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let route = warp::get()
            .and(warp::path!("api" / "ambient" / "v1" / String))
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::header::headers_cloned())
            .map(move |collection: String, query: HashMap<String, String>, headers: HeaderMap| {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                };
                recorded.lock().push(RecordedRequest {
                    collection: collection.clone(),
                    query,
                    authorization: header("authorization"),
                    project: header("x-ambient-project"),
                    last_event_id: header("last-event-id"),
                    accept: header("accept"),
                });
                respond(&collection)
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(route).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(server);

        Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn client(
        &self,
        collection: &str,
    ) -> WatchClient {
        self.builder(collection).build().expect("client should build")
    }

    pub fn builder(
        &self,
        collection: &str,
    ) -> WatchClientBuilder {
        WatchClient::builder(self.base_url())
            .token(TOKEN)
            .project(PROJECT)
            .collection(collection)
            .default_timeout(None)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn change_event(
    kind: &str,
    resource_id: &str,
) -> String {
    serde_json::json!({
        "type": kind,
        "resource_id": resource_id,
        "object": { "id": resource_id, "name": "nightly", "phase": "Running", "timeout": 600 }
    })
    .to_string()
}

fn respond(collection: &str) -> Response {
    match collection {
        "sessions" => {
            let events = vec![
                Event::default().id("1").data(change_event("CREATED", "s1")),
                Event::default().id("2").data(change_event("UPDATED", "s1")),
                Event::default().id("3").data("not json"),
                Event::default()
                    .id("4")
                    .data(r#"{"type":"DELETED","resource_id":"s1"}"#),
                Event::default().data("[DONE]"),
            ];
            let stream = futures::stream::iter(events.into_iter().map(Ok::<_, Infallible>));
            warp::sse::reply(stream).into_response()
        }
        "projects" => {
            let events = vec![Event::default().data(change_event("CREATED", "p1"))];
            let stream = futures::stream::iter(events.into_iter().map(Ok::<_, Infallible>));
            warp::sse::reply(stream).into_response()
        }
        "quiet" => {
            let stream = warp::sse::keep_alive()
                .interval(Duration::from_millis(50))
                .stream(futures::stream::pending::<Result<Event, Infallible>>());
            warp::sse::reply(stream).into_response()
        }
        "ndjson" => {
            let body = format!(
                "{}\n\n{}\n[DONE]\n",
                change_event("CREATED", "n1"),
                change_event("DELETED", "n1")
            );
            warp::http::Response::builder()
                .header("content-type", "application/x-ndjson")
                .body(body.into())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        "secret" => warp::reply::with_status("invalid token", StatusCode::UNAUTHORIZED).into_response(),
        _ => warp::reply::with_status("not found", StatusCode::NOT_FOUND).into_response(),
    }
}
