#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Local HTTP/1 server answering with a scripted sequence of statuses.
/// The last status repeats once the script is exhausted.
pub struct ScriptedServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
}

struct ServerState {
    script: Mutex<VecDeque<u16>>,
    hits: AtomicU32,
    bodies: Mutex<Vec<Bytes>>,
    content_types: Mutex<Vec<Option<String>>>,
}

impl ScriptedServer {
    pub async fn start(statuses: &[u16]) -> Self {
        assert!(!statuses.is_empty(), "script needs at least one status");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState {
            script: Mutex::new(statuses.iter().copied().collect()),
            hits: AtomicU32::new(0),
            bodies: Mutex::new(Vec::new()),
            content_types: Mutex::new(Vec::new()),
        });

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&server_state);
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, Arc::clone(&state)));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> u32 {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Bytes> {
        self.state.bodies.lock().unwrap().clone()
    }

    pub fn content_types(&self) -> Vec<Option<String>> {
        self.state.content_types.lock().unwrap().clone()
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = req
        .into_body()
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();

    state.hits.fetch_add(1, Ordering::SeqCst);
    state.bodies.lock().unwrap().push(body);
    state.content_types.lock().unwrap().push(content_type);

    let status = {
        let mut script = state.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().unwrap()
        }
    };

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(format!("{{\"status\":{}}}", status))))
        .unwrap())
}

/// Address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}
