// Local WebSocket and HTTP servers for probe tests

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const TEST_EMAIL: &str = "admin@example.com";
pub const TEST_PASSWORD: &str = "secret";
pub const TEST_ACCESS_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJ1c2VyX2lkIjoxfQ.c2ln";

/// What the WebSocket server does with each accepted connection
#[derive(Debug, Clone)]
pub enum Script {
    /// Send the messages, then close with the given code and reason
    SendThenClose(Vec<String>, u16, String),
    /// Reply to every received text message with `reply:<text>`, and send
    /// the extra messages once `expect` messages arrived
    Echo { expect: usize, extra: Vec<String> },
    /// Complete the handshake, then drop the TCP connection
    DropAfterOpen,
    /// Drop the TCP connection before the handshake
    RefuseHandshake,
}

pub struct WsServer {
    pub addr: SocketAddr,
    pub seen_uris: Arc<Mutex<Vec<String>>>,
}

impl WsServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.addr, path_and_query)
    }

    pub fn uris(&self) -> Vec<String> {
        self.seen_uris.lock().unwrap().clone()
    }
}

pub async fn start_ws_server(script: Script) -> WsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen_uris = Arc::new(Mutex::new(Vec::new()));
    let uris = seen_uris.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let script = script.clone();
            let uris = uris.clone();
            tokio::spawn(async move {
                handle_connection(stream, script, uris).await;
            });
        }
    });

    WsServer { addr, seen_uris }
}

async fn handle_connection(stream: TcpStream, script: Script, uris: Arc<Mutex<Vec<String>>>) {
    if matches!(script, Script::RefuseHandshake) {
        drop(stream);
        return;
    }

    let callback = |req: &HandshakeRequest,
                    resp: HandshakeResponse|
     -> Result<HandshakeResponse, ErrorResponse> {
        uris.lock().unwrap().push(req.uri().to_string());
        Ok(resp)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    match script {
        Script::SendThenClose(messages, code, reason) => {
            for message in messages {
                ws.send(Message::Text(message)).await.unwrap();
            }
            ws.close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            }))
            .await
            .unwrap();
            drain(&mut ws).await;
        }
        Script::Echo { expect, extra } => {
            let mut seen = 0;
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    ws.send(Message::Text(format!("reply:{}", text)))
                        .await
                        .unwrap();
                    seen += 1;
                    if seen == expect {
                        for message in &extra {
                            ws.send(Message::Text(message.clone())).await.unwrap();
                        }
                    }
                }
            }
        }
        Script::DropAfterOpen => {
            drop(ws);
        }
        Script::RefuseHandshake => {}
    }
}

async fn drain(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

/// Port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn login_handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/api/auth/login/" {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .unwrap());
    }

    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    let credentials: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();

    let (status, body) = if credentials["email"] == TEST_EMAIL
        && credentials["password"] == TEST_PASSWORD
    {
        (
            StatusCode::OK,
            serde_json::json!({"access": TEST_ACCESS_TOKEN, "refresh": "r"}).to_string(),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"detail": "Invalid credentials"}).to_string(),
        )
    };

    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap())
}

/// Threat event request as the backend saw it
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

pub struct EventsServer {
    pub base_url: String,
    pub events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventsServer {
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

async fn events_handler(
    req: Request<Incoming>,
    events: Arc<Mutex<Vec<RecordedEvent>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/api/threatmap/events/" {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .unwrap());
    }

    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();

    let id = {
        let mut events = events.lock().unwrap();
        events.push(RecordedEvent {
            authorization,
            body,
        });
        events.len()
    };

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(
            serde_json::json!({"id": id}).to_string(),
        )))
        .unwrap())
}

/// Backend exposing only the threat event endpoint
pub async fn start_events_server() -> EventsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let events = recorded.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| events_handler(req, events.clone()));
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    EventsServer {
        base_url: format!("http://{}", addr),
        events,
    }
}

/// Minimal backend exposing only the login endpoint
pub async fn start_login_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(login_handler))
                    .await;
            });
        }
    });

    format!("http://{}", addr)
}
