#![allow(dead_code)]

use actix_web::dev::{Server, ServerHandle};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures::channel::oneshot;
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

pub const SORRY_HTML: &str = "<html><head></head><body>SorryPage</body></html>";
pub const SORRY_JSON: &str = "{\"detail\": \"This endpoint is currently in sorrypage mode\"}";

/// A loopback upstream answering every request with the same response.
pub struct Upstream {
    pub url: String,
    pub handle: ServerHandle,
}

impl Upstream {
    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

pub fn fixed(status: StatusCode, content_type: &'static str, body: &'static str) -> Upstream {
    let server = HttpServer::new(move || {
        App::new().default_service(web::to(move || async move {
            HttpResponse::build(status)
                .content_type(content_type)
                .body(body)
        }))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind fixed upstream");
    let addr = server.addrs()[0];
    start(addr, server.run())
}

/// A loopback upstream that describes the request it received as JSON.
pub fn echo() -> Upstream {
    let server = HttpServer::new(|| App::new().default_service(web::to(echo_handler)))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind echo upstream");
    let addr = server.addrs()[0];
    start(addr, server.run())
}

async fn echo_handler(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    HttpResponse::Ok()
        .insert_header(("X-Upstream", "echo"))
        .append_header(("Set-Cookie", "a=1"))
        .append_header(("Set-Cookie", "b=2"))
        .json(serde_json::json!({
            "method": req.method().as_str(),
            "path": req.path(),
            "query": req.query_string(),
            "host": header("host"),
            "forwardedFor": header("x-forwarded-for"),
            "custom": header("x-custom"),
            "keepAlive": header("keep-alive"),
            "body": String::from_utf8_lossy(&body),
        }))
}

/// A loopback upstream that drains the request body and reports its size,
/// answering 503 like a sorry page would.
pub fn sink() -> Upstream {
    let server = HttpServer::new(|| App::new().default_service(web::to(sink_handler)))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind sink upstream");
    let addr = server.addrs()[0];
    start(addr, server.run())
}

async fn sink_handler(mut payload: web::Payload) -> HttpResponse {
    let mut received = 0usize;
    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) => received += chunk.len(),
            Err(_) => return HttpResponse::BadRequest().finish(),
        }
    }
    HttpResponse::ServiceUnavailable().json(serde_json::json!({ "received": received }))
}

/// A loopback upstream that streams `chunks` small chunks, `gap` apart.
pub fn dribble(chunks: usize, gap: Duration) -> Upstream {
    let server = HttpServer::new(move || {
        App::new().default_service(web::to(move || async move {
            let body = futures::stream::unfold(0, move |n| async move {
                if n == chunks {
                    return None;
                }
                actix_rt::time::sleep(gap).await;
                let chunk = web::Bytes::from(format!("chunk-{};", n));
                Some((Ok::<_, actix_web::Error>(chunk), n + 1))
            });
            HttpResponse::ServiceUnavailable()
                .content_type("text/plain")
                .streaming(body)
        }))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind dribble upstream");
    let addr = server.addrs()[0];
    start(addr, server.run())
}

/// A raw TCP upstream that accepts one connection and never answers.
pub struct Stalled {
    pub url: String,
    /// Fires once request bytes have arrived.
    pub received: oneshot::Receiver<()>,
    /// Fires once the client has closed the connection.
    pub closed: oneshot::Receiver<()>,
}

pub async fn stalled() -> Stalled {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind stalled upstream");
    let addr = listener.local_addr().expect("stalled upstream address");
    let (received_tx, received) = oneshot::channel();
    let (closed_tx, closed) = oneshot::channel();

    actix_rt::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut received_tx = Some(received_tx);
        let mut buf = [0u8; 4096];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Some(tx) = received_tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
        }
        let _ = closed_tx.send(());
    });

    Stalled {
        url: format!("http://{}", addr),
        received,
        closed,
    }
}

fn start(addr: SocketAddr, server: Server) -> Upstream {
    let handle = server.handle();
    actix_rt::spawn(server);
    Upstream {
        url: format!("http://{}", addr),
        handle,
    }
}
