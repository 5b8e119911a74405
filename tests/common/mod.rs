//! Shared helpers for the end-to-end tests.

use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use waypoint::{App, Server};

/// A parsed reply from the server under test.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub head: String,
    pub body: String,
}

impl Reply {
    /// Case-insensitive header lookup.
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Serve `app` on an ephemeral loopback port and return its address.
#[allow(dead_code)]
pub async fn spawn_app(app: App) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = app.serve(server).await;
    });
    addr
}

/// A running `waypoint` binary, killed when dropped.
#[allow(dead_code)]
pub struct Binary {
    pub addr: SocketAddr,
    _child: Child,
}

/// Start the `waypoint` binary on a free loopback port with extra `args`,
/// and wait until it accepts connections.
#[allow(dead_code)]
pub async fn spawn_binary(args: &[&str]) -> Binary {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let child = Command::new(env!("CARGO_BIN_EXE_waypoint"))
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(args)
        .env("RUST_LOG", "off")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return Binary {
                addr,
                _child: child,
            };
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("waypoint did not start listening on {addr}");
}

/// Send one raw request and read the reply until the server closes.
pub async fn send_raw(addr: SocketAddr, raw: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let text = String::from_utf8(buf).unwrap();

    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();

    Reply {
        status,
        head: head.to_owned(),
        body: body.to_owned(),
    }
}

/// `GET path` with `Connection: close`.
#[allow(dead_code)]
pub async fn get(addr: SocketAddr, path: &str) -> Reply {
    send_raw(
        addr,
        &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    )
    .await
}

/// `POST path` with a JSON content type and `Connection: close`.
#[allow(dead_code)]
pub async fn post(addr: SocketAddr, path: &str, body: &str) -> Reply {
    send_raw(
        addr,
        &format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await
}
