//! Integration tests for the Linecast server: handshake, admission, and
//! the full relay flow over real TCP connections.

use std::time::Duration;

use linecast::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;

// =========================================================================
// Helpers
// =========================================================================

const PROMPT: &str = "Enter your username: ";

struct Started {
    addr: String,
    membership: Membership,
    stop: Option<oneshot::Sender<()>>,
    stopped: tokio::task::JoinHandle<Result<(), LinecastError>>,
}

/// Starts a server on a random port.
async fn start_server(builder: LinecastServerBuilder) -> Started {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let membership = server.membership();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let stopped = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    Started {
        addr,
        membership,
        stop: Some(stop_tx),
        stopped,
    }
}

async fn start_default() -> Started {
    start_server(LinecastServer::builder()).await
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connects and consumes the username prompt.
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };

        let mut prompt = vec![0u8; PROMPT.len()];
        tokio::time::timeout(
            Duration::from_secs(2),
            client.reader.read_exact(&mut prompt),
        )
        .await
        .expect("prompt should arrive")
        .expect("read prompt");
        assert_eq!(prompt, PROMPT.as_bytes());
        client
    }

    /// Connects, picks `name`, and consumes the welcome banner.
    async fn join(addr: &str, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(name).await;
        assert_eq!(client.line().await, "=== Welcome ===");
        assert_eq!(client.line().await, format!("Your username: {name}"));
        assert_eq!(client.line().await, "Type 'exit' to quit");
        assert_eq!(client.line().await, "===");
        assert_eq!(client.line().await, "");
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write");
    }

    /// Reads one line, without its terminator.
    async fn line(&mut self) -> String {
        let mut line = String::new();
        let n = tokio::time::timeout(
            Duration::from_secs(2),
            self.reader.read_line(&mut line),
        )
        .await
        .expect("line should arrive")
        .expect("read line");
        assert!(n > 0, "connection closed while waiting for a line");
        line.trim_end_matches('\n').to_string()
    }

    /// Skips lines until one equal to `wanted` shows up.
    async fn wait_for(&mut self, wanted: &str) {
        loop {
            if self.line().await == wanted {
                return;
            }
        }
    }

    /// Asserts the server closes the connection (after any pending lines).
    async fn assert_closed(&mut self) {
        let mut rest = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(2),
            self.reader.read_to_end(&mut rest),
        )
        .await
        .expect("server should close the connection")
        .ok();
    }
}

/// Polls `membership` until it holds `expected` members.
async fn wait_for_members(membership: &Membership, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while membership.len().await != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {expected} members"));
}

// =========================================================================
// Handshake and admission
// =========================================================================

#[tokio::test]
async fn test_join_is_announced_to_existing_clients() {
    let server = start_default().await;

    let mut bo = Client::join(&server.addr, "bo").await;
    assert_eq!(bo.line().await, "*** bo has joined the chat ***");
    assert_eq!(bo.line().await, "*** Online users: bo ***");

    let mut al = Client::join(&server.addr, "al").await;
    assert_eq!(bo.line().await, "*** al has joined the chat ***");
    assert_eq!(bo.line().await, "*** Online users: bo, al ***");

    assert_eq!(al.line().await, "*** al has joined the chat ***");
    assert_eq!(al.line().await, "*** Online users: bo, al ***");
    assert_eq!(server.membership.names().await, vec!["bo", "al"]);
}

#[tokio::test]
async fn test_username_is_trimmed() {
    let server = start_default().await;
    let mut al = Client::connect(&server.addr).await;
    al.send("   al  \r").await;
    assert_eq!(al.line().await, "=== Welcome ===");
    assert_eq!(al.line().await, "Your username: al");
}

#[tokio::test]
async fn test_too_short_username_is_rejected() {
    let server = start_default().await;

    let mut client = Client::connect(&server.addr).await;
    client.send("a").await;
    assert_eq!(client.line().await, "Username must be 2-32 characters.");
    client.assert_closed().await;

    assert_eq!(server.membership.len().await, 0);
}

#[tokio::test]
async fn test_too_long_username_is_rejected() {
    let server = start_default().await;

    let mut client = Client::connect(&server.addr).await;
    client.send(&"x".repeat(33)).await;
    assert_eq!(client.line().await, "Username must be 2-32 characters.");
    client.assert_closed().await;
}

#[tokio::test]
async fn test_full_server_rejects_next_client() {
    let server = start_default().await;

    let mut clients = Vec::new();
    for i in 0..50 {
        clients.push(Client::join(&server.addr, &format!("user{i:02}")).await);
    }
    wait_for_members(&server.membership, 50).await;

    let mut late = Client::connect(&server.addr).await;
    late.send("latecomer").await;
    assert_eq!(late.line().await, "Server is full. Try again later.");
    late.assert_closed().await;

    assert_eq!(server.membership.len().await, 50);
    assert!(
        !server
            .membership
            .names()
            .await
            .contains(&"latecomer".to_string())
    );
}

#[tokio::test]
async fn test_capacity_frees_up_after_leave() {
    let server = start_server(LinecastServer::builder().max_sessions(1)).await;

    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::connect(&server.addr).await;
    bo.send("bo").await;
    assert_eq!(bo.line().await, "Server is full. Try again later.");

    al.send("exit").await;
    al.assert_closed().await;
    wait_for_members(&server.membership, 0).await;

    let _bo = Client::join(&server.addr, "bo").await;
    wait_for_members(&server.membership, 1).await;
}

#[tokio::test]
async fn test_handshake_timeout_closes_silent_client() {
    let config = SessionConfig {
        handshake_timeout: Some(Duration::from_millis(50)),
        ..SessionConfig::default()
    };
    let server =
        start_server(LinecastServer::builder().session_config(config)).await;

    let mut silent = Client::connect(&server.addr).await;
    silent.assert_closed().await;
    assert_eq!(server.membership.len().await, 0);
}

// =========================================================================
// Relay
// =========================================================================

#[tokio::test]
async fn test_chat_line_is_stamped_and_relayed() {
    let server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::join(&server.addr, "bo").await;
    bo.wait_for("*** Online users: al, bo ***").await;
    al.wait_for("*** Online users: al, bo ***").await;

    al.send("hello").await;

    for client in [&mut al, &mut bo] {
        let line = client.line().await;
        // "[HH:MM:SS] al: hello"
        assert_eq!(line.len(), "[00:00:00] al: hello".len(), "{line}");
        assert!(line.starts_with('['), "{line}");
        assert_eq!(&line[3..4], ":");
        assert_eq!(&line[6..7], ":");
        assert!(line.ends_with("] al: hello"), "{line}");
    }
}

#[tokio::test]
async fn test_empty_lines_are_ignored() {
    let server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::join(&server.addr, "bo").await;
    bo.wait_for("*** Online users: al, bo ***").await;

    al.send("").await;
    al.send("   ").await;
    al.send("real").await;

    assert!(bo.line().await.ends_with("] al: real"));
}

#[tokio::test]
async fn test_lines_keep_one_order_for_everyone() {
    let server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::join(&server.addr, "bo").await;
    let mut cy = Client::join(&server.addr, "cy").await;
    for client in [&mut al, &mut bo, &mut cy] {
        client.wait_for("*** Online users: al, bo, cy ***").await;
    }

    for i in 0..10 {
        al.send(&format!("a{i}")).await;
        bo.send(&format!("b{i}")).await;
    }

    let mut views = Vec::new();
    for client in [&mut al, &mut bo, &mut cy] {
        let mut view = Vec::new();
        for _ in 0..20 {
            let line = client.line().await;
            // Strip the timestamp; it may tick between lines.
            view.push(line[11..].to_string());
        }
        views.push(view);
    }
    assert_eq!(views[0], views[1]);
    assert_eq!(views[1], views[2]);
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test]
async fn test_exit_announces_leave_without_echo() {
    let server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::join(&server.addr, "bo").await;
    al.wait_for("*** Online users: al, bo ***").await;

    bo.send("exit").await;

    assert_eq!(al.line().await, "*** bo has left the chat ***");
    assert_eq!(al.line().await, "*** Online users: al ***");
    bo.assert_closed().await;
    wait_for_members(&server.membership, 1).await;
}

#[tokio::test]
async fn test_dropped_connection_announces_leave() {
    let server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    let bo = Client::join(&server.addr, "bo").await;
    al.wait_for("*** Online users: al, bo ***").await;

    drop(bo);

    assert_eq!(al.line().await, "*** bo has left the chat ***");
    assert_eq!(al.line().await, "*** Online users: al ***");
}

#[tokio::test]
async fn test_overlong_line_ends_session() {
    let config = SessionConfig {
        max_line_len: 64,
        ..SessionConfig::default()
    };
    let server =
        start_server(LinecastServer::builder().session_config(config)).await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut bo = Client::join(&server.addr, "bo").await;
    al.wait_for("*** Online users: al, bo ***").await;

    bo.send(&"z".repeat(200)).await;

    assert_eq!(al.line().await, "*** bo has left the chat ***");
    bo.assert_closed().await;
}

#[tokio::test]
async fn test_stalled_reader_is_dropped_others_continue() {
    let config = SessionConfig {
        queue_capacity: 8,
        ..SessionConfig::default()
    };
    let server =
        start_server(LinecastServer::builder().session_config(config)).await;
    let mut al = Client::join(&server.addr, "al").await;
    // cy never reads; the kernel buffers fill, then its queue does.
    let _cy = Client::join(&server.addr, "cy").await;
    al.wait_for("*** Online users: al, cy ***").await;

    let payload = "p".repeat(4000);
    let mut i = 0;
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            al.send(&format!("{i} {payload}")).await;
            i += 1;
            let line = al.line().await;
            if line == "*** cy has left the chat ***" {
                break;
            }
        }
    })
    .await
    .expect("stalled client should be dropped");

    assert_eq!(al.line().await, "*** Online users: al ***");
    wait_for_members(&server.membership, 1).await;

    // Lines sent after the overflow are still in flight ahead of this one.
    al.send("still here").await;
    loop {
        if al.line().await.ends_with("] al: still here") {
            break;
        }
    }
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_notifies_clients_and_stops() {
    let mut server = start_default().await;
    let mut al = Client::join(&server.addr, "al").await;
    al.wait_for("*** Online users: al ***").await;

    let _ = server.stop.take().expect("stop handle").send(());

    assert_eq!(al.line().await, "*** Server is shutting down ***");
    al.assert_closed().await;

    tokio::time::timeout(Duration::from_secs(2), server.stopped)
        .await
        .expect("server should stop")
        .expect("task")
        .expect("clean stop");
    assert!(server.membership.is_empty().await);
}

#[tokio::test]
async fn test_shutdown_grace_closes_clients_that_stopped_reading() {
    let config = SessionConfig {
        queue_capacity: 100_000,
        ..SessionConfig::default()
    };
    let mut server = start_server(
        LinecastServer::builder()
            .session_config(config)
            .shutdown_grace(Duration::from_millis(200)),
    )
    .await;
    let mut al = Client::join(&server.addr, "al").await;
    let mut cy = Client::join(&server.addr, "cy").await;
    al.wait_for("*** Online users: al, cy ***").await;

    // Far more than the socket buffers hold, so writes to cy block.
    let payload = "p".repeat(4000);
    tokio::time::timeout(Duration::from_secs(20), async {
        for i in 0..5000 {
            al.send(&format!("{i} {payload}")).await;
        }
    })
    .await
    .expect("sends should complete");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let _ = server.stop.take().expect("stop handle").send(());
    tokio::time::timeout(Duration::from_secs(5), server.stopped)
        .await
        .expect("server should stop after the grace period")
        .expect("task")
        .expect("clean stop");

    // Whatever was buffered drains, then the socket is closed.
    let mut rest = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(10),
        cy.reader.read_to_end(&mut rest),
    )
    .await
    .expect("socket should reach EOF")
    .expect("read to end");
}
