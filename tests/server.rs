//! End-to-end tests: a real server on an ephemeral port, driven over TCP.

use photonkv::persistence::SNAPSHOT_FILE;
use photonkv::{Server, ServerConfig};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    async fn start(config: ServerConfig) -> Self {
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown,
            task,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

fn in_memory() -> ServerConfig {
    ServerConfig {
        port: 0,
        persistence: false,
        ..Default::default()
    }
}

fn persistent(dir: &Path) -> ServerConfig {
    ServerConfig {
        port: 0,
        data_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

struct Client {
    stream: BufReader<TcpStream>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: BufReader::new(TcpStream::connect(addr).await.unwrap()),
        }
    }

    /// Sends one command and reads a single-line reply.
    async fn send(&mut self, line: &str) -> String {
        self.send_lines(line, 1).await.remove(0)
    }

    /// Sends one command and reads a reply spanning `count` lines.
    async fn send_lines(&mut self, line: &str, count: usize) -> Vec<String> {
        self.stream
            .get_mut()
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();

        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            let mut reply = String::new();
            self.stream.read_line(&mut reply).await.unwrap();
            lines.push(reply.trim_end_matches('\n').to_string());
        }
        lines
    }
}

#[tokio::test]
async fn test_basic_commands() {
    let server = RunningServer::start(in_memory()).await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.send("PING").await, "PONG");
    assert_eq!(client.send("SET name Ada").await, "OK");
    assert_eq!(client.send("GET name").await, "Ada");
    assert_eq!(client.send("GET missing").await, "(nil)");
    assert_eq!(client.send("INCR visits").await, "1");
    assert_eq!(client.send("RPUSH letters a b c").await, "3");
    assert_eq!(client.send_lines("LRANGE letters 0 -1", 3).await, ["a", "b", "c"]);
    assert_eq!(client.send("HSET user name Ada").await, "1");
    assert_eq!(client.send_lines("HGETALL user", 1).await, ["\"name\" -> \"Ada\""]);
    assert_eq!(client.send("DBSIZE").await, "4");

    server.stop().await;
}

#[tokio::test]
async fn test_errors_keep_connection_open() {
    let server = RunningServer::start(in_memory()).await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.send("NOPE").await, "ERROR: unknown command 'NOPE'");
    assert!(client.send("GET").await.starts_with("ERROR: wrong number of arguments"));

    client.send("SET word abc").await;
    assert_eq!(
        client.send("INCR word").await,
        "ERROR: value is not an integer or out of range"
    );
    assert!(client.send("LPUSH word x").await.starts_with("ERROR: WRONGTYPE"));

    // Still usable after every error
    assert_eq!(client.send("GET word").await, "abc");

    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_lines() {
    let server = RunningServer::start(in_memory()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    stream
        .write_all(b"SET k1 v1\nSET k2 v2\n\nGET k1\nGET k2\n")
        .await
        .unwrap();

    let expected = b"OK\nOK\nv1\nv2\n";
    let mut buf = vec![0u8; expected.len()];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for pipelined replies")
        .unwrap();
    assert_eq!(&buf[..], expected);

    server.stop().await;
}

#[tokio::test]
async fn test_ttl_expires_over_the_wire() {
    let server = RunningServer::start(in_memory()).await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.send("SET session abc EX 1").await, "OK");
    assert_eq!(client.send("GET session").await, "abc");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(client.send("GET session").await, "(nil)");
    assert_eq!(client.send("TTL session").await, "-2");

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients_disjoint_keys() {
    let server = RunningServer::start(in_memory()).await;

    let mut tasks = Vec::new();
    for c in 0..8 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            for i in 0..50 {
                let reply = client.send(&format!("SET client{}:key{} {}", c, i, i)).await;
                assert_eq!(reply, "OK");
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.send("DBSIZE").await, "400");
    assert_eq!(client.send("GET client7:key49").await, "49");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_idle_clients() {
    let server = RunningServer::start(in_memory()).await;
    let mut client = Client::connect(server.addr).await;
    assert_eq!(client.send("PING").await, "PONG");

    server.stop().await;

    let mut rest = String::new();
    let n = tokio::time::timeout(Duration::from_secs(2), client.stream.read_line(&mut rest))
        .await
        .expect("client was not disconnected")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();

    let server = RunningServer::start(persistent(dir.path())).await;
    let mut client = Client::connect(server.addr).await;
    client.send("SET name Ada").await;
    client.send("SET session abc EX 300").await;
    client.send("LPUSH queue a").await;
    client.send("LPUSH queue b").await;
    client.send("HSET user lang en").await;
    drop(client);
    server.stop().await;

    // The final save on shutdown wrote the snapshot
    assert!(dir.path().join(SNAPSHOT_FILE).exists());

    let server = RunningServer::start(persistent(dir.path())).await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.send("DBSIZE").await, "4");
    assert_eq!(client.send("GET name").await, "Ada");
    assert_eq!(client.send_lines("LRANGE queue 0 -1", 2).await, ["b", "a"]);
    assert_eq!(client.send("HGET user lang").await, "en");
    assert_eq!(client.send("TYPE queue").await, "list");

    let ttl: i64 = client.send("TTL session").await.parse().unwrap();
    assert!(ttl > 0 && ttl <= 300);

    server.stop().await;
}

#[tokio::test]
async fn test_save_command() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(persistent(dir.path())).await;
    let mut client = Client::connect(server.addr).await;

    client.send("SET a 1").await;
    assert_eq!(client.send("SAVE").await, "OK");
    assert!(dir.path().join(SNAPSHOT_FILE).exists());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_save_commands() {
    let dir = TempDir::new().unwrap();
    let server = RunningServer::start(persistent(dir.path())).await;

    let mut client = Client::connect(server.addr).await;
    for i in 0..500 {
        client.send(&format!("SET key:{} {}", i, i)).await;
    }

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            for _ in 0..5 {
                assert_eq!(client.send("SAVE").await, "OK");
            }
        }));
    }

    // Other clients are still served while snapshots are written
    assert_eq!(client.send("GET key:499").await, "499");

    for task in tasks {
        task.await.unwrap();
    }
    server.stop().await;
}

#[tokio::test]
async fn test_persistence_disabled() {
    let dir = TempDir::new().unwrap();
    let config = ServerConfig {
        persistence: false,
        ..persistent(dir.path())
    };

    let server = RunningServer::start(config).await;
    let mut client = Client::connect(server.addr).await;
    client.send("SET a 1").await;
    assert!(client.send("SAVE").await.starts_with("ERROR: "));
    server.stop().await;

    assert!(!dir.path().join(SNAPSHOT_FILE).exists());
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(SNAPSHOT_FILE), b"this is not json").unwrap();

    let server = RunningServer::start(persistent(dir.path())).await;
    let mut client = Client::connect(server.addr).await;

    assert_eq!(client.send("DBSIZE").await, "0");
    assert_eq!(client.send("SET fresh start").await, "OK");

    server.stop().await;
}
