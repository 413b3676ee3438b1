//! Test fixtures: an in-process HTTP responder and fake collaborators.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::wallpaper::applier::{ApplyError, WallpaperApplier};
use crate::wallpaper::connectivity::ConnectivityChecker;

/// Smallest byte sequence `image::guess_format` recognizes as JPEG, padded
/// with a JFIF header and an end-of-image marker.
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub const HTML_BYTES: &[u8] = b"<!DOCTYPE html><html><body>502 Bad Gateway</body></html>";

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }

    pub fn jpeg() -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body: JPEG_BYTES.to_vec(),
        }
    }

    pub fn html() -> Self {
        Self {
            status: 200,
            content_type: "text/html",
            body: HTML_BYTES.to_vec(),
        }
    }
}

/// Handle to a running responder. The accept loop is aborted on drop.
pub struct HttpServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl HttpServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests answered so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve `replies` in order, one per connection. The last reply repeats
/// once the list is exhausted.
pub async fn spawn_http(replies: Vec<Reply>) -> HttpServer {
    assert!(!replies.is_empty(), "at least one reply required");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let task = tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let reply = &replies[served.min(replies.len() - 1)];
            served += 1;

            // Drain the request head before answering.
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            counter.fetch_add(1, Ordering::SeqCst);

            let header = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reply.content_type,
                reply.body.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&reply.body).await;
            let _ = stream.shutdown().await;
        }
    });

    HttpServer { addr, hits, task }
}

/// Connectivity that never changes.
pub struct StaticConnectivity(pub bool);

#[async_trait]
impl ConnectivityChecker for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// Connectivity that reports online only after the test opens the gate.
/// Holds a change worker in `Loading` for as long as the test needs.
pub struct GatedConnectivity {
    pub gate: Arc<Notify>,
}

#[async_trait]
impl ConnectivityChecker for GatedConnectivity {
    async fn is_online(&self) -> bool {
        self.gate.notified().await;
        true
    }
}

/// Applier that records every path it is asked to apply.
#[derive(Default)]
pub struct RecordingApplier {
    pub applied: Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

impl RecordingApplier {
    pub fn failing() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().unwrap().clone()
    }
}

impl WallpaperApplier for RecordingApplier {
    fn apply(&self, path: &Path) -> Result<(), ApplyError> {
        if self.fail {
            return Err(ApplyError::Os("desktop refused the change".into()));
        }
        self.applied.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
