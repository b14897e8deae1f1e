//! Shared fixtures for the in-crate tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::{TempDir, tempdir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::monitoring::{CheckResult, Checker};
use crate::pool::{LibsqlPool, open_pool};

/// Migrated database in a throwaway directory. Keep the `TempDir` alive for
/// as long as the pool is used.
pub async fn create_test_database() -> Result<(LibsqlPool, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");

    let pool = open_pool(&db_path.to_string_lossy(), 4).await?;
    let conn = pool.get().await?;
    crate::database::initialize_database(&conn).await?;

    Ok((pool, temp_dir))
}

/// A localhost port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind throwaway listener");
    listener.local_addr().expect("local addr").port()
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub body: String,
}

/// How the canned server answers one request
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(&'static str),
    /// Hold the request, then answer
    Delayed(Duration, &'static str),
    /// Close without answering
    HangUp,
    /// Keep the connection open without answering until the client leaves
    Stall,
}

/// Counts requests being handled and remembers the highest count seen
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Minimal HTTP/1.1 server. The responder gets the request method and picks
/// the reply.
pub struct CannedServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    in_flight: Arc<InFlight>,
}

impl CannedServer {
    pub async fn always(status: &'static str) -> Self {
        Self::spawn(move |_| Reply::Status(status)).await
    }

    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind canned server");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(InFlight::default());
        let respond = Arc::new(respond);

        let (accept_hits, accept_requests, accept_in_flight) = (hits.clone(), requests.clone(), in_flight.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_hits.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, respond.clone(), accept_requests.clone(), accept_in_flight.clone()));
            }
        });

        Self { addr, hits, requests, in_flight }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Accepted connections
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Most requests ever held open at once
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve<F>(
    mut stream: TcpStream,
    respond: Arc<F>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    in_flight: Arc<InFlight>,
) where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    let _guard = in_flight.enter();
    let reply = respond(&request.method);
    requests.lock().unwrap().push(request);

    let status = match reply {
        Reply::Status(status) => Some(status),
        Reply::Delayed(hold, status) => {
            tokio::time::sleep(hold).await;
            Some(status)
        }
        Reply::HangUp => None,
        Reply::Stall => {
            let mut sink = [0u8; 512];
            let drain = async { while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {} };
            let _ = tokio::time::timeout(Duration::from_secs(30), drain).await;
            None
        }
    };

    if let Some(status) = status {
        let response = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(response.as_bytes()).await;
    }
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let method = head.split_whitespace().next()?.to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(CapturedRequest { method, body })
}

/// Checker that replays queued results, then reports failures
#[derive(Default)]
pub struct ScriptedChecker {
    results: Mutex<VecDeque<CheckResult>>,
    targets: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: Arc<InFlight>,
}

impl ScriptedChecker {
    pub fn new(results: impl IntoIterator<Item = CheckResult>) -> Self {
        Self { results: Mutex::new(results.into_iter().collect()), ..Default::default() }
    }

    /// Every check takes `delay` before it answers
    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }

    /// Most checks ever running at once
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait::async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, target: &str) -> CheckResult {
        let _guard = self.in_flight.enter();
        self.targets.lock().unwrap().push(target.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.results.lock().unwrap().pop_front().unwrap_or(CheckResult::failed(0))
    }
}

/// Poll `condition` until it holds, panicking after `limit`
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
