// Shared fixtures: generated images, an in-process upstream, and a controllable in-memory source.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use gallery_engine::source::traits::ImageSource;

/// Deterministic test image of the given size.
pub fn test_image(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    encode(&test_image(w, h), ImageFormat::Png)
}

/// Dimensions the upstream serves for image `n.png`: (10 + n) x (5 + n).
pub fn upstream_dims(n: u32) -> (u32, u32) {
    (10 + n, 5 + n)
}

#[derive(Clone)]
struct UpstreamState {
    hits: Arc<AtomicUsize>,
}

async fn image_handler(State(state): State<UpstreamState>, Path(name): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let id: u32 = match name.split('.').next().and_then(|n| n.parse().ok()) {
        Some(id) => id,
        None => return (StatusCode::NOT_FOUND, "no such image").into_response(),
    };
    let (w, h) = upstream_dims(id);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        png_bytes(w, h),
    )
        .into_response()
}

async fn broken_handler(State(state): State<UpstreamState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        b"<html>definitely not a jpeg</html>".to_vec(),
    )
        .into_response()
}

async fn missing_handler(State(state): State<UpstreamState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "gone").into_response()
}

async fn large_handler() -> Response {
    (StatusCode::OK, vec![0xFFu8; 64 * 1024]).into_response()
}

/// Running fake image server.
pub struct Upstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/images/", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Routes: `/images/{n}.png` serves a PNG, `/broken/{name}` serves garbage,
/// `/missing/{name}` is a 404 and `/large` is a 64 KB body.
pub async fn start_upstream() -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/images/{name}", get(image_handler))
        .route("/broken/{name}", get(broken_handler))
        .route("/missing/{name}", get(missing_handler))
        .route("/large", get(large_handler))
        .with_state(UpstreamState { hits: hits.clone() });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Upstream { addr, hits }
}

/// In-memory source whose fetches can be held open and whose concurrency is observable.
pub struct MemorySource {
    payloads: Mutex<HashMap<String, Bytes>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    started: Semaphore,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            payloads: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            started: Semaphore::new(0),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: &Url, payload: Vec<u8>) {
        self.payloads
            .lock()
            .insert(locator.to_string(), Bytes::from(payload));
    }

    /// Hold fetches of `locator` until [`release`](Self::release) is called.
    pub fn gate(&self, locator: &Url) {
        self.gates
            .lock()
            .insert(locator.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, locator: &Url) {
        if let Some(gate) = self.gates.lock().get(&locator.to_string()) {
            gate.add_permits(1);
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Wait until `n` fetches have entered the source.
    pub async fn wait_started(&self, n: u32) {
        self.started.acquire_many(n).await.unwrap().forget();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    async fn fetch(&self, locator: &Url) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.add_permits(1);

        let gate = self.gates.lock().get(&locator.to_string()).cloned();
        if let Some(gate) = gate {
            gate.acquire().await?.forget();
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.payloads
            .lock()
            .get(&locator.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("no payload for {}", locator))
    }
}
