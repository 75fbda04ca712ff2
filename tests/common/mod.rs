//! Fixtures and a minimal static file server shared by the integration tests.

#![allow(dead_code)]

use affnav::optimize::{OptimizationOptions, optimize, write_optimized};
use affnav::types::SiteConfig;
use serde_json::{Value, json};
use std::io::{Read as _, Write as _};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// ===========================================================================
// Fixtures
// ===========================================================================

/// Two menu items: a `single` with five sites and a `tabs` with two
/// submenus of two and one site.
pub fn site_config_json() -> Value {
    json!({
        "site": {
            "title": "Affiliate导航",
            "description": "专业的Affiliate营销导航网站",
            "logo": { "text": "Affiliate导航", "href": "/" }
        },
        "categoryMap": { "追踪器": "trackers", "流量平台": "traffic" },
        "menuItems": [
            {
                "name": "追踪器",
                "href": "#trackers",
                "icon": "chart",
                "type": "single",
                "sites": [
                    { "title": "Binom", "description": "Self-hosted tracker", "url": "https://binom.org" },
                    { "title": "Voluum", "description": "Cloud tracker", "url": "https://voluum.com" },
                    { "title": "RedTrack", "description": "Attribution", "url": "https://redtrack.io" },
                    { "title": "Keitaro", "description": "Tracker for teams" },
                    { "title": "BeMob", "description": "Free tier tracker", "url": "https://bemob.com" }
                ]
            },
            {
                "name": "流量平台",
                "href": "#traffic",
                "icon": "globe",
                "type": "tabs",
                "submenu": [
                    {
                        "name": "PoP",
                        "href": "#traffic-pop",
                        "icon": "bolt",
                        "sites": [
                            { "title": "PropellerAds", "description": "Pop traffic", "url": "https://propellerads.com" },
                            { "title": "RichAds", "description": "Push and pop" }
                        ]
                    },
                    {
                        "name": "Native",
                        "href": "#traffic-native",
                        "icon": "news",
                        "sites": [
                            { "title": "Taboola", "description": "Native ads", "url": "https://taboola.com" }
                        ]
                    }
                ]
            }
        ]
    })
}

pub fn site_config() -> SiteConfig {
    serde_json::from_value(site_config_json()).unwrap()
}

/// A site directory holding the optimized config, the traditional backup
/// and every category chunk.
pub fn optimized_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let config = site_config();
    let result = optimize(&config, &OptimizationOptions::default()).unwrap();
    write_optimized(&result, &config, tmp.path()).unwrap();
    tmp
}

// ===========================================================================
// Minimal HTTP server
// ===========================================================================

pub struct TestServer {
    port: u16,
    requests: Arc<AtomicUsize>,
    _stop: std::sync::mpsc::Sender<()>,
}

impl TestServer {
    /// Serve files under `root`. Each request is answered after `delay`.
    pub fn start(root: PathBuf, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        thread::spawn(move || {
            listener.set_nonblocking(true).unwrap();
            loop {
                if rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, _)) => {
                        let root = root.clone();
                        let counter = counter.clone();
                        thread::spawn(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(delay);
                            serve_request(stream, &root);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            port,
            requests,
            _stop: tx,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn serve_request(mut stream: std::net::TcpStream, root: &Path) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 4096];
    let n = match stream.read(&mut buf) {
        Ok(n) if n > 0 => n,
        _ => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let file_path = root.join(path.trim_start_matches('/'));

    let (status, body, ct) = if file_path.is_file() {
        let body = std::fs::read(&file_path).unwrap_or_default();
        ("200 OK", body, "application/json")
    } else {
        ("404 Not Found", b"Not Found".to_vec(), "text/plain")
    };

    let header = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: {ct}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
}
