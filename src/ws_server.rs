use crate::orchestrator::ViewUpdate;
use crate::scene::{DrawCommand, Scene};
use crossbeam_channel::{never, select, Receiver};
use log::{debug, error, info, warn};
use serde_json::json;
use sha1_smol::Sha1;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How often new clients are checked for when nothing else is happening.
const IDLE_POLL: Duration = Duration::from_millis(100);
/// A viewer that cannot take a frame within this long is dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Combined HTTP + WebSocket server for the browser map viewer.
///
/// - `GET /` or `GET /viewer.html` → serves the viewer page
/// - WebSocket upgrade → the current scene as a snapshot, then every draw
///   command and view update as it happens
///
/// Draw commands are incremental, so they are never throttled or dropped.
pub struct WsServer {
    draw_rx: Receiver<DrawCommand>,
    view_rx: Receiver<ViewUpdate>,
    addr: String,
    viewer_path: PathBuf,
}

struct WsClient {
    stream: TcpStream,
    alive: bool,
    synced: bool,
}

impl WsClient {
    fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));
        Self {
            stream,
            alive: true,
            synced: false,
        }
    }

    fn send_text(&mut self, text: &str) -> bool {
        let payload = text.as_bytes();
        let len = payload.len();
        let mut frame = Vec::with_capacity(10 + len);
        frame.push(0x81); // FIN + text opcode
        if len < 126 {
            frame.push(len as u8);
        } else if len < 65536 {
            frame.push(126);
            frame.push((len >> 8) as u8);
            frame.push((len & 0xFF) as u8);
        } else {
            frame.push(127);
            for i in (0..8).rev() {
                frame.push(((len >> (i * 8)) & 0xFF) as u8);
            }
        }
        frame.extend_from_slice(payload);
        match self.stream.write_all(&frame) {
            Ok(()) => true,
            Err(_) => {
                self.alive = false;
                false
            }
        }
    }
}

type ClientList = Arc<Mutex<Vec<WsClient>>>;

/// Parsed HTTP request: enough to decide WS vs HTTP.
struct HttpRequest {
    path: String,
    is_upgrade: bool,
    ws_key: Option<String>,
}

fn parse_request(stream: &mut TcpStream) -> Result<HttpRequest, String> {
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
    let mut path = String::from("/");
    let mut is_upgrade = false;
    let mut ws_key = None;
    let mut first = true;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).map_err(|e| e.to_string())?;
        let trimmed = line.trim().to_string();
        if n == 0 || trimmed.is_empty() {
            break;
        }
        if first {
            // "GET /path HTTP/1.1"
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() >= 2 {
                path = parts[1].to_string();
            }
            first = false;
        }
        let lower = trimmed.to_lowercase();
        if lower.starts_with("upgrade:") && lower.contains("websocket") {
            is_upgrade = true;
        }
        if lower.starts_with("sec-websocket-key:") {
            ws_key = Some(trimmed[18..].trim().to_string());
        }
    }
    Ok(HttpRequest {
        path,
        is_upgrade,
        ws_key,
    })
}

pub fn ws_accept_key(key: &str) -> String {
    let magic = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
    let mut hasher = Sha1::new();
    hasher.update(format!("{}{}", key, magic).as_bytes());
    base64_encode(&hasher.digest().bytes())
}

fn ws_handshake(stream: &mut TcpStream, key: &str) -> Result<(), String> {
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        ws_accept_key(key)
    );
    stream
        .write_all(response.as_bytes())
        .map_err(|e| e.to_string())
}

fn serve_static(stream: &mut TcpStream, content: &[u8], content_type: &str) {
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         Cache-Control: no-cache\r\n\
         \r\n",
        content_type,
        content.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(content);
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".js") {
        "application/javascript; charset=utf-8"
    } else if path.ends_with(".css") {
        "text/css; charset=utf-8"
    } else if path.ends_with(".json") {
        "application/json"
    } else if path.ends_with(".svg") {
        "image/svg+xml"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".html") {
        "text/html; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

fn serve_404(stream: &mut TcpStream) {
    let body = b"<h1>404</h1><p>Open <a href=\"/\">/</a> for the track viewer</p>";
    let header = format!(
        "HTTP/1.1 404 Not Found\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}

fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::new();
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        result.push(CHARS[((triple >> 18) & 0x3F) as usize] as char);
        result.push(CHARS[((triple >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            result.push(CHARS[((triple >> 6) & 0x3F) as usize] as char);
        } else {
            result.push('=');
        }
        if chunk.len() > 2 {
            result.push(CHARS[(triple & 0x3F) as usize] as char);
        } else {
            result.push('=');
        }
    }
    result
}

enum Incoming {
    /// `None` once the orchestrator has dropped its surface.
    Draw(Option<DrawCommand>),
    View(Option<ViewUpdate>),
    Idle,
}

fn draw_message(cmd: &DrawCommand) -> String {
    json!({ "kind": "draw", "cmd": cmd }).to_string()
}

fn view_message(update: &ViewUpdate) -> String {
    json!({ "kind": "view", "update": update }).to_string()
}

fn handle_connection(mut stream: TcpStream, clients: ClientList, html: Arc<Vec<u8>>, dir: Arc<PathBuf>) {
    match parse_request(&mut stream) {
        Ok(req) if req.is_upgrade => {
            if let Some(key) = req.ws_key {
                match ws_handshake(&mut stream, &key) {
                    Ok(()) => {
                        info!("Viewer connected");
                        if let Ok(mut cl) = clients.lock() {
                            cl.push(WsClient::new(stream));
                        }
                    }
                    Err(e) => warn!("WS handshake failed: {}", e),
                }
            }
        }
        Ok(req) => match req.path.as_str() {
            "/" | "/viewer.html" | "/index.html" => {
                if html.is_empty() {
                    serve_404(&mut stream);
                } else {
                    serve_static(&mut stream, &html, "text/html; charset=utf-8");
                }
            }
            path => {
                // Static files next to the viewer page; no path traversal.
                let clean = path.trim_start_matches('/');
                if clean.contains("..") || clean.contains('\\') {
                    serve_404(&mut stream);
                } else {
                    match fs::read(dir.join(clean)) {
                        Ok(data) => serve_static(&mut stream, &data, content_type_for(clean)),
                        Err(_) => serve_404(&mut stream),
                    }
                }
            }
        },
        Err(e) => warn!("Request parse error: {}", e),
    }
}

impl WsServer {
    pub fn new(
        draw_rx: Receiver<DrawCommand>,
        view_rx: Receiver<ViewUpdate>,
        addr: String,
        viewer_path: PathBuf,
    ) -> Self {
        Self {
            draw_rx,
            view_rx,
            addr,
            viewer_path,
        }
    }

    pub fn run(self) {
        let clients: ClientList = Arc::new(Mutex::new(Vec::new()));

        let viewer_html = match fs::read(&self.viewer_path) {
            Ok(data) => {
                info!(
                    "Loaded viewer: {} ({} bytes)",
                    self.viewer_path.display(),
                    data.len()
                );
                Arc::new(data)
            }
            Err(e) => {
                warn!(
                    "Could not load {}: {}, HTTP serving disabled",
                    self.viewer_path.display(),
                    e
                );
                Arc::new(Vec::new())
            }
        };
        let base_dir: Arc<PathBuf> = Arc::new(
            self.viewer_path
                .parent()
                .unwrap_or(std::path::Path::new("."))
                .to_path_buf(),
        );

        let accept_clients = clients.clone();
        let addr = self.addr.clone();
        let spawned = thread::Builder::new()
            .name("ws-accept".into())
            .spawn(move || {
                let listener = match TcpListener::bind(&addr) {
                    Ok(l) => l,
                    Err(e) => {
                        error!("Server failed to bind {}: {}", addr, e);
                        return;
                    }
                };
                info!("Viewer at http://{}", addr);
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => {
                            let cl = accept_clients.clone();
                            let html = viewer_html.clone();
                            let dir = base_dir.clone();
                            // HTTP connections close right away; WS ones join the client list.
                            thread::spawn(move || handle_connection(stream, cl, html, dir));
                        }
                        Err(e) => warn!("TCP accept error: {}", e),
                    }
                }
            });
        if let Err(e) = spawned {
            error!("Failed to spawn acceptor: {}", e);
            return;
        }

        // The broadcast loop owns the scene mirror; late joiners get it first.
        let mut scene = Scene::new();
        let mut last_view: Option<ViewUpdate> = None;
        let mut draw_rx = self.draw_rx.clone();
        let mut view_rx = self.view_rx.clone();
        let mut draws_open = true;
        let mut views_open = true;

        while draws_open || views_open {
            let incoming = select! {
                recv(draw_rx) -> msg => Incoming::Draw(msg.ok()),
                recv(view_rx) -> msg => Incoming::View(msg.ok()),
                default(IDLE_POLL) => Incoming::Idle,
            };
            let outgoing = match incoming {
                Incoming::Draw(Some(cmd)) => {
                    scene.apply(&cmd);
                    Some(draw_message(&cmd))
                }
                Incoming::Draw(None) => {
                    draws_open = false;
                    draw_rx = never();
                    None
                }
                Incoming::View(Some(update)) => {
                    let text = view_message(&update);
                    last_view = Some(update);
                    Some(text)
                }
                Incoming::View(None) => {
                    views_open = false;
                    view_rx = never();
                    None
                }
                Incoming::Idle => None,
            };

            let mut cl = match clients.lock() {
                Ok(cl) => cl,
                Err(_) => break,
            };
            if let Some(text) = outgoing {
                for client in cl.iter_mut() {
                    if client.synced {
                        client.send_text(&text);
                    }
                }
            }
            // The message just received is already folded into the scene.
            for client in cl.iter_mut().filter(|c| !c.synced) {
                for cmd in scene.snapshot() {
                    client.send_text(&draw_message(&cmd));
                }
                if let Some(update) = &last_view {
                    client.send_text(&view_message(update));
                }
                client.synced = true;
                debug!("Sent scene snapshot ({} segments)", scene.segments.len());
            }
            cl.retain(|c| c.alive);
        }
        info!("Viewer server stopping");
    }
}
