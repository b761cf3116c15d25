//! Shared test infrastructure for integration tests.
//!
//! A `Fixture` lays out an export directory, a RAW library and a taxonomy in a
//! temp dir and runs the built binary against them with a scrubbed
//! environment. `StubGemini` answers `generateContent` requests locally so
//! full runs never leave the machine.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

pub const TAXONOMY: &str = "[Scene]\n\tsunset\n\tbeach\n[People]\n\tportrait\n";

pub struct Fixture {
    root: TempDir,
    pub image_dir: PathBuf,
    pub raw_root: PathBuf,
    pub taxonomy: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let image_dir = root.path().join("exports");
        let raw_root = root.path().join("library");
        std::fs::create_dir_all(&image_dir).expect("create image dir");
        std::fs::create_dir_all(&raw_root).expect("create raw root");
        let taxonomy = root.path().join("taxonomy.txt");
        std::fs::write(&taxonomy, TAXONOMY).expect("write taxonomy");
        Self {
            root,
            image_dir,
            raw_root,
            taxonomy,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Write an export whose bytes identify it to `StubGemini`.
    pub fn image(&self, name: &str) -> PathBuf {
        let path = self.image_dir.join(name);
        std::fs::write(&path, image_bytes(name)).expect("write image");
        path
    }

    /// Write a RAW file (and optionally its sidecar) under the library.
    pub fn raw(&self, rel: &str, with_sidecar: bool) -> PathBuf {
        let path = self.raw_root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create raw parent");
        }
        std::fs::write(&path, b"raw").expect("write raw");
        if with_sidecar {
            std::fs::write(sidecar_of(&path), ORIGINAL_XMP).expect("write sidecar");
        }
        path
    }

    /// Binary invocation with positional inputs and no inherited environment.
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_photo-keyword-tagger"));
        command
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", self.root())
            .env("XDG_CONFIG_HOME", self.root().join("config"))
            .arg(&self.image_dir)
            .arg(&self.raw_root)
            .arg(&self.taxonomy);
        command
    }

    /// Stand-in exiftool that logs its argv and appends a marker to the sidecar.
    #[cfg(unix)]
    pub fn fake_exiftool(&self) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = self.root().join("exiftool.log");
        let script = self.root().join("fake-exiftool");
        let body = format!(
            "#!/bin/sh\nfor last; do :; done\nprintf '%s\\n' \"$*\" >> '{}'\necho '<modified/>' >> \"$last\"\n",
            log.display()
        );
        std::fs::write(&script, body).expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        (script, log)
    }
}

pub const ORIGINAL_XMP: &str = "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>\n";

pub fn sidecar_of(raw: &Path) -> PathBuf {
    raw.with_extension("xmp")
}

pub fn image_bytes(name: &str) -> Vec<u8> {
    format!("fake-jpeg:{name}").into_bytes()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// One request received by the stub.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub api_key: Option<String>,
    pub body: String,
}

/// How the stub answers the request carrying a given image.
#[derive(Debug, Clone)]
pub enum Reply {
    Keywords(Vec<String>),
    Status(u16, String),
}

pub fn keywords(list: &[&str]) -> Reply {
    Reply::Keywords(list.iter().map(|keyword| keyword.to_string()).collect())
}

/// Minimal HTTP/1.1 server standing in for the Gemini API.
pub struct StubGemini {
    pub base_url: String,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl StubGemini {
    /// `replies` maps image file names to the answer for that image.
    pub fn start(replies: Vec<(&str, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let needles: Vec<(String, Reply)> = replies
            .into_iter()
            .map(|(name, reply)| (base64_encode(&image_bytes(name)), reply))
            .collect();

        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                if let Some(request) = handle(stream, &needles) {
                    seen.lock().expect("lock requests").push(request);
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/v1beta"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().expect("lock requests").clone()
    }
}

fn handle(mut stream: TcpStream, needles: &[(String, Reply)]) -> Option<SeenRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut content_length = 0usize;
    let mut chunked = false;
    let mut api_key = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse().ok()?,
            "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
            "x-goog-api-key" => api_key = Some(value.to_string()),
            _ => {}
        }
    }

    let body = if chunked {
        read_chunked(&mut reader)?
    } else {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).ok()?;
        body
    };
    let body = String::from_utf8_lossy(&body).into_owned();

    let reply = needles
        .iter()
        .find(|(needle, _)| body.contains(needle.as_str()))
        .map(|(_, reply)| reply.clone())
        .unwrap_or_else(|| Reply::Status(404, "unknown image".to_string()));
    let (status, payload) = match reply {
        Reply::Keywords(keywords) => {
            let answer = serde_json::json!({ "keywords": keywords }).to_string();
            let envelope = serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "Looks like a photo.", "thought": true},
                        {"text": answer}
                    ]},
                    "finishReason": "STOP"
                }]
            });
            (200, envelope.to_string())
        }
        Reply::Status(status, message) => (
            status,
            serde_json::json!({"error": {"code": status, "message": message}}).to_string(),
        ),
    };
    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()?;

    Some(SeenRequest {
        path,
        api_key,
        body,
    })
}

fn read_chunked(reader: &mut BufReader<TcpStream>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).ok()?;
        let size = usize::from_str_radix(size_line.trim().split(';').next()?, 16).ok()?;
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk).ok()?;
        if size == 0 {
            return Some(body);
        }
        body.extend_from_slice(&chunk[..size]);
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose, Engine};
    general_purpose::STANDARD.encode(bytes)
}
