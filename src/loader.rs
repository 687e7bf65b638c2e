// src/loader.rs

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use url::Url;

use crate::error::{PlayerError, Result};

const CHUNK: usize = 64 * 1024;
/// Stand-in for the remaining byte count when the server sends no length.
const UNKNOWN_TOTAL_GUESS: u64 = 1_000_000;
/// Most we reserve up front from an advertised length.
const PREALLOC_LIMIT: u64 = CHUNK as u64 * 64;

/// Where a clip actually lives once its catalog path is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    File(PathBuf),
    Http(Url),
}

impl Location {
    /// Accepts `http(s)://` and `file://` URLs, absolute paths, and
    /// URL-encoded paths relative to `base`.
    pub fn resolve(raw: &str, base: &Path) -> Result<Self> {
        if Path::new(raw).is_absolute() {
            return Ok(Location::File(PathBuf::from(raw)));
        }
        if let Ok(url) = Url::parse(raw) {
            return match url.scheme() {
                "http" | "https" => Ok(Location::Http(url)),
                "file" => url
                    .to_file_path()
                    .map(Location::File)
                    .map_err(|_| PlayerError::Network(format!("bad file url: {raw}"))),
                other => Err(PlayerError::Network(format!("unsupported scheme: {other}"))),
            };
        }

        let base = if base.is_absolute() {
            base.to_path_buf()
        } else {
            std::env::current_dir()?.join(base)
        };
        let base_url = Url::from_directory_path(&base)
            .map_err(|_| PlayerError::Network(format!("bad base directory: {}", base.display())))?;
        base_url
            .join(raw)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .map(Location::File)
            .ok_or_else(|| PlayerError::Network(format!("cannot resolve path: {raw}")))
    }

    /// Lowercased extension, used as a format hint.
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            Location::File(p) => p.extension().and_then(|e| e.to_str()).map(str::to_owned),
            Location::Http(u) => Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_owned),
        };
        ext.map(|e| e.to_ascii_lowercase())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Http(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(p) => write!(f, "{}", p.display()),
            Location::Http(u) => write!(f, "{u}"),
        }
    }
}

/// Blocking GET that only accepts 200 and 206.
pub fn open_http(url: &Url) -> Result<(reqwest::blocking::Response, Option<u64>)> {
    let response =
        reqwest::blocking::get(url.clone()).map_err(|e| PlayerError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    if status != 200 && status != 206 {
        return Err(PlayerError::Network(format!("XHR error: {status}")));
    }
    let len = response.content_length();
    Ok((response, len))
}

fn open(location: &Location) -> Result<(Box<dyn Read + Send>, Option<u64>)> {
    match location {
        Location::File(path) => {
            let file = File::open(path).map_err(|e| {
                PlayerError::Network(format!("Error reading file: {}: {e}", path.display()))
            })?;
            let len = file.metadata().ok().map(|m| m.len());
            Ok((Box::new(file), len))
        }
        Location::Http(url) => {
            let (response, len) = open_http(url)?;
            Ok((Box::new(response), len))
        }
    }
}

#[derive(Debug)]
pub enum LoaderMsg {
    Progress {
        generation: u64,
        loaded: u64,
        total: Option<u64>,
    },
    Done {
        generation: u64,
        bytes: Vec<u8>,
        extension: Option<String>,
    },
    Failed {
        generation: u64,
        error: PlayerError,
    },
}

impl LoaderMsg {
    pub fn generation(&self) -> u64 {
        match self {
            LoaderMsg::Progress { generation, .. }
            | LoaderMsg::Done { generation, .. }
            | LoaderMsg::Failed { generation, .. } => *generation,
        }
    }
}

/// Download percentage, 0..=100.
pub fn percent(loaded: u64, total: Option<u64>) -> u8 {
    let total = match total {
        Some(t) if t > 0 => t,
        _ => loaded + UNKNOWN_TOTAL_GUESS,
    };
    ((loaded as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Fetches clip bytes on worker threads. Every message carries the
/// generation it was started with; the player drops the ones that no longer
/// match its current load.
pub struct ResourceLoader {
    base_dir: PathBuf,
    tx: Sender<LoaderMsg>,
    rx: Receiver<LoaderMsg>,
}

impl ResourceLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = channel();
        Self {
            base_dir: base_dir.into(),
            tx,
            rx,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = base_dir.into();
    }

    pub fn resolve(&self, raw: &str) -> Result<Location> {
        Location::resolve(raw, &self.base_dir)
    }

    pub fn fetch(&self, raw: &str, generation: u64) {
        let location = match self.resolve(raw) {
            Ok(l) => l,
            Err(error) => {
                let _ = self.tx.send(LoaderMsg::Failed { generation, error });
                return;
            }
        };
        log::info!("fetching {location:?} (generation {generation})");

        let tx = self.tx.clone();
        thread::spawn(move || {
            // A dying worker still has to end the load.
            let result = panic::catch_unwind(AssertUnwindSafe(|| read_all(&location, generation, &tx)))
                .unwrap_or_else(|_| {
                    Err(PlayerError::Network(format!("fetch of {location} aborted")))
                });
            let msg = match result {
                Ok(bytes) => LoaderMsg::Done {
                    generation,
                    bytes,
                    extension: location.extension(),
                },
                Err(error) => LoaderMsg::Failed { generation, error },
            };
            let _ = tx.send(msg);
        });
    }

    /// Next pending message, if any. Never blocks.
    pub fn try_recv(&self) -> Option<LoaderMsg> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

fn read_all(location: &Location, generation: u64, tx: &Sender<LoaderMsg>) -> Result<Vec<u8>> {
    let (mut reader, total) = open(location)?;
    let reserve = total.unwrap_or(0).min(PREALLOC_LIMIT);
    let mut bytes = Vec::with_capacity(reserve as usize);
    let mut chunk = vec![0u8; CHUNK];

    loop {
        let n = reader.read(&mut chunk).map_err(|e| match location {
            Location::File(p) => {
                PlayerError::Network(format!("Error reading file: {}: {e}", p.display()))
            }
            Location::Http(_) => PlayerError::Network(e.to_string()),
        })?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        let progress = LoaderMsg::Progress {
            generation,
            loaded: bytes.len() as u64,
            total,
        };
        if tx.send(progress).is_err() {
            break;
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};

    fn wait_for_end(loader: &ResourceLoader) -> Vec<LoaderMsg> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while Instant::now() < deadline {
            match loader.try_recv() {
                Some(msg) => {
                    let end = !matches!(msg, LoaderMsg::Progress { .. });
                    out.push(msg);
                    if end {
                        break;
                    }
                }
                None => thread::sleep(Duration::from_millis(2)),
            }
        }
        out
    }

    #[test]
    fn percent_known_and_unknown_length() {
        assert_eq!(percent(50, Some(200)), 25);
        assert_eq!(percent(200, Some(200)), 100);
        assert_eq!(percent(1_000_000, None), 50);
        assert_eq!(percent(0, None), 0);
    }

    #[test]
    fn resolves_encoded_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let loc = Location::resolve("drums/snare%20hit.wav", dir.path()).unwrap();
        assert_eq!(loc, Location::File(dir.path().join("drums").join("snare hit.wav")));
        assert_eq!(loc.extension().as_deref(), Some("wav"));
    }

    #[test]
    fn resolves_urls() {
        let base = Path::new("/tmp");
        let loc = Location::resolve("https://example.com/a/B.MP3", base).unwrap();
        assert!(loc.is_remote());
        assert_eq!(loc.extension().as_deref(), Some("mp3"));
        assert!(Location::resolve("ftp://example.com/x.wav", base).is_err());
    }

    #[test]
    fn fetch_streams_progress_then_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.bin");
        let payload = vec![7u8; CHUNK * 2 + 10];
        File::create(&path).unwrap().write_all(&payload).unwrap();

        let loader = ResourceLoader::new(dir.path());
        loader.fetch("clip.bin", 3);
        let msgs = wait_for_end(&loader);

        let progress: Vec<u64> = msgs
            .iter()
            .filter_map(|m| match m {
                LoaderMsg::Progress { loaded, .. } => Some(*loaded),
                _ => None,
            })
            .collect();
        assert_eq!(progress.last().copied(), Some(payload.len() as u64));
        assert!(msgs.iter().all(|m| m.generation() == 3));
        match msgs.last() {
            Some(LoaderMsg::Done { bytes, .. }) => assert_eq!(bytes, &payload),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_fails_with_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ResourceLoader::new(dir.path());
        loader.fetch("nope.wav", 1);
        match wait_for_end(&loader).pop() {
            Some(LoaderMsg::Failed { error, .. }) => {
                assert!(error.to_string().starts_with("Error reading file"))
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
