// src/main.rs

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{self, disable_raw_mode, enable_raw_mode},
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use waveboard::board::Soundboard;
use waveboard::session::{SoundKind, SoundRecord};
use waveboard::{
    Catalog, DesktopPlatform, HeadlessPlatform, LoadState, PlaybackParams, Player, SessionConfig,
};

const USAGE: &str = "usage: waveboard <catalog.json | audio-file> [--config params.json] [--session session.json] [--export-peaks N]";
const DEFAULT_SESSION: &str = "waveboard-session.json";

struct Args {
    target: PathBuf,
    config: Option<PathBuf>,
    session: PathBuf,
    export_peaks: Option<usize>,
}

fn parse_args() -> Result<Args, anyhow::Error> {
    let mut it = std::env::args().skip(1);
    let mut target = None;
    let mut config = None;
    let mut session = PathBuf::from(DEFAULT_SESSION);
    let mut export_peaks = None;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(it.next().context(USAGE)?)),
            "--session" => session = PathBuf::from(it.next().context(USAGE)?),
            "--export-peaks" => {
                let n = it.next().context(USAGE)?;
                export_peaks = Some(n.parse().with_context(|| format!("bad peak count: {n}"))?);
            }
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => target = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        target: target.context(USAGE)?,
        config,
        session,
        export_peaks,
    })
}

/// A `.json` target is a catalog; anything else is a single sound.
fn load_catalog(target: &Path) -> Result<(Catalog, PathBuf), anyhow::Error> {
    let base_dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let is_catalog = target
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_catalog {
        return Ok((Catalog::load_from_disk(target)?, base_dir));
    }

    let path = std::fs::canonicalize(target)
        .with_context(|| format!("opening {}", target.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = path.to_string_lossy().into_owned();
    let sound = SoundRecord {
        name,
        kind: match SoundKind::from_extension(&path) {
            // Let the decoder decide for formats the catalog does not list.
            SoundKind::Bad => SoundKind::Wav,
            kind => kind,
        },
        path,
        category: String::new(),
    };
    Ok((Catalog { sounds: vec![sound] }, base_dir))
}

/// Decodes offline and prints the peaks as JSON.
fn export_peaks(
    catalog: &Catalog,
    base_dir: PathBuf,
    params: PlaybackParams,
    length: usize,
) -> Result<(), anyhow::Error> {
    let sound = catalog.playable().next().context("no playable sound")?;
    let mut player = Player::new(params, Rc::new(HeadlessPlatform::default()))?;
    player.set_base_dir(base_dir);
    player.load(&sound.path);

    let deadline = Instant::now() + Duration::from_secs(60);
    while player.load_state() == LoadState::Loading {
        if Instant::now() > deadline {
            bail!("timed out loading {}", sound.path);
        }
        player.tick();
        thread::sleep(Duration::from_millis(10));
    }
    if player.load_state() != LoadState::Ready {
        bail!("could not load {}", sound.path);
    }
    println!("{}", player.export_peaks(Some(length), None));
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = parse_args()?;
    let params = match &args.config {
        Some(path) => PlaybackParams::load_from_disk(path)?,
        None => PlaybackParams::default(),
    };
    let (catalog, base_dir) = load_catalog(&args.target)?;

    if let Some(length) = args.export_peaks {
        return export_peaks(&catalog, base_dir, params, length);
    }

    let session = SessionConfig::load_from_disk(&args.session).unwrap_or_else(|e| {
        log::info!("starting a fresh session: {e:#}");
        SessionConfig {
            autoplay: true,
            ..SessionConfig::default()
        }
    });

    let (columns, _) = terminal::size().unwrap_or((80, 24));
    let mut board = Soundboard::new(
        catalog,
        base_dir,
        params,
        session,
        Rc::new(DesktopPlatform),
        columns,
    )?;

    println!("[SPACE] Play/Pause | [←/→] Skip | [0-9] Seek | [+/-] Volume | [M] Mute | [N/P] Next/Prev | [F] Filter | [Q] Quit");

    enable_raw_mode()?;

    // Target 20 FPS (50ms per frame)
    let target_frame_duration = Duration::from_millis(50);

    let result = (|| -> Result<(), anyhow::Error> {
        board.run_tick()?;
        loop {
            if event::poll(target_frame_duration)? {
                if let Event::Key(ev) = event::read()? {
                    if ev.kind == KeyEventKind::Press {
                        if ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL)
                        {
                            break;
                        }
                        if board.should_quit(ev.code) {
                            break;
                        }
                        board.handle_key(ev.code);
                    }
                }
            }
            board.run_tick()?;
        }
        Ok(())
    })();

    disable_raw_mode()?;

    if let Err(e) = board.session().save_to_disk(&args.session) {
        eprintln!("❌ Failed to save session: {e:#}");
    }
    board.shutdown();
    println!("\n🛑 Exiting soundboard.");
    result
}
