use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;

use tongueswitch_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use tongueswitch_core::detector::config::DetectorConfig;
use tongueswitch_core::detector::gesture_switch::{self, GestureSignal};
use tongueswitch_core::detector::snapshot::PreviewImage;
use tongueswitch_core::presence::domain::hold_timer::HoldTimer;
use tongueswitch_core::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL};
use tongueswitch_core::shared::model_resolver::{self, ModelSource};

const TICK: Duration = Duration::from_micros(16_667);
const DEBUG_FRAME_INTERVAL: Duration = Duration::from_secs(1);
const PREVIEW_KEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Headless tongue-gesture switch: polls the detector at 60 Hz and logs
/// what a game loop would see.
#[derive(Parser)]
#[command(name = "tongueswitch")]
struct Cli {
    /// JSON detector config. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a directory of images instead of opening the camera.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the replay after the last image.
    #[arg(long, requires = "replay")]
    loop_replay: bool,

    /// Replay speed in frames per second.
    #[arg(long, default_value = "30", requires = "replay")]
    replay_fps: f64,

    /// Number of player slots.
    #[arg(long)]
    players: Option<usize>,

    /// Minimum gesture fraction of the mouth interior (0.0-1.0).
    #[arg(long)]
    frac_threshold: Option<f64>,

    /// Minimum lip gap in pixels.
    #[arg(long)]
    min_open_px: Option<u32>,

    /// Minimum seconds between two reported rising edges.
    #[arg(long)]
    debounce: Option<f64>,

    /// Direction dead zone as a fraction of the mouth box.
    #[arg(long)]
    dead_zone: Option<f64>,

    /// Keep the camera image unmirrored.
    #[arg(long)]
    no_mirror: bool,

    /// Do not draw boxes and readouts on the preview.
    #[arg(long)]
    no_metrics: bool,

    /// Preview size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    preview_size: Option<(u32, u32)>,

    /// TTF/OTF font for the overlay readout.
    #[arg(long)]
    overlay_font: Option<PathBuf>,

    /// Face-mesh ONNX model file.
    #[arg(long)]
    mesh_model: Option<PathBuf>,

    /// Stop after this many seconds (default: run until interrupted).
    #[arg(long)]
    duration: Option<f64>,

    /// Seconds every player must hold the gesture to trigger a restart.
    #[arg(long, default_value = "5")]
    hold_seconds: f64,

    /// Write the last preview to this PNG on exit.
    #[arg(long)]
    preview_out: Option<PathBuf>,

    /// Write the full annotated frame here once per second.
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    config.validate()?;

    if let Some(dir) = &cli.debug_dir {
        std::fs::create_dir_all(dir)?;
    }
    prefetch_face_model(&config);

    let switch = match &cli.replay {
        Some(dir) => {
            let source = ImageSequenceSource::new(dir, cli.loop_replay)
                .with_frame_interval(Duration::from_secs_f64(1.0 / cli.replay_fps));
            gesture_switch::create_with_source(config, Box::new(source))
        }
        None => gesture_switch::create(config),
    };
    if !switch.is_enabled() {
        log::warn!("Gesture detector unavailable, no gestures will be reported");
    }

    switch.start();
    let last_preview = poll_loop(&*switch, &cli)?;
    switch.stop();

    if let Some(path) = &cli.preview_out {
        save_preview(last_preview, path)?;
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<DetectorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::load(path)?,
        None => match DetectorConfig::default_path().filter(|p| p.exists()) {
            Some(path) => {
                log::info!("Using config {}", path.display());
                DetectorConfig::load(&path)?
            }
            None => DetectorConfig::default(),
        },
    };

    if let Some(players) = cli.players {
        config.max_players = players;
    }
    if let Some(frac) = cli.frac_threshold {
        config.frac_threshold = frac;
    }
    if let Some(px) = cli.min_open_px {
        config.min_open_px = px;
    }
    if let Some(debounce) = cli.debounce {
        config.debounce_s = debounce;
    }
    if let Some(dead) = cli.dead_zone {
        config.dir_dead_frac = dead;
    }
    if cli.no_mirror {
        config.mirror = false;
    }
    if cli.no_metrics {
        config.show_metrics = false;
    }
    if let Some(size) = cli.preview_size {
        config.preview_size = size;
    }
    if cli.overlay_font.is_some() {
        config.overlay_font = cli.overlay_font.clone();
    }
    if cli.mesh_model.is_some() {
        config.mesh_model = cli.mesh_model.clone();
    }
    if cli.debug_dir.is_some() {
        config.show_debug_window = true;
    }
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = &cli.replay {
        if !dir.is_dir() {
            return Err(format!("Replay directory not found: {}", dir.display()).into());
        }
    }
    if !(cli.replay_fps.is_finite() && cli.replay_fps > 0.0) {
        return Err(format!("Replay fps must be positive, got {}", cli.replay_fps).into());
    }
    if let Some(secs) = cli.duration {
        if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
            return Err(format!("Duration must be positive, got {secs}").into());
        }
    }
    if Duration::try_from_secs_f64(cli.hold_seconds).is_err() {
        return Err(format!("Hold seconds must be non-negative, got {}", cli.hold_seconds).into());
    }
    if let Some(path) = &cli.mesh_model {
        if !path.is_file() {
            return Err(format!("Mesh model not found: {}", path.display()).into());
        }
    }
    Ok(())
}

/// Polls the switch once per tick until `--duration` runs out. Returns the
/// most recent preview seen, if any.
fn poll_loop(
    switch: &dyn GestureSignal,
    cli: &Cli,
) -> Result<Option<PreviewImage>, Box<dyn std::error::Error>> {
    let players = switch.max_players();
    let started = Instant::now();
    let deadline = cli.duration.map(|s| started + Duration::from_secs_f64(s));

    let mut states = vec![false; players];
    let mut hold = HoldTimer::new(Duration::from_secs_f64(cli.hold_seconds));
    let mut last_preview = None;
    let mut last_preview_at: Option<Instant> = None;
    let mut last_debug_at: Option<Instant> = None;
    let mut debug_written = 0usize;

    log::info!("Polling {players} slot(s) at 60 Hz");
    while deadline.map_or(true, |d| Instant::now() < d) {
        let tick_start = Instant::now();

        for (slot, previous) in states.iter_mut().enumerate() {
            if switch.consume_rising_edge(slot) {
                let dir = switch.get_direction(slot).map_or("NONE", |d| d.label());
                log::info!("P{} gesture started ({dir})", slot + 1);
            }
            let state = switch.get_state(slot);
            if state != *previous {
                log::info!("P{} {}", slot + 1, if state { "on" } else { "off" });
                *previous = state;
            }
        }

        let all_on = players > 0 && states.iter().all(|&s| s);
        if hold.update(all_on, TICK) {
            log::info!(
                "All players held the gesture for {:.1}s",
                hold.target().as_secs_f64()
            );
            hold.reset();
        }

        if cli.preview_out.is_some() && due(last_preview_at, PREVIEW_KEEP_INTERVAL) {
            if let Some(preview) = switch.get_preview() {
                last_preview = Some(preview);
            }
            last_preview_at = Some(tick_start);
        }

        if let Some(dir) = &cli.debug_dir {
            if due(last_debug_at, DEBUG_FRAME_INTERVAL) {
                if let Some(frame) = switch.get_debug_frame() {
                    let path = dir.join(format!("debug_{debug_written:05}.png"));
                    frame.save(&path)?;
                    debug_written += 1;
                }
                last_debug_at = Some(tick_start);
            }
        }

        std::thread::sleep(TICK.saturating_sub(tick_start.elapsed()));
    }
    Ok(last_preview)
}

fn due(last: Option<Instant>, interval: Duration) -> bool {
    last.map_or(true, |t| t.elapsed() >= interval)
}

fn save_preview(
    preview: Option<PreviewImage>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(image) = preview.and_then(|p| p.to_rgb_image()) else {
        log::warn!("No preview was published, {} not written", path.display());
        return Ok(());
    };
    image.save(path)?;
    log::info!("Preview written to {}", path.display());
    Ok(())
}

/// Downloads the face model up front so the progress is visible.
fn prefetch_face_model(config: &DetectorConfig) {
    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let result = model_resolver::resolve(
        ModelSource {
            name: FACE_MODEL_NAME,
            url: Some(FACE_MODEL_URL),
        },
        config.model_dir.as_deref(),
        Some(Box::new(download_progress)),
    );
    if let Err(e) = result {
        log::warn!("Face model unavailable: {e}");
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("preview size must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("900x260", (900, 260))]
    #[case("640X180", (640, 180))]
    #[case(" 320 x 90 ", (320, 90))]
    fn test_parse_size_accepts(#[case] input: &str, #[case] expected: (u32, u32)) {
        assert_eq!(parse_size(input), Ok(expected));
    }

    #[rstest]
    #[case("900")]
    #[case("0x260")]
    #[case("axb")]
    fn test_parse_size_rejects(#[case] input: &str) {
        assert!(parse_size(input).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "tongueswitch",
            "--players",
            "1",
            "--frac-threshold",
            "0.1",
            "--no-mirror",
            "--preview-size",
            "320x90",
            "--debug-dir",
            "/tmp/tongueswitch-debug",
        ]);
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("detector.json");
        std::fs::write(&path, r#"{ "max_players": 2, "min_open_px": 12 }"#).unwrap();
        let cli = Cli {
            config: Some(path),
            ..cli
        };

        let config = build_config(&cli).unwrap();

        assert_eq!(config.max_players, 1);
        assert_eq!(config.min_open_px, 12);
        assert!(!config.mirror);
        assert!(config.show_debug_window);
        assert_eq!(config.preview_size, (320, 90));
    }

    #[test]
    fn test_validate_rejects_bad_hold() {
        let cli = Cli::parse_from(["tongueswitch", "--hold-seconds=-1"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_replay_dir() {
        let cli = Cli::parse_from(["tongueswitch", "--replay", "/nonexistent/frames"]);
        assert!(validate(&cli).is_err());
    }
}
