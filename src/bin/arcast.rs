use std::path::{Path, PathBuf};

use anyhow::Context as _;
use arcast::camera::CameraInput;
use arcast::encode::{InMemorySink, write_png};
use arcast::marker::{DefaultMarkerLoader, MarkerLoader, MarkerTracker, PatternTracker};
use arcast::render::{DeviceCaps, RenderDevice, SoftwareDevice};
use arcast::scan::{CodeDecoder, RqrrDecoder, parse_scan_payload};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arcast", version)]
struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report which platform capabilities are available.
    Probe,
    /// Run a campaign session and record its output.
    Run(RunArgs),
    /// Detect a marker in a still image and print the result as JSON.
    Detect(DetectArgs),
    /// Decode a campaign QR code from a still image.
    Scan(ScanArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Session config JSON.
    #[arg(long = "config")]
    config_path: PathBuf,

    /// Number of frames to render.
    #[arg(long, default_value_t = 150)]
    frames: u64,

    /// Replay a recorded video instead of opening a capture device.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Capture device (defaults to the platform's first camera).
    #[arg(long, conflicts_with = "replay")]
    device: Option<String>,

    /// Output MP4 path (requires `ffmpeg` on PATH).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the last composited frame as a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Render as fast as possible instead of at the configured frame rate.
    #[arg(long)]
    unpaced: bool,
}

#[derive(Parser, Debug)]
struct DetectArgs {
    /// Marker image path or URL.
    #[arg(long)]
    marker: String,

    /// Camera still to search.
    #[arg(long = "in", required_unless_present = "print")]
    in_path: Option<PathBuf>,

    /// Write the printable marker (with its border) to this path and exit.
    #[arg(long)]
    print: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ScanArgs {
    /// Image containing the campaign QR code.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Probe => cmd_probe(),
        Command::Run(args) => cmd_run(args),
        Command::Detect(args) => cmd_detect(args),
        Command::Scan(args) => cmd_scan(args),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "arcast=debug" } else { "arcast=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_probe() -> anyhow::Result<()> {
    let caps: Option<DeviceCaps> = SoftwareDevice::new().probe().ok();
    let report = serde_json::json!({
        "ffmpeg": arcast::is_ffmpeg_on_path(),
        "ffmpegBin": arcast::ffmpeg_bin(),
        "mediaFfmpegFeature": cfg!(feature = "media-ffmpeg"),
        "renderDevice": caps.map(|c| c.name),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = arcast::SessionConfig::from_path(&args.config_path)
        .with_context(|| format!("load session config '{}'", args.config_path.display()))?;

    let camera = match (&args.replay, &args.device) {
        (Some(path), _) => arcast::FfmpegCamera::new(CameraInput::File(path.clone())),
        (None, Some(device)) => arcast::FfmpegCamera::new(CameraInput::Device(device.clone())),
        (None, None) => arcast::FfmpegCamera::default_device(),
    };
    let fps = config.fps;
    let mut session = arcast::ArSession::new(config, arcast::Platform::native(camera));

    match &args.out {
        Some(out) => {
            let opts = arcast::FfmpegSinkOpts::new(out);
            session.set_sink(Box::new(arcast::FfmpegSink::new(opts)))?;
        }
        None => session.set_sink(Box::new(InMemorySink::new()))?,
    }

    session.start().map_err(|e| {
        anyhow::anyhow!("{} ({}): {e}", e.code().user_message(), e.code())
    })?;

    let mut render_loop = arcast::RenderLoop::new(fps)
        .with_cancel(session.cancel_token())
        .with_max_ticks(args.frames);
    if args.unpaced {
        render_loop = render_loop.unpaced();
    }
    let summary = session.run(&render_loop)?;

    if let Some(path) = &args.snapshot {
        let frame = session
            .last_frame()
            .context("session produced no frame to snapshot")?;
        write_png(frame, path)?;
        eprintln!("wrote {}", path.display());
    }

    let stats = session.stats();
    session.teardown();
    if let Some(out) = &args.out {
        eprintln!("wrote {}", out.display());
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "ticks": summary.ticks,
            "cancelled": summary.cancelled,
            "stats": stats,
        }))?
    );
    Ok(())
}

fn cmd_detect(args: DetectArgs) -> anyhow::Result<()> {
    let desc = DefaultMarkerLoader::default().load(&args.marker)?;
    if let Some(path) = &args.print {
        save_image(&desc.printable(512), path)?;
        eprintln!("wrote {}", path.display());
        return Ok(());
    }

    let Some(in_path) = &args.in_path else {
        anyhow::bail!("--in is required unless --print is given");
    };
    let frame = read_still(in_path)?;
    let viewport = arcast::Viewport::new(frame.width, frame.height)?;
    let mut tracker = PatternTracker::new(desc, Default::default());
    tracker.set_viewport(viewport);
    let detection = tracker.detect(&frame);
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

fn cmd_scan(args: ScanArgs) -> anyhow::Result<()> {
    let frame = read_still(&args.in_path)?;
    let codes = RqrrDecoder.decode(&frame.to_gray());
    let payload = codes
        .iter()
        .find_map(|text| parse_scan_payload(text))
        .with_context(|| format!("no campaign code found in '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn read_still(path: &Path) -> anyhow::Result<arcast::CameraFrame> {
    let img = image::open(path)
        .with_context(|| format!("open image '{}'", path.display()))?
        .to_rgba8();
    Ok(arcast::CameraFrame::from_image(&img))
}

fn save_image(img: &image::RgbaImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("write image '{}'", path.display()))?;
    Ok(())
}
