//! cuesight CLI: keystone calibration, ball and target detection, marker tools.

use clap::{Args, Parser, Subcommand, ValueEnum};
use cuesight::aruco::{builtin_dictionary, render_marker, BUILTIN_NAMES};
use cuesight::config::{Parameters, RigConfig};
use cuesight::core::TableCorners;
use cuesight::keystone::KeystoneCalibrator;
use cuesight::pipeline::{detect_balls, detect_targets, draw_target_zones, BallDetection};
use cuesight::scoring::{GameKind, Positions};
use cuesight::store::TransformStore;
use cuesight::table::{ClassifiedCircle, TableClassification};
use cuesight::tags::{resolve_family, TagDetector};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "cuesight")]
#[command(about = "Keystone calibration and ball/target detection for a projector pool table")]
#[command(version)]
struct Cli {
    /// Rig parameter file (JSON). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when built without the `tracing` feature.
    #[arg(long, global = true, default_value = "info")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grab one frame through the configured camera.
    Capture {
        /// Output image; defaults to the configured camera frame path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Compute the projector-to-table transform and store it.
    Keystone(KeystoneArgs),

    /// Find the balls on the table.
    Detect(DetectArgs),

    /// Keystone a game image and find its targets.
    Targets(TargetsArgs),

    /// Judge a round from ball and target positions.
    Score(ScoreArgs),

    /// Detect corner markers of one family (debugging aid).
    Markers(MarkersArgs),

    /// Render one dictionary marker to PNG.
    PrintMarker(PrintMarkerArgs),

    /// Write a built-in family as a JSON code table.
    ExportDictionary {
        #[arg(long)]
        family: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct KeystoneArgs {
    /// Camera frame showing both marker sets; captured when omitted.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Projector template with the projector markers.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Where to store the transform.
    #[arg(long)]
    matrix: Option<PathBuf>,

    /// Where to write the keystoned template.
    #[arg(long)]
    verification: Option<PathBuf>,

    /// Show the verification image on the projector.
    #[arg(long)]
    show: bool,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Camera frame; captured when omitted.
    #[arg(long)]
    image: Option<PathBuf>,

    /// JSON report; printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct TargetsArgs {
    /// Game image as authored for the projector canvas.
    #[arg(long)]
    image: PathBuf,

    /// Stored transform; defaults to the configured path.
    #[arg(long)]
    matrix: Option<PathBuf>,

    /// JSON report; printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Ring this game's scoring zones and write the projector image here.
    #[arg(long, requires = "game")]
    projected: Option<PathBuf>,

    #[arg(long, value_enum)]
    game: Option<GameArg>,
}

#[derive(Debug, Clone, Args)]
struct ScoreArgs {
    #[arg(long, value_enum)]
    game: GameArg,

    /// Ball positions (JSON map of label to [x, y]).
    #[arg(long)]
    balls: PathBuf,

    /// Target positions (JSON map of label to [x, y]).
    #[arg(long)]
    targets: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct MarkersArgs {
    #[arg(long)]
    image: PathBuf,

    /// Marker family or code table; defaults to the table family.
    #[arg(long)]
    family: Option<String>,

    /// Write the annotated frame here.
    #[arg(long)]
    annotated: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct PrintMarkerArgs {
    #[arg(long)]
    family: String,

    #[arg(long)]
    id: u32,

    /// Side of one marker cell in pixels.
    #[arg(long, default_value = "40")]
    cell_px: u32,

    /// White margin in cells.
    #[arg(long, default_value = "1")]
    quiet_cells: u32,

    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GameArg {
    Line,
    Obstacle,
    Contact,
}

impl From<GameArg> for GameKind {
    fn from(g: GameArg) -> Self {
        match g {
            GameArg::Line => GameKind::Line,
            GameArg::Obstacle => GameKind::Obstacle,
            GameArg::Contact => GameKind::Contact,
        }
    }
}

#[derive(Serialize)]
struct DetectReport {
    table: TableClassification,
    corners: TableCorners,
    objects: Positions,
    circles: Vec<ClassifiedCircle>,
}

#[derive(Serialize)]
struct TargetsReport {
    objects: Positions,
    circles: Vec<ClassifiedCircle>,
}

#[cfg(feature = "tracing")]
fn init_logging(level: log::LevelFilter) {
    let _ = tracing_log::LogTracer::init();
    cuesight::core::init_tracing(level, false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: log::LevelFilter) {
    let _ = cuesight::core::init_with_level(level);
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let rig = load_rig(cli.config.as_deref())?;

    match cli.command {
        Commands::Capture { out } => run_capture(&rig, out),
        Commands::Keystone(args) => run_keystone(&rig, &args),
        Commands::Detect(args) => run_detect(&rig, &args),
        Commands::Targets(args) => run_targets(&rig, &args),
        Commands::Score(args) => run_score(&rig, &args),
        Commands::Markers(args) => run_markers(&rig, &args),
        Commands::PrintMarker(args) => run_print_marker(&args),
        Commands::ExportDictionary { family, out } => run_export_dictionary(&family, &out),
    }
}

fn load_rig(path: Option<&Path>) -> CliResult<RigConfig> {
    match path {
        Some(p) => Ok(RigConfig::load(p)?),
        None => {
            log::info!("no --config given, using built-in parameters");
            Ok(Parameters::default().build_rig()?)
        }
    }
}

fn open_rgb(path: &Path) -> CliResult<RgbImage> {
    let img = image::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(img.to_rgb8())
}

fn save_rgb(img: &RgbImage, path: &Path) -> CliResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    img.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_report<T: Serialize>(report: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// The frame at `given`, or a fresh capture written to `fallback`.
fn frame(rig: &RigConfig, given: Option<&Path>, fallback: &Path) -> CliResult<RgbImage> {
    if let Some(path) = given {
        return open_rgb(path);
    }
    capture_to(rig, fallback)?;
    open_rgb(fallback)
}

fn capture_to(rig: &RigConfig, out: &Path) -> CliResult<()> {
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let camera = rig.devices.build_camera();
    camera.capture(out, rig.camera.rotation, rig.camera.wait)?;
    Ok(())
}

// ── capture ────────────────────────────────────────────────────────────

fn run_capture(rig: &RigConfig, out: Option<PathBuf>) -> CliResult<()> {
    let out = out.unwrap_or_else(|| rig.paths.camera_frame.clone());
    capture_to(rig, &out)?;
    println!("Wrote {}", out.display());
    Ok(())
}

// ── keystone ───────────────────────────────────────────────────────────

fn run_keystone(rig: &RigConfig, args: &KeystoneArgs) -> CliResult<()> {
    let template_path = args
        .template
        .clone()
        .unwrap_or_else(|| rig.paths.keystone_template.clone());
    let template = open_rgb(&template_path)?;
    let display = rig.devices.build_display();
    if args.image.is_none() {
        // The projector must be showing its markers while the camera fires.
        if let Err(e) = display.show(&template_path, true, 0) {
            log::warn!("could not project the template: {e}");
        }
    }
    let camera = frame(rig, args.image.as_deref(), &rig.paths.keystone_frame)?;

    let store = TransformStore::new(
        args.matrix
            .clone()
            .unwrap_or_else(|| rig.paths.transform.clone()),
    );
    let verification = args
        .verification
        .clone()
        .unwrap_or_else(|| rig.paths.keystone_verification.clone());

    let calibrator = KeystoneCalibrator::from_rig(rig);
    let tagged = rig.paths.keystone_tagged.as_path();
    let result =
        calibrator.calibrate_and_persist(&camera, &template, &store, &verification, Some(tagged));
    if tagged.exists() {
        println!("Wrote {}", tagged.display());
    }
    result?;
    println!("Stored transform in {}", store.path().display());

    if args.show {
        display.show(&verification, true, 0)?;
    }
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(rig: &RigConfig, args: &DetectArgs) -> CliResult<()> {
    let camera = frame(rig, args.image.as_deref(), &rig.paths.camera_frame)?;
    let report = match detect_balls(&camera, rig)? {
        BallDetection::Detected(report) => report,
        BallDetection::TagsNotFound { markers_found } => {
            return Err(format!("tags not found: {markers_found} of 4 table markers").into())
        }
    };

    save_rgb(&report.warped, &rig.paths.warped)?;
    save_rgb(&report.no_background, &rig.paths.no_background)?;
    save_rgb(&report.annotated, &rig.paths.circles)?;

    let out = DetectReport {
        table: report.table,
        corners: report.corners,
        objects: report.objects,
        circles: report.circles,
    };
    write_report(&out, args.out.as_deref())
}

// ── targets ────────────────────────────────────────────────────────────

fn run_targets(rig: &RigConfig, args: &TargetsArgs) -> CliResult<()> {
    let game_image = open_rgb(&args.image)?;
    let store = TransformStore::new(
        args.matrix
            .clone()
            .unwrap_or_else(|| rig.paths.transform.clone()),
    );
    let transform = store.load()?;
    let layout = detect_targets(&game_image, &transform, rig)?;

    if let (Some(path), Some(game)) = (&args.projected, args.game) {
        let mut projected = layout.warped.clone();
        draw_target_zones(&mut projected, &layout.objects, game.into(), rig);
        save_rgb(&projected, path)?;
    }

    let out = TargetsReport {
        objects: layout.objects,
        circles: layout.circles,
    };
    write_report(&out, args.out.as_deref())
}

// ── score ──────────────────────────────────────────────────────────────

fn run_score(rig: &RigConfig, args: &ScoreArgs) -> CliResult<()> {
    let balls: Positions = serde_json::from_str(&std::fs::read_to_string(&args.balls)?)?;
    let targets: Positions = serde_json::from_str(&std::fs::read_to_string(&args.targets)?)?;
    let game = GameKind::from(args.game);

    let misplaced = game.misplaced(&balls, &targets, rig.placement_radius);
    if let Ok(labels) = &misplaced {
        if !labels.is_empty() {
            log::info!("not on their placement marks: {labels:?}");
        }
    }
    let outcome = game.evaluate(&balls, &targets, rig.zone_radius, rig.placement_radius)?;
    write_report(&outcome, None)
}

// ── markers ────────────────────────────────────────────────────────────

fn run_markers(rig: &RigConfig, args: &MarkersArgs) -> CliResult<()> {
    let image = open_rgb(&args.image)?;
    let detector = match &args.family {
        Some(family) => TagDetector::from_family(family, rig.markers.clone())?,
        None => TagDetector::new(rig.table_dictionary.clone(), rig.markers.clone()),
    };
    let det = detector.detect(&image, args.annotated.is_some());

    println!("{}: {} markers", detector.family(), det.markers.len());
    for (m, c) in det.markers.iter().zip(det.centers()) {
        println!(
            "  id {:>4}  center ({:>5}, {:>5})  rot {}  hamming {}",
            m.id, c.x, c.y, m.rotation, m.hamming
        );
    }
    match det.corners {
        Some(c) => println!(
            "  roles: TL {} TR {} BL {} BR {}",
            c.top_left, c.top_right, c.bottom_left, c.bottom_right
        ),
        None => println!("  roles: insufficient markers"),
    }

    if let (Some(path), Some(img)) = (&args.annotated, &det.annotated) {
        save_rgb(img, path)?;
    }
    Ok(())
}

// ── print-marker ───────────────────────────────────────────────────────

fn unknown_family(name: &str) -> CliError {
    format!("unknown family {name:?}; built-in: {}", BUILTIN_NAMES.join(", ")).into()
}

fn run_print_marker(args: &PrintMarkerArgs) -> CliResult<()> {
    let dict = resolve_family(&args.family)?;
    let img = render_marker(&dict, args.id, args.cell_px, args.quiet_cells).ok_or_else(|| {
        format!(
            "{} has ids 0..{} and needs a non-zero cell size",
            dict.name,
            dict.len()
        )
    })?;
    img.save(&args.out)?;
    println!("Wrote {}", args.out.display());
    Ok(())
}

// ── export-dictionary ──────────────────────────────────────────────────

fn run_export_dictionary(family: &str, out: &Path) -> CliResult<()> {
    let dict = builtin_dictionary(family).ok_or_else(|| unknown_family(family))?;
    dict.write_json(out)?;
    println!("Wrote {} ({} codes)", out.display(), dict.len());
    Ok(())
}
