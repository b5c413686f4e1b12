//! Marker Viewer
//!
//! Runs the session client with the headless renderer. By default it drives
//! the simulated runtime: two checkerboard markers are registered and the
//! device reports them in front of the viewer, so anchored cubes show up in
//! the captures. Built with the `openxr` feature, `--runtime openxr` connects
//! to the system OpenXR runtime through a headless session instead.
//!
//! Use `--capture <dir>` to save the last frame of each view as PNG and
//! `--frames N` to stop after N loop iterations.

use anyhow::Context;
use app::{run_guarded, startup, AppError, CommonArgs, FrameLoop, LoopExit};
use clap::{Parser, ValueEnum};
use glam::Vec3;
use renderer::{HeadlessGraphics, HEADLESS_PLUGIN};
use system::{AppState, HostEvent, HostEventQueue, HostPlatform, ProcessHost};
use tracing_subscriber::EnvFilter;
use xr::sim::{SimConfig, SimRuntime};
use xr::types::{MarkerDetection, MarkerId, Pose};
use xr::{ApplicationInfo, MarkerImage, Options, XrProgram, XrRuntime};

/// Frames the simulated session renders before it asks to exit
const SIM_SESSION_FRAMES: u64 = 300;

/// Runtime the session is negotiated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RuntimeKind {
    /// Scripted in-process runtime
    Sim,
    /// System OpenXR loader (needs the `openxr` feature)
    Openxr,
}

/// Marker Viewer
///
/// Tracks reference images and anchors a cube on each one.
#[derive(Parser)]
#[command(name = "marker-viewer")]
#[command(about = "Marker tracking demo on an XR runtime")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Runtime to connect to
    #[arg(long, value_enum, default_value = "sim")]
    runtime: RuntimeKind,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let options = args.common.resolve_options()?;
    if !options.graphics_plugin.eq_ignore_ascii_case(HEADLESS_PLUGIN) {
        anyhow::bail!(
            "graphics plugin {} is not available (supported: {})",
            options.graphics_plugin,
            HEADLESS_PLUGIN
        );
    }
    tracing::info!("Using {:?} runtime with {:?}", args.runtime, options);

    let markers = if args.common.no_markers {
        Vec::new()
    } else {
        reference_markers()
    };

    let terminated = match args.runtime {
        RuntimeKind::Sim => {
            let mut runtime = SimRuntime::new(SimConfig {
                exit_after_frames: Some(SIM_SESSION_FRAMES),
                ..SimConfig::auto()
            });
            queue_detections(&mut runtime, markers.len());
            run(&args, options, runtime, markers)?
        }
        RuntimeKind::Openxr => run_openxr(&args, options, markers)?,
    };

    // Everything is written and released; the host asked for the process to end
    if terminated {
        tracing::info!("Host terminated; exiting");
        std::process::exit(0);
    }
    Ok(())
}

#[cfg(feature = "openxr")]
fn run_openxr(args: &Args, options: Options, markers: Vec<MarkerImage>) -> anyhow::Result<bool> {
    let runtime = xr::openxr_runtime::OpenXrRuntime::load()?;
    run(args, options, runtime, markers)
}

#[cfg(not(feature = "openxr"))]
fn run_openxr(_args: &Args, _options: Options, _markers: Vec<MarkerImage>) -> anyhow::Result<bool> {
    anyhow::bail!("marker-viewer was built without the openxr feature")
}

/// Start up, run the frame loop and save captures; returns whether the
/// host was terminated
fn run<R: XrRuntime>(
    args: &Args,
    options: Options,
    runtime: R,
    markers: Vec<MarkerImage>,
) -> anyhow::Result<bool> {
    let platform = HostPlatform::new(ApplicationInfo {
        name: "marker-viewer".to_string(),
        version: 1,
        engine_name: "xr".to_string(),
    });
    let window_slot = platform.window_slot();
    let mut program = XrProgram::new(options, runtime, HeadlessGraphics::new(), platform)
        .with_marker_images(markers);

    if let Err(e) = startup::initialize(&mut program) {
        tracing::error!("Startup failed: {}", e);
        return Err(AppError::Startup(e).into());
    }

    // A desktop process is started and resumed as soon as it runs
    let (sender, events) = HostEventQueue::new();
    sender.send(HostEvent::Start);
    sender.send(HostEvent::Resume);

    let mut frame_loop = FrameLoop::new(program, events, ProcessHost::new())
        .with_app_state(AppState::new().with_window_slot(window_slot))
        .with_config(args.common.loop_config());
    let exit = run_guarded(|| frame_loop.run())?;
    drop(sender);

    let program = frame_loop.program();
    tracing::info!(
        "Frame loop ended ({:?}) after {} iterations, {} frames",
        exit,
        frame_loop.iterations(),
        program.frame_count()
    );
    let terminated = frame_loop.host().is_terminated();
    if exit == LoopExit::Finished && !terminated {
        tracing::warn!("Session finished without terminating the host");
    }

    if let Some(ref dir) = args.common.capture {
        let written = program
            .graphics()
            .save_captures(dir)
            .with_context(|| format!("saving captures to {}", dir.display()))?;
        println!("Saved {} view captures to {}", written.len(), dir.display());
    }

    Ok(terminated)
}

fn reference_markers() -> Vec<MarkerImage> {
    vec![
        MarkerImage::checkerboard("board-small", 4, 0.15),
        MarkerImage::checkerboard("board-large", 6, 0.3),
    ]
}

/// Place every registered marker in front of the viewer, drifting slowly
fn queue_detections(runtime: &mut SimRuntime, markers: usize) {
    if markers == 0 {
        return;
    }
    for step in 0..8 {
        let drift = step as f32 * 0.02;
        let detections = (0..markers)
            .map(|index| {
                let x = (index as f32 - 0.5) * 0.5 + drift;
                MarkerDetection {
                    id: MarkerId(index as u64 + 1),
                    database_index: index,
                    pose: Pose::from_position(Vec3::new(x, 1.4, -1.5)),
                }
            })
            .collect();
        runtime.queue_marker_frame(detections);
    }
}
