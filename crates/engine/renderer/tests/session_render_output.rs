//! Render a tracked marker through the session controller and inspect the
//! headless output

use glam::Vec3;
use renderer::{HeadlessGraphics, BACKGROUND};
use xr::platform::{NativeWindow, PlatformBackend};
use xr::sim::{SimConfig, SimRuntime};
use xr::types::{MarkerDetection, Pose};
use xr::{ApplicationInfo, MarkerId, MarkerImage, Options, Program, XrProgram};

struct DesktopPlatform;

impl PlatformBackend for DesktopPlatform {
    fn application_info(&self) -> ApplicationInfo {
        ApplicationInfo {
            name: "render-output".to_string(),
            version: 1,
            engine_name: "tests".to_string(),
        }
    }

    fn instance_extensions(&self) -> Vec<String> {
        Vec::new()
    }

    fn native_window(&self) -> Option<NativeWindow> {
        None
    }
}

type RenderProgram = XrProgram<SimRuntime, HeadlessGraphics, DesktopPlatform>;

fn started() -> RenderProgram {
    let mut program = XrProgram::new(
        Options::default(),
        SimRuntime::new(SimConfig::auto()),
        HeadlessGraphics::new(),
        DesktopPlatform,
    )
    .with_marker_images(vec![MarkerImage::checkerboard("board", 4, 0.3)]);

    program.create_instance().unwrap();
    program.initialize_system().unwrap();
    program.initialize_session().unwrap();
    program.create_swapchains().unwrap();
    program.initialize_application().unwrap();
    program.initialize_marker().unwrap();
    assert_eq!(program.add_marker_images().unwrap(), 1);
    program.initialize_plane_tracking().unwrap();
    program.poll_events().unwrap();
    assert!(program.is_session_focused());
    program
}

fn frame(program: &mut RenderProgram) {
    program.poll_actions().unwrap();
    program.render_frame().unwrap();
    program.process_marker_data().unwrap();
    program.process_plane_tracking().unwrap();
}

fn lit_pixels(program: &RenderProgram) -> Vec<usize> {
    let swapchains = program.swapchains().expect("swapchains");
    swapchains
        .swapchains()
        .iter()
        .map(|swapchain| {
            let target = swapchain.render_target.expect("render target");
            let image = program
                .graphics()
                .last_image(target)
                .expect("view was rendered");
            image.pixels().filter(|p| **p != BACKGROUND).count()
        })
        .collect()
}

#[test]
fn test_marker_anchor_appears_in_both_views() {
    let mut program = started();

    frame(&mut program);
    let empty = lit_pixels(&program);
    println!("Lit pixels before detection: {:?}", empty);
    assert!(empty.iter().all(|&count| count == 0));

    program.runtime_mut().queue_marker_frame(vec![MarkerDetection {
        id: MarkerId(1),
        database_index: 0,
        pose: Pose::from_position(Vec3::new(0.0, 1.6, -1.2)),
    }]);
    // Detected after the first frame, drawn on the second
    frame(&mut program);
    assert_eq!(program.scene().marker_count(), 1);
    frame(&mut program);

    let lit = lit_pixels(&program);
    println!("Lit pixels with anchored cube: {:?}", lit);
    assert_eq!(lit.len(), 2);
    assert!(lit.iter().all(|&count| count > 0));
    assert!(program.graphics().pipeline().lines_drawn() >= 24);
}

#[test]
fn test_captures_survive_session_exit() {
    let dir = tempfile::tempdir().unwrap();
    let mut program = started();
    frame(&mut program);
    frame(&mut program);

    program.shutdown();
    assert_eq!(program.graphics().render_target_count(), 0);

    let written = program.graphics().save_captures(dir.path()).unwrap();
    assert_eq!(written.len(), 2);
    for path in &written {
        let image = image::open(path).unwrap();
        assert_eq!((image.width(), image.height()), (320, 240));
    }
}
