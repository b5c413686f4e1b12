//! CPU wireframe cube pipeline
//!
//! Projects the twelve edges of each cube instance through the view and
//! projection matrices and rasterizes them into an RGBA image. Edges are
//! clipped against the near plane in clip space and against the viewport
//! in screen space, so off-screen geometry costs nothing.

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};
use xr::graphics::{CubeInstance, ViewSubmission};

/// Clear color of every rendered view
pub const BACKGROUND: Rgba<u8> = Rgba([12, 14, 20, 255]);

/// Edge colors, cycled per cube
const PALETTE: [Rgba<u8>; 4] = [
    Rgba([90, 200, 250, 255]),
    Rgba([250, 180, 60, 255]),
    Rgba([120, 230, 120, 255]),
    Rgba([240, 90, 140, 255]),
];

/// Clip-space `w` below which a point counts as behind the eye
const NEAR_W: f32 = 1e-4;

const CORNERS: [Vec3; 8] = [
    Vec3::new(-0.5, -0.5, -0.5),
    Vec3::new(0.5, -0.5, -0.5),
    Vec3::new(0.5, 0.5, -0.5),
    Vec3::new(-0.5, 0.5, -0.5),
    Vec3::new(-0.5, -0.5, 0.5),
    Vec3::new(0.5, -0.5, 0.5),
    Vec3::new(0.5, 0.5, 0.5),
    Vec3::new(-0.5, 0.5, 0.5),
];

const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Draw state for the cube wireframe, owned by one graphics backend
#[derive(Debug, Clone, Default)]
pub struct CubePipeline {
    lines_drawn: u64,
}

impl CubePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges that reached the viewport since creation
    pub fn lines_drawn(&self) -> u64 {
        self.lines_drawn
    }

    /// Clear the image and draw every cube of the submission
    pub fn draw(&mut self, image: &mut RgbaImage, submission: &ViewSubmission<'_>) {
        for pixel in image.pixels_mut() {
            *pixel = BACKGROUND;
        }

        let view_projection = submission.projection * submission.view;
        for (index, cube) in submission.cubes.iter().enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            self.draw_cube(image, &view_projection, cube, color);
        }
    }

    fn draw_cube(
        &mut self,
        image: &mut RgbaImage,
        view_projection: &Mat4,
        cube: &CubeInstance,
        color: Rgba<u8>,
    ) {
        let mvp = *view_projection * cube.scaled_model();
        let clip: Vec<Vec4> = CORNERS.iter().map(|c| mvp * c.extend(1.0)).collect();

        for (a, b) in EDGES {
            let Some((a, b)) = clip_near(clip[a], clip[b]) else {
                continue;
            };
            let size = Vec2::new(image.width() as f32, image.height() as f32);
            let (a, b) = (to_screen(a, size), to_screen(b, size));
            if let Some((a, b)) = clip_viewport(a, b, size) {
                draw_line(image, a, b, color);
                self.lines_drawn += 1;
            }
        }
    }
}

/// Clip a clip-space segment against the near plane
fn clip_near(a: Vec4, b: Vec4) -> Option<(Vec4, Vec4)> {
    match (a.w >= NEAR_W, b.w >= NEAR_W) {
        (true, true) => Some((a, b)),
        (false, false) => None,
        (a_in, _) => {
            let t = (NEAR_W - a.w) / (b.w - a.w);
            let cut = a.lerp(b, t);
            if a_in {
                Some((a, cut))
            } else {
                Some((cut, b))
            }
        }
    }
}

/// Clip-space point to pixel coordinates, origin top-left
fn to_screen(p: Vec4, size: Vec2) -> Vec2 {
    let ndc = Vec2::new(p.x / p.w, p.y / p.w);
    Vec2::new(
        (ndc.x * 0.5 + 0.5) * size.x,
        (1.0 - (ndc.y * 0.5 + 0.5)) * size.y,
    )
}

/// Liang-Barsky clip of a screen-space segment to the viewport
fn clip_viewport(a: Vec2, b: Vec2, size: Vec2) -> Option<(Vec2, Vec2)> {
    let d = b - a;
    let max = size - Vec2::ONE;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (p, q) in [
        (-d.x, a.x),
        (d.x, max.x - a.x),
        (-d.y, a.y),
        (d.y, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((a + d * t0, a + d * t1))
}

fn draw_line(image: &mut RgbaImage, a: Vec2, b: Vec2, color: Rgba<u8>) {
    let steps = (b - a).abs().max_element().ceil().max(1.0) as u32;
    for i in 0..=steps {
        let p = a.lerp(b, i as f32 / steps as f32).round();
        let (x, y) = (p.x as u32, p.y as u32);
        if x < image.width() && y < image.height() {
            image.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr::types::Fov;

    fn lit_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| **p != BACKGROUND).count()
    }

    fn submission(cubes: &[CubeInstance]) -> ViewSubmission<'_> {
        ViewSubmission {
            projection: Fov::symmetric(1.5, 1.5).projection(0.05, 100.0),
            view: Mat4::IDENTITY,
            cubes,
        }
    }

    #[test]
    fn test_cube_in_front_is_drawn() {
        let mut image = RgbaImage::new(64, 64);
        let mut pipeline = CubePipeline::new();
        let cubes = [CubeInstance::at_position(Vec3::new(0.0, 0.0, -3.0), 1.0)];
        pipeline.draw(&mut image, &submission(&cubes));

        assert!(lit_pixels(&image) > 50);
        assert_eq!(pipeline.lines_drawn(), 12);
        // The cube straddles the optical axis, so the center stays empty
        assert_eq!(*image.get_pixel(32, 32), BACKGROUND);
    }

    #[test]
    fn test_cube_behind_eye_is_culled() {
        let mut image = RgbaImage::new(32, 32);
        let mut pipeline = CubePipeline::new();
        let cubes = [CubeInstance::at_position(Vec3::new(0.0, 0.0, 3.0), 1.0)];
        pipeline.draw(&mut image, &submission(&cubes));

        assert_eq!(lit_pixels(&image), 0);
        assert_eq!(pipeline.lines_drawn(), 0);
    }

    #[test]
    fn test_draw_clears_previous_contents() {
        let mut image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        CubePipeline::new().draw(&mut image, &submission(&[]));
        assert_eq!(lit_pixels(&image), 0);
    }

    #[test]
    fn test_viewport_clip_rejects_outside_segment() {
        let size = Vec2::new(10.0, 10.0);
        assert!(clip_viewport(Vec2::new(-5.0, -5.0), Vec2::new(-1.0, -2.0), size).is_none());
        let (a, b) = clip_viewport(Vec2::new(-5.0, 5.0), Vec2::new(15.0, 5.0), size).unwrap();
        assert_eq!(a, Vec2::new(0.0, 5.0));
        assert_eq!(b, Vec2::new(9.0, 5.0));
    }
}
