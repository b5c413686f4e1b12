//! Application-side content placed on tracked markers and planes

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use crate::graphics::CubeInstance;
use crate::marker::{MarkerDatabase, MarkerObservation};
use crate::plane::PlaneObservation;
use crate::tracking::Lifecycle;
use crate::types::{ActionSnapshot, MarkerId, PlaneId};

const HAND_CUBE_SCALE: f32 = 0.1;
const PLANE_CUBE_HEIGHT: f32 = 0.01;
const DEFAULT_MARKER_SCALE: f32 = 0.1;

/// Cubes anchored to what the runtime tracks
#[derive(Debug, Clone, Default)]
pub struct AnchorScene {
    markers: BTreeMap<MarkerId, CubeInstance>,
    planes: BTreeMap<PlaneId, CubeInstance>,
    hands: [Option<CubeInstance>; 2],
}

impl AnchorScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add, move or drop marker anchors according to their lifecycle
    pub fn apply_markers(&mut self, observations: &[MarkerObservation], database: &MarkerDatabase) {
        for observation in observations {
            match observation.lifecycle {
                Lifecycle::Added | Lifecycle::Updated => {
                    let scale = database
                        .get(observation.data.database_index)
                        .map(|entry| entry.physical_size.x)
                        .unwrap_or(DEFAULT_MARKER_SCALE);
                    let cube = CubeInstance::at_pose(&observation.data.pose, scale);
                    if self.markers.insert(observation.id, cube).is_none() {
                        tracing::info!(
                            "Marker {} {:?} at {:?}",
                            observation.id,
                            observation.lifecycle,
                            observation.data.pose.position
                        );
                    }
                }
                Lifecycle::Removed => {
                    self.markers.remove(&observation.id);
                    tracing::info!("Marker {} removed", observation.id);
                }
            }
        }
    }

    /// Add, move or drop plane anchors; planes render as flat slabs
    pub fn apply_planes(&mut self, observations: &[PlaneObservation]) {
        for observation in observations {
            match observation.lifecycle {
                Lifecycle::Added | Lifecycle::Updated => {
                    let extent = observation.data.extent;
                    let model = observation.data.pose.to_mat4()
                        * Mat4::from_scale(Vec3::new(extent.x, PLANE_CUBE_HEIGHT, extent.y));
                    self.planes.insert(observation.id, CubeInstance::new(model, 1.0));
                }
                Lifecycle::Removed => {
                    self.planes.remove(&observation.id);
                }
            }
        }
    }

    pub fn apply_hands(&mut self, actions: &ActionSnapshot) {
        for (slot, pose) in self.hands.iter_mut().zip(actions.hands) {
            *slot = pose.map(|pose| CubeInstance::at_pose(&pose, HAND_CUBE_SCALE));
        }
    }

    pub fn marker_anchor(&self, id: MarkerId) -> Option<&CubeInstance> {
        self.markers.get(&id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Everything to draw this frame
    pub fn cubes(&self) -> Vec<CubeInstance> {
        self.markers
            .values()
            .chain(self.planes.values())
            .chain(self.hands.iter().flatten())
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.planes.clear();
        self.hands = [None, None];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerSighting;
    use crate::tracking::Observation;
    use crate::types::{MarkerImage, Pose};

    fn sighting(x: f32) -> MarkerSighting {
        MarkerSighting {
            database_index: 0,
            pose: Pose::from_position(Vec3::new(x, 0.0, -1.0)),
        }
    }

    #[test]
    fn test_marker_anchor_follows_lifecycle() {
        let mut database = MarkerDatabase::default();
        database
            .insert(0, &MarkerImage::checkerboard("a", 2, 0.25))
            .unwrap();

        let mut scene = AnchorScene::new();
        let id = MarkerId(1);
        scene.apply_markers(
            &[Observation {
                id,
                lifecycle: Lifecycle::Added,
                data: sighting(0.0),
            }],
            &database,
        );
        assert_eq!(scene.marker_count(), 1);
        assert_eq!(scene.marker_anchor(id).map(|c| c.scale), Some(0.25));

        scene.apply_markers(
            &[Observation {
                id,
                lifecycle: Lifecycle::Updated,
                data: sighting(2.0),
            }],
            &database,
        );
        let moved = scene.marker_anchor(id).map(|c| c.position());
        assert_eq!(moved, Some(Vec3::new(2.0, 0.0, -1.0)));

        scene.apply_markers(
            &[Observation {
                id,
                lifecycle: Lifecycle::Removed,
                data: sighting(2.0),
            }],
            &database,
        );
        assert_eq!(scene.marker_count(), 0);
        assert!(scene.cubes().is_empty());
    }

    #[test]
    fn test_hands_are_drawn_when_tracked() {
        let mut scene = AnchorScene::new();
        scene.apply_hands(&ActionSnapshot {
            quit: false,
            hands: [Some(Pose::from_position(Vec3::X)), None],
        });
        assert_eq!(scene.cubes().len(), 1);
        scene.apply_hands(&ActionSnapshot::default());
        assert!(scene.cubes().is_empty());
    }
}
