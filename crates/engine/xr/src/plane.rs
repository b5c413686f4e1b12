//! Plane detection layered on a live session

use glam::Vec2;

use crate::error::Result;
use crate::runtime::XrRuntime;
use crate::tracking::{Observation, ObservationTracker};
use crate::types::{PlaneId, PlaneOrientation, PlaneTrackerHandle, Pose, SessionHandle, SpaceHandle};

/// Where a plane was seen this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSighting {
    pub pose: Pose,
    pub extent: Vec2,
    pub orientation: PlaneOrientation,
}

pub type PlaneObservation = Observation<PlaneId, PlaneSighting>;

/// Plane tracker state for one session
#[derive(Debug, Default)]
pub struct PlaneTracking {
    tracker: Option<PlaneTrackerHandle>,
    observations: ObservationTracker<PlaneId, PlaneSighting>,
    latest: Vec<PlaneObservation>,
}

impl PlaneTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize<R>(&mut self, runtime: &mut R, session: SessionHandle) -> Result<()>
    where
        R: XrRuntime + ?Sized,
    {
        if self.tracker.is_some() {
            return Ok(());
        }
        let tracker = runtime.create_plane_tracker(session)?;
        tracing::info!("Plane tracking enabled ({})", tracker);
        self.tracker = Some(tracker);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_some()
    }

    pub fn process<R>(
        &mut self,
        runtime: &mut R,
        display_time: i64,
        space: SpaceHandle,
    ) -> Result<&[PlaneObservation]>
    where
        R: XrRuntime + ?Sized,
    {
        let Some(tracker) = self.tracker else {
            self.latest.clear();
            return Ok(&self.latest);
        };

        let detections = runtime.locate_planes(tracker, display_time, space)?;
        self.latest = self.observations.update(detections.into_iter().map(|plane| {
            (
                plane.id,
                PlaneSighting {
                    pose: plane.pose,
                    extent: plane.extent,
                    orientation: plane.orientation,
                },
            )
        }));
        Ok(&self.latest)
    }

    pub fn latest(&self) -> &[PlaneObservation] {
        &self.latest
    }

    pub fn shutdown<R>(&mut self, runtime: &mut R) -> Vec<PlaneObservation>
    where
        R: XrRuntime + ?Sized,
    {
        if let Some(tracker) = self.tracker.take() {
            runtime.destroy_plane_tracker(tracker);
        }
        self.latest.clear();
        self.observations.clear()
    }
}
