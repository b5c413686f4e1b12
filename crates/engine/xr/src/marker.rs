//! Marker recognition layered on a live session
//!
//! The marker extension is optional. When the runtime lacks it,
//! [`MarkerTracking::initialize`] reports [`XrError::ExtensionUnsupported`]
//! and every later step quietly does nothing.

use glam::Vec2;

use crate::error::{Result, XrError};
use crate::runtime::XrRuntime;
use crate::tracking::{Observation, ObservationTracker};
use crate::types::{MarkerId, MarkerImage, MarkerTrackerHandle, Pose, SessionHandle, SpaceHandle};

/// A registered reference image
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDatabaseEntry {
    /// Index the runtime assigned at registration
    pub index: usize,
    pub label: String,
    pub physical_size: Vec2,
}

/// Reference images known to the tracker
///
/// Filled once per session, then sealed and read-only.
#[derive(Debug, Clone, Default)]
pub struct MarkerDatabase {
    entries: Vec<MarkerDatabaseEntry>,
    sealed: bool,
}

impl MarkerDatabase {
    pub fn insert(&mut self, index: usize, image: &MarkerImage) -> Result<()> {
        if self.sealed {
            return Err(XrError::MarkerDatabaseSealed);
        }
        self.entries.push(MarkerDatabaseEntry {
            index,
            label: image.label.clone(),
            physical_size: image.physical_size,
        });
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn entries(&self) -> &[MarkerDatabaseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a runtime database index
    pub fn get(&self, index: usize) -> Option<&MarkerDatabaseEntry> {
        self.entries.iter().find(|entry| entry.index == index)
    }
}

/// Where a marker was seen this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSighting {
    pub database_index: usize,
    pub pose: Pose,
}

pub type MarkerObservation = Observation<MarkerId, MarkerSighting>;

/// Marker tracker state for one session
#[derive(Debug, Default)]
pub struct MarkerTracking {
    tracker: Option<MarkerTrackerHandle>,
    database: MarkerDatabase,
    observations: ObservationTracker<MarkerId, MarkerSighting>,
    latest: Vec<MarkerObservation>,
}

impl MarkerTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the tracker through the marker extension
    pub fn initialize<R>(&mut self, runtime: &mut R, session: SessionHandle) -> Result<()>
    where
        R: XrRuntime + ?Sized,
    {
        if self.tracker.is_some() {
            return Ok(());
        }
        let tracker = runtime.create_marker_tracker(session)?;
        tracing::info!("Marker tracking enabled ({})", tracker);
        self.tracker = Some(tracker);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_some()
    }

    pub fn database(&self) -> &MarkerDatabase {
        &self.database
    }

    /// Register reference images and seal the database
    ///
    /// Images the runtime rejects are logged and skipped. Returns the number
    /// registered.
    pub fn add_images<R>(&mut self, runtime: &mut R, images: &[MarkerImage]) -> Result<usize>
    where
        R: XrRuntime + ?Sized,
    {
        let Some(tracker) = self.tracker else {
            return Err(XrError::PhaseOrder {
                operation: "add_marker_images",
                requirement: "an initialized marker tracker",
            });
        };
        if self.database.is_sealed() {
            return Err(XrError::MarkerDatabaseSealed);
        }

        let mut registered = 0;
        for image in images {
            match runtime.add_marker_image(tracker, image) {
                Ok(index) => {
                    self.database.insert(index, image)?;
                    registered += 1;
                    tracing::info!(
                        "Registered marker '{}' ({}x{} px, {:.3}x{:.3} m) at index {}",
                        image.label,
                        image.width,
                        image.height,
                        image.physical_size.x,
                        image.physical_size.y,
                        index
                    );
                }
                Err(e) => tracing::warn!("Marker '{}' not registered: {}", image.label, e),
            }
        }
        self.database.seal();
        Ok(registered)
    }

    /// Fetch this frame's detections and tag them
    pub fn process<R>(
        &mut self,
        runtime: &mut R,
        display_time: i64,
        space: SpaceHandle,
    ) -> Result<&[MarkerObservation]>
    where
        R: XrRuntime + ?Sized,
    {
        let Some(tracker) = self.tracker else {
            self.latest.clear();
            return Ok(&self.latest);
        };

        let detections = runtime.locate_markers(tracker, display_time, space)?;
        let database = &self.database;
        let known = detections.into_iter().filter_map(|detection| {
            if database.get(detection.database_index).is_none() {
                tracing::debug!(
                    "Ignoring detection {} for unknown database index {}",
                    detection.id,
                    detection.database_index
                );
                return None;
            }
            Some((
                detection.id,
                MarkerSighting {
                    database_index: detection.database_index,
                    pose: detection.pose,
                },
            ))
        });
        self.latest = self.observations.update(known);
        Ok(&self.latest)
    }

    /// Observations produced by the last `process`
    pub fn latest(&self) -> &[MarkerObservation] {
        &self.latest
    }

    /// Destroy the tracker and forget the session's database
    ///
    /// Returns removals for every marker still tracked.
    pub fn shutdown<R>(&mut self, runtime: &mut R) -> Vec<MarkerObservation>
    where
        R: XrRuntime + ?Sized,
    {
        if let Some(tracker) = self.tracker.take() {
            runtime.destroy_marker_tracker(tracker);
        }
        self.database = MarkerDatabase::default();
        self.latest.clear();
        self.observations.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_rejects_inserts_after_seal() {
        let mut db = MarkerDatabase::default();
        let image = MarkerImage::checkerboard("a", 2, 0.1);
        db.insert(0, &image).unwrap();
        db.seal();
        assert_eq!(db.insert(1, &image), Err(XrError::MarkerDatabaseSealed));
        assert_eq!(db.len(), 1);
        assert_eq!(db.get(0).map(|e| e.label.as_str()), Some("a"));
        assert!(db.get(1).is_none());
    }
}
