//! Identity continuity for per-frame detections
//!
//! The runtime reports what it sees each frame with no history. The tracker
//! keeps the identities seen last frame and tags this frame's detections as
//! added, updated or removed.

use std::collections::HashMap;
use std::hash::Hash;

/// Lifecycle tag of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// First frame the identity is seen
    Added,
    /// Seen this frame and the frame before
    Updated,
    /// Seen last frame, gone now
    Removed,
}

/// A detection tagged with its lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation<Id, T> {
    pub id: Id,
    pub lifecycle: Lifecycle,
    /// For `Removed`, the last data seen
    pub data: T,
}

/// Tracks identities between consecutive frames
#[derive(Debug, Clone)]
pub struct ObservationTracker<Id, T> {
    known: HashMap<Id, T>,
}

impl<Id, T> Default for ObservationTracker<Id, T> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
        }
    }
}

impl<Id, T> ObservationTracker<Id, T>
where
    Id: Copy + Eq + Hash + Ord,
    T: Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Identities currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.known.contains_key(id)
    }

    /// Tag this frame's detections against the previous frame
    ///
    /// Output is ordered: added and updated in input order, then removals
    /// sorted by identity. A duplicate identity within one frame keeps the
    /// last detection.
    pub fn update<I>(&mut self, detections: I) -> Vec<Observation<Id, T>>
    where
        I: IntoIterator<Item = (Id, T)>,
    {
        let mut current: HashMap<Id, T> = HashMap::new();
        let mut order = Vec::new();
        for (id, data) in detections {
            if current.insert(id, data).is_none() {
                order.push(id);
            }
        }

        let mut observations = Vec::with_capacity(order.len() + self.known.len());
        for id in &order {
            let data = current[id];
            let lifecycle = if self.known.contains_key(id) {
                Lifecycle::Updated
            } else {
                Lifecycle::Added
            };
            observations.push(Observation {
                id: *id,
                lifecycle,
                data,
            });
        }

        let mut removed: Vec<_> = self
            .known
            .iter()
            .filter(|(id, _)| !current.contains_key(*id))
            .map(|(id, data)| Observation {
                id: *id,
                lifecycle: Lifecycle::Removed,
                data: *data,
            })
            .collect();
        removed.sort_by_key(|observation| observation.id);
        observations.extend(removed);

        self.known = current;
        observations
    }

    /// Forget everything, reporting each known identity as removed
    pub fn clear(&mut self) -> Vec<Observation<Id, T>> {
        self.update(std::iter::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(observations: &[Observation<u32, f32>]) -> Vec<(u32, Lifecycle)> {
        observations.iter().map(|o| (o.id, o.lifecycle)).collect()
    }

    #[test]
    fn test_first_frame_is_all_added() {
        let mut tracker = ObservationTracker::new();
        let obs = tracker.update([(1u32, 0.0f32), (2, 0.0)]);
        assert_eq!(tags(&obs), vec![(1, Lifecycle::Added), (2, Lifecycle::Added)]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_continuity_added_updated_removed() {
        let mut tracker = ObservationTracker::new();
        tracker.update([(1u32, 0.0f32), (2, 0.0)]);
        let obs = tracker.update([(2, 1.0), (3, 1.0)]);
        assert_eq!(
            tags(&obs),
            vec![
                (2, Lifecycle::Updated),
                (3, Lifecycle::Added),
                (1, Lifecycle::Removed)
            ]
        );
        assert!(!tracker.contains(&1));
        assert!(tracker.contains(&3));
    }

    #[test]
    fn test_removed_carries_last_data() {
        let mut tracker = ObservationTracker::new();
        tracker.update([(7u32, 4.5f32)]);
        let obs = tracker.update(std::iter::empty());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].lifecycle, Lifecycle::Removed);
        assert_eq!(obs[0].data, 4.5);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_identity_reappearing_after_gap_is_added_again() {
        let mut tracker = ObservationTracker::new();
        tracker.update([(1u32, 0.0f32)]);
        tracker.update(std::iter::empty());
        let obs = tracker.update([(1, 0.0)]);
        assert_eq!(tags(&obs), vec![(1, Lifecycle::Added)]);
    }

    #[test]
    fn test_duplicate_identity_in_frame_keeps_last() {
        let mut tracker = ObservationTracker::new();
        let obs = tracker.update([(1u32, 1.0f32), (1, 2.0)]);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].data, 2.0);
    }

    #[test]
    fn test_clear_reports_removals() {
        let mut tracker = ObservationTracker::new();
        tracker.update([(2u32, 0.0f32), (1, 0.0)]);
        let obs = tracker.clear();
        assert_eq!(
            tags(&obs),
            vec![(1, Lifecycle::Removed), (2, Lifecycle::Removed)]
        );
    }
}
