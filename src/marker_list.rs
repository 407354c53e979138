//! Host-facing marker collection: add markers one at a time, merge them in
//! place, and query the resulting merge tree.

use crate::marker::{Marker, MarkerInfo, MarkerKind};
use crate::merge_engine::merge_markers_fast;

/// Where marker `i` sits in the merge tree, as reported by [`MarkerList::parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerParts {
    /// An original marker that was never merged and never will be (no merge
    /// has run since it was added, or it survived the last merge untouched).
    Single,
    /// An original marker consumed by a later merge; still present in the
    /// backing array but not part of the live set.
    Leaf,
    /// A merge product that is itself still live: both children as
    /// `(a, b)`.
    Root(usize, usize),
    /// A merge product that was itself later merged into something else:
    /// both children as `(a, b)`.
    Merge(usize, usize),
}

/// A growable collection of markers that merges overlapping entries on
/// demand, keeping every historical marker (originals and merge products)
/// addressable by index.
///
/// Mirrors the host API of the original marker-merging tool: markers are
/// added one at a time with [`MarkerList::add`], [`MarkerList::merge`] runs
/// the merge algorithm over the currently live set, and [`MarkerList::compress`]
/// forgets merge history for markers that survived untouched so a later
/// `add`/`merge` cycle starts clean.
#[derive(Debug, Clone)]
pub struct MarkerList {
    info: MarkerInfo,
    markers: Vec<Marker>,
}

impl MarkerList {
    /// An empty list using `kind` and `scale` for every marker's overlap
    /// geometry.
    pub fn new(kind: MarkerKind, scale: f64) -> Self {
        MarkerList {
            info: MarkerInfo::new(kind, scale),
            markers: Vec::new(),
        }
    }

    /// Replace the kind/scale used for all future distance and merge
    /// computations. Does not retroactively change already-computed radii
    /// of existing markers; call before adding markers that should use the
    /// new settings, or re-add from scratch.
    pub fn set_info(&mut self, kind: MarkerKind, scale: f64) {
        self.info = MarkerInfo::new(kind, scale);
    }

    /// Append a new, unmerged marker and return the new length.
    pub fn add(&mut self, x: f64, y: f64, size: f64) -> usize {
        self.markers.push(Marker::new(&self.info, x, y, size));
        self.markers.len()
    }

    /// Number of markers in the backing array, including merge products and
    /// markers consumed by a merge.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The marker at `i`, or `None` if out of range.
    pub fn marker(&self, i: usize) -> Option<&Marker> {
        self.markers.get(i)
    }

    /// `true` iff marker `i` was consumed by a merge and is no longer part
    /// of the live set. `None` if `i` is out of range.
    pub fn deleted(&self, i: usize) -> Option<bool> {
        self.markers.get(i).map(|m| m.deleted)
    }

    /// Where marker `i` sits in the merge tree. `None` if `i` is out of range.
    pub fn parts(&self, i: usize) -> Option<MarkerParts> {
        let m = self.markers.get(i)?;
        Some(match (m.parents, m.deleted) {
            (None, false) => MarkerParts::Single,
            (None, true) => MarkerParts::Leaf,
            (Some((a, b)), false) => MarkerParts::Root(a, b),
            (Some((a, b)), true) => MarkerParts::Merge(a, b),
        })
    }

    /// Drop every consumed marker and forget merge history for every
    /// surviving one, renumbering the live set to a contiguous prefix. After
    /// this call every remaining marker reports [`MarkerParts::Single`].
    /// Returns the new length.
    ///
    /// Existing indices into the list are invalidated by this call; it's
    /// meant to be used right before adding a fresh batch of markers for
    /// another merge pass, not while other indices are still in use.
    pub fn compress(&mut self) -> usize {
        self.markers.retain(|m| !m.deleted);
        for m in &mut self.markers {
            m.parents = None;
        }
        self.markers.len()
    }

    /// Clear every marker, keeping the current kind/scale settings.
    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Merge every currently overlapping pair of markers, repeatedly, until
    /// none remain. Returns the new length (originals plus merge products).
    ///
    /// Compresses first, so any marker already consumed by a previous merge
    /// is dropped (and its index invalidated) before the new pass begins;
    /// [`merge_markers_fast`] only ever sees a live, parents-free array, just
    /// like a fresh batch.
    pub fn merge(&mut self) -> usize {
        self.compress();
        merge_markers_fast(&self.info, &mut self.markers)
    }
}
