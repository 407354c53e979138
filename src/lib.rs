//! Fast merging of overlapping population markers.
//!
//! Given a set of circular or square markers, each with a center and a
//! population-derived size, [`merge_markers_fast`] repeatedly merges the
//! pair of markers whose footprints overlap most until no two remaining
//! markers overlap. Each merge replaces two markers with one whose
//! population is the sum and whose center is the population-weighted
//! centroid of the two.
//!
//! The crate is organised leaves-first:
//!
//! - [`marker`] — geometric primitives (`Marker`, `MarkerInfo`, distance, merge).
//! - [`priority_queue`] — an indexed min-heap keyed on a caller-owned value array.
//! - [`quadtree`] — a spatial index supporting "nearest overlapping marker with
//!   smaller index" queries under the marker distance function.
//! - [`merge_engine`] — the merge loop that ties the above together.
//! - [`marker_list`] — the `MarkerList` type a caller actually builds and merges.
pub mod marker;
pub mod marker_list;
pub mod merge_engine;
pub mod priority_queue;
pub mod quadtree;
mod utils;

pub use marker::{Marker, MarkerInfo, MarkerKind};
pub use marker_list::{MarkerList, MarkerParts};
pub use merge_engine::merge_markers_fast;
