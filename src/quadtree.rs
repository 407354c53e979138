//! A depth-bounded region quadtree over marker footprints.
//!
//! Unlike a point quadtree, nodes are not split on a points-per-node
//! capacity; a node subdivides only when a marker doesn't fit entirely
//! inside its region and the depth budget isn't exhausted, so a single
//! marker's index can be stored at several nodes at once (once per
//! quadrant it straddles). The tree stores marker **indices**, never
//! references or copies, and every method that needs marker geometry is
//! handed `markers: &[Marker]` explicitly — see the "arena-with-index
//! identity" design note in `DESIGN.md`.

use crate::marker::{distance, Marker, MarkerExtent, MarkerInfo};
use crate::utils::high_bit_position;

// These are chosen so bit 0 of the quadrant index encodes east/west and bit
// 1 encodes north/south:
//
//  ---------------
// |       |       |
// |  NW   |  NE   |
// |  (2)  |  (3)  |
//  ---------------
// |       |       |
// |  SW   |  SE   |
// |  (0)  |  (1)  |
//  ---------------
const SW: usize = 0;
const SE: usize = 1;
const NW: usize = 2;
const NE: usize = 3;

#[derive(Debug, Clone, Copy)]
struct Region {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Region {
    /// The bounding box of quadrant `q` within this region.
    fn quadrant(self, q: usize) -> Region {
        let w = self.w * 0.5;
        let h = self.h * 0.5;
        let mut x = self.x;
        let mut y = self.y;
        if q & 1 != 0 {
            x += w;
        }
        if q & 2 != 0 {
            y += h;
        }
        Region { x, y, w, h }
    }
}

/// Returns `true` iff the given region lies entirely inside `marker`'s
/// footprint, including the boundary.
fn region_inside_marker(region: Region, marker: &Marker) -> bool {
    let mx = marker.x;
    let my = marker.y;
    let mr = marker.r;
    mx - mr <= region.x
        && region.x + region.w <= mx + mr
        && my - mr <= region.y
        && region.y + region.h <= my + mr
}

/// A 4-bit mask of which quadrants of `region` the given marker's bounding
/// box touches.
fn touch_code(region: Region, marker: &Marker) -> u8 {
    let xm = region.x + 0.5 * region.w;
    let ym = region.y + 0.5 * region.h;
    let mut code: u8 = (1 << SW) | (1 << SE) | (1 << NW) | (1 << NE);
    if marker.x + marker.r < xm {
        code &= !((1 << NE) | (1 << SE));
    }
    if marker.x - marker.r > xm {
        code &= !((1 << NW) | (1 << SW));
    }
    if marker.y + marker.r < ym {
        code &= !((1 << NW) | (1 << NE));
    }
    if marker.y - marker.r > ym {
        code &= !((1 << SW) | (1 << SE));
    }
    code
}

/// A quadtree node. `children` is `None` for a leaf. Note a node may hold
/// markers in `markers` *and* have children at the same time: a marker
/// whose footprint fully contains the node's region is stored right there
/// regardless of whether the node has since been subdivided for other,
/// smaller markers.
#[derive(Debug, Default)]
struct Node {
    markers: Vec<usize>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn leaf() -> Self {
        Node::default()
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn is_empty_leaf(&self) -> bool {
        self.is_leaf() && self.markers.is_empty()
    }

    fn subdivide(&mut self) {
        if self.is_leaf() {
            self.children = Some(Box::new([Node::leaf(), Node::leaf(), Node::leaf(), Node::leaf()]));
        }
    }

    fn remove_marker(&mut self, idx: usize) {
        if let Some(pos) = self.markers.iter().position(|&m| m == idx) {
            self.markers.swap_remove(pos);
        }
    }
}

fn insert(node: &mut Node, levels: u32, region: Region, markers: &[Marker], idx: usize) {
    let marker = &markers[idx];
    if levels == 0 || region_inside_marker(region, marker) {
        node.markers.push(idx);
        return;
    }
    node.subdivide();
    let code = touch_code(region, marker);
    let children = node.children.as_mut().unwrap();
    for q in 0..4 {
        if code & (1 << q) != 0 {
            insert(&mut children[q], levels - 1, region.quadrant(q), markers, idx);
        }
    }
}

fn delete(node: &mut Node, levels: u32, region: Region, markers: &[Marker], idx: usize) {
    let marker = &markers[idx];
    if levels == 0 || region_inside_marker(region, marker) {
        node.remove_marker(idx);
        return;
    }
    if let Some(children) = node.children.as_mut() {
        let code = touch_code(region, marker);
        for q in 0..4 {
            if code & (1 << q) != 0 {
                delete(&mut children[q], levels - 1, region.quadrant(q), markers, idx);
            }
        }
        if children.iter().all(Node::is_empty_leaf) {
            node.children = None;
        }
    }
}

/// Search every node overlapping `target`'s footprint for the closest
/// overlapping marker with an index strictly smaller than `target`.
fn search_nearest(
    info: &MarkerInfo,
    node: &Node,
    levels: u32,
    region: Region,
    markers: &[Marker],
    target: usize,
    best: &mut Option<usize>,
    best_dist: &mut f64,
) {
    for &m in &node.markers {
        if m < target {
            let d = distance(info, &markers[target], &markers[m]);
            if d < 0.0 && d < *best_dist {
                *best_dist = d;
                *best = Some(m);
            }
        }
    }
    if levels == 0 {
        return;
    }
    if let Some(children) = &node.children {
        let code = touch_code(region, &markers[target]);
        for q in 0..4 {
            if code & (1 << q) != 0 {
                search_nearest(
                    info,
                    &children[q],
                    levels - 1,
                    region.quadrant(q),
                    markers,
                    target,
                    best,
                    best_dist,
                );
            }
        }
    }
}

/// A spatial index over marker indices, supporting insert, delete, and
/// "nearest overlapping marker with smaller index" queries.
#[derive(Debug)]
pub struct MarkerQuadtree {
    region: Region,
    max_depth: u32,
    root: Node,
}

impl MarkerQuadtree {
    /// Build an empty tree over `extent`, with max depth chosen heuristically
    /// from `marker_count` (the number of markers that will be inserted).
    pub fn new(extent: MarkerExtent, marker_count: usize) -> Self {
        let max_depth = (high_bit_position(marker_count) / 4 + 3).max(0) as u32;
        MarkerQuadtree {
            region: Region {
                x: extent.x,
                y: extent.y,
                w: extent.w,
                h: extent.h,
            },
            max_depth,
            root: Node::leaf(),
        }
    }

    /// Insert `markers[idx]` into the tree, if its footprint overlaps the
    /// tree's root region at all.
    pub fn insert(&mut self, markers: &[Marker], idx: usize) {
        let m = &markers[idx];
        let r = self.region;
        if m.x + m.r >= r.x && m.x - m.r <= r.x + r.w && m.y + m.r >= r.y && m.y - m.r <= r.y + r.h
        {
            insert(&mut self.root, self.max_depth, self.region, markers, idx);
        }
    }

    /// Remove `markers[idx]` from the tree. No-op if it isn't present.
    pub fn delete(&mut self, markers: &[Marker], idx: usize) {
        delete(&mut self.root, self.max_depth, self.region, markers, idx);
    }

    /// Find the marker with an index strictly smaller than `target`, among
    /// those whose footprint overlaps `markers[target]`'s, that overlaps it
    /// most (has the most negative distance). Returns `None` if no such
    /// marker exists.
    pub fn nearest_overlapping(
        &self,
        info: &MarkerInfo,
        markers: &[Marker],
        target: usize,
    ) -> Option<usize> {
        let mut best = None;
        let mut best_dist = f64::INFINITY;
        search_nearest(
            info,
            &self.root,
            self.max_depth,
            self.region,
            markers,
            target,
            &mut best,
            &mut best_dist,
        );
        best
    }

    /// `true` iff the tree holds no markers at all (a leaf root with an
    /// empty marker list).
    pub fn is_empty(&self) -> bool {
        self.root.is_empty_leaf()
    }
}
