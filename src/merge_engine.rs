//! The merge loop: repeatedly merge the globally closest overlapping pair of
//! markers until none overlap, using the quadtree to find nearest-neighbor
//! candidates and the indexed priority queue to always pick the globally
//! closest pair next.

use crate::marker::{distance, extent, Marker, MarkerInfo};
use crate::priority_queue::IndexedPriorityQueue;
use crate::quadtree::MarkerQuadtree;

/// Repeatedly merge the closest pair of the given markers until they don't
/// overlap, using the centroid rule: each merge removes its two inputs and
/// creates a new marker whose size is the sum of the originals' and whose
/// center is their size-weighted average.
///
/// `markers` must have exactly `n` live entries on entry, where `n =
/// markers.len()`; merge products are appended with `Vec::push`, so the
/// array grows from `n` up to at most `2n - 1` entries. The final length is
/// returned; some of the returned entries may be marked `deleted` and should
/// be ignored by the caller.
///
/// Runs in O(n k log n) where k is the maximum number of markers
/// simultaneously overlapping any single marker in the input.
pub fn merge_markers_fast(info: &MarkerInfo, markers: &mut Vec<Marker>) -> usize {
    let n = markers.len();
    if n == 0 {
        return 0;
    }
    let max_len = 2 * n - 1;
    markers.reserve(max_len - n);

    let mut engine = MergeEngine::new(info, markers, max_len);
    engine.run(markers)
}

/// Owns the scratch state (nearest-neighbor links, the quadtree, the
/// priority queue) for the duration of a single merge call.
struct MergeEngine<'a> {
    info: &'a MarkerInfo,
    quadtree: MarkerQuadtree,
    pq: IndexedPriorityQueue,
    /// `n_nghbr[i]` is the nearest overlapping marker with smaller index
    /// than `i`, if one was known the last time `i`'s neighbor was computed.
    n_nghbr: Vec<Option<usize>>,
    /// `mindist[i] == distance(markers[i], markers[n_nghbr[i]])`; doubles as
    /// the priority queue's key array.
    mindist: Vec<f64>,
    /// `inv_nghbr_head[b]` starts the singly linked list of every `a` with
    /// `n_nghbr[a] == Some(b)`.
    inv_nghbr_head: Vec<Option<usize>>,
    /// `inv_nghbr_next[a]` is the next link in that list.
    inv_nghbr_next: Vec<Option<usize>>,
}

impl<'a> MergeEngine<'a> {
    fn new(info: &'a MarkerInfo, markers: &[Marker], max_len: usize) -> Self {
        let n = markers.len();
        let ext = extent(markers, n).expect("merge_markers_fast already rejected n == 0");
        let mut quadtree = MarkerQuadtree::new(ext, n);
        for i in 0..n {
            quadtree.insert(markers, i);
        }

        let mut n_nghbr = vec![None; max_len];
        let mut mindist = vec![0.0; max_len];
        let mut inv_nghbr_head = vec![None; max_len];
        let mut inv_nghbr_next = vec![None; max_len];
        let mut heap = Vec::with_capacity(n);

        for a in 0..n {
            if let Some(b) = quadtree.nearest_overlapping(info, markers, a) {
                n_nghbr[a] = Some(b);
                mindist[a] = distance(info, &markers[a], &markers[b]);
                heap.push(a);
                inv_nghbr_next[a] = inv_nghbr_head[b];
                inv_nghbr_head[b] = Some(a);
            }
        }

        let pq = IndexedPriorityQueue::set_up_heap(heap, &mindist, max_len);

        MergeEngine {
            info,
            quadtree,
            pq,
            n_nghbr,
            mindist,
            inv_nghbr_head,
            inv_nghbr_next,
        }
    }

    /// Push `a` onto the front of `b`'s inverse-neighbor list.
    fn link_inverse(&mut self, a: usize, b: usize) {
        self.inv_nghbr_next[a] = self.inv_nghbr_head[b];
        self.inv_nghbr_head[b] = Some(a);
    }

    /// Collect every live marker in `b`'s inverse-neighbor list into `out`.
    fn collect_inverse(&self, b: usize, markers: &[Marker], out: &mut Vec<usize>) {
        let mut p = self.inv_nghbr_head[b];
        while let Some(i) = p {
            if !markers[i].deleted {
                out.push(i);
            }
            p = self.inv_nghbr_next[i];
        }
    }

    fn run(&mut self, markers: &mut Vec<Marker>) -> usize {
        let mut tmp = Vec::new();
        while let Some(a) = self.pq.get_min(&self.mindist) {
            let b = self.n_nghbr[a].expect("every queued marker has a recorded neighbor");

            self.pq.delete(b, &self.mindist);
            self.quadtree.delete(markers, a);
            self.quadtree.delete(markers, b);
            markers[a].deleted = true;
            markers[b].deleted = true;

            tmp.clear();
            self.collect_inverse(a, markers, &mut tmp);
            self.collect_inverse(b, markers, &mut tmp);

            let aa = markers.len();
            markers.push(Marker::merge(self.info, markers, a, b));
            self.quadtree.insert(markers, aa);

            if let Some(bb) = self.quadtree.nearest_overlapping(self.info, markers, aa) {
                self.n_nghbr[aa] = Some(bb);
                self.mindist[aa] = distance(self.info, &markers[aa], &markers[bb]);
                self.pq.add(aa, &self.mindist);
                self.link_inverse(aa, bb);
            }

            for i in 0..tmp.len() {
                let p = tmp[i];
                match self.quadtree.nearest_overlapping(self.info, markers, p) {
                    Some(bb) => {
                        self.n_nghbr[p] = Some(bb);
                        self.mindist[p] = distance(self.info, &markers[p], &markers[bb]);
                        self.pq.update(p, &self.mindist);
                        self.link_inverse(p, bb);
                    }
                    None => {
                        self.pq.delete(p, &self.mindist);
                    }
                }
            }
        }
        markers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerKind;
    use crate::utils::EPS;
    use rand::Rng;

    fn add_all(info: &MarkerInfo, points: &[(f64, f64, f64)]) -> Vec<Marker> {
        points
            .iter()
            .map(|&(x, y, size)| Marker::new(info, x, y, size))
            .collect()
    }

    fn assert_no_overlaps(info: &MarkerInfo, markers: &[Marker]) {
        let live: Vec<&Marker> = markers.iter().filter(|m| !m.deleted).collect();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                assert!(
                    distance(info, a, b) >= -EPS,
                    "live markers still overlap: {:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    fn assert_mass_conserved(markers: &[Marker], original_total: f64) {
        let live_total: f64 = markers.iter().filter(|m| !m.deleted).map(|m| m.size).sum();
        assert!((live_total - original_total).abs() < EPS);
    }

    #[test]
    fn two_touching_circles_merge() {
        let info = MarkerInfo::new(MarkerKind::Circle, 1.0);
        let mut markers = add_all(&info, &[(0.0, 0.0, 1.0), (0.0, 0.0, 1.0)]);
        let len = merge_markers_fast(&info, &mut markers);
        assert_eq!(len, 3);
        let live: Vec<&Marker> = markers.iter().filter(|m| !m.deleted).collect();
        assert_eq!(live.len(), 1);
        assert!((live[0].x - 0.0).abs() < EPS);
        assert!((live[0].y - 0.0).abs() < EPS);
        assert!((live[0].size - 2.0).abs() < EPS);
        let expected_r = info.size_to_radius(2.0);
        assert!((live[0].r - expected_r).abs() < EPS);
    }

    #[test]
    fn two_disjoint_circles_do_not_merge() {
        let info = MarkerInfo::new(MarkerKind::Circle, 0.1);
        let mut markers = add_all(&info, &[(0.0, 0.0, 1.0), (100.0, 0.0, 1.0)]);
        let len = merge_markers_fast(&info, &mut markers);
        assert_eq!(len, 2);
        assert!(!markers[0].deleted);
        assert!(!markers[1].deleted);
        assert!((markers[0].x - 0.0).abs() < EPS);
        assert!((markers[1].x - 100.0).abs() < EPS);
    }

    #[test]
    fn three_collinear_circles_chain_merge_into_one() {
        let info = MarkerInfo::new(MarkerKind::Circle, 2.0);
        let mut markers = add_all(&info, &[(0.0, 0.0, 1.0), (1.0, 0.0, 1.0), (2.0, 0.0, 1.0)]);
        let len = merge_markers_fast(&info, &mut markers);
        let live: Vec<&Marker> = markers[..len].iter().filter(|m| !m.deleted).collect();
        assert_eq!(live.len(), 1);
        assert!((live[0].x - 1.0).abs() < EPS);
        assert!((live[0].y - 0.0).abs() < EPS);
        assert!((live[0].size - 3.0).abs() < EPS);
    }

    #[test]
    fn duplicate_coincident_markers_merge() {
        let info = MarkerInfo::new(MarkerKind::Circle, 1.0);
        let mut markers = add_all(&info, &[(5.0, 5.0, 2.0), (5.0, 5.0, 3.0)]);
        let len = merge_markers_fast(&info, &mut markers);
        let live: Vec<&Marker> = markers[..len].iter().filter(|m| !m.deleted).collect();
        assert_eq!(live.len(), 1);
        assert!((live[0].x - 5.0).abs() < EPS);
        assert!((live[0].y - 5.0).abs() < EPS);
        assert!((live[0].size - 5.0).abs() < EPS);
    }

    #[test]
    fn square_markers_close_on_one_axis() {
        let info = MarkerInfo::new(MarkerKind::Square, 1.0);
        let mut markers = add_all(&info, &[(0.0, 0.0, 4.0), (3.0, 0.0, 4.0)]);
        let d = distance(&info, &markers[0], &markers[1]);
        let len = merge_markers_fast(&info, &mut markers);
        if d < 0.0 {
            assert_eq!(markers[..len].iter().filter(|m| !m.deleted).count(), 1);
        } else {
            assert_eq!(markers[..len].iter().filter(|m| !m.deleted).count(), 2);
        }
    }

    #[test]
    fn empty_input_returns_zero() {
        let info = MarkerInfo::default();
        let mut markers: Vec<Marker> = vec![];
        assert_eq!(merge_markers_fast(&info, &mut markers), 0);
    }

    #[test]
    fn merge_tree_validity_and_mass_conservation_on_random_input() {
        let info = MarkerInfo::new(MarkerKind::Circle, 3.0);
        let mut rng = rand::thread_rng();
        let n = 120;
        let mut markers: Vec<Marker> = (0..n)
            .map(|_| {
                let x = rng.gen_range(0.0..50.0);
                let y = rng.gen_range(0.0..50.0);
                let size = rng.gen_range(1.0..5.0);
                Marker::new(&info, x, y, size)
            })
            .collect();
        let original_total: f64 = markers.iter().map(|m| m.size).sum();

        let len = merge_markers_fast(&info, &mut markers);
        assert!(len >= n);
        assert!(len <= 2 * n - 1);

        assert_mass_conserved(&markers[..len], original_total);
        assert_no_overlaps(&info, &markers[..len]);

        for (i, m) in markers[..len].iter().enumerate() {
            if let Some((a, b)) = m.parents {
                assert!(a < i);
                assert!(b < i);
                if !m.deleted {
                    assert!(markers[a].deleted);
                    assert!(markers[b].deleted);
                }
            }
        }
    }
}
