//! Polygon overlay, dissolve and area kernels.
//!
//! [`PatchIndex`] bulk-loads patch envelopes into an R-tree so that an
//! intersection overlay only runs the boolean op on pairs whose bounding
//! boxes touch. Everything here assumes projected coordinates in metres.

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::SQUARE_METRES_PER_HECTARE;

/// A patch stored in the R-tree, pointing back at its input position.
struct PatchEntry<'a> {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: &'a MultiPolygon<f64>,
}

impl RTreeObject for PatchEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One non-empty overlap between a target geometry and an indexed patch.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    /// Position of the patch in the slice the index was built from.
    pub patch_index: usize,
    /// Set-intersection of the target and the patch.
    pub geometry: MultiPolygon<f64>,
}

/// R-tree over a borrowed collection of polygons.
pub struct PatchIndex<'a> {
    tree: RTree<PatchEntry<'a>>,
}

impl<'a> PatchIndex<'a> {
    /// Builds the index. Empty geometries are skipped since they can never
    /// overlap anything.
    pub fn new(patches: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Self {
        let entries: Vec<PatchEntry<'a>> = patches
            .into_iter()
            .enumerate()
            .filter_map(|(index, polygon)| {
                compute_envelope(polygon).map(|envelope| PatchEntry {
                    index,
                    envelope,
                    polygon,
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed (non-empty) patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no patch was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Intersects `target` with every indexed patch and returns the
    /// overlaps with positive area, ordered by patch position.
    ///
    /// Pairs that only touch along an edge or at a point produce no
    /// overlap.
    #[must_use]
    pub fn overlaps(&self, target: &MultiPolygon<f64>) -> Vec<Overlap> {
        let Some(query_env) = compute_envelope(target) else {
            return Vec::new();
        };

        let mut overlaps: Vec<Overlap> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter_map(|entry| {
                let geometry = target.intersection(entry.polygon);
                (geometry.unsigned_area() > 0.0).then_some(Overlap {
                    patch_index: entry.index,
                    geometry,
                })
            })
            .collect();

        overlaps.sort_by_key(|overlap| overlap.patch_index);
        overlaps
    }
}

/// Unions a polygon collection into one overlap-free geometry.
pub fn dissolve<'a>(
    polygons: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> MultiPolygon<f64> {
    geo::unary_union(polygons)
}

/// Clips `geometry` to `region`.
#[must_use]
pub fn clip(geometry: &MultiPolygon<f64>, region: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry.intersection(region)
}

/// Planar area in hectares.
#[must_use]
pub fn area_ha(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area() / SQUARE_METRES_PER_HECTARE
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
