/*!
 * Density based clustering (DBSCAN) of points in longitude/latitude space.
 *
 * Distances are plain Euclidean distances in degrees. At the scale of a neighborhood radius of a
 * few tens of meters that is close enough.
 */

use crate::geo::Coord;
use rustc_hash::FxHashMap as HashMap;
use static_assertions::const_assert;
use std::collections::VecDeque;
use strum::{EnumIter, IntoStaticStr};

/// The neighborhood radius in degrees.
pub const EPS: f64 = 0.0004;

/// The number of points (including itself) within [EPS] of a point for it to be a core point.
pub const MIN_POINTS: usize = 3;

const_assert!(EPS > 0.0);
const_assert!(MIN_POINTS >= 1);

/// Parameters for [dbscan].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    /// Neighborhood radius, degrees. Must be greater than zero.
    pub eps: f64,
    /// Minimum neighborhood size of a core point, including the point itself.
    pub min_points: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        DbscanParams {
            eps: EPS,
            min_points: MIN_POINTS,
        }
    }
}

/// The role a point plays in the clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PointType {
    /// Has at least `min_points` neighbors.
    Core,
    /// Not a core point, but a neighbor of one.
    Boundary,
    /// Everything else.
    Noise,
}

impl PointType {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// The result of clustering a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterAssignment {
    /// None for noise.
    pub cluster_id: Option<u32>,
    pub point_type: PointType,
}

/// The number of points of each type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointTypeCounts {
    pub core: usize,
    pub boundary: usize,
    pub noise: usize,
}

impl PointTypeCounts {
    pub fn total(&self) -> usize {
        self.core + self.boundary + self.noise
    }

    /// The number of points of one type.
    pub fn get(&self, point_type: PointType) -> usize {
        match point_type {
            PointType::Core => self.core,
            PointType::Boundary => self.boundary,
            PointType::Noise => self.noise,
        }
    }
}

/// Count how many points of each type there are.
pub fn count_point_types(assignments: &[ClusterAssignment]) -> PointTypeCounts {
    assignments
        .iter()
        .fold(PointTypeCounts::default(), |mut counts, a| {
            match a.point_type {
                PointType::Core => counts.core += 1,
                PointType::Boundary => counts.boundary += 1,
                PointType::Noise => counts.noise += 1,
            }
            counts
        })
}

/**
 * Cluster points with DBSCAN.
 *
 * Cluster ids start at 0 and are assigned in the order the first core point of each cluster
 * appears in `points`. A boundary point within reach of more than one cluster goes to the one
 * with the lowest id. The result is in the same order as `points` and is completely determined by
 * the order of the input.
 */
pub fn dbscan(points: &[Coord], params: &DbscanParams) -> Vec<ClusterAssignment> {
    debug_assert!(params.eps > 0.0);

    // Points at exactly the same place share a neighborhood, so cluster the distinct sites and
    // weight each one by the number of points on it. Sites are in order of first appearance.
    let mut site_ids: HashMap<(u64, u64), usize> = HashMap::default();
    let mut sites: Vec<Coord> = vec![];
    let mut weights: Vec<usize> = vec![];
    let site_of: Vec<usize> = points
        .iter()
        .map(|pnt| {
            let key = ((pnt.lon + 0.0).to_bits(), (pnt.lat + 0.0).to_bits());
            let site = *site_ids.entry(key).or_insert_with(|| {
                sites.push(*pnt);
                weights.push(0);
                sites.len() - 1
            });
            weights[site] += 1;
            site
        })
        .collect();

    let index = GridIndex::new(&sites, params.eps);

    let is_core: Vec<bool> = (0..sites.len())
        .map(|i| {
            index
                .neighbors(&sites, i)
                .map(|j| weights[j])
                .sum::<usize>()
                >= params.min_points
        })
        .collect();

    let mut labels: Vec<Option<u32>> = vec![None; sites.len()];
    let mut next_id: u32 = 0;
    let mut queue = VecDeque::new();

    for start in 0..sites.len() {
        if !is_core[start] || labels[start].is_some() {
            continue;
        }

        let id = next_id;
        next_id += 1;

        labels[start] = Some(id);
        queue.push_back(start);

        // Clusters are expanded one at a time, so a boundary point is claimed by the first
        // (lowest id) cluster to reach it.
        while let Some(p) = queue.pop_front() {
            for q in index.neighbors(&sites, p) {
                if labels[q].is_none() {
                    labels[q] = Some(id);
                    if is_core[q] {
                        queue.push_back(q);
                    }
                }
            }
        }
    }

    site_of
        .into_iter()
        .map(|site| {
            let cluster_id = labels[site];
            let point_type = match (is_core[site], cluster_id) {
                (true, _) => PointType::Core,
                (false, Some(_)) => PointType::Boundary,
                (false, None) => PointType::Noise,
            };

            ClusterAssignment {
                cluster_id,
                point_type,
            }
        })
        .collect()
}

/// A uniform grid with cells the size of the neighborhood radius, so every neighbor of a point is
/// in the same cell or one of the eight around it.
struct GridIndex {
    eps: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl GridIndex {
    fn new(points: &[Coord], eps: f64) -> Self {
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::default();

        for (i, pnt) in points.iter().enumerate() {
            cells.entry(Self::cell(pnt, eps)).or_default().push(i);
        }

        GridIndex { eps, cells }
    }

    fn cell(pnt: &Coord, eps: f64) -> (i64, i64) {
        ((pnt.lon / eps).floor() as i64, (pnt.lat / eps).floor() as i64)
    }

    /// All points within eps of `points[i]`, including i.
    fn neighbors<'s>(
        &'s self,
        points: &'s [Coord],
        i: usize,
    ) -> impl Iterator<Item = usize> + 's {
        let center = points[i];
        let (cx, cy) = Self::cell(&center, self.eps);
        let eps = self.eps;

        (-1..=1)
            .flat_map(move |dx| (-1..=1).map(move |dy| (cx + dx, cy + dy)))
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|members| members.iter().copied())
            .filter(move |&j| {
                let other = points[j];
                f64::hypot(other.lon - center.lon, other.lat - center.lat) <= eps
            })
    }
}
