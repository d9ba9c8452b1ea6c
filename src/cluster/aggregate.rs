use crate::geo::{great_circle_distance, Coord};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;

/// A core point of a cluster, the only kind of point that counts toward a [ClusterAggregate].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorePoint {
    pub coord: Coord,
    /// The localized time of the record.
    pub time: DateTime<FixedOffset>,
    pub cluster_id: u32,
}

/**
 * The aggregate properties of the core points in a cluster.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAggregate {
    pub cluster_id: u32,
    /// Average latitude and longitude of the points in the cluster.
    pub centroid: Coord,
    /// Seconds between the earliest and the latest point in the cluster.
    pub time_range: i64,
    /// The great circle distance from the centroid to the farthest point in the cluster, meters.
    pub max_dist_from_centroid: f64,
    /// The number of points in the cluster.
    pub count: usize,
}

/**
 * Summarize each cluster.
 *
 * #Arguments
 * points - the core points of all the clusters, in any order.
 *
 * #Returns
 * One aggregate per cluster id, sorted by cluster id.
 */
pub fn aggregate_clusters(points: &[CorePoint]) -> Vec<ClusterAggregate> {
    let mut by_cluster: BTreeMap<u32, Vec<&CorePoint>> = BTreeMap::new();
    for pnt in points {
        by_cluster.entry(pnt.cluster_id).or_default().push(pnt);
    }

    by_cluster
        .into_iter()
        .map(|(cluster_id, members)| {
            let count = members.len();

            let (sum_lat, sum_lon) = members
                .iter()
                .fold((0.0, 0.0), |(lat, lon), p| (lat + p.coord.lat, lon + p.coord.lon));
            let centroid = Coord {
                lat: sum_lat / count as f64,
                lon: sum_lon / count as f64,
            };

            let max_dist_from_centroid = members
                .iter()
                .map(|p| great_circle_distance(centroid.lat, centroid.lon, p.coord.lat, p.coord.lon))
                .fold(0.0, f64::max);

            // Groups from the BTreeMap are never empty.
            let earliest = members.iter().map(|p| p.time).min().unwrap_or(members[0].time);
            let latest = members.iter().map(|p| p.time).max().unwrap_or(members[0].time);
            let time_range = (latest - earliest).num_seconds();

            ClusterAggregate {
                cluster_id,
                centroid,
                time_range,
                max_dist_from_centroid,
                count,
            }
        })
        .collect()
}
