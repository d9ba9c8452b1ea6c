/*!
 * Types and functions for working with clusters.
 *
 * Points are grouped into clusters with [dbscan], and a [ClusterAggregate] describes the
 * aggregate properties of the core points of a single cluster.
 */

pub use aggregate::{aggregate_clusters, ClusterAggregate, CorePoint};
pub use dbscan::{
    count_point_types, dbscan, ClusterAssignment, DbscanParams, PointType, PointTypeCounts, EPS,
    MIN_POINTS,
};

mod aggregate;
mod dbscan;
