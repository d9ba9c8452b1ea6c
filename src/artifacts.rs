/*!
 * Per-user files kept so the home location decisions can be audited later.
 */

use crate::{
    cluster::{ClusterAggregate, ClusterAssignment},
    csv::{CsvFile, CsvWriter},
    record::LocalizedRecord,
    HomeResult,
};
use log::debug;
use std::path::{Path, PathBuf};

/// Default directory for the per point clustering results.
pub const CLUSTERS_OUTPUT: &str = "output_clustering_results";

/// Default directory for the cluster aggregate tables.
pub const AGGREGATES_OUTPUT: &str = "output_cluster_aggregates";

const SNAPSHOT_HEADER: [&str; 7] = [
    "datetime",
    "tz_name",
    "user_id",
    "lon",
    "lat",
    "cluster_id",
    "type",
];

const AGGREGATES_HEADER: [&str; 6] = [
    "cluster_id",
    "centroid_lon",
    "centroid_lat",
    "time_range",
    "max_dist_from_centroid",
    "count",
];

/// Where the per-user files go. Each user gets one file named `<user_id>.csv` in each directory,
/// and running a user again replaces them.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    clusters_dir: PathBuf,
    aggregates_dir: PathBuf,
}

impl ArtifactStore {
    /// Use these directories, creating them if needed.
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(
        clusters_dir: P1,
        aggregates_dir: P2,
    ) -> HomeResult<Self> {
        let clusters_dir = clusters_dir.as_ref().to_path_buf();
        let aggregates_dir = aggregates_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&clusters_dir)?;
        std::fs::create_dir_all(&aggregates_dir)?;

        Ok(ArtifactStore {
            clusters_dir,
            aggregates_dir,
        })
    }

    /// Use the default directory names inside `base`.
    pub fn in_dir<P: AsRef<Path>>(base: P) -> HomeResult<Self> {
        let base = base.as_ref();
        Self::new(base.join(CLUSTERS_OUTPUT), base.join(AGGREGATES_OUTPUT))
    }

    pub fn cluster_snapshot_path(&self, user_id: i64) -> PathBuf {
        self.clusters_dir.join(format!("{}.csv", user_id))
    }

    pub fn cluster_aggregates_path(&self, user_id: i64) -> PathBuf {
        self.aggregates_dir.join(format!("{}.csv", user_id))
    }

    /// Save the clustering result of every point, noise included.
    pub fn write_cluster_snapshot(
        &self,
        user_id: i64,
        records: &[LocalizedRecord],
        assignments: &[ClusterAssignment],
    ) -> HomeResult<()> {
        if records.len() != assignments.len() {
            return Err(format!(
                "{} records but {} cluster assignments",
                records.len(),
                assignments.len()
            )
            .into());
        }

        let path = self.cluster_snapshot_path(user_id);
        let mut out = CsvFile::create(&path)?;
        out.write_record(SNAPSHOT_HEADER)?;

        for (rec, assignment) in records.iter().zip(assignments) {
            let cluster_id = assignment
                .cluster_id
                .map(|id| id.to_string())
                .unwrap_or_default();

            out.write_record([
                rec.local.to_rfc3339(),
                rec.zone_label(),
                user_id.to_string(),
                rec.record.lon.to_string(),
                rec.record.lat.to_string(),
                cluster_id,
                assignment.point_type.name().to_owned(),
            ])?;
        }

        out.flush()?;
        debug!("wrote {}", path.display());

        Ok(())
    }

    /// Save the aggregate table of a user's clusters.
    pub fn write_cluster_aggregates(
        &self,
        user_id: i64,
        aggregates: &[ClusterAggregate],
    ) -> HomeResult<()> {
        let path = self.cluster_aggregates_path(user_id);
        let mut out = CsvFile::create(&path)?;
        out.write_record(AGGREGATES_HEADER)?;

        for agg in aggregates {
            out.write_record([
                agg.cluster_id.to_string(),
                agg.centroid.lon.to_string(),
                agg.centroid.lat.to_string(),
                agg.time_range.to_string(),
                agg.max_dist_from_centroid.to_string(),
                agg.count.to_string(),
            ])?;
        }

        out.flush()?;
        debug!("wrote {}", path.display());

        Ok(())
    }
}
