/*!
 * Decide which cluster, if any, is a user's home.
 */

use crate::{
    artifacts::ArtifactStore,
    cluster::{
        aggregate_clusters, count_point_types, dbscan, ClusterAggregate, CorePoint, DbscanParams,
        PointType, PointTypeCounts,
    },
    geo::Coord,
    preprocess::{preprocess, HomePeriod},
    timezone::DatetimeLocalizer,
    HomeResult, Record,
};
use log::debug;
use std::cmp::Ordering;
use strum::{IntoEnumIterator, IntoStaticStr};

/// The value of the home cluster id when there was nothing to choose from.
pub const NO_HOME_CLUSTER: i64 = -1;

/// Why a cluster was, or was not, chosen as home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum HomeReason {
    #[strum(serialize = "no tweets in desired time range")]
    NoRecordsInHomePeriod,
    #[strum(serialize = "no clusters")]
    NoClusters,
    #[strum(serialize = "only one max cluster")]
    OnlyOneMaxCluster,
    #[strum(serialize = "cluster with minimum distance")]
    MinimumDistance,
    #[strum(serialize = "cluster with maximum time range")]
    MaximumTimeRange,
}

impl HomeReason {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// The outcome of looking for a home cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum HomeDecision {
    /// Preprocessing left nothing to cluster.
    NoRecordsInHomePeriod,
    /// Every point was noise.
    NoClusters,
    /// There were clusters, but every rule ended in a tie.
    Undecided,
    /// The chosen cluster.
    Home {
        cluster_id: u32,
        reason: HomeReason,
        centroid: Coord,
        count: usize,
    },
}

impl HomeDecision {
    /// [NO_HOME_CLUSTER] when there was nothing to choose from, `None` when undecided.
    pub fn home_cluster_id(&self) -> Option<i64> {
        match self {
            Self::NoRecordsInHomePeriod | Self::NoClusters => Some(NO_HOME_CLUSTER),
            Self::Undecided => None,
            Self::Home { cluster_id, .. } => Some(i64::from(*cluster_id)),
        }
    }

    pub fn reason(&self) -> Option<HomeReason> {
        match self {
            Self::NoRecordsInHomePeriod => Some(HomeReason::NoRecordsInHomePeriod),
            Self::NoClusters => Some(HomeReason::NoClusters),
            Self::Undecided => None,
            Self::Home { reason, .. } => Some(*reason),
        }
    }

    pub fn centroid(&self) -> Option<Coord> {
        match self {
            Self::Home { centroid, .. } => Some(*centroid),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Home { count, .. } => Some(*count),
            _ => None,
        }
    }
}

/// Find the only cluster with the best value of `key`, if there is exactly one.
fn unique_best<K, F>(
    aggregates: &[ClusterAggregate],
    key: F,
    better: Ordering,
) -> Option<&ClusterAggregate>
where
    K: PartialOrd + Copy,
    F: Fn(&ClusterAggregate) -> K,
{
    let mut best: Option<(&ClusterAggregate, K)> = None;
    let mut num_best = 0;

    for agg in aggregates {
        let val = key(agg);
        match best {
            None => {
                best = Some((agg, val));
                num_best = 1;
            }
            Some((_, best_val)) => match val.partial_cmp(&best_val) {
                Some(Ordering::Equal) => num_best += 1,
                Some(ord) if ord == better => {
                    best = Some((agg, val));
                    num_best = 1;
                }
                _ => {}
            },
        }
    }

    best.filter(|_| num_best == 1).map(|(agg, _)| agg)
}

fn most_points(aggregates: &[ClusterAggregate]) -> Option<&ClusterAggregate> {
    unique_best(aggregates, |a| a.count, Ordering::Greater)
}

fn tightest(aggregates: &[ClusterAggregate]) -> Option<&ClusterAggregate> {
    unique_best(aggregates, |a| a.max_dist_from_centroid, Ordering::Less)
}

fn longest_time_range(aggregates: &[ClusterAggregate]) -> Option<&ClusterAggregate> {
    unique_best(aggregates, |a| a.time_range, Ordering::Greater)
}

type Rule = fn(&[ClusterAggregate]) -> Option<&ClusterAggregate>;

/// The rules in the order they are tried. Every rule looks at all the clusters.
const POLICY: [(Rule, HomeReason); 3] = [
    (most_points as Rule, HomeReason::OnlyOneMaxCluster),
    (tightest as Rule, HomeReason::MinimumDistance),
    (longest_time_range as Rule, HomeReason::MaximumTimeRange),
];

/**
 * Choose the home cluster.
 *
 * The first rule to pick out a single cluster wins:
 *  1. the cluster with the most points,
 *  2. the cluster with the smallest maximum distance from its centroid,
 *  3. the cluster with the longest time range.
 *
 * If all of them end in ties the result is [HomeDecision::Undecided]. An empty slice is
 * [HomeDecision::NoClusters].
 */
pub fn select_home(aggregates: &[ClusterAggregate]) -> HomeDecision {
    if aggregates.is_empty() {
        return HomeDecision::NoClusters;
    }

    POLICY
        .iter()
        .find_map(|(rule, reason)| rule(aggregates).map(|agg| (agg, *reason)))
        .map(|(agg, reason)| HomeDecision::Home {
            cluster_id: agg.cluster_id,
            reason,
            centroid: agg.centroid,
            count: agg.count,
        })
        .unwrap_or(HomeDecision::Undecided)
}

/// The fixed parameters of the home location pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HomeParams {
    pub dbscan: DbscanParams,
    pub home_period: HomePeriod,
}

/// The home decision along with diagnostics about how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeLocation {
    /// Whether there was anything left to cluster after preprocessing.
    pub clustering_attempted: bool,
    pub n_burst_records: usize,
    pub n_home_period_records: usize,
    /// Only available if clustering was attempted.
    pub point_types: Option<PointTypeCounts>,
    pub decision: HomeDecision,
}

/**
 * Run the whole home location pipeline for one user.
 *
 * #Arguments
 * records - all the records of a single user, in the order they were stored.
 * localizer - resolves local times, its cache should not outlive this user.
 * params - clustering and home period parameters.
 * artifacts - if given, the clustering snapshot and cluster aggregates are saved here.
 */
pub fn infer_home(
    records: &[Record],
    localizer: &mut DatetimeLocalizer,
    params: &HomeParams,
    artifacts: Option<&ArtifactStore>,
) -> HomeResult<HomeLocation> {
    let pre = preprocess(records, localizer, &params.home_period)?;

    let mut location = HomeLocation {
        clustering_attempted: false,
        n_burst_records: pre.n_burst_records,
        n_home_period_records: pre.n_home_period_records,
        point_types: None,
        decision: HomeDecision::NoRecordsInHomePeriod,
    };

    // If there are any records left, there was at least one to begin with.
    let user_id = match pre.records.first() {
        Some(rec) => rec.record.user_id,
        None => return Ok(location),
    };

    let coords: Vec<Coord> = pre.records.iter().map(|r| r.coord()).collect();
    let assignments = dbscan(&coords, &params.dbscan);
    let counts = count_point_types(&assignments);

    if log::log_enabled!(log::Level::Debug) {
        let summary: Vec<String> = PointType::iter()
            .map(|t| format!("{} {}", counts.get(t), t.name()))
            .collect();
        debug!("user {}: {}", user_id, summary.join(", "));
    }

    location.clustering_attempted = true;
    location.point_types = Some(counts);

    if let Some(artifacts) = artifacts {
        artifacts.write_cluster_snapshot(user_id, &pre.records, &assignments)?;
    }

    if assignments.iter().all(|a| a.cluster_id.is_none()) {
        location.decision = HomeDecision::NoClusters;
        return Ok(location);
    }

    // DBSCAN*, only the core points matter from here on.
    let core_points: Vec<CorePoint> = pre
        .records
        .iter()
        .zip(&assignments)
        .filter(|(_, a)| a.point_type == PointType::Core)
        .filter_map(|(rec, a)| {
            a.cluster_id.map(|cluster_id| CorePoint {
                coord: rec.coord(),
                time: rec.local,
                cluster_id,
            })
        })
        .collect();

    let aggregates = aggregate_clusters(&core_points);

    if let Some(artifacts) = artifacts {
        artifacts.write_cluster_aggregates(user_id, &aggregates)?;
    }

    location.decision = select_home(&aggregates);
    debug!("user {}: {:?}", user_id, location.decision);

    Ok(location)
}
