/*!
 * Infer the home location of a social media user from their geotagged posts.
 *
 * The core of the crate is the home location pipeline run for each user:
 *
 *  1. Burst posts (identical time and place) are removed and each post's time is localized to the
 *     time zone at its coordinates. Only posts made in the [HomePeriod] are kept.
 *  2. The remaining points are clustered with [DBSCAN](dbscan) and only the core points
 *     of each cluster are kept (DBSCAN*).
 *  3. Each cluster is summarized as a [ClusterAggregate].
 *  4. One cluster is chosen as home with [select_home].
 *
 * The home location is one of several [measures](MeasureRegistry) calculated for every user and
 * written as a single row of an output file.
 */

pub use artifacts::{ArtifactStore, AGGREGATES_OUTPUT, CLUSTERS_OUTPUT};
pub use cluster::{
    aggregate_clusters, count_point_types, dbscan, ClusterAggregate, ClusterAssignment, CorePoint,
    DbscanParams, PointType, PointTypeCounts, EPS, MIN_POINTS,
};
pub use csv::{CsvFile, CsvReader, CsvWriter};
pub use database::{AddRecordsTransaction, RecordStore};
pub use error::{MeasureConfigError, OutputSchemaError};
pub use crate::geo::{great_circle_distance, Coord, Region, EARTH_RADIUS_M};
pub use home::{
    infer_home, select_home, HomeDecision, HomeLocation, HomeParams, HomeReason, NO_HOME_CLUSTER,
};
pub use measures::{
    HomeLocationMeasure, Measure, MeasureOutput, MeasureRecord, MeasureRegistry, MeasureValue,
    RecordsInRegion, ScalarMeasure, MOST_FREQUENT_NAME, MOST_RECENT_NAME, NUM_RECORDS,
    UNIQUE_DAYS, USER_ID_KEY,
};
pub use output::MeasureOutputFile;
pub use preprocess::{
    filter_home_period, preprocess, remove_burst_records, HomePeriod, Preprocessed,
    HOME_PERIOD_LAST_WEEKDAY, HOME_PERIOD_START_HOUR,
};
pub use record::{LocalizedRecord, Record};
pub use timezone::{parse_timestamp, DatetimeLocalizer, TimeZoneFinder, ZoneCache};

/// Result type used throughout the crate.
pub type HomeResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod artifacts;
mod cluster;
mod csv;
mod database;
mod error;
mod geo;
mod home;
mod measures;
mod output;
mod preprocess;
mod record;
mod timezone;
