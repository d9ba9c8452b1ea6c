/*!
 * Per-user measures and the registry that combines them into a single output row.
 *
 * A [Measure] either produces one value, stored under the measure's name, or several named
 * values. Every key a measure can produce is declared up front, so the registry can check that no
 * two measures write the same key and the header of the output file is known before any user is
 * processed.
 */

use crate::{
    artifacts::ArtifactStore,
    error::MeasureConfigError,
    geo::Region,
    home::{infer_home, HomeLocation, HomeParams},
    timezone::{parse_timestamp, DatetimeLocalizer, TimeZoneFinder},
    HomeResult, Record,
};
use log::debug;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// The key of the user id, added to every record by the registry.
pub const USER_ID_KEY: &str = "user_id";

/// A single value in the output.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl MeasureValue {
    /// The value as it is written to the output file. Null is an empty field.
    pub fn to_field(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for MeasureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for MeasureValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for MeasureValue {
    fn from(v: bool) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for MeasureValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for MeasureValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for MeasureValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<MeasureValue>> From<Option<T>> for MeasureValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// What a measure produces for one user.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureOutput {
    /// A single value, stored under the name of the measure.
    Scalar(MeasureValue),
    /// Several values, each under its own key.
    Fields(Vec<(&'static str, MeasureValue)>),
}

/// A summary of a user's records.
pub trait Measure {
    /// The name of the measure, which is also the output key of a scalar measure.
    fn name(&self) -> &'static str;

    /// Every key this measure may produce.
    fn output_keys(&self) -> Vec<&'static str> {
        vec![self.name()]
    }

    /// Keys this measure deliberately shares with other measures. A later measure overwrites
    /// the value of an earlier one.
    fn shared_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn compute(&self, records: &[Record]) -> HomeResult<MeasureOutput>;
}

/// All the measures for a single user, keyed by output key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureRecord {
    values: HashMap<&'static str, MeasureValue>,
}

impl MeasureRecord {
    pub fn get(&self, key: &str) -> Option<&MeasureValue> {
        self.values.get(key)
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.values.get(USER_ID_KEY) {
            Some(MeasureValue::Int(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values as output fields in `header` order. Missing keys are empty fields.
    pub fn fields(&self, header: &[&str]) -> Vec<String> {
        header
            .iter()
            .map(|key| {
                self.values
                    .get(key)
                    .map(MeasureValue::to_field)
                    .unwrap_or_default()
            })
            .collect()
    }

    fn insert(&mut self, key: &'static str, value: MeasureValue) {
        self.values.insert(key, value);
    }
}

/// The fixed list of measures calculated for every user.
pub struct MeasureRegistry<'a> {
    measures: Vec<Box<dyn Measure + 'a>>,
    header: Vec<&'static str>,
}

impl<'a> MeasureRegistry<'a> {
    /// Check that the measures agree on who owns which key and work out the output header.
    ///
    /// The header lists keys in the order the measures declare them, followed by the user id.
    pub fn new(measures: Vec<Box<dyn Measure + 'a>>) -> HomeResult<Self> {
        let mut owners: HashMap<&'static str, &'static str> = HashMap::default();
        let mut header = vec![];

        for measure in &measures {
            let mut own_keys: HashSet<&'static str> = HashSet::default();

            for key in measure.output_keys() {
                if key == USER_ID_KEY {
                    return Err(MeasureConfigError {
                        msg: format!("measure {} may not produce '{}'", measure.name(), key),
                    }
                    .into());
                }

                if !own_keys.insert(key) {
                    return Err(MeasureConfigError {
                        msg: format!("measure {} declares '{}' twice", measure.name(), key),
                    }
                    .into());
                }

                match owners.get(key) {
                    None => {
                        owners.insert(key, measure.name());
                        header.push(key);
                    }
                    Some(owner) => {
                        let owner_shares = measures
                            .iter()
                            .filter(|m| m.name() == *owner)
                            .all(|m| m.shared_keys().contains(&key));

                        if !(owner_shares && measure.shared_keys().contains(&key)) {
                            return Err(MeasureConfigError {
                                msg: format!(
                                    "measures {} and {} both produce '{}'",
                                    owner,
                                    measure.name(),
                                    key
                                ),
                            }
                            .into());
                        }
                    }
                }
            }
        }

        header.push(USER_ID_KEY);

        Ok(MeasureRegistry { measures, header })
    }

    /// The standard set of measures.
    ///
    /// #Arguments
    /// finder - used to localize times for the home location.
    /// region - the area counted by `n_tweets_in_region`, if any.
    /// artifacts - where to save the clustering results, if anywhere.
    pub fn standard(
        finder: &'a TimeZoneFinder,
        region: Option<Region>,
        artifacts: Option<ArtifactStore>,
    ) -> HomeResult<Self> {
        let measures: Vec<Box<dyn Measure + 'a>> = vec![
            Box::new(HomeLocationMeasure {
                finder,
                params: HomeParams::default(),
                artifacts,
            }),
            Box::new(MOST_FREQUENT_NAME),
            Box::new(MOST_RECENT_NAME),
            Box::new(NUM_RECORDS),
            Box::new(RecordsInRegion { region }),
            Box::new(UNIQUE_DAYS),
        ];

        Self::new(measures)
    }

    /// Every key in a [MeasureRecord], in output order.
    pub fn header(&self) -> &[&'static str] {
        &self.header
    }

    /// Calculate all the measures for one user's records.
    pub fn run(&self, records: &[Record]) -> HomeResult<MeasureRecord> {
        let user_id = match records.first() {
            Some(rec) => rec.user_id,
            None => return Err("no records to measure".into()),
        };

        let mut result = MeasureRecord::default();

        for measure in &self.measures {
            let declared = measure.output_keys();

            let values = match measure.compute(records)? {
                MeasureOutput::Scalar(value) => vec![(measure.name(), value)],
                MeasureOutput::Fields(values) => values,
            };

            for (key, value) in values {
                if !declared.contains(&key) {
                    return Err(MeasureConfigError {
                        msg: format!("measure {} produced undeclared key '{}'", measure.name(), key),
                    }
                    .into());
                }

                result.insert(key, value);
            }
        }

        result.insert(USER_ID_KEY, MeasureValue::Int(user_id));
        debug!("user {}: {} measures", user_id, result.len());

        Ok(result)
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                     Home location
 *-----------------------------------------------------------------------------------------------*/
const HOME_LOCATION_KEYS: [&str; 11] = [
    "clustering_attempted",
    "n_dbscan_core_tweets",
    "n_dbscan_boundary_tweets",
    "n_dbscan_noise_tweets",
    "n_burst_tweets",
    "n_home_period_tweets",
    "home_cluster_id",
    "home_cluster_reason",
    "home_cluster_centroid_lon",
    "home_cluster_centroid_lat",
    "home_cluster_count",
];

/// The home location along with the statistics of how it was found.
pub struct HomeLocationMeasure<'a> {
    pub finder: &'a TimeZoneFinder,
    pub params: HomeParams,
    pub artifacts: Option<ArtifactStore>,
}

impl<'a> Measure for HomeLocationMeasure<'a> {
    fn name(&self) -> &'static str {
        "home_location"
    }

    fn output_keys(&self) -> Vec<&'static str> {
        HOME_LOCATION_KEYS.to_vec()
    }

    fn compute(&self, records: &[Record]) -> HomeResult<MeasureOutput> {
        // A fresh zone cache for every user.
        let mut localizer = DatetimeLocalizer::new(self.finder);
        let location = infer_home(records, &mut localizer, &self.params, self.artifacts.as_ref())?;

        Ok(MeasureOutput::Fields(home_location_fields(&location)))
    }
}

fn home_location_fields(location: &HomeLocation) -> Vec<(&'static str, MeasureValue)> {
    let HomeLocation {
        clustering_attempted,
        n_burst_records,
        n_home_period_records,
        point_types,
        decision,
    } = location;

    let centroid = decision.centroid();

    let values: [MeasureValue; 11] = [
        (*clustering_attempted).into(),
        point_types.map(|c| c.core).into(),
        point_types.map(|c| c.boundary).into(),
        point_types.map(|c| c.noise).into(),
        (*n_burst_records).into(),
        (*n_home_period_records).into(),
        decision.home_cluster_id().into(),
        decision.reason().map(|r| r.as_str()).into(),
        centroid.map(|c| c.lon).into(),
        centroid.map(|c| c.lat).into(),
        decision.count().into(),
    ];

    HOME_LOCATION_KEYS.into_iter().zip(values).collect()
}

/*-------------------------------------------------------------------------------------------------
 *                                     Simple measures
 *-----------------------------------------------------------------------------------------------*/
/// A measure that is just a function of the records producing a single value.
#[derive(Clone, Copy)]
pub struct ScalarMeasure {
    pub name: &'static str,
    pub func: fn(&[Record]) -> HomeResult<MeasureValue>,
}

impl Measure for ScalarMeasure {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compute(&self, records: &[Record]) -> HomeResult<MeasureOutput> {
        (self.func)(records).map(MeasureOutput::Scalar)
    }
}

/// The most frequently used user name. Ties go to the name that sorts first.
pub const MOST_FREQUENT_NAME: ScalarMeasure = ScalarMeasure {
    name: "most_frequent_name",
    func: most_frequent_name,
};

/// The user name on the last record.
pub const MOST_RECENT_NAME: ScalarMeasure = ScalarMeasure {
    name: "most_recent_name",
    func: most_recent_name,
};

/// The number of records.
pub const NUM_RECORDS: ScalarMeasure = ScalarMeasure {
    name: "n_tweets",
    func: num_records,
};

/// The number of distinct (UTC) days with a record.
pub const UNIQUE_DAYS: ScalarMeasure = ScalarMeasure {
    name: "unique_days",
    func: unique_days,
};

fn most_frequent_name(records: &[Record]) -> HomeResult<MeasureValue> {
    let mut counts: HashMap<&str, usize> = HashMap::default();
    for rec in records {
        *counts.entry(rec.user_name.as_str()).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        best = match best {
            Some((best_name, best_count))
                if best_count > count || (best_count == count && best_name < name) =>
            {
                Some((best_name, best_count))
            }
            _ => Some((name, count)),
        };
    }

    Ok(best.map(|(name, _)| name).into())
}

fn most_recent_name(records: &[Record]) -> HomeResult<MeasureValue> {
    Ok(records.last().map(|r| r.user_name.as_str()).into())
}

fn num_records(records: &[Record]) -> HomeResult<MeasureValue> {
    Ok(records.len().into())
}

fn unique_days(records: &[Record]) -> HomeResult<MeasureValue> {
    let mut days = HashSet::default();
    for rec in records {
        days.insert(parse_timestamp(&rec.created_at)?.naive_utc().date());
    }

    Ok(days.len().into())
}

/// The number of records inside a region. Null if there is no region.
pub struct RecordsInRegion {
    pub region: Option<Region>,
}

impl Measure for RecordsInRegion {
    fn name(&self) -> &'static str {
        "n_tweets_in_region"
    }

    fn compute(&self, records: &[Record]) -> HomeResult<MeasureOutput> {
        let value = self
            .region
            .as_ref()
            .map(|region| records.iter().filter(|r| region.contains(r.coord())).count());

        Ok(MeasureOutput::Scalar(value.into()))
    }
}
