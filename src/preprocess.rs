/*!
 * Prepare a user's records for clustering.
 *
 * Bursts of identical posts are removed, times are localized, and only the records posted during
 * the home period are kept.
 */

use crate::{record::LocalizedRecord, timezone::DatetimeLocalizer, HomeResult, Record};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use log::debug;
use rustc_hash::FxHashSet as HashSet;
use static_assertions::const_assert;

/// The last day of the week (starting Monday) that is part of the home period.
pub const HOME_PERIOD_LAST_WEEKDAY: Weekday = Weekday::Thu;

/// The first local hour of the day (24 hour clock) that is part of the home period. The period
/// runs until midnight.
pub const HOME_PERIOD_START_HOUR: u32 = 21;

const_assert!(HOME_PERIOD_START_HOUR < 24);

/// The window of local time when people are assumed to be at home.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomePeriod {
    /// Monday through this day are included.
    pub last_weekday: Weekday,
    /// Times at or after this hour are included.
    pub start_hour: u32,
}

impl Default for HomePeriod {
    fn default() -> Self {
        HomePeriod {
            last_weekday: HOME_PERIOD_LAST_WEEKDAY,
            start_hour: HOME_PERIOD_START_HOUR,
        }
    }
}

impl HomePeriod {
    pub fn contains(&self, local: &DateTime<FixedOffset>) -> bool {
        local.weekday().num_days_from_monday() <= self.last_weekday.num_days_from_monday()
            && local.hour() >= self.start_hour
    }
}

/// The records left after preprocessing along with some statistics about what was removed.
#[derive(Debug, Clone)]
pub struct Preprocessed<'r> {
    /// Localized records in the home period, in their original order.
    pub records: Vec<LocalizedRecord<'r>>,
    /// The number of records removed as duplicates.
    pub n_burst_records: usize,
    /// The number of records in the home period, the length of `records`.
    pub n_home_period_records: usize,
}

/// Remove records with exactly the same timestamp and location as an earlier record.
///
/// Order is preserved and the first record of each group is kept.
pub fn remove_burst_records(records: &[Record]) -> Vec<&Record> {
    // Adding zero folds -0.0 into 0.0 so they group together.
    let key = |r: &Record| ((r.lon + 0.0).to_bits(), (r.lat + 0.0).to_bits());

    let mut seen: HashSet<(&str, u64, u64)> = HashSet::default();

    records
        .iter()
        .filter(|r| {
            let (lon, lat) = key(r);
            seen.insert((r.created_at.as_str(), lon, lat))
        })
        .collect()
}

/// Keep only the records in the home period.
pub fn filter_home_period<'r>(
    records: Vec<LocalizedRecord<'r>>,
    period: &HomePeriod,
) -> Vec<LocalizedRecord<'r>> {
    records
        .into_iter()
        .filter(|r| period.contains(&r.local))
        .collect()
}

/// Run all the preprocessing steps on one user's records.
///
/// Fails only if a timestamp cannot be parsed.
pub fn preprocess<'r>(
    records: &'r [Record],
    localizer: &mut DatetimeLocalizer,
    period: &HomePeriod,
) -> HomeResult<Preprocessed<'r>> {
    let deduplicated = remove_burst_records(records);
    let n_burst_records = records.len() - deduplicated.len();

    let localized = deduplicated
        .into_iter()
        .map(|r| localizer.localize(r))
        .collect::<HomeResult<Vec<_>>>()?;

    let records = filter_home_period(localized, period);
    let n_home_period_records = records.len();

    debug!(
        "preprocessing removed {} burst records, {} records in the home period",
        n_burst_records, n_home_period_records
    );

    Ok(Preprocessed {
        records,
        n_burst_records,
        n_home_period_records,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timezone::TimeZoneFinder;

    fn record(created_at: &str, lon: f64, lat: f64) -> Record {
        Record {
            created_at: created_at.to_owned(),
            user_name: "someone".to_owned(),
            user_id: 7,
            lon,
            lat,
        }
    }

    #[test]
    fn test_remove_burst_records() {
        let records = vec![
            record("Mon Jul 02 02:00:00 +0000 2018", -71.0, 42.0),
            record("Mon Jul 02 02:00:00 +0000 2018", -71.0, 42.0),
            record("Mon Jul 02 02:00:00 +0000 2018", -71.1, 42.0),
            record("Mon Jul 02 02:00:01 +0000 2018", -71.0, 42.0),
            record("Mon Jul 02 02:00:00 +0000 2018", -71.0, 42.0),
            record("Mon Jul 02 02:00:00 +0000 2018", -0.0, 0.0),
            record("Mon Jul 02 02:00:00 +0000 2018", 0.0, -0.0),
        ];

        let kept = remove_burst_records(&records);

        assert_eq!(kept.len(), 4);
        assert!(std::ptr::eq(kept[0], &records[0]));
        assert!(std::ptr::eq(kept[1], &records[2]));
        assert!(std::ptr::eq(kept[2], &records[3]));
        assert!(std::ptr::eq(kept[3], &records[5]));
    }

    #[test]
    fn test_home_period_contains() {
        let period = HomePeriod::default();
        let parse = |s| crate::timezone::parse_timestamp(s).unwrap();

        // 2018-07-02 is a Monday
        assert!(period.contains(&parse("2018-07-02T21:00:00+00:00")));
        assert!(period.contains(&parse("2018-07-05T23:59:59+00:00")));
        assert!(!period.contains(&parse("2018-07-02T20:59:59+00:00")));
        assert!(!period.contains(&parse("2018-07-06T22:00:00+00:00")));
        assert!(!period.contains(&parse("2018-07-08T22:00:00+00:00")));

        // Local time counts, not UTC.
        assert!(period.contains(&parse("2018-07-03T21:30:00-04:00")));
        assert!(!period.contains(&parse("2018-07-04T01:30:00+00:00")));
    }

    #[test]
    fn test_preprocess() {
        let finder = TimeZoneFinder::global();
        let mut localizer = DatetimeLocalizer::new(finder);

        let records = vec![
            // Tuesday 22:00 in Boston
            record("Wed Jul 04 02:00:00 +0000 2018", -71.0589, 42.3601),
            record("Wed Jul 04 02:00:00 +0000 2018", -71.0589, 42.3601),
            // Tuesday 18:00 in Boston
            record("Tue Jul 03 22:00:00 +0000 2018", -71.0589, 42.3601),
            // Saturday 22:00 in Boston
            record("Sun Jul 08 02:00:00 +0000 2018", -71.0589, 42.3601),
            // Thursday 21:15 in Boston
            record("Fri Jul 06 01:15:00 +0000 2018", -71.0600, 42.3600),
        ];

        let pre = preprocess(&records, &mut localizer, &HomePeriod::default()).unwrap();

        assert_eq!(pre.n_burst_records, 1);
        assert_eq!(pre.n_home_period_records, 2);
        assert_eq!(pre.records.len(), 2);
        assert!(std::ptr::eq(pre.records[0].record, &records[0]));
        assert!(std::ptr::eq(pre.records[1].record, &records[4]));
        assert!(pre
            .records
            .iter()
            .all(|r| r.tz_name == Some("America/New_York")));
    }
}
