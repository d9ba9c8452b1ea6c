/*!
 * Turn the source timestamps into local times.
 *
 * The source timestamps carry no information about where the post was made, so the local time
 * zone is looked up from the coordinates of the post. Looking up the zone name is done with a
 * [TimeZoneFinder] that should be created once and shared, while the parsed zones are kept in a
 * [ZoneCache] that lives only as long as the processing of a single user.
 */

use crate::{record::LocalizedRecord, HomeResult, Record};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap as HashMap;

/// Parse a timestamp as it is stored in the record database.
///
/// The native format of the Twitter API (`Wed Oct 10 20:19:24 +0000 2018`) is tried first, then
/// RFC 3339 and RFC 2822. Timestamps without any offset (`2018-10-10 20:19:24`) are taken to be
/// UTC.
pub fn parse_timestamp(text: &str) -> HomeResult<DateTime<FixedOffset>> {
    const TWITTER_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
    const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_str(text, TWITTER_FORMAT) {
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt);
    }

    let naive = NaiveDateTime::parse_from_str(text, NAIVE_FORMAT)
        .map_err(|err| format!("unable to parse timestamp '{}': {}", text, err))?;
    let utc = FixedOffset::east_opt(0).ok_or("invalid UTC offset")?;

    Ok(utc.from_utc_datetime(&naive))
}

/// Finds the name of the time zone at a location.
pub struct TimeZoneFinder(tzf_rs::DefaultFinder);

impl TimeZoneFinder {
    /// This loads the time zone boundaries, so it is slow. Make one and share it.
    pub fn new() -> Self {
        TimeZoneFinder(tzf_rs::DefaultFinder::new())
    }

    /// A finder shared by the whole process, loaded on first use.
    pub fn global() -> &'static Self {
        static FINDER: OnceCell<TimeZoneFinder> = OnceCell::new();
        FINDER.get_or_init(TimeZoneFinder::new)
    }

    /// The IANA name of the time zone at this location, if there is one.
    pub fn zone_name(&self, lon: f64, lat: f64) -> Option<&str> {
        let name = self.0.get_tz_name(lon, lat);
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

impl Default for TimeZoneFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed time zones keyed by zone name.
///
/// Names that could not be turned into a time zone are remembered too, so they are only
/// reported once.
#[derive(Debug, Default)]
pub struct ZoneCache {
    zones: HashMap<String, Option<Tz>>,
}

impl ZoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the time zone for a name, parsing it on first use.
    pub fn get(&mut self, name: &str) -> Option<Tz> {
        if let Some(zone) = self.zones.get(name) {
            return *zone;
        }

        let zone = name.parse::<Tz>().ok();
        if zone.is_none() {
            warn!("unrecognized time zone name: {}", name);
        }

        self.zones.insert(name.to_owned(), zone);
        zone
    }

    /// The number of distinct zone names seen.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Resolves the local time of records.
pub struct DatetimeLocalizer<'a> {
    finder: &'a TimeZoneFinder,
    cache: ZoneCache,
}

impl<'a> DatetimeLocalizer<'a> {
    /// Create a localizer with an empty cache.
    pub fn new(finder: &'a TimeZoneFinder) -> Self {
        Self::with_cache(finder, ZoneCache::new())
    }

    pub fn with_cache(finder: &'a TimeZoneFinder, cache: ZoneCache) -> Self {
        DatetimeLocalizer { finder, cache }
    }

    /// Look up the time zone at a location.
    pub fn lookup_tz(&mut self, lon: f64, lat: f64) -> Option<Tz> {
        let name = self.finder.zone_name(lon, lat)?;
        self.cache.get(name)
    }

    /// Localize a record.
    ///
    /// If no time zone can be found for the record's location, the parsed timestamp is used as
    /// is. The only error is a timestamp that cannot be parsed at all.
    pub fn localize<'r>(&mut self, record: &'r Record) -> HomeResult<LocalizedRecord<'r>> {
        let parsed = parse_timestamp(&record.created_at)?;

        match self.lookup_tz(record.lon, record.lat) {
            Some(tz) => {
                let zoned = parsed.with_timezone(&tz);
                let offset = zoned.offset().fix();

                Ok(LocalizedRecord {
                    record,
                    local: zoned.with_timezone(&offset),
                    tz_name: Some(tz.name()),
                })
            }
            None => {
                debug!(
                    "no time zone for ({}, {}), using unlocalized time",
                    record.lon, record.lat
                );

                Ok(LocalizedRecord {
                    record,
                    local: parsed,
                    tz_name: None,
                })
            }
        }
    }

    pub fn cache(&self) -> &ZoneCache {
        &self.cache
    }

    pub fn into_cache(self) -> ZoneCache {
        self.cache
    }
}
