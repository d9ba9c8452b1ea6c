/*! The geotagged posts everything else in the crate works with. */

use crate::geo::Coord;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};

/// A single geotagged post as it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The creation time exactly as it came from the source, time zone unknown.
    pub created_at: String,
    /// The display name of the user at the time of posting.
    pub user_name: String,
    pub user_id: i64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Record {
    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// A [Record] with its time resolved to the local time where it was posted.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedRecord<'a> {
    pub record: &'a Record,
    /// The local date and time. When the time zone could not be resolved this is the parsed
    /// timestamp in whatever offset the source used.
    pub local: DateTime<FixedOffset>,
    /// The IANA name of the time zone, if it was resolved.
    pub tz_name: Option<&'static str>,
}

impl<'a> LocalizedRecord<'a> {
    pub fn weekday(&self) -> Weekday {
        self.local.weekday()
    }

    pub fn hour(&self) -> u32 {
        self.local.hour()
    }

    pub fn coord(&self) -> Coord {
        self.record.coord()
    }

    /// The time zone name, or the UTC offset if no zone was resolved.
    pub fn zone_label(&self) -> String {
        match self.tz_name {
            Some(name) => name.to_owned(),
            None => self.local.offset().to_string(),
        }
    }
}
