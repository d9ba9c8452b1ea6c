use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike, Weekday};
use homefinder::{
    aggregate_clusters, count_point_types, dbscan, filter_home_period, remove_burst_records,
    select_home, ClusterAggregate, Coord, CorePoint, DbscanParams, HomeDecision, HomePeriod,
    LocalizedRecord, PointType, Record,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn record(created_at: String, lon: f64, lat: f64) -> Record {
    Record {
        created_at,
        user_name: "someone".to_owned(),
        user_id: 1,
        lon,
        lat,
    }
}

/// Records drawn from a small pool of times and places, so duplicates are common.
fn burst_records() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec((0..4u32, 0..3u32, 0..3u32), 0..40).prop_map(|picks| {
        picks
            .into_iter()
            .map(|(t, x, y)| {
                record(
                    format!("Mon Jul 02 2{}:00:00 +0000 2018", t),
                    -71.0 + 0.0001 * x as f64,
                    42.0 + 0.0001 * y as f64,
                )
            })
            .collect()
    })
}

/// Points clumped into a small area so there are clusters, boundary points, and noise.
fn points() -> impl Strategy<Value = Vec<Coord>> {
    prop::collection::vec((0..40i32, 0..40i32), 0..60).prop_map(|cells| {
        cells
            .into_iter()
            .map(|(x, y)| Coord::new(-71.0 + 0.0001 * x as f64, 42.0 + 0.0001 * y as f64))
            .collect()
    })
}

fn local_time(secs: i64, offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
    let naive = NaiveDateTime::from_timestamp_opt(secs, 0).unwrap();
    offset.from_utc_datetime(&naive)
}

fn aggregates() -> impl Strategy<Value = Vec<ClusterAggregate>> {
    prop::collection::vec((1..4usize, 0..3u32, 0..3i64), 0..6).prop_map(|clusters| {
        clusters
            .into_iter()
            .enumerate()
            .map(|(i, (count, dist, time_range))| ClusterAggregate {
                cluster_id: i as u32,
                centroid: Coord::new(-71.0 + i as f64, 42.0),
                time_range: time_range * 3600,
                max_dist_from_centroid: dist as f64 * 10.0,
                count,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn burst_removal_leaves_unique_records(records in burst_records()) {
        let kept = remove_burst_records(&records);
        prop_assert!(kept.len() <= records.len());

        let mut seen = HashSet::new();
        for rec in &kept {
            prop_assert!(seen.insert((rec.created_at.clone(), rec.lon.to_bits(), rec.lat.to_bits())));
        }

        // Every group is still represented.
        for rec in &records {
            prop_assert!(seen.contains(&(rec.created_at.clone(), rec.lon.to_bits(), rec.lat.to_bits())));
        }
    }

    #[test]
    fn home_period_filter_is_idempotent(
        times in prop::collection::vec((1_500_000_000i64..1_600_000_000i64, -11..12i32), 0..30)
    ) {
        let rec = record("unused".to_owned(), -71.0, 42.0);
        let localized: Vec<LocalizedRecord> = times
            .iter()
            .map(|&(secs, offset)| LocalizedRecord {
                record: &rec,
                local: local_time(secs, offset),
                tz_name: None,
            })
            .collect();

        let period = HomePeriod::default();
        let once = filter_home_period(localized, &period);

        for r in &once {
            prop_assert!(r.local.weekday().num_days_from_monday() <= Weekday::Thu.num_days_from_monday());
            prop_assert!(r.local.hour() >= period.start_hour);
        }

        let twice = filter_home_period(once.clone(), &period);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dbscan_counts_add_up(points in points()) {
        let assignments = dbscan(&points, &DbscanParams::default());
        prop_assert_eq!(assignments.len(), points.len());

        let counts = count_point_types(&assignments);
        prop_assert_eq!(counts.core + counts.boundary + counts.noise, points.len());

        for a in &assignments {
            prop_assert_eq!(a.cluster_id.is_none(), a.point_type == PointType::Noise);
        }
    }

    #[test]
    fn aggregates_match_core_points(points in points()) {
        let assignments = dbscan(&points, &DbscanParams::default());
        let t0 = local_time(1_530_000_000, 0);

        let core: Vec<CorePoint> = points
            .iter()
            .zip(&assignments)
            .filter(|(_, a)| a.point_type == PointType::Core)
            .filter_map(|(&coord, a)| a.cluster_id.map(|cluster_id| CorePoint { coord, time: t0, cluster_id }))
            .collect();

        for agg in aggregate_clusters(&core) {
            let members: Vec<&CorePoint> = core.iter().filter(|p| p.cluster_id == agg.cluster_id).collect();
            prop_assert_eq!(agg.count, members.len());

            let eps = 1.0e-9;
            let min_lon = members.iter().map(|p| p.coord.lon).fold(f64::INFINITY, f64::min);
            let max_lon = members.iter().map(|p| p.coord.lon).fold(f64::NEG_INFINITY, f64::max);
            let min_lat = members.iter().map(|p| p.coord.lat).fold(f64::INFINITY, f64::min);
            let max_lat = members.iter().map(|p| p.coord.lat).fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(agg.centroid.lon >= min_lon - eps && agg.centroid.lon <= max_lon + eps);
            prop_assert!(agg.centroid.lat >= min_lat - eps && agg.centroid.lat <= max_lat + eps);
            prop_assert_eq!(agg.time_range, 0);
        }
    }

    #[test]
    fn home_selection_is_deterministic(aggregates in aggregates()) {
        let first = select_home(&aggregates);
        prop_assert_eq!(&first, &select_home(&aggregates));

        let mut reversed = aggregates.clone();
        reversed.reverse();
        prop_assert_eq!(&first, &select_home(&reversed));

        match first {
            HomeDecision::Home { cluster_id, count, .. } => {
                prop_assert!(aggregates
                    .iter()
                    .any(|a| a.cluster_id == cluster_id && a.count == count));
            }
            HomeDecision::NoClusters => prop_assert!(aggregates.is_empty()),
            HomeDecision::Undecided => prop_assert!(aggregates.len() > 1),
            HomeDecision::NoRecordsInHomePeriod => prop_assert!(false, "not a selector result"),
        }
    }
}
