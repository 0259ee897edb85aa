//! Geo-math primitives.
//!
//! Pure functions over [`Position`] values: great-circle distance, speed,
//! glitch-tolerant track length, plausibility filters and the unit
//! conversions used for display. No state, no failure modes: degenerate
//! inputs (identical points, missing or non-increasing timestamps) resolve
//! to zero.

use crate::position::PositionConfig;
use crate::types::Position;

/// Mean Earth radius in meters (6371 km).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single hop at or above this length is a GPS glitch, not motion.
pub const MAX_JUMP_M: f64 = 1000.0;

/// Positions with a worse accuracy radius than this are discarded.
pub const MAX_ACCURACY_M: f64 = 50.0;

/// Slowest plausible walking speed (1.8 km/h).
pub const MIN_WALKING_SPEED_MPS: f64 = 0.5;

/// Fastest plausible walking speed (9 km/h).
pub const MAX_WALKING_SPEED_MPS: f64 = 2.5;

/// Displacement above which two fixes count as movement.
pub const DEFAULT_MOVING_THRESHOLD_M: f64 = 5.0;

const MPS_TO_KMH: f64 = 3.6;

/// Great-circle distance between two positions in meters (haversine).
pub fn distance(p1: &Position, p2: &Position) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Speed between two timestamped positions in m/s.
///
/// Returns 0 when either timestamp is missing or the elapsed time is not
/// positive. A timestamp of 0 is a real instant, not a missing one.
pub fn speed(p1: &Position, p2: &Position) -> f64 {
    let (Some(t1), Some(t2)) = (p1.timestamp_ms, p2.timestamp_ms) else {
        return 0.0;
    };
    if t2 <= t1 {
        return 0.0;
    }
    let elapsed_s = (t2 - t1) as f64 / 1000.0;
    distance(p1, p2) / elapsed_s
}

/// Sum of consecutive hop distances, skipping any hop of 1000 m or more.
pub fn total_distance(positions: &[Position]) -> f64 {
    total_distance_with_limit(positions, MAX_JUMP_M)
}

/// [`total_distance`] with an explicit glitch threshold.
pub fn total_distance_with_limit(positions: &[Position], max_jump_m: f64) -> f64 {
    positions
        .windows(2)
        .map(|pair| distance(&pair[0], &pair[1]))
        .filter(|hop| *hop < max_jump_m)
        .sum()
}

/// True iff an accuracy radius was reported and is at most 50 m.
pub fn is_accurate_position(accuracy_m: Option<f64>) -> bool {
    is_accurate_within(accuracy_m, MAX_ACCURACY_M)
}

/// [`is_accurate_position`] with an explicit accuracy limit.
pub fn is_accurate_within(accuracy_m: Option<f64>, max_accuracy_m: f64) -> bool {
    matches!(accuracy_m, Some(a) if a <= max_accuracy_m)
}

/// True iff `speed_mps` lies in the human walking band, 0.5 to 2.5 m/s inclusive.
pub fn is_walking_speed(speed_mps: f64) -> bool {
    (MIN_WALKING_SPEED_MPS..=MAX_WALKING_SPEED_MPS).contains(&speed_mps)
}

/// True when the displacement between two fixes exceeds `threshold_m`.
pub fn is_moving(p1: &Position, p2: &Position, threshold_m: f64) -> bool {
    distance(p1, p2) > threshold_m
}

/// Drop implausible points from a noisy track.
///
/// The first point is always kept. Each later point is compared against the
/// last point that was kept: it survives only if that hop is shorter than the
/// glitch threshold and its speed is either unknown (0) or a walking speed.
pub fn filter_positions(positions: &[Position]) -> Vec<Position> {
    filter_positions_with(positions, &PositionConfig::default())
}

/// [`filter_positions`] using thresholds from `config`.
pub fn filter_positions_with(positions: &[Position], config: &PositionConfig) -> Vec<Position> {
    let Some((first, rest)) = positions.split_first() else {
        return Vec::new();
    };

    let walking = config.min_walking_speed_mps..=config.max_walking_speed_mps;
    let mut kept = Vec::with_capacity(positions.len());
    kept.push(*first);

    for current in rest {
        let last = kept[kept.len() - 1];
        let hop = distance(&last, current);
        let v = speed(&last, current);
        if hop < config.max_jump_m && (v == 0.0 || walking.contains(&v)) {
            kept.push(*current);
        }
    }

    kept
}

/// Convert m/s to km/h.
pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * MPS_TO_KMH
}

/// Render a distance: whole meters below 1 km, one-decimal kilometers above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Render a speed given in m/s as one-decimal km/h.
pub fn format_speed(speed_mps: f64) -> String {
    format!("{:.1}km/h", mps_to_kmh(speed_mps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Offset a point due north by `meters`.
    fn north_of(p: &Position, meters: f64) -> Position {
        let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
        Position {
            latitude: p.latitude + d_lat,
            ..*p
        }
    }

    #[test]
    fn test_distance_identical_points_is_zero() {
        let p = Position::new(35.6812, 139.7671);
        assert_eq!(distance(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let tokyo = Position::new(35.6812, 139.7671);
        let osaka = Position::new(34.7025, 135.4959);
        assert_eq!(distance(&tokyo, &osaka), distance(&osaka, &tokyo));
    }

    #[test]
    fn test_distance_known_value() {
        // London to Paris is roughly 343.5 km
        let london = Position::new(51.5074, -0.1278);
        let paris = Position::new(48.8566, 2.3522);
        assert_relative_eq!(distance(&london, &paris), 343_560.0, epsilon = 5000.0);
    }

    #[test]
    fn test_speed_requires_timestamps() {
        let a = Position::new(35.0, 139.0);
        let b = north_of(&a, 10.0);
        assert_eq!(speed(&a, &b), 0.0);
    }

    #[test]
    fn test_speed_non_positive_elapsed_is_zero() {
        let a = Position::at(35.0, 139.0, 5_000);
        let b = Position {
            timestamp_ms: Some(5_000),
            ..north_of(&a, 10.0)
        };
        assert_eq!(speed(&a, &b), 0.0);
        let earlier = Position {
            timestamp_ms: Some(4_000),
            ..b
        };
        assert_eq!(speed(&a, &earlier), 0.0);
    }

    #[test]
    fn test_speed_treats_zero_timestamp_as_valid() {
        let origin = Position::at(35.0, 139.0, 0);
        let b = Position {
            timestamp_ms: Some(2_000),
            ..north_of(&origin, 3.0)
        };
        assert_relative_eq!(speed(&origin, &b), 1.5, epsilon = 1e-6);

        let untimed = Position::new(35.0, 139.0);
        assert_eq!(speed(&untimed, &b), 0.0);
    }

    #[test]
    fn test_speed_basic() {
        let a = Position::at(35.0, 139.0, 0);
        let b = Position {
            timestamp_ms: Some(10_000),
            ..north_of(&a, 15.0)
        };
        assert_relative_eq!(speed(&a, &b), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_total_distance_excludes_glitch_jump() {
        let a = Position::new(35.0, 139.0);
        let b = north_of(&a, 5.0);
        let c = north_of(&b, 2000.0);
        assert_eq!(total_distance(&[a, b, c]), distance(&a, &b));
    }

    #[test]
    fn test_total_distance_short_tracks() {
        assert_eq!(total_distance(&[]), 0.0);
        assert_eq!(total_distance(&[Position::new(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_total_distance_keeps_hops_after_glitch() {
        let a = Position::new(35.0, 139.0);
        let b = north_of(&a, 5.0);
        let c = north_of(&b, 2000.0);
        let d = north_of(&c, 7.0);
        let total = total_distance(&[a, b, c, d]);
        assert_relative_eq!(total, 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_accuracy_filter_boundaries() {
        assert!(!is_accurate_position(Some(51.0)));
        assert!(is_accurate_position(Some(50.0)));
        assert!(!is_accurate_position(None));
    }

    #[test]
    fn test_walking_speed_band() {
        assert!(is_walking_speed(0.5));
        assert!(is_walking_speed(2.5));
        assert!(!is_walking_speed(0.49));
        assert!(!is_walking_speed(2.51));
    }

    #[test]
    fn test_is_moving_threshold() {
        let a = Position::new(35.0, 139.0);
        assert!(!is_moving(&a, &north_of(&a, 4.0), DEFAULT_MOVING_THRESHOLD_M));
        assert!(is_moving(&a, &north_of(&a, 6.0), DEFAULT_MOVING_THRESHOLD_M));
    }

    #[test]
    fn test_filter_positions_drops_sprints_and_glitches() {
        let a = Position::at(35.0, 139.0, 0);
        // 1.2 m/s, keep
        let b = Position {
            timestamp_ms: Some(10_000),
            ..north_of(&a, 12.0)
        };
        // 10 m/s from b, drop
        let c = Position {
            timestamp_ms: Some(20_000),
            ..north_of(&b, 100.0)
        };
        // 1.0 m/s measured against b (the last kept point), keep
        let d = Position {
            timestamp_ms: Some(30_000),
            ..north_of(&b, 20.0)
        };
        let filtered = filter_positions(&[a, b, c, d]);
        assert_eq!(filtered, vec![a, b, d]);
    }

    #[test]
    fn test_filter_positions_keeps_untimed_points() {
        let a = Position::new(35.0, 139.0);
        let b = north_of(&a, 30.0);
        assert_eq!(filter_positions(&[a, b]).len(), 2);
        assert!(filter_positions(&[]).is_empty());
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(999.0), "999m");
        assert_eq!(format_distance(1500.0), "1.5km");
        assert_eq!(format_distance(0.0), "0m");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1.0), "3.6km/h");
        assert_eq!(format_speed(0.0), "0.0km/h");
    }
}
