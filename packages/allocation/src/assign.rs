//! Nearest-facility assignment and per-facility service statistics.
//!
//! Every zone is measured from its centroid to every facility in the
//! planar frame and handed to the closest one. Zones are independent, so
//! the search runs in parallel; the per-facility totals are merged on one
//! thread afterwards.
//!
//! A zone's assigned precinct is the precinct of its facility, which can
//! differ from the precinct the zone sits in geographically.

use std::collections::BTreeMap;

use coverage_map_allocation_models::{FacilityRecord, ServiceAreaStats, ZoneAssignment};
use coverage_map_spatial::Zone;
use coverage_map_spatial::projection::METRES_PER_KM;
use geo::{Distance, Euclidean, Point};
use rayon::prelude::*;

use crate::optimize::Facility;

/// A facility together with the statistics of the zones it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedFacility {
    pub facility: Facility,
    pub service: ServiceAreaStats,
}

impl ServedFacility {
    /// Flattens into the geometry-free output record.
    #[must_use]
    pub fn record(&self) -> FacilityRecord {
        FacilityRecord {
            facility_id: self.facility.id.clone(),
            precinct_id: self.facility.precinct_id,
            cluster_size: self.facility.cluster_size,
            service: self.service,
        }
    }
}

/// Output of [`assign`]: facilities with service statistics, and one
/// assignment per input zone in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub facilities: Vec<ServedFacility>,
    pub zones: Vec<ZoneAssignment>,
}

/// Index of and distance (metres) to the nearest facility.
///
/// Facilities are scanned in order and only a strictly smaller distance
/// replaces the current best, so ties go to the facility listed first.
#[must_use]
pub fn nearest_facility(point: Point<f64>, facilities: &[Facility]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, facility) in facilities.iter().enumerate() {
        let d = Euclidean.distance(point, facility.location);
        if best.is_none_or(|(_, current)| d < current) {
            best = Some((i, d));
        }
    }
    best
}

#[derive(Default)]
struct Accumulator {
    area_sq_km: f64,
    distance_km: f64,
    count: u64,
}

/// Assigns every zone to its nearest facility.
///
/// With no facilities at all, every zone is left unassigned. The
/// `home_precinct_id` field is not filled here; it needs the precinct
/// geometry (see [`crate::pipeline`]).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn assign(zones: &[Zone], facilities: &[Facility]) -> Assignment {
    if facilities.is_empty() {
        log::warn!(
            "No facilities to assign {} zones to; all zones left unassigned",
            zones.len()
        );
    }

    let nearest: Vec<Option<(usize, f64)>> = zones
        .par_iter()
        .map(|zone| nearest_facility(zone.centroid(), facilities))
        .collect();

    let mut totals: BTreeMap<usize, Accumulator> = BTreeMap::new();
    let mut assignments = Vec::with_capacity(zones.len());

    for (zone, hit) in zones.iter().zip(nearest) {
        let hit = hit.map(|(index, metres)| (index, metres / METRES_PER_KM));

        if let Some((index, distance_km)) = hit {
            let acc = totals.entry(index).or_default();
            acc.area_sq_km += zone.area_sq_km();
            acc.distance_km += distance_km;
            acc.count += 1;
        }

        assignments.push(ZoneAssignment {
            zone_id: zone.id().to_string(),
            area_sq_km: zone.area_sq_km(),
            nearest_facility_id: hit.map(|(i, _)| facilities[i].id.clone()),
            distance_km: hit.map(|(_, d)| d),
            assigned_precinct_id: hit.map(|(i, _)| facilities[i].precinct_id),
            home_precinct_id: None,
        });
    }

    let served = facilities
        .iter()
        .enumerate()
        .map(|(i, facility)| {
            let service = totals
                .get(&i)
                .map_or_else(ServiceAreaStats::default, |acc| ServiceAreaStats {
                    service_area_sq_km: acc.area_sq_km,
                    avg_distance_km: acc.distance_km / acc.count as f64,
                    zipcode_count: acc.count,
                });
            ServedFacility {
                facility: facility.clone(),
                service,
            }
        })
        .collect::<Vec<_>>();

    let idle = served
        .iter()
        .filter(|f| f.service.zipcode_count == 0)
        .count();
    log::info!(
        "Assigned {} zones to {} facilities ({idle} serve no zones)",
        assignments.iter().filter(|z| z.nearest_facility_id.is_some()).count(),
        served.len()
    );

    Assignment {
        facilities: served,
        zones: assignments,
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};
    use serde_json::Map;

    use super::*;

    fn square_zone(id: &str, cx: f64, cy: f64, side: f64) -> Zone {
        let h = side / 2.0;
        let polygon = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (cx - h, cy - h),
                (cx + h, cy - h),
                (cx + h, cy + h),
                (cx - h, cy + h),
                (cx - h, cy - h),
            ]),
            vec![],
        )]);
        Zone::new(id, polygon, Map::new()).unwrap()
    }

    fn facility(id: &str, precinct_id: i64, x: f64, y: f64) -> Facility {
        Facility {
            id: id.to_string(),
            precinct_id,
            location: Point::new(x, y),
            cluster_size: 1,
        }
    }

    #[test]
    fn assigns_nearest_and_converts_to_km() {
        let zones = vec![
            square_zone("a", 1_000.0, 0.0, 1_000.0),
            square_zone("b", 9_000.0, 0.0, 1_000.0),
        ];
        let facilities = vec![
            facility("S1_1", 1, 0.0, 0.0),
            facility("S2_1", 2, 12_000.0, 4_000.0),
        ];

        let result = assign(&zones, &facilities);

        assert_eq!(result.zones[0].nearest_facility_id.as_deref(), Some("S1_1"));
        assert!((result.zones[0].distance_km.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(result.zones[0].assigned_precinct_id, Some(1));

        assert_eq!(result.zones[1].nearest_facility_id.as_deref(), Some("S2_1"));
        assert!((result.zones[1].distance_km.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(result.zones[1].assigned_precinct_id, Some(2));
    }

    #[test]
    fn no_facility_is_closer_than_the_assigned_one() {
        let zones: Vec<Zone> = (0..25)
            .map(|i| {
                let (x, y) = (f64::from(i % 5) * 2_000.0, f64::from(i / 5) * 2_000.0);
                square_zone(&format!("z{i}"), x, y, 500.0)
            })
            .collect();
        let facilities = vec![
            facility("S1_1", 1, 1_000.0, 1_000.0),
            facility("S1_2", 1, 7_500.0, 2_000.0),
            facility("S2_1", 2, 3_000.0, 7_000.0),
            facility("S2_2", 2, 8_000.0, 8_000.0),
        ];

        let result = assign(&zones, &facilities);
        for (zone, assignment) in zones.iter().zip(&result.zones) {
            let assigned = assignment.distance_km.unwrap();
            for f in &facilities {
                let d = Euclidean.distance(zone.centroid(), f.location) / METRES_PER_KM;
                assert!(d >= assigned - 1e-12, "{} closer to {}", zone.id(), f.id);
            }
        }
    }

    #[test]
    fn tie_goes_to_first_facility() {
        let zones = vec![square_zone("mid", 0.0, 0.0, 100.0)];
        let facilities = vec![
            facility("S1_1", 1, -1_000.0, 0.0),
            facility("S2_1", 2, 1_000.0, 0.0),
        ];
        let result = assign(&zones, &facilities);
        assert_eq!(result.zones[0].nearest_facility_id.as_deref(), Some("S1_1"));
    }

    #[test]
    fn aggregates_service_area_and_zero_fills_idle_facilities() {
        let zones = vec![
            square_zone("a", 0.0, 0.0, 1_000.0),
            square_zone("b", 2_000.0, 0.0, 2_000.0),
            square_zone("c", 50_000.0, 0.0, 1_000.0),
        ];
        let facilities = vec![
            facility("S1_1", 1, 1_000.0, 0.0),
            facility("S1_2", 1, 50_000.0, 3_000.0),
            facility("S1_3", 1, -90_000.0, 0.0),
        ];
        let result = assign(&zones, &facilities);

        let first = &result.facilities[0].service;
        assert_eq!(first.zipcode_count, 2);
        assert!((first.service_area_sq_km - 5.0).abs() < 1e-9);
        assert!((first.avg_distance_km - 1.0).abs() < 1e-9);

        let second = &result.facilities[1].service;
        assert_eq!(second.zipcode_count, 1);
        assert!((second.avg_distance_km - 3.0).abs() < 1e-9);

        assert_eq!(result.facilities[2].service, ServiceAreaStats::default());

        let total: f64 = result
            .facilities
            .iter()
            .map(|f| f.service.service_area_sq_km)
            .sum();
        let zone_area: f64 = zones.iter().map(Zone::area_sq_km).sum();
        assert!((total - zone_area).abs() < 1e-9);
    }

    #[test]
    fn assignment_is_idempotent() {
        let zones = vec![
            square_zone("a", 100.0, 200.0, 300.0),
            square_zone("b", 4_000.0, -2_000.0, 800.0),
        ];
        let facilities = vec![facility("S1_1", 1, 0.0, 0.0), facility("S1_2", 1, 5_000.0, 0.0)];
        assert_eq!(assign(&zones, &facilities), assign(&zones, &facilities));
    }

    #[test]
    fn zones_stay_unassigned_without_facilities() {
        let zones = vec![square_zone("a", 0.0, 0.0, 10.0)];
        let result = assign(&zones, &[]);
        assert!(result.facilities.is_empty());
        assert_eq!(result.zones[0].nearest_facility_id, None);
        assert_eq!(result.zones[0].distance_km, None);
        assert_eq!(result.zones[0].assigned_precinct_id, None);
    }

    #[test]
    fn record_carries_service_stats() {
        let served = ServedFacility {
            facility: facility("S4_2", 4, 0.0, 0.0),
            service: ServiceAreaStats {
                service_area_sq_km: 12.0,
                avg_distance_km: 2.5,
                zipcode_count: 3,
            },
        };
        let record = served.record();
        assert_eq!(record.facility_id, "S4_2");
        assert_eq!(record.precinct_id, 4);
        assert_eq!(record.service.zipcode_count, 3);
    }
}
