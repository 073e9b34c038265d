//! Same-line grouping of annotation records
//!
//! Two records are on the same visual line when their vertical midlines are
//! within a tolerance of each other. There is no real line layout behind this;
//! it is a single scan over the page's records.

use crate::record::{AnnotationRecord, RecordId};
use std::collections::BTreeSet;

/// Default midline tolerance in document units.
pub const DEFAULT_GROUP_TOLERANCE: f64 = 2.0;

/// Ids of `candidates` on the selected record's page whose midline lies within
/// `tolerance` of the selected record's midline (boundary inclusive).
///
/// The selected record is part of its own group if it appears in `candidates`.
pub fn group<'a, I>(selected: &AnnotationRecord, candidates: I, tolerance: f64) -> BTreeSet<RecordId>
where
    I: IntoIterator<Item = &'a AnnotationRecord>,
{
    let midline = selected.midline();

    candidates
        .into_iter()
        .filter(|candidate| candidate.page == selected.page)
        .filter(|candidate| (candidate.midline() - midline).abs() <= tolerance)
        .map(|candidate| candidate.id.clone())
        .collect()
}

/// Group for an optional selection id, looked up among `candidates`.
///
/// Empty when nothing is selected or the id is not among the candidates.
pub fn group_for_id<'a>(
    selected_id: Option<&str>,
    candidates: &[&'a AnnotationRecord],
    tolerance: f64,
) -> BTreeSet<RecordId> {
    let Some(id) = selected_id else {
        return BTreeSet::new();
    };

    match candidates.iter().find(|record| record.id == id) {
        Some(selected) => group(selected, candidates.iter().copied(), tolerance),
        None => BTreeSet::new(),
    }
}

/// Parse a user-typed tolerance. Accepts `,` as the decimal separator and
/// rejects negative or non-numeric input.
pub fn parse_tolerance(raw: &str) -> Option<f64> {
    crate::decimal::parse_decimal(raw).filter(|value| *value >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BoundingBox;

    fn record(id: &str, page: u32, top: f64, bottom: f64) -> AnnotationRecord {
        AnnotationRecord::new(id, page, BoundingBox::new(0.0, top, 10.0, bottom), id)
    }

    fn ids(set: &BTreeSet<RecordId>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_scenario_tolerance_changes_group() {
        let first = record("1", 1, 100.0, 112.0);
        let second = record("2", 1, 101.0, 113.0);
        let page = [&first, &second];

        assert_eq!(ids(&group(&first, page, 2.0)), vec!["1", "2"]);
        assert_eq!(ids(&group(&first, page, 0.5)), vec!["1"]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let first = record("1", 1, 100.0, 110.0);
        let second = record("2", 1, 102.0, 112.0);

        assert_eq!(ids(&group(&first, [&first, &second], 2.0)), vec!["1", "2"]);
        assert_eq!(ids(&group(&first, [&first, &second], 1.999)), vec!["1"]);
    }

    #[test]
    fn test_grouping_is_symmetric() {
        let records = [
            record("a", 1, 0.0, 10.0),
            record("b", 1, 1.5, 11.0),
            record("c", 1, 3.0, 14.0),
            record("d", 1, 40.0, 52.0),
        ];

        for tolerance in [0.0, 1.0, 2.0, 4.5, 50.0] {
            for r1 in &records {
                for r2 in &records {
                    let forward = group(r1, &records, tolerance).contains(&r2.id);
                    let backward = group(r2, &records, tolerance).contains(&r1.id);
                    let expected = (r1.midline() - r2.midline()).abs() <= tolerance;
                    assert_eq!(forward, backward);
                    assert_eq!(forward, expected);
                }
            }
        }
    }

    #[test]
    fn test_other_pages_are_ignored() {
        let first = record("1", 1, 100.0, 112.0);
        let elsewhere = record("2", 2, 100.0, 112.0);
        assert_eq!(ids(&group(&first, [&first, &elsewhere], 2.0)), vec!["1"]);
    }

    #[test]
    fn test_group_for_id_without_selection_is_empty() {
        let first = record("1", 1, 100.0, 112.0);
        assert!(group_for_id(None, &[&first], 2.0).is_empty());
        assert!(group_for_id(Some("9"), &[&first], 2.0).is_empty());
        assert!(group_for_id(Some("1"), &[], 2.0).is_empty());
        assert_eq!(group_for_id(Some("1"), &[&first], 2.0).len(), 1);
    }

    #[test]
    fn test_parse_tolerance() {
        assert_eq!(parse_tolerance("2,5"), Some(2.5));
        assert_eq!(parse_tolerance("0"), Some(0.0));
        assert_eq!(parse_tolerance("-1"), None);
        assert_eq!(parse_tolerance("wide"), None);
    }
}
