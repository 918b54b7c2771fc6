//! Turns course-level conflict declarations into weighted section-pair edges.

use itertools::Itertools;
use log::{debug, warn};
use std::collections::BTreeMap;

use crate::data::{ConflictDeclaration, CourseId, Section, SectionId, Severity};
use crate::error::ScheduleError;

/// Weighted conflict between two sections. `first < second`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEdge {
    pub first: SectionId,
    pub second: SectionId,
    pub weight: u32,
    pub tier: Severity,
}

pub type CourseRoster = BTreeMap<CourseId, Vec<SectionId>>;

/// Groups section ids by course; ids within a course come out sorted.
pub fn group_by_course(sections: &[Section]) -> Result<CourseRoster, ScheduleError> {
    let pairs = sections
        .iter()
        .map(|s| s.course_id().map(|course| (course, s.id.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairs
        .into_iter()
        .into_group_map()
        .into_iter()
        .map(|(course, mut ids)| {
            ids.sort();
            (course, ids)
        })
        .collect())
}

/// Collapses declarations onto unordered course pairs. A later declaration
/// for the same pair replaces the earlier one.
pub fn merge_declarations(
    declarations: &[ConflictDeclaration],
) -> BTreeMap<(CourseId, CourseId), Severity> {
    let mut merged = BTreeMap::new();
    for d in declarations {
        if d.first_course == d.second_course {
            warn!("Ignoring conflict of course {} with itself", d.first_course);
            continue;
        }
        let key = if d.first_course < d.second_course {
            (d.first_course.clone(), d.second_course.clone())
        } else {
            (d.second_course.clone(), d.first_course.clone())
        };
        merged.insert(key, d.severity);
    }
    merged
}

/// Per-section-pair weight for a course conflict, diluted across every
/// section pairing. Integer division; `None` when either course has no sections.
pub fn pair_weight(severity: Severity, first_sections: usize, second_sections: usize) -> Option<u32> {
    let pairings = u32::try_from(first_sections.checked_mul(second_sections)?).ok()?;
    if pairings == 0 {
        return None;
    }
    Some(severity.base_weight() / pairings)
}

pub fn normalize(roster: &CourseRoster, declarations: &[ConflictDeclaration]) -> Vec<SectionEdge> {
    let mut edges = Vec::new();
    for ((first, second), severity) in merge_declarations(declarations) {
        let empty = Vec::new();
        let a = roster.get(&first).unwrap_or(&empty);
        let b = roster.get(&second).unwrap_or(&empty);
        let Some(weight) = pair_weight(severity, a.len(), b.len()) else {
            debug!("Conflict {first} / {second} has a course with no sections; no edges");
            continue;
        };
        let tier = Severity::from_weight(weight);
        for (x, y) in a.iter().cartesian_product(b.iter()) {
            let (lo, hi) = if x < y { (x, y) } else { (y, x) };
            edges.push(SectionEdge {
                first: lo.clone(),
                second: hi.clone(),
                weight,
                tier,
            });
        }
    }
    edges.sort_by(|e1, e2| (&e1.first, &e1.second).cmp(&(&e2.first, &e2.second)));
    edges
}
