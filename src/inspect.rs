//! Single-section queries against already committed assignments. These use
//! the same overlap table and edge tiers as the solver but never place anything.

use serde::Serialize;
use std::collections::HashMap;

use crate::data::{Assignments, ConflictReport, Placement, RoomId, SectionId, TimeslotId};
use crate::error::ScheduleError;
use crate::graph::SectionGraph;

/// Rooms open at a proposed timeslot and the conflicts the move would incur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsAndConflicts {
    pub rooms: Vec<RoomId>,
    #[serde(flatten)]
    pub conflicts: ConflictReport,
}

/// A section's current placement and the conflicts it already incurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConflicts {
    pub assigned_timeslot: Option<TimeslotId>,
    pub assigned_room: Option<RoomId>,
    #[serde(flatten)]
    pub conflicts: ConflictReport,
}

struct Resolved<'a> {
    timeslot: usize,
    room: Option<&'a RoomId>,
}

fn resolve<'a>(
    graph: &SectionGraph,
    assignments: &'a Assignments,
) -> Result<HashMap<&'a str, Resolved<'a>>, ScheduleError> {
    let mut resolved = HashMap::new();
    for (section, placement) in assignments {
        let Some(ts) = placement.timeslot.as_deref() else {
            continue;
        };
        let timeslot = graph
            .table()
            .index_of(ts)
            .ok_or_else(|| ScheduleError::UnknownTimeslot {
                section: section.clone(),
                timeslot: ts.to_string(),
            })?;
        resolved.insert(
            section.as_str(),
            Resolved {
                timeslot,
                room: placement.room.as_ref(),
            },
        );
    }
    Ok(resolved)
}

fn locate(graph: &SectionGraph, section: &str, timeslot: &str) -> Result<(usize, usize), ScheduleError> {
    let v = graph
        .vertex_index(section)
        .ok_or_else(|| ScheduleError::UnknownSection(section.to_string()))?;
    let t = graph
        .table()
        .index_of(timeslot)
        .ok_or_else(|| ScheduleError::UnknownTimeslot {
            section: section.to_string(),
            timeslot: timeslot.to_string(),
        })?;
    Ok((v, t))
}

/// Conflicting sections that would overlap `section` if it met at `timeslot`,
/// grouped by edge tier and ordered by section id.
pub fn conflicts_at(
    graph: &SectionGraph,
    section: &str,
    timeslot: &str,
    assignments: &Assignments,
) -> Result<ConflictReport, ScheduleError> {
    let (v, t) = locate(graph, section, timeslot)?;
    let resolved = resolve(graph, assignments)?;

    let mut report = ConflictReport::default();
    for n in graph.neighbors(v) {
        let other: &SectionId = &graph.vertices()[n.vertex].section;
        if let Some(r) = resolved.get(other.as_str()) {
            if graph.table().overlaps(t, r.timeslot) {
                report.push(n.tier, other.clone());
            }
        }
    }
    Ok(report)
}

/// Acceptable rooms of `section` not held by another section at an
/// overlapping timeslot.
pub fn available_rooms(
    graph: &SectionGraph,
    section: &str,
    timeslot: &str,
    assignments: &Assignments,
) -> Result<Vec<RoomId>, ScheduleError> {
    let (v, t) = locate(graph, section, timeslot)?;
    let resolved = resolve(graph, assignments)?;

    let rooms = graph.vertices()[v]
        .rooms
        .iter()
        .filter(|room| {
            !resolved.iter().any(|(other, r)| {
                *other != section
                    && r.room == Some(*room)
                    && graph.table().overlaps(t, r.timeslot)
            })
        })
        .cloned()
        .collect();
    Ok(rooms)
}

pub fn rooms_and_conflicts(
    graph: &SectionGraph,
    section: &str,
    timeslot: &str,
    assignments: &Assignments,
) -> Result<RoomsAndConflicts, ScheduleError> {
    Ok(RoomsAndConflicts {
        rooms: available_rooms(graph, section, timeslot, assignments)?,
        conflicts: conflicts_at(graph, section, timeslot, assignments)?,
    })
}

/// Conflicts at the section's own assigned timeslot; empty when unassigned.
pub fn current_conflicts(
    graph: &SectionGraph,
    section: &str,
    assignments: &Assignments,
) -> Result<CurrentConflicts, ScheduleError> {
    if graph.vertex_index(section).is_none() {
        return Err(ScheduleError::UnknownSection(section.to_string()));
    }
    let placement = assignments.get(section).cloned().unwrap_or_else(Placement::unassigned);
    let conflicts = match placement.timeslot.as_deref() {
        Some(ts) => conflicts_at(graph, section, ts, assignments)?,
        None => ConflictReport::default(),
    };
    Ok(CurrentConflicts {
        assigned_timeslot: placement.timeslot,
        assigned_room: placement.room,
        conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConflictDeclaration, SchedulingInput, Section, Severity, TimeslotRecord};

    fn section(id: &str, course: &str, rooms: &[&str]) -> Section {
        Section {
            id: id.to_string(),
            course: Some(course.parse().unwrap()),
            instructor: None,
            acceptable_rooms: rooms.iter().map(|r| r.parse().unwrap()).collect(),
            acceptable_timeslots: vec!["mwf9".into(), "tr9".into()],
        }
    }

    fn decl(a: &str, b: &str, severity: Severity) -> ConflictDeclaration {
        ConflictDeclaration {
            first_course: a.parse().unwrap(),
            second_course: b.parse().unwrap(),
            severity,
        }
    }

    fn graph() -> SectionGraph {
        SectionGraph::build(&SchedulingInput {
            sections: vec![
                section("a", "CS 101", &["BUSH 301", "BUSH 302"]),
                section("b", "CS 102", &["BUSH 301"]),
                section("c", "CS 103", &["BUSH 302"]),
                section("d", "CS 104", &["BUSH 303"]),
            ],
            conflicts: vec![
                decl("CS 101", "CS 102", Severity::Heavy),
                decl("CS 101", "CS 103", Severity::Medium),
                decl("CS 104", "CS 101", Severity::Light),
            ],
            timeslots: vec![
                TimeslotRecord {
                    id: "mwf9".into(),
                    descriptor: "MWF 09:00 - 09:50".into(),
                },
                TimeslotRecord {
                    id: "mw930".into(),
                    descriptor: "MW 09:30 - 10:45".into(),
                },
                TimeslotRecord {
                    id: "tr9".into(),
                    descriptor: "TR 09:00 - 10:15".into(),
                },
            ],
            ..Default::default()
        })
        .unwrap()
    }

    fn room(s: &str) -> RoomId {
        s.parse().unwrap()
    }

    fn current() -> Assignments {
        [
            ("b".to_string(), Placement::at("mwf9", room("BUSH 301"))),
            ("c".to_string(), Placement::at("mw930", room("BUSH 302"))),
            ("d".to_string(), Placement::at("tr9", room("BUSH 303"))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn conflicts_grouped_by_tier() {
        let g = graph();
        let report = conflicts_at(&g, "a", "mwf9", &current()).unwrap();
        assert_eq!(report.heavy_conflicts, vec!["b".to_string()]);
        assert_eq!(report.medium_conflicts, vec!["c".to_string()]);
        assert!(report.light_conflicts.is_empty());

        let report = conflicts_at(&g, "a", "tr9", &current()).unwrap();
        assert_eq!(report.light_conflicts, vec!["d".to_string()]);
        assert!(report.heavy_conflicts.is_empty());
    }

    #[test]
    fn rooms_held_at_overlapping_times_are_excluded() {
        let g = graph();
        assert!(available_rooms(&g, "a", "mwf9", &current()).unwrap().is_empty());
        assert_eq!(
            available_rooms(&g, "a", "tr9", &current()).unwrap(),
            vec![room("BUSH 301"), room("BUSH 302")]
        );
    }

    #[test]
    fn own_placement_does_not_block_itself() {
        let g = graph();
        assert_eq!(
            available_rooms(&g, "b", "mwf9", &current()).unwrap(),
            vec![room("BUSH 301")]
        );
    }

    #[test]
    fn current_conflicts_use_assigned_timeslot() {
        let g = graph();
        let mut assignments = current();
        assignments.insert("a".into(), Placement::at("mw930", room("BUSH 303")));
        let cur = current_conflicts(&g, "a", &assignments).unwrap();
        assert_eq!(cur.assigned_timeslot.as_deref(), Some("mw930"));
        assert_eq!(cur.conflicts.heavy_conflicts, vec!["b".to_string()]);
        assert_eq!(cur.conflicts.medium_conflicts, vec!["c".to_string()]);

        let unplaced = current_conflicts(&g, "a", &current()).unwrap();
        assert_eq!(unplaced.assigned_timeslot, None);
        assert!(unplaced.conflicts.is_empty());
    }

    #[test]
    fn unknown_inputs_are_errors() {
        let g = graph();
        assert_eq!(
            conflicts_at(&g, "zz", "mwf9", &current()),
            Err(ScheduleError::UnknownSection("zz".into()))
        );
        assert!(matches!(
            available_rooms(&g, "a", "sat", &current()),
            Err(ScheduleError::UnknownTimeslot { .. })
        ));
        let mut bad = current();
        bad.insert("b".into(), Placement::at("sun", room("BUSH 301")));
        assert!(matches!(
            conflicts_at(&g, "a", "mwf9", &bad),
            Err(ScheduleError::UnknownTimeslot { .. })
        ));
    }
}
