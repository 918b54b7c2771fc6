use itertools::Itertools;
use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::data::{
    Minute, Placement, RoomId, SchedulingInput, SchedulingOutput, SectionId, UnmetSoftConstraint,
};
use crate::error::ScheduleError;
use crate::graph::SectionGraph;
use crate::timeslot::TimeslotTable;

/// Scoring term for two sections taught by the same instructor.
pub trait ProximityPolicy {
    /// Penalty for meeting at a timeslot whose relation to an already placed
    /// same-instructor section is `overlap` / `gap` (minutes, same day only).
    fn penalty(&self, overlap: bool, gap: Option<Minute>) -> f64;
}

/// Penalizes same-day gaps outside `[min_gap, max_gap]` and double-booking.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GapWindowPolicy {
    pub min_gap: Minute,
    pub max_gap: Minute,
    pub tight_penalty: f64,
    pub loose_penalty: f64,
    pub clash_penalty: f64,
}

impl Default for GapWindowPolicy {
    fn default() -> Self {
        GapWindowPolicy {
            min_gap: 10,
            max_gap: 180,
            tight_penalty: 1.0,
            loose_penalty: 0.5,
            clash_penalty: 12.0,
        }
    }
}

impl ProximityPolicy for GapWindowPolicy {
    fn penalty(&self, overlap: bool, gap: Option<Minute>) -> f64 {
        if overlap {
            return self.clash_penalty;
        }
        match gap {
            Some(g) if g < self.min_gap => self.tight_penalty,
            Some(g) if g > self.max_gap => self.loose_penalty,
            _ => 0.0,
        }
    }
}

/// Free rooms per timeslot for one run. Taking a room at a timeslot removes
/// it from every overlapping timeslot as well.
#[derive(Debug, Clone)]
pub struct RoomLedger {
    free: Vec<BTreeSet<RoomId>>,
}

impl RoomLedger {
    pub fn new(graph: &SectionGraph) -> Self {
        let universe: BTreeSet<RoomId> = graph
            .vertices
            .iter()
            .flat_map(|v| v.rooms.iter().cloned())
            .collect();
        RoomLedger {
            free: vec![universe; graph.table.len()],
        }
    }

    pub fn is_free(&self, timeslot: usize, room: &RoomId) -> bool {
        self.free[timeslot].contains(room)
    }

    pub fn occupy(&mut self, table: &TimeslotTable, timeslot: usize, room: &RoomId) {
        for t in table.overlapping(timeslot) {
            self.free[t].remove(room);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub timeslot: usize,
    pub room: RoomId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum SectionState {
    Unscheduled,
    Scheduled(Candidate),
    Unschedulable,
}

/// Greedy single pass: each section is placed once, most constrained first,
/// and never revisited.
pub struct OnePassSolver<'a, P: ProximityPolicy> {
    graph: SectionGraph,
    ledger: RoomLedger,
    policy: &'a P,
    states: Vec<SectionState>,
}

impl<'a, P: ProximityPolicy> OnePassSolver<'a, P> {
    pub fn new(graph: SectionGraph, policy: &'a P) -> Self {
        let ledger = RoomLedger::new(&graph);
        let states = vec![SectionState::Unscheduled; graph.vertices.len()];
        OnePassSolver {
            graph,
            ledger,
            policy,
            states,
        }
    }

    /// Candidates still open to `v`, ordered by timeslot then room.
    pub fn candidates(&self, v: usize) -> Vec<Candidate> {
        let vertex = &self.graph.vertices[v];
        vertex
            .slots
            .iter()
            .flat_map(move |(&t, score)| {
                vertex
                    .rooms
                    .iter()
                    .filter(move |room| self.ledger.is_free(t, room))
                    .map(move |room| Candidate {
                        timeslot: t,
                        room: room.clone(),
                        score: score.total(),
                    })
            })
            .collect()
    }

    fn open_domain_size(&self, v: usize) -> usize {
        let vertex = &self.graph.vertices[v];
        vertex
            .slots
            .keys()
            .map(|&t| {
                vertex
                    .rooms
                    .iter()
                    .filter(|room| self.ledger.is_free(t, room))
                    .count()
            })
            .sum()
    }

    /// Next section to visit: smallest open domain, ties by section id.
    fn next_vertex(&self) -> Option<usize> {
        (0..self.states.len())
            .filter(|&v| self.states[v] == SectionState::Unscheduled)
            .min_by_key(|&v| (self.open_domain_size(v), v))
    }

    /// Lowest score wins; ties go to the lowest timeslot id, then room id.
    pub fn best_candidate(&self, v: usize) -> Option<Candidate> {
        self.candidates(v).into_iter().min_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.timeslot.cmp(&b.timeslot))
                .then_with(|| a.room.cmp(&b.room))
        })
    }

    fn commit(&mut self, v: usize, chosen: Candidate) {
        let t = chosen.timeslot;
        self.ledger.occupy(&self.graph.table, t, &chosen.room);

        let SectionGraph {
            table,
            vertices,
            adjacency,
            peers,
            ..
        } = &mut self.graph;

        for n in &adjacency[v] {
            if self.states[n.vertex] != SectionState::Unscheduled {
                continue;
            }
            for (&other, score) in vertices[n.vertex].slots.iter_mut() {
                if table.overlaps(t, other) {
                    score.conflict_penalty += f64::from(n.weight);
                }
            }
        }

        for &u in &peers[v] {
            if self.states[u] != SectionState::Unscheduled {
                continue;
            }
            for (&other, score) in vertices[u].slots.iter_mut() {
                score.proximity_penalty += self
                    .policy
                    .penalty(table.overlaps(t, other), table.gap(t, other));
            }
        }

        trace!(
            "Placed {} at {} in {} (score {})",
            vertices[v].section,
            table.id(t),
            chosen.room,
            chosen.score
        );
        self.states[v] = SectionState::Scheduled(chosen);
    }

    pub fn run(mut self) -> SchedulingOutput {
        let start_time = Instant::now();
        info!(
            "Scheduling {} sections over {} timeslots with {} conflict edges...",
            self.graph.vertices.len(),
            self.graph.table.len(),
            self.graph.edges.len()
        );

        while let Some(v) = self.next_vertex() {
            match self.best_candidate(v) {
                Some(chosen) => self.commit(v, chosen),
                None => {
                    warn!(
                        "Section {} is unschedulable: no open timeslot/room pair",
                        self.graph.vertices[v].section
                    );
                    self.states[v] = SectionState::Unschedulable;
                }
            }
        }

        let output = self.into_output();
        info!(
            "Scheduled {} of {} sections (penalty {}) in {:.2?}",
            output.assignments.len() - output.unschedulable.len(),
            output.assignments.len(),
            output.score,
            start_time.elapsed()
        );
        output
    }

    fn into_output(self) -> SchedulingOutput {
        let mut assignments = BTreeMap::new();
        let mut unschedulable = Vec::new();
        let mut score = 0.0;
        let mut placed: Vec<Option<usize>> = vec![None; self.states.len()];

        for (v, state) in self.states.iter().enumerate() {
            let section = self.graph.vertices[v].section.clone();
            let placement = match state {
                SectionState::Scheduled(c) => {
                    score += c.score;
                    placed[v] = Some(c.timeslot);
                    Placement::at(self.graph.table.id(c.timeslot), c.room.clone())
                }
                _ => {
                    unschedulable.push(section.clone());
                    Placement::unassigned()
                }
            };
            assignments.insert(section, placement);
        }

        let unmet_soft_constraints = unmet_constraints(&self.graph, &placed, self.policy);
        SchedulingOutput {
            assignments,
            unschedulable,
            score,
            unmet_soft_constraints,
        }
    }
}

/// Overlapping conflict pairs and poorly spaced instructor pairs in a finished schedule.
fn unmet_constraints<P: ProximityPolicy>(
    graph: &SectionGraph,
    placed: &[Option<usize>],
    policy: &P,
) -> Vec<UnmetSoftConstraint> {
    let table = &graph.table;
    let name = |v: usize| graph.vertices[v].section.as_str();
    let mut unmet = Vec::new();

    for edge in &graph.edges {
        let (Some(a), Some(b)) = (
            graph.vertex_index(&edge.first),
            graph.vertex_index(&edge.second),
        ) else {
            continue;
        };
        if let (Some(ta), Some(tb)) = (placed[a], placed[b]) {
            if table.overlaps(ta, tb) {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Course Conflict".to_string(),
                    description: format!(
                        "Sections {} ({}) and {} ({}) overlap despite a {:?} conflict (weight {}).",
                        name(a),
                        table.id(ta),
                        name(b),
                        table.id(tb),
                        edge.tier,
                        edge.weight
                    ),
                });
            }
        }
    }

    for (a, peers) in graph.peers.iter().enumerate() {
        for &b in peers.iter().filter(|&&b| b > a) {
            let (Some(ta), Some(tb)) = (placed[a], placed[b]) else {
                continue;
            };
            let overlap = table.overlaps(ta, tb);
            let gap = table.gap(ta, tb);
            if policy.penalty(overlap, gap) <= 0.0 {
                continue;
            }
            let detail = match (overlap, gap) {
                (true, _) => "meet at overlapping times".to_string(),
                (false, Some(g)) => format!("are {g} minutes apart on a shared day"),
                (false, None) => "are penalized by the proximity policy".to_string(),
            };
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Instructor Spacing".to_string(),
                description: format!(
                    "Instructor {} teaches {} ({}) and {} ({}), which {}.",
                    graph.vertices[a].instructor.as_deref().unwrap_or_default(),
                    name(a),
                    table.id(ta),
                    name(b),
                    table.id(tb),
                    detail
                ),
            });
        }
    }

    unmet
}

/// Builds the graph for `input` and runs one greedy pass over it.
pub fn schedule(input: &SchedulingInput) -> Result<SchedulingOutput, ScheduleError> {
    let graph = SectionGraph::build(input)?;
    let policy = input.options.proximity;
    Ok(OnePassSolver::new(graph, &policy).run())
}

/// Same as [`schedule`] with a caller-supplied proximity term.
pub fn schedule_with<P: ProximityPolicy>(
    input: &SchedulingInput,
    policy: &P,
) -> Result<SchedulingOutput, ScheduleError> {
    let graph = SectionGraph::build(input)?;
    Ok(OnePassSolver::new(graph, policy).run())
}

/// Section ids that ended up sharing a room at overlapping times. Always empty
/// for solver output; used to check externally edited assignments.
pub fn room_clashes(
    graph: &SectionGraph,
    assignments: &BTreeMap<SectionId, Placement>,
) -> Vec<(SectionId, SectionId)> {
    let table = &graph.table;
    let resolved: Vec<(&SectionId, usize, &RoomId)> = assignments
        .iter()
        .filter_map(|(id, p)| {
            let t = table.index_of(p.timeslot.as_deref()?)?;
            Some((id, t, p.room.as_ref()?))
        })
        .collect();

    resolved
        .iter()
        .tuple_combinations()
        .filter(|((_, ta, ra), (_, tb, rb))| ra == rb && table.overlaps(*ta, *tb))
        .map(|((a, _, _), (b, _, _))| ((*a).clone(), (*b).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConflictDeclaration, Section, Severity, TimeslotRecord};

    fn slot(id: &str, descriptor: &str) -> TimeslotRecord {
        TimeslotRecord {
            id: id.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    fn section(id: &str, course: &str, instructor: &str, rooms: &[&str], slots: &[&str]) -> Section {
        Section {
            id: id.to_string(),
            course: Some(course.parse().unwrap()),
            instructor: Some(instructor.to_string()),
            acceptable_rooms: rooms.iter().map(|r| r.parse().unwrap()).collect(),
            acceptable_timeslots: slots.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn heavy(a: &str, b: &str) -> ConflictDeclaration {
        ConflictDeclaration {
            first_course: a.parse().unwrap(),
            second_course: b.parse().unwrap(),
            severity: Severity::Heavy,
        }
    }

    #[test]
    fn gap_window_policy_defaults() {
        let p = GapWindowPolicy::default();
        assert_eq!(p.penalty(true, None), 12.0);
        assert_eq!(p.penalty(false, None), 0.0);
        assert_eq!(p.penalty(false, Some(5)), 1.0);
        assert_eq!(p.penalty(false, Some(10)), 0.0);
        assert_eq!(p.penalty(false, Some(180)), 0.0);
        assert_eq!(p.penalty(false, Some(181)), 0.5);
    }

    #[test]
    fn policy_deserializes_partially() {
        let p: GapWindowPolicy = serde_json::from_str(r#"{"minGap": 30}"#).unwrap();
        assert_eq!(p.min_gap, 30);
        assert_eq!(p.max_gap, 180);
    }

    #[test]
    fn conflicting_sections_are_spread_apart() {
        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf09", "mwf10"]),
                section("b", "CS 102", "Jones", &["BUSH 302"], &["mwf09", "mwf10"]),
            ],
            conflicts: vec![heavy("CS 101", "CS 102")],
            timeslots: vec![
                slot("mwf09", "MWF 09:00 - 09:50"),
                slot("mwf10", "MWF 10:00 - 10:50"),
            ],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        let a = out.assignments["a"].timeslot.clone().unwrap();
        let b = out.assignments["b"].timeslot.clone().unwrap();
        assert_ne!(a, b);
        assert_eq!(a, "mwf09");
        assert_eq!(out.score, 0.0);
        assert!(out.unmet_soft_constraints.is_empty());
    }

    #[test]
    fn room_taken_at_overlapping_timeslot_is_blocked() {
        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf9"]),
                section("b", "CS 102", "Jones", &["BUSH 301"], &["mw930"]),
            ],
            timeslots: vec![
                slot("mwf9", "MWF 09:00 - 09:50"),
                slot("mw930", "MW 09:30 - 10:45"),
            ],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.unschedulable, vec!["b".to_string()]);
        assert_eq!(out.assignments["b"], Placement::unassigned());
    }

    #[test]
    fn most_constrained_section_goes_first() {
        // "z" has one option, "a" has two; "z" must claim its only slot first.
        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf09", "mwf10"]),
                section("z", "CS 102", "Jones", &["BUSH 301"], &["mwf09"]),
            ],
            timeslots: vec![
                slot("mwf09", "MWF 09:00 - 09:50"),
                slot("mwf10", "MWF 10:00 - 10:50"),
            ],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.assignments["z"].timeslot.as_deref(), Some("mwf09"));
        assert_eq!(out.assignments["a"].timeslot.as_deref(), Some("mwf10"));
        assert!(out.unschedulable.is_empty());
    }

    #[test]
    fn instructor_is_not_double_booked_when_avoidable() {
        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf09", "mwf11"]),
                section("b", "CS 102", "Smith", &["BUSH 302"], &["mwf09", "mwf11"]),
            ],
            timeslots: vec![
                slot("mwf09", "MWF 09:00 - 09:50"),
                slot("mwf11", "MWF 11:00 - 11:50"),
            ],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.assignments["a"].timeslot.as_deref(), Some("mwf09"));
        assert_eq!(out.assignments["b"].timeslot.as_deref(), Some("mwf11"));
    }

    #[test]
    fn custom_policy_changes_choice() {
        struct PreferClose;
        impl ProximityPolicy for PreferClose {
            fn penalty(&self, overlap: bool, gap: Option<Minute>) -> f64 {
                match (overlap, gap) {
                    (true, _) => 100.0,
                    (false, Some(g)) => f64::from(g),
                    (false, None) => 0.0,
                }
            }
        }

        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf08"]),
                section("b", "CS 102", "Smith", &["BUSH 302"], &["mwf09", "mwf15"]),
            ],
            timeslots: vec![
                slot("mwf08", "MWF 08:00 - 08:50"),
                slot("mwf09", "MWF 09:00 - 09:50"),
                slot("mwf15", "MWF 15:00 - 15:50"),
            ],
            ..Default::default()
        };
        let out = schedule_with(&input, &PreferClose).unwrap();
        assert_eq!(out.assignments["b"].timeslot.as_deref(), Some("mwf09"));
        assert_eq!(out.score, 10.0);
    }

    #[test]
    fn unavoidable_conflict_is_reported() {
        let input = SchedulingInput {
            sections: vec![
                section("a", "CS 101", "Smith", &["BUSH 301"], &["mwf09"]),
                section("b", "CS 102", "Jones", &["BUSH 302"], &["mwf09"]),
            ],
            conflicts: vec![heavy("CS 101", "CS 102")],
            timeslots: vec![slot("mwf09", "MWF 09:00 - 09:50")],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.score, 12.0);
        assert_eq!(out.unmet_soft_constraints.len(), 1);
        assert_eq!(out.unmet_soft_constraints[0].constraint_type, "Course Conflict");
    }

    #[test]
    fn tight_instructor_spacing_is_reported() {
        let input = SchedulingInput {
            sections: vec![
                section("1", "CS 101", "Smith", &["BUSH 301"], &["a"]),
                section("2", "CS 102", "Smith", &["BUSH 302"], &["b"]),
            ],
            timeslots: vec![
                slot("a", "MWF 08:00 - 08:50"),
                slot("b", "MWF 08:55 - 09:45"),
            ],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.score, 1.0);
        assert_eq!(out.unmet_soft_constraints.len(), 1);
        let unmet = &out.unmet_soft_constraints[0];
        assert_eq!(unmet.constraint_type, "Instructor Spacing");
        assert!(unmet.description.contains("5 minutes apart"), "{unmet}");
        assert!(unmet.description.starts_with("Instructor Smith teaches 1 (a) and 2 (b)"));
    }

    #[test]
    fn double_booked_instructor_is_reported() {
        let input = SchedulingInput {
            sections: vec![
                section("1", "CS 101", "Smith", &["BUSH 301"], &["a"]),
                section("2", "CS 102", "Smith", &["BUSH 302"], &["a"]),
            ],
            timeslots: vec![slot("a", "MWF 08:00 - 08:50")],
            ..Default::default()
        };
        let out = schedule(&input).unwrap();
        assert_eq!(out.score, GapWindowPolicy::default().clash_penalty);
        assert_eq!(out.score, 12.0);
        assert_eq!(out.unmet_soft_constraints.len(), 1);
        let unmet = &out.unmet_soft_constraints[0];
        assert_eq!(unmet.constraint_type, "Instructor Spacing");
        assert!(unmet.description.contains("meet at overlapping times"), "{unmet}");
    }

    #[test]
    fn room_clashes_finds_shared_rooms() {
        let input = SchedulingInput {
            sections: vec![],
            timeslots: vec![
                slot("mwf9", "MWF 09:00 - 09:50"),
                slot("mw930", "MW 09:30 - 10:45"),
                slot("tr9", "TR 09:00 - 10:15"),
            ],
            ..Default::default()
        };
        let graph = SectionGraph::build(&input).unwrap();
        let room = RoomId::new("BUSH", "301");
        let assignments: BTreeMap<SectionId, Placement> = [
            ("a".to_string(), Placement::at("mwf9", room.clone())),
            ("b".to_string(), Placement::at("mw930", room.clone())),
            ("c".to_string(), Placement::at("tr9", room)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            room_clashes(&graph, &assignments),
            vec![("a".to_string(), "b".to_string())]
        );
    }
}
