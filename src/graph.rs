//! Vertex/edge model consumed by the solver: one vertex per section with its
//! feasible (timeslot, room) domain, one weighted edge per conflicting pair.

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::conflicts::{self, SectionEdge};
use crate::data::{
    ConflictDeclaration, CourseId, InstructorId, RoomId, SchedulingInput, Section, SectionId,
    Severity,
};
use crate::error::ScheduleError;
use crate::timeslot::TimeslotTable;

/// Running penalties for one (section, timeslot) candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotScore {
    pub conflict_penalty: f64,
    pub proximity_penalty: f64,
}

impl SlotScore {
    pub fn total(&self) -> f64 {
        self.conflict_penalty + self.proximity_penalty
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub section: SectionId,
    pub course: CourseId,
    pub instructor: Option<InstructorId>,
    /// Acceptable rooms, sorted and de-duplicated.
    pub rooms: Vec<RoomId>,
    /// Keyed by timeslot index in the run's [`TimeslotTable`].
    pub slots: BTreeMap<usize, SlotScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub vertex: usize,
    pub weight: u32,
    pub tier: Severity,
}

#[derive(Debug, Clone)]
pub struct SectionGraph {
    pub(crate) table: TimeslotTable,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) edges: Vec<SectionEdge>,
    pub(crate) adjacency: Vec<Vec<Neighbor>>,
    pub(crate) peers: Vec<Vec<usize>>,
    index: HashMap<SectionId, usize>,
}

impl SectionGraph {
    pub fn build(input: &SchedulingInput) -> Result<Self, ScheduleError> {
        let table = TimeslotTable::from_records(&input.timeslots)?;
        SectionGraph::from_parts(&input.sections, &input.conflicts, table)
    }

    pub fn from_parts(
        sections: &[Section],
        declarations: &[ConflictDeclaration],
        table: TimeslotTable,
    ) -> Result<Self, ScheduleError> {
        let mut ordered: Vec<&Section> = sections.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut vertices = Vec::with_capacity(ordered.len());
        let mut index = HashMap::with_capacity(ordered.len());
        for section in ordered {
            if index.insert(section.id.clone(), vertices.len()).is_some() {
                return Err(ScheduleError::DuplicateSection(section.id.clone()));
            }
            vertices.push(vertex_for(section, &table)?);
        }

        let roster = conflicts::group_by_course(sections)?;
        let edges: Vec<SectionEdge> = conflicts::normalize(&roster, declarations)
            .into_iter()
            .filter(|e| index.contains_key(&e.first) && index.contains_key(&e.second))
            .collect();

        let mut adjacency = vec![Vec::new(); vertices.len()];
        for e in &edges {
            let (a, b) = (index[&e.first], index[&e.second]);
            adjacency[a].push(Neighbor {
                vertex: b,
                weight: e.weight,
                tier: e.tier,
            });
            adjacency[b].push(Neighbor {
                vertex: a,
                weight: e.weight,
                tier: e.tier,
            });
        }
        for list in &mut adjacency {
            list.sort_by_key(|n| n.vertex);
        }

        let mut by_instructor: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, v) in vertices.iter().enumerate() {
            if let Some(name) = v.instructor.as_deref() {
                by_instructor.entry(name).or_default().push(i);
            }
        }
        let mut peers = vec![Vec::new(); vertices.len()];
        for group in by_instructor.values() {
            for &v in group {
                peers[v] = group.iter().copied().filter(|&u| u != v).collect();
            }
        }

        debug!(
            "Built section graph: {} vertices, {} edges, {} timeslots",
            vertices.len(),
            edges.len(),
            table.len()
        );

        Ok(SectionGraph {
            table,
            vertices,
            edges,
            adjacency,
            peers,
            index,
        })
    }

    pub fn table(&self) -> &TimeslotTable {
        &self.table
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[SectionEdge] {
        &self.edges
    }

    pub fn vertex_index(&self, section: &str) -> Option<usize> {
        self.index.get(section).copied()
    }

    pub fn neighbors(&self, v: usize) -> &[Neighbor] {
        &self.adjacency[v]
    }

    /// Other sections taught by the same instructor.
    pub fn instructor_peers(&self, v: usize) -> &[usize] {
        &self.peers[v]
    }
}

fn vertex_for(section: &Section, table: &TimeslotTable) -> Result<Vertex, ScheduleError> {
    let mut slots = BTreeMap::new();
    for ts in &section.acceptable_timeslots {
        let idx = table
            .index_of(ts)
            .ok_or_else(|| ScheduleError::UnknownTimeslot {
                section: section.id.clone(),
                timeslot: ts.clone(),
            })?;
        slots.insert(idx, SlotScore::default());
    }
    let rooms: BTreeSet<RoomId> = section.acceptable_rooms.iter().cloned().collect();

    Ok(Vertex {
        section: section.id.clone(),
        course: section.course_id()?,
        instructor: section
            .instructor
            .as_ref()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty()),
        rooms: rooms.into_iter().collect(),
        slots,
    })
}
