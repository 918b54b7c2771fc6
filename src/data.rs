use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ScheduleError;
use crate::solver::GapWindowPolicy;

// Type aliases for clarity
pub type SectionId = String;
pub type InstructorId = String;
pub type TimeslotId = String;
/// Minutes since midnight.
pub type Minute = u16;

pub type Assignments = BTreeMap<SectionId, Placement>;

/// A teaching day. Thursday is written `R` in descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Day {
    pub const ALL: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn letter(self) -> char {
        match self {
            Day::Mon => 'M',
            Day::Tue => 'T',
            Day::Wed => 'W',
            Day::Thu => 'R',
            Day::Fri => 'F',
        }
    }

    pub fn from_letter(c: char) -> Option<Day> {
        Day::ALL.into_iter().find(|d| d.letter() == c)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of meeting days, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DaySet(u8);

impl DaySet {
    pub fn empty() -> Self {
        DaySet(0)
    }

    pub fn insert(&mut self, day: Day) {
        self.0 |= day.bit();
    }

    pub fn contains(&self, day: Day) -> bool {
        self.0 & day.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects(&self, other: &DaySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Day> + '_ {
        Day::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Day> for DaySet {
    fn from_iter<I: IntoIterator<Item = Day>>(iter: I) -> Self {
        let mut set = DaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in self.iter() {
            write!(f, "{}", day.letter())?;
        }
        Ok(())
    }
}

/// One recurring meeting: a set of days sharing the half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fragment {
    pub days: DaySet,
    pub start: Minute,
    pub end: Minute,
}

/// A named meeting pattern. More than one fragment makes it a composite timeslot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeslot {
    pub id: TimeslotId,
    pub fragments: Vec<Fragment>,
}

impl Timeslot {
    pub fn is_composite(&self) -> bool {
        self.fragments.len() > 1
    }
}

/// Timeslot as it arrives on the wire, e.g. `"MW 13:00 - 14:15 ; F 09:00 - 09:50"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotRecord {
    pub id: TimeslotId,
    pub descriptor: String,
}

/// Catalog identity shared by the lecture and lab sections of one course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseId {
    pub prefix: String,
    pub number: String,
    pub honors: bool,
    pub crosslisted: bool,
}

impl CourseId {
    pub fn new(prefix: &str, number: &str) -> Self {
        CourseId {
            prefix: prefix.to_string(),
            number: number.to_string(),
            honors: false,
            crosslisted: false,
        }
    }

    /// Derives the course from a section name such as `"CMS 170 - Lecture H1X"`.
    /// The fifth field carries the honors (`H`) and crosslist (`X`) markers.
    pub fn from_section_name(name: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = name.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ScheduleError::InvalidSectionName(name.to_string()));
        }
        Ok(CourseId {
            prefix: fields[0].to_string(),
            number: fields[1].to_string(),
            honors: fields[4].contains('H'),
            crosslisted: fields[4].contains('X'),
        })
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix, self.number)?;
        match (self.honors, self.crosslisted) {
            (true, true) => write!(f, " - HX"),
            (true, false) => write!(f, " - H"),
            (false, true) => write!(f, " - X"),
            (false, false) => Ok(()),
        }
    }
}

impl FromStr for CourseId {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidCourse(s.to_string());
        let fields: Vec<&str> = s.split_whitespace().collect();
        let (prefix, number, qualifier) = match fields.as_slice() {
            [prefix, number] => (*prefix, *number, ""),
            [prefix, number, "-", qualifier] => (*prefix, *number, *qualifier),
            _ => return Err(invalid()),
        };
        if qualifier.chars().any(|c| c != 'H' && c != 'X') {
            return Err(invalid());
        }
        Ok(CourseId {
            prefix: prefix.to_string(),
            number: number.to_string(),
            honors: qualifier.contains('H'),
            crosslisted: qualifier.contains('X'),
        })
    }
}

impl TryFrom<String> for CourseId {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CourseId> for String {
    fn from(value: CourseId) -> Self {
        value.to_string()
    }
}

/// A physical room, written `"BUILDING NUMBER"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId {
    pub building: String,
    pub number: String,
}

impl RoomId {
    pub fn new(building: &str, number: &str) -> Self {
        RoomId {
            building: building.to_string(),
            number: number.to_string(),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.building, self.number)
    }
}

impl FromStr for RoomId {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(' ') {
            Some((building, number)) if !building.is_empty() && !number.trim().is_empty() => {
                Ok(RoomId::new(building, number.trim()))
            }
            _ => Err(ScheduleError::InvalidRoom(s.to_string())),
        }
    }
}

impl TryFrom<String> for RoomId {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.to_string()
    }
}

/// How undesirable an overlap between two conflicting courses is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Severity {
    Light,
    Medium,
    Heavy,
}

impl Severity {
    pub fn base_weight(self) -> u32 {
        match self {
            Severity::Heavy => 12,
            Severity::Medium => 6,
            Severity::Light => 2,
        }
    }

    /// Buckets a per-section-pair weight back into a tier.
    pub fn from_weight(weight: u32) -> Self {
        if weight > 6 {
            Severity::Heavy
        } else if weight > 2 {
            Severity::Medium
        } else {
            Severity::Light
        }
    }
}

/// Course-level statement that two courses share enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDeclaration {
    pub first_course: CourseId,
    pub second_course: CourseId,
    pub severity: Severity,
}

/// A schedulable lecture or lab offering.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    /// Derived from `id` when absent.
    #[serde(default)]
    pub course: Option<CourseId>,
    #[serde(default)]
    pub instructor: Option<InstructorId>,
    #[serde(default)]
    pub acceptable_rooms: Vec<RoomId>,
    #[serde(default)]
    pub acceptable_timeslots: Vec<TimeslotId>,
}

impl Section {
    pub fn course_id(&self) -> Result<CourseId, ScheduleError> {
        match &self.course {
            Some(course) => Ok(course.clone()),
            None => CourseId::from_section_name(&self.id),
        }
    }
}

/// Tunables for one run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverOptions {
    #[serde(default)]
    pub proximity: GapWindowPolicy,
}

/// The complete input for one scheduling run: a consistent snapshot of the roster.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub sections: Vec<Section>,
    #[serde(default)]
    pub conflicts: Vec<ConflictDeclaration>,
    pub timeslots: Vec<TimeslotRecord>,
    #[serde(default)]
    pub options: SolverOptions,
}

/// Where a section meets. Both fields are null for unscheduled sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default)]
    pub timeslot: Option<TimeslotId>,
    #[serde(default)]
    pub room: Option<RoomId>,
}

impl Placement {
    pub fn at(timeslot: &str, room: RoomId) -> Self {
        Placement {
            timeslot: Some(timeslot.to_string()),
            room: Some(room),
        }
    }

    pub fn unassigned() -> Self {
        Placement::default()
    }

    pub fn is_assigned(&self) -> bool {
        self.timeslot.is_some() && self.room.is_some()
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub assignments: Assignments,
    pub unschedulable: Vec<SectionId>,
    pub score: f64,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}

/// Sections that would overlap a given section, grouped by edge tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub heavy_conflicts: Vec<SectionId>,
    pub medium_conflicts: Vec<SectionId>,
    pub light_conflicts: Vec<SectionId>,
}

impl ConflictReport {
    pub(crate) fn push(&mut self, tier: Severity, section: SectionId) {
        match tier {
            Severity::Heavy => self.heavy_conflicts.push(section),
            Severity::Medium => self.medium_conflicts.push(section),
            Severity::Light => self.light_conflicts.push(section),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heavy_conflicts.is_empty()
            && self.medium_conflicts.is_empty()
            && self.light_conflicts.is_empty()
    }
}
