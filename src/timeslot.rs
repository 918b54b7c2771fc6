//! Timeslot geometry: overlap and same-day gap between meeting patterns,
//! plus the descriptor parsing that turns wire records into fragments.

use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;

use crate::data::{Day, DaySet, Fragment, Minute, Timeslot, TimeslotId, TimeslotRecord};
use crate::error::ScheduleError;

const MINUTES_PER_DAY: Minute = 24 * 60;

/// Two fragments overlap when they share a day and either start falls inside
/// the other's `[start, end]` span. Touching boundaries count.
pub fn fragments_overlap(a: &Fragment, b: &Fragment) -> bool {
    a.days.intersects(&b.days)
        && ((a.start >= b.start && a.start <= b.end) || (b.start >= a.start && b.start <= a.end))
}

/// True if any fragment of `a` overlaps any fragment of `b`.
pub fn overlaps(a: &Timeslot, b: &Timeslot) -> bool {
    a.fragments
        .iter()
        .cartesian_product(b.fragments.iter())
        .any(|(fa, fb)| fragments_overlap(fa, fb))
}

/// Tightest spacing, in minutes, between non-overlapping fragments that share
/// a day. `None` when no such fragment pair exists.
pub fn gap(a: &Timeslot, b: &Timeslot) -> Option<Minute> {
    a.fragments
        .iter()
        .cartesian_product(b.fragments.iter())
        .filter(|(fa, fb)| fa.days.intersects(&fb.days) && !fragments_overlap(fa, fb))
        .map(|(fa, fb)| {
            if fa.end < fb.start {
                fb.start - fa.end
            } else {
                fa.start - fb.end
            }
        })
        .min()
}

/// Parses `"MWF 09:00 - 09:50"`, or several such fragments joined by `" ; "`.
pub fn parse_timeslot(id: &str, descriptor: &str) -> Result<Timeslot, ScheduleError> {
    let fragments = descriptor
        .split(';')
        .map(|part| parse_fragment(id, part))
        .collect::<Result<Vec<_>, _>>()?;
    let timeslot = Timeslot {
        id: id.to_string(),
        fragments,
    };
    validate(&timeslot)?;
    Ok(timeslot)
}

pub fn parse_records(records: &[TimeslotRecord]) -> Result<Vec<Timeslot>, ScheduleError> {
    records
        .iter()
        .map(|r| parse_timeslot(&r.id, &r.descriptor))
        .collect()
}

fn parse_fragment(id: &str, text: &str) -> Result<Fragment, ScheduleError> {
    let spaced = text.replace('-', " - ");
    let fields: Vec<&str> = spaced.split_whitespace().collect();
    let [days, start, "-", end] = fields.as_slice() else {
        return Err(ScheduleError::malformed(
            id,
            format!("expected 'DAYS HH:MM - HH:MM', got '{}'", text.trim()),
        ));
    };

    let mut day_set = DaySet::empty();
    for c in days.chars() {
        let day = Day::from_letter(c).ok_or_else(|| {
            ScheduleError::malformed(id, format!("unknown day letter '{c}' in '{days}'"))
        })?;
        if day_set.contains(day) {
            return Err(ScheduleError::malformed(
                id,
                format!("day '{c}' repeated in '{days}'"),
            ));
        }
        day_set.insert(day);
    }

    Ok(Fragment {
        days: day_set,
        start: parse_time(id, start)?,
        end: parse_time(id, end)?,
    })
}

fn parse_time(id: &str, text: &str) -> Result<Minute, ScheduleError> {
    let bad = || ScheduleError::malformed(id, format!("bad time '{text}'"));
    let (h, m) = text.split_once(':').ok_or_else(bad)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if h.is_empty() || h.len() > 2 || m.len() != 2 || !digits(h) || !digits(m) {
        return Err(bad());
    }
    let hours: Minute = h.parse().map_err(|_| bad())?;
    let minutes: Minute = m.parse().map_err(|_| bad())?;
    if hours >= 24 || minutes >= 60 {
        return Err(bad());
    }
    Ok(hours * 60 + minutes)
}

/// Structural checks applied to every timeslot before it enters a run.
pub fn validate(timeslot: &Timeslot) -> Result<(), ScheduleError> {
    let id = &timeslot.id;
    if timeslot.fragments.is_empty() {
        return Err(ScheduleError::malformed(id, "no fragments"));
    }
    for f in &timeslot.fragments {
        if f.days.is_empty() {
            return Err(ScheduleError::malformed(id, "fragment has no meeting days"));
        }
        if f.start >= f.end || f.end >= MINUTES_PER_DAY {
            return Err(ScheduleError::malformed(
                id,
                format!("fragment '{f}' does not describe a forward interval"),
            ));
        }
    }
    if let Some((a, b)) = timeslot
        .fragments
        .iter()
        .tuple_combinations()
        .find(|(a, b)| fragments_overlap(a, b))
    {
        return Err(ScheduleError::malformed(
            id,
            format!("fragments '{a}' and '{b}' overlap"),
        ));
    }
    Ok(())
}

fn format_time(f: &mut fmt::Formatter<'_>, minute: Minute) -> fmt::Result {
    write!(f, "{:02}:{:02}", minute / 60, minute % 60)
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.days)?;
        format_time(f, self.start)?;
        write!(f, " - ")?;
        format_time(f, self.end)
    }
}

impl fmt::Display for Timeslot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fragments.iter().join(" ; "))
    }
}

/// Pairwise overlap and gap for every timeslot in a run, indexed by position.
/// Positions follow ascending timeslot id, so lower index means lower id.
#[derive(Debug, Clone)]
pub struct TimeslotTable {
    slots: Vec<Timeslot>,
    index: HashMap<TimeslotId, usize>,
    overlap: Vec<Vec<bool>>,
    gap: Vec<Vec<Option<Minute>>>,
}

impl TimeslotTable {
    pub fn build(mut slots: Vec<Timeslot>) -> Result<Self, ScheduleError> {
        for slot in &slots {
            validate(slot)?;
        }
        slots.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some((dup, _)) = slots.iter().tuple_windows().find(|(a, b)| a.id == b.id) {
            return Err(ScheduleError::DuplicateTimeslot(dup.id.clone()));
        }

        let n = slots.len();
        let mut overlap = vec![vec![false; n]; n];
        let mut gaps = vec![vec![None; n]; n];
        for i in 0..n {
            overlap[i][i] = overlaps(&slots[i], &slots[i]);
            gaps[i][i] = gap(&slots[i], &slots[i]);
        }
        for (i, j) in (0..n).tuple_combinations() {
            let o = overlaps(&slots[i], &slots[j]);
            let g = gap(&slots[i], &slots[j]);
            overlap[i][j] = o;
            overlap[j][i] = o;
            gaps[i][j] = g;
            gaps[j][i] = g;
        }

        let index = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        Ok(TimeslotTable {
            slots,
            index,
            overlap,
            gap: gaps,
        })
    }

    pub fn from_records(records: &[TimeslotRecord]) -> Result<Self, ScheduleError> {
        TimeslotTable::build(parse_records(records)?)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, idx: usize) -> &TimeslotId {
        &self.slots[idx].id
    }

    pub fn overlaps(&self, a: usize, b: usize) -> bool {
        self.overlap[a][b]
    }

    pub fn gap(&self, a: usize, b: usize) -> Option<Minute> {
        self.gap[a][b]
    }

    /// Every timeslot overlapping `idx`, itself included.
    pub fn overlapping(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.slots.len()).filter(move |&j| self.overlap[idx][j])
    }
}
