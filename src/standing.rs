use std::collections::HashMap;
use std::fmt;

use crate::models::{Cgpa, StandingSummary, Student};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Standing {
    Distinction,
    Good,
    Satisfactory,
    /// Candidates for the academic support program.
    Probation,
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Standing::Distinction => "Distinction",
            Standing::Good => "Good standing",
            Standing::Satisfactory => "Satisfactory",
            Standing::Probation => "Probation",
        };
        f.write_str(label)
    }
}

pub fn standing(cgpa: Cgpa) -> Standing {
    match cgpa.value() {
        v if v >= 3.5 => Standing::Distinction,
        v if v >= 3.0 => Standing::Good,
        v if v >= 2.0 => Standing::Satisfactory,
        _ => Standing::Probation,
    }
}

/// Count and mean cgpa per tier, most populated first.
pub fn summarize_by_standing(students: &[Student]) -> Vec<StandingSummary> {
    let mut map: HashMap<Standing, (usize, f64)> = HashMap::new();

    for student in students {
        let entry = map.entry(standing(student.cgpa)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += student.cgpa.value();
    }

    let mut summaries: Vec<StandingSummary> = map
        .into_iter()
        .map(|(standing, (count, total))| StandingSummary {
            standing,
            count,
            avg_cgpa: total / count as f64,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.standing.cmp(&b.standing)));
    summaries
}

/// Probation students, weakest first.
pub fn support_candidates(students_ascending: &[Student]) -> Vec<&Student> {
    students_ascending
        .iter()
        .take_while(|student| standing(student.cgpa) == Standing::Probation)
        .collect()
}
