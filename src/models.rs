use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{EngineError, Result};

pub const CGPA_MIN: f64 = 0.0;
pub const CGPA_MAX: f64 = 4.0;

/// A grade point average guaranteed to lie in `[0.0, 4.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cgpa(f64);

impl Cgpa {
    pub const ZERO: Cgpa = Cgpa(0.0);

    pub fn new(value: f64) -> Result<Self> {
        Self::checked("cgpa", value)
    }

    pub fn checked(field: &'static str, value: f64) -> Result<Self> {
        if (CGPA_MIN..=CGPA_MAX).contains(&value) {
            // folds -0.0 into 0.0 so total_cmp sees one zero
            Ok(Cgpa(value + 0.0))
        } else {
            Err(EngineError::OutOfRange { field, value })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// NaN never passes `checked`, so total_cmp agrees with numeric order here.
impl Eq for Cgpa {}

impl PartialOrd for Cgpa {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cgpa {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Cgpa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub reg_no: String,
    pub name: String,
    pub email: String,
    pub program: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub cgpa: Cgpa,
    /// Previous cgpa values, oldest first.
    pub gpa_history: Vec<Cgpa>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpportunityType {
    Internship,
    Job,
    Scholarship,
    Workshop,
}

impl OpportunityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::Internship => "Internship",
            OpportunityType::Job => "Job",
            OpportunityType::Scholarship => "Scholarship",
            OpportunityType::Workshop => "Workshop",
        }
    }
}

impl FromStr for OpportunityType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "internship" => Ok(OpportunityType::Internship),
            "job" => Ok(OpportunityType::Job),
            "scholarship" => Ok(OpportunityType::Scholarship),
            "workshop" => Ok(OpportunityType::Workshop),
            other => Err(EngineError::Validation(format!(
                "unknown opportunity type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shortest-path length from the origin. `Unreachable` sorts after every
/// known distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Distance {
    Km(u64),
    Unreachable,
}

const UNKNOWN_DISTANCE: &str = "Unknown";

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Km(km) => write!(f, "{km}"),
            Distance::Unreachable => f.write_str(UNKNOWN_DISTANCE),
        }
    }
}

impl FromStr for Distance {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(UNKNOWN_DISTANCE) {
            return Ok(Distance::Unreachable);
        }
        s.parse::<u64>()
            .map(Distance::Km)
            .map_err(|_| EngineError::Validation(format!("invalid distance '{s}'")))
    }
}

impl Serialize for Distance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Distance::Km(km) => serializer.serialize_u64(*km),
            Distance::Unreachable => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub opp_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub min_cgpa: Cgpa,
    pub link: String,
    pub details: String,
    pub location: String,
    pub distance_km: Distance,
}

impl Opportunity {
    pub fn is_open_to(&self, cgpa: Cgpa) -> bool {
        self.min_cgpa <= cgpa
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Placement,
    Exam,
    Student,
}

/// Operations the host layer gates by role before calling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RegisterStudent,
    PostOpportunity,
    UpdateGrades,
    ManageUsers,
    ViewAll,
    ViewOwn,
}

impl Role {
    pub fn allows(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Placement => matches!(
                capability,
                RegisterStudent | PostOpportunity | ManageUsers | ViewAll | ViewOwn
            ),
            Role::Exam => matches!(capability, UpdateGrades | ViewAll | ViewOwn),
            Role::Student => matches!(capability, ViewOwn),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Placement => "Placement",
            Role::Exam => "Exam",
            Role::Student => "Student",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Placement" => Ok(Role::Placement),
            "Exam" => Ok(Role::Exam),
            "Student" => Ok(Role::Student),
            other => Err(EngineError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatistics {
    pub student_count: usize,
    pub opportunity_count: usize,
    pub average_cgpa: Option<f64>,
    pub highest_cgpa: Option<f64>,
    pub lowest_cgpa: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StandingSummary {
    pub standing: crate::standing::Standing,
    pub count: usize,
    pub avg_cgpa: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgpa_rejects_values_outside_scale() {
        assert!(Cgpa::new(0.0).is_ok());
        assert!(Cgpa::new(4.0).is_ok());
        assert!(matches!(
            Cgpa::new(4.01),
            Err(EngineError::OutOfRange { field: "cgpa", .. })
        ));
        assert!(Cgpa::new(-0.5).is_err());
        assert!(Cgpa::new(f64::NAN).is_err());
    }

    #[test]
    fn unreachable_sorts_last() {
        let mut distances = vec![Distance::Unreachable, Distance::Km(300), Distance::Km(12)];
        distances.sort();
        assert_eq!(
            distances,
            vec![Distance::Km(12), Distance::Km(300), Distance::Unreachable]
        );
    }

    #[test]
    fn distance_parses_persisted_forms() {
        assert_eq!("12".parse::<Distance>().unwrap(), Distance::Km(12));
        assert_eq!("Unknown".parse::<Distance>().unwrap(), Distance::Unreachable);
        assert!("-3".parse::<Distance>().is_err());
    }

    #[test]
    fn opportunity_type_parses_case_insensitively() {
        assert_eq!(
            "INTERNSHIP".parse::<OpportunityType>().unwrap(),
            OpportunityType::Internship
        );
        assert!("gig".parse::<OpportunityType>().is_err());
    }

    #[test]
    fn roles_gate_capabilities() {
        assert!(Role::Placement.allows(Capability::PostOpportunity));
        assert!(!Role::Placement.allows(Capability::UpdateGrades));
        assert!(Role::Exam.allows(Capability::UpdateGrades));
        assert!(!Role::Student.allows(Capability::ViewAll));
        assert!(Role::Student.allows(Capability::ViewOwn));
    }
}
