use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::models::{Distance, Opportunity, Student, SystemStatistics};
use crate::standing;

const TOP_STUDENTS: usize = 10;
const ELIGIBLE_PREVIEW: usize = 5;

/// Everything the placement dashboard report is built from.
pub struct ReportInput<'a> {
    pub origin: &'a str,
    pub generated_at: DateTime<Local>,
    pub stats: &'a SystemStatistics,
    /// Best first.
    pub students: &'a [Student],
    pub opportunities: &'a [Opportunity],
}

/// "A, B, C, D, E and 3 more..." over students already ordered best first.
pub fn eligible_preview(eligible: &[&Student]) -> String {
    let mut names = eligible
        .iter()
        .take(ELIGIBLE_PREVIEW)
        .map(|student| student.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if eligible.len() > ELIGIBLE_PREVIEW {
        let _ = write!(names, " and {} more...", eligible.len() - ELIGIBLE_PREVIEW);
    }
    names
}

fn cgpa_label(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    let stats = input.stats;

    let _ = writeln!(output, "# Placement Office Report");
    let _ = writeln!(
        output,
        "Generated {} (distances from {})",
        input.generated_at.format("%Y-%m-%d %H:%M"),
        input.origin
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Students: {}", stats.student_count);
    let _ = writeln!(output, "- Opportunities: {}", stats.opportunity_count);
    let _ = writeln!(
        output,
        "- CGPA average {} / highest {} / lowest {}",
        cgpa_label(stats.average_cgpa),
        cgpa_label(stats.highest_cgpa),
        cgpa_label(stats.lowest_cgpa)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Standing Mix");
    let summaries = standing::summarize_by_standing(input.students);
    if summaries.is_empty() {
        let _ = writeln!(output, "No students registered.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg CGPA {:.2})",
                summary.standing, summary.count, summary.avg_cgpa
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Students");
    if input.students.is_empty() {
        let _ = writeln!(output, "No students registered.");
    } else {
        for student in input.students.iter().take(TOP_STUDENTS) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) CGPA {:.2}",
                student.name, student.reg_no, student.program, student.cgpa.value()
            );
        }
    }

    let mut ascending = input.students.to_vec();
    ascending.reverse();
    let support = standing::support_candidates(&ascending);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Support Program Candidates");
    if support.is_empty() {
        let _ = writeln!(output, "No students on probation.");
    } else {
        for student in support {
            let _ = writeln!(
                output,
                "- {} ({}) CGPA {:.2}",
                student.name, student.reg_no, student.cgpa.value()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Opportunities");
    if input.opportunities.is_empty() {
        let _ = writeln!(output, "No opportunities posted.");
    } else {
        for opportunity in input.opportunities {
            let eligible: Vec<&Student> = input
                .students
                .iter()
                .take_while(|student| opportunity.is_open_to(student.cgpa))
                .collect();
            let distance = match opportunity.distance_km {
                Distance::Km(km) => format!("{km} km"),
                Distance::Unreachable => "distance unknown".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} [{}] {} in {} ({}), min CGPA {:.2}: {} eligible",
                opportunity.opp_id,
                opportunity.kind,
                opportunity.title,
                opportunity.location,
                distance,
                opportunity.min_cgpa.value(),
                eligible.len()
            );
            if !eligible.is_empty() {
                let _ = writeln!(output, "  - {}", eligible_preview(&eligible));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cgpa, OpportunityType};

    fn student(name: &str, cgpa: f64) -> Student {
        Student {
            reg_no: format!("21-{name}"),
            name: name.to_string(),
            email: format!("{name}@namal.edu.pk"),
            program: "BSCS".to_string(),
            password: "pw".to_string(),
            cgpa: Cgpa::new(cgpa).unwrap(),
            gpa_history: Vec::new(),
        }
    }

    #[test]
    fn preview_truncates_after_five() {
        let students: Vec<Student> = ["A", "B", "C", "D", "E", "F", "G"]
            .iter()
            .map(|n| student(n, 3.0))
            .collect();
        let refs: Vec<&Student> = students.iter().collect();
        assert_eq!(eligible_preview(&refs), "A, B, C, D, E and 2 more...");
        assert_eq!(eligible_preview(&refs[..2]), "A, B");
    }

    #[test]
    fn report_lists_sections() {
        let students = vec![student("Sana", 3.7), student("Omar", 3.1), student("Zain", 1.6)];
        let opportunities = vec![Opportunity {
            opp_id: "OPP1".to_string(),
            title: "Data Intern".to_string(),
            kind: OpportunityType::Internship,
            min_cgpa: Cgpa::new(3.0).unwrap(),
            link: "https://example.com".to_string(),
            details: String::new(),
            location: "Islamabad".to_string(),
            distance_km: Distance::Km(255),
        }];
        let stats = SystemStatistics {
            student_count: 3,
            opportunity_count: 1,
            average_cgpa: Some(2.8),
            highest_cgpa: Some(3.7),
            lowest_cgpa: Some(1.6),
        };
        let report = build_report(&ReportInput {
            origin: "Namal",
            generated_at: Local::now(),
            stats: &stats,
            students: &students,
            opportunities: &opportunities,
        });

        assert!(report.contains("## Standing Mix"));
        assert!(report.contains("- Sana (21-Sana, BSCS) CGPA 3.70"));
        assert!(report.contains("## Support Program Candidates\n- Zain (21-Zain) CGPA 1.60"));
        assert!(report.contains("OPP1 [Internship] Data Intern in Islamabad (255 km), min CGPA 3.00: 2 eligible"));
        assert!(report.contains("  - Sana, Omar"));
    }
}
