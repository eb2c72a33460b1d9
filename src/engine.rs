//! Transaction boundary over the student, opportunity and user indexes.
//!
//! Writes hold the exclusive lock across every structure they touch and
//! across the file rewrite. A failed rewrite undoes the in-memory change
//! before the lock is released, so readers never see memory and disk
//! disagree.

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::graph::CampusGraph;
use crate::models::{Cgpa, Distance, Opportunity, Role, Student, SystemStatistics, User};
use crate::opportunities::{OpportunityDraft, OpportunityIndex};
use crate::store::{RawTable, RecordKind, RecordStore};
use crate::students::{SortOrder, StudentIndex};
use crate::users::UserDirectory;

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub reg_no: String,
    pub name: String,
    pub email: String,
    pub program: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewOpportunity {
    pub opp_id: String,
    pub title: String,
    pub kind: String,
    pub min_cgpa: f64,
    pub link: String,
    pub details: String,
    pub location: String,
}

#[derive(Debug, Default)]
struct Indexes {
    students: StudentIndex,
    opportunities: OpportunityIndex,
    users: UserDirectory,
}

pub struct Engine {
    graph: CampusGraph,
    store: RecordStore,
    state: RwLock<Indexes>,
}

impl Engine {
    /// Builds the graph from the routes file, then loads every record file.
    pub fn open(config: &Config) -> Result<Self> {
        let store = config.store();
        let routes = store.load_routes()?;
        let graph = CampusGraph::build(&config.origin, &routes.records)?;
        Self::load(graph, store)
    }

    pub fn load(graph: CampusGraph, store: RecordStore) -> Result<Self> {
        let mut state = Indexes::default();
        let students = store.load_students()?;
        let opportunities = store.load_opportunities()?;
        let users = store.load_users()?;
        let mut skipped = students.skipped + opportunities.skipped + users.skipped;

        for student in students.records {
            if let Err(err) = state.students.insert(student) {
                warn!(%err, "skipping student row");
                skipped += 1;
            }
        }
        for opportunity in opportunities.records {
            if let Err(err) = state.opportunities.insert_resolved(opportunity) {
                warn!(%err, "skipping opportunity row");
                skipped += 1;
            }
        }
        for user in users.records {
            if let Err(err) = state.users.insert(user) {
                warn!(%err, "skipping user row");
                skipped += 1;
            }
        }

        // A registration interrupted between the two file rewrites leaves a
        // student with no login. Recreate it from the student row.
        let orphans: Vec<User> = state
            .students
            .iter()
            .filter(|student| !state.users.contains(&student.reg_no))
            .map(|student| User {
                username: student.reg_no.clone(),
                password: student.password.clone(),
                role: Role::Student,
            })
            .collect();
        if !orphans.is_empty() {
            for login in orphans {
                warn!(reg_no = %login.username, "restoring missing student login");
                state.users.insert(login)?;
            }
            store.save_users(state.users.sorted())?;
        }

        if skipped > 0 {
            warn!(skipped, "started with rows left out");
        }
        info!(
            students = state.students.len(),
            opportunities = state.opportunities.len(),
            users = state.users.len(),
            origin = graph.origin(),
            "engine ready"
        );

        Ok(Engine {
            graph,
            store,
            state: RwLock::new(state),
        })
    }

    pub fn graph(&self) -> &CampusGraph {
        &self.graph
    }

    pub fn authenticate_user(&self, username: &str, password: &str) -> Option<User> {
        let user = self.state.read().users.authenticate(username, password).cloned();
        if user.is_none() {
            debug!("authentication failed");
        }
        user
    }

    /// Adds the student and a Student-role login named after the reg_no.
    pub fn register_new_student(&self, new: NewStudent) -> Result<String> {
        let reg_no = required("reg_no", &new.reg_no)?;
        let student = Student {
            name: required("name", &new.name)?,
            email: required("email", &new.email)?,
            program: required("program", &new.program)?,
            password: required("password", &new.password)?,
            reg_no: reg_no.clone(),
            cgpa: Cgpa::ZERO,
            gpa_history: Vec::new(),
        };
        let login = User {
            username: reg_no.clone(),
            password: student.password.clone(),
            role: Role::Student,
        };

        let mut state = self.state.write();
        if state.students.contains(&reg_no) {
            return Err(EngineError::duplicate("registration number", reg_no));
        }
        if state.users.contains(&reg_no) {
            return Err(EngineError::duplicate("username", reg_no));
        }
        state.students.insert(student)?;
        state.users.insert(login)?;

        let persisted = self
            .save_students(&state)
            .and_then(|()| self.store.save_users(state.users.sorted()));
        if let Err(err) = persisted {
            state.students.remove(&reg_no);
            state.users.remove(&reg_no);
            error!(%reg_no, %err, "registration rolled back");
            if let Err(restore) = self.save_students(&state) {
                error!(%restore, "students file could not be restored");
                return Err(EngineError::RollbackFailed {
                    cause: Box::new(err),
                    restore: Box::new(restore),
                });
            }
            return Err(err);
        }

        debug_assert!(state.students.is_consistent());
        info!(%reg_no, "student registered");
        Ok(format!("Student {reg_no} registered successfully"))
    }

    pub fn add_user(&self, username: &str, password: &str, role: Role) -> Result<String> {
        let user = User {
            username: required("username", username)?,
            password: required("password", password)?,
            role,
        };
        let username = user.username.clone();

        let mut state = self.state.write();
        state.users.insert(user)?;
        if let Err(err) = self.store.save_users(state.users.sorted()) {
            state.users.remove(&username);
            error!(%username, %err, "user creation rolled back");
            return Err(err);
        }

        info!(%username, %role, "user added");
        Ok(format!("User {username} added with role {role}"))
    }

    pub fn post_new_opportunity(&self, new: NewOpportunity) -> Result<String> {
        let draft = OpportunityDraft {
            opp_id: required("opp_id", &new.opp_id)?,
            title: required("title", &new.title)?,
            kind: required("type", &new.kind)?.parse()?,
            min_cgpa: Cgpa::checked("min_cgpa", new.min_cgpa)?,
            link: required("link", &new.link)?,
            details: new.details.trim().to_string(),
            location: required("location", &new.location)?,
        };
        let opp_id = draft.opp_id.clone();

        let mut state = self.state.write();
        let distance = state.opportunities.insert(draft, &self.graph)?.distance_km;

        if let Err(err) = self.store.save_opportunities(state.opportunities.all()) {
            state.opportunities.remove(&opp_id);
            error!(%opp_id, %err, "opportunity rolled back");
            return Err(err);
        }

        info!(%opp_id, %distance, "opportunity posted");
        let origin = self.graph.origin();
        Ok(match distance {
            Distance::Km(km) => format!("Opportunity {opp_id} posted ({km} km from {origin})"),
            Distance::Unreachable => {
                format!("Opportunity {opp_id} posted (no route from {origin})")
            }
        })
    }

    pub fn update_student_gpa(&self, reg_no: &str, gpa: f64) -> Result<String> {
        let gpa = Cgpa::new(gpa)?;

        let mut state = self.state.write();
        let Some(before) = state.students.get(reg_no).cloned() else {
            return Err(EngineError::not_found("student", reg_no));
        };
        let old = state.students.update_cgpa(reg_no, gpa.value())?;

        if let Err(err) = self.save_students(&state) {
            state.students.remove(reg_no);
            state.students.insert(before)?;
            error!(%reg_no, %err, "gpa update rolled back");
            return Err(err);
        }

        debug_assert!(state.students.is_consistent());
        info!(%reg_no, %old, new = %gpa, "gpa updated");
        Ok(format!("GPA for {reg_no} updated from {old} to {gpa}"))
    }

    /// Best first, for dashboards.
    pub fn students_sorted_by_cgpa(&self) -> Vec<Student> {
        self.students_sorted(SortOrder::Descending)
    }

    pub fn students_sorted(&self, order: SortOrder) -> Vec<Student> {
        self.state
            .read()
            .students
            .sorted_by_cgpa(order)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn student_by_reg_no(&self, reg_no: &str) -> Option<Student> {
        self.state.read().students.get(reg_no).cloned()
    }

    /// Students with cgpa >= `min_cgpa`, in the same order as
    /// `students_sorted_by_cgpa`.
    pub fn eligible_students(&self, min_cgpa: f64) -> Vec<Student> {
        self.state
            .read()
            .students
            .at_least(min_cgpa)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn top_students(&self, k: usize) -> Vec<Student> {
        self.state
            .read()
            .students
            .top_k(k)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn opportunity_by_id(&self, opp_id: &str) -> Option<Opportunity> {
        self.state.read().opportunities.get(opp_id).cloned()
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.state
            .read()
            .opportunities
            .all()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Opportunities open to the student, nearest first. Unreachable
    /// locations come last; ties go by opp_id.
    pub fn eligible_opportunities(&self, reg_no: &str) -> Result<Vec<Opportunity>> {
        let state = self.state.read();
        let student = state
            .students
            .get(reg_no)
            .ok_or_else(|| EngineError::not_found("student", reg_no))?;

        let mut open: Vec<Opportunity> = state
            .opportunities
            .eligible_for(student.cgpa)
            .into_iter()
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            a.distance_km
                .cmp(&b.distance_km)
                .then_with(|| a.opp_id.cmp(&b.opp_id))
        });
        Ok(open)
    }

    /// Recomputed from the records on every call.
    pub fn system_statistics(&self) -> SystemStatistics {
        let state = self.state.read();
        let (sum, highest, lowest) = state.students.iter().fold(
            (0.0f64, None::<f64>, None::<f64>),
            |(sum, highest, lowest), student| {
                let cgpa = student.cgpa.value();
                (
                    sum + cgpa,
                    Some(highest.map_or(cgpa, |h| h.max(cgpa))),
                    Some(lowest.map_or(cgpa, |l| l.min(cgpa))),
                )
            },
        );
        let count = state.students.len();

        SystemStatistics {
            student_count: count,
            opportunity_count: state.opportunities.len(),
            average_cgpa: (!state.students.is_empty()).then(|| sum / count as f64),
            highest_cgpa: highest,
            lowest_cgpa: lowest,
        }
    }

    fn save_students(&self, state: &Indexes) -> Result<()> {
        self.store
            .save_students(state.students.sorted_by_cgpa(SortOrder::Descending))
    }

    /// Raw rows of one record file. Holds the shared lock so no write is
    /// mid-flight while the file is read.
    pub fn read_all(&self, kind: RecordKind) -> Result<RawTable> {
        let _state = self.state.read();
        self.store.read_raw(kind)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}
