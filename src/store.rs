//! CSV-backed persistence. Every save rewrites one file through a temp file
//! and a rename, so readers only ever see a complete file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::graph::Route;
use crate::models::{Cgpa, Opportunity, Student, User};

const HISTORY_DELIMITER: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordKind {
    Students,
    Opportunities,
    Users,
    Routes,
}

impl RecordKind {
    pub fn file_name(self) -> &'static str {
        match self {
            RecordKind::Students => "students.csv",
            RecordKind::Opportunities => "opportunities.csv",
            RecordKind::Users => "users.csv",
            RecordKind::Routes => "routes.csv",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            RecordKind::Students => &[
                "reg_no",
                "name",
                "email",
                "program",
                "password",
                "cgpa",
                "gpa_history",
            ],
            RecordKind::Opportunities => &[
                "opp_id", "title", "type", "min_cgpa", "link", "details", "location", "distance",
            ],
            RecordKind::Users => &["username", "password", "role"],
            RecordKind::Routes => &["from", "to", "km"],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StudentRow {
    reg_no: String,
    name: String,
    email: String,
    program: String,
    password: String,
    cgpa: f64,
    gpa_history: String,
}

impl StudentRow {
    fn from_student(student: &Student) -> Self {
        let history: Vec<String> = student.gpa_history.iter().map(Cgpa::to_string).collect();
        StudentRow {
            reg_no: student.reg_no.clone(),
            name: student.name.clone(),
            email: student.email.clone(),
            program: student.program.clone(),
            password: student.password.clone(),
            cgpa: student.cgpa.value(),
            gpa_history: history.join(HISTORY_DELIMITER),
        }
    }

    fn into_student(self) -> Result<Student> {
        if self.reg_no.trim().is_empty() {
            return Err(EngineError::Validation("empty reg_no".to_string()));
        }
        let gpa_history = self
            .gpa_history
            .split(HISTORY_DELIMITER)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let value: f64 = entry.parse().map_err(|_| {
                    EngineError::Validation(format!("invalid history entry '{entry}'"))
                })?;
                Cgpa::new(value)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Student {
            reg_no: self.reg_no,
            name: self.name,
            email: self.email,
            program: self.program,
            password: self.password,
            cgpa: Cgpa::new(self.cgpa)?,
            gpa_history,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpportunityRow {
    opp_id: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
    min_cgpa: f64,
    link: String,
    details: String,
    location: String,
    distance: String,
}

impl OpportunityRow {
    fn from_opportunity(opportunity: &Opportunity) -> Self {
        OpportunityRow {
            opp_id: opportunity.opp_id.clone(),
            title: opportunity.title.clone(),
            kind: opportunity.kind.to_string(),
            min_cgpa: opportunity.min_cgpa.value(),
            link: opportunity.link.clone(),
            details: opportunity.details.clone(),
            location: opportunity.location.clone(),
            distance: opportunity.distance_km.to_string(),
        }
    }

    fn into_opportunity(self) -> Result<Opportunity> {
        if self.opp_id.trim().is_empty() {
            return Err(EngineError::Validation("empty opp_id".to_string()));
        }
        Ok(Opportunity {
            kind: self.kind.parse()?,
            min_cgpa: Cgpa::checked("min_cgpa", self.min_cgpa)?,
            distance_km: self.distance.parse()?,
            opp_id: self.opp_id,
            title: self.title,
            link: self.link,
            details: self.details,
            location: self.location,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    username: String,
    password: String,
    role: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        if self.username.trim().is_empty() {
            return Err(EngineError::Validation("empty username".to_string()));
        }
        Ok(User {
            role: self.role.parse()?,
            username: self.username,
            password: self.password,
        })
    }
}

/// Records read from one file plus the count of rows that were dropped.
#[derive(Debug)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

/// A file's rows as plain strings, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: RecordKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Creates the data directory and header-only files for any that are
    /// missing. Returns the files it created.
    pub fn init(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir).map_err(|e| persistence(&self.dir, e.into()))?;

        let mut created = Vec::new();
        for kind in [
            RecordKind::Students,
            RecordKind::Opportunities,
            RecordKind::Users,
            RecordKind::Routes,
        ] {
            let path = self.path(kind);
            if path.exists() {
                continue;
            }
            self.write_atomic::<StudentRow>(kind, std::iter::empty())?;
            created.push(path);
        }
        Ok(created)
    }

    pub fn load_students(&self) -> Result<Loaded<Student>> {
        self.load_rows(RecordKind::Students, StudentRow::into_student)
    }

    pub fn load_opportunities(&self) -> Result<Loaded<Opportunity>> {
        self.load_rows(RecordKind::Opportunities, OpportunityRow::into_opportunity)
    }

    pub fn load_users(&self) -> Result<Loaded<User>> {
        self.load_rows(RecordKind::Users, UserRow::into_user)
    }

    pub fn load_routes(&self) -> Result<Loaded<Route>> {
        self.load_rows(RecordKind::Routes, |route: Route| Ok(route))
    }

    pub fn save_students<'a>(&self, students: impl IntoIterator<Item = &'a Student>) -> Result<()> {
        let rows = students.into_iter().map(StudentRow::from_student);
        self.write_atomic(RecordKind::Students, rows)
    }

    pub fn save_opportunities<'a>(
        &self,
        opportunities: impl IntoIterator<Item = &'a Opportunity>,
    ) -> Result<()> {
        let rows = opportunities
            .into_iter()
            .map(OpportunityRow::from_opportunity);
        self.write_atomic(RecordKind::Opportunities, rows)
    }

    pub fn save_users<'a>(&self, users: impl IntoIterator<Item = &'a User>) -> Result<()> {
        let rows = users.into_iter().map(|user| UserRow {
            username: user.username.clone(),
            password: user.password.clone(),
            role: user.role.to_string(),
        });
        self.write_atomic(RecordKind::Users, rows)
    }

    pub fn save_routes(&self, routes: &[Route]) -> Result<()> {
        self.write_atomic(RecordKind::Routes, routes.iter())
    }

    /// Reads a file without interpreting it. A missing file yields just the
    /// expected headers.
    pub fn read_raw(&self, kind: RecordKind) -> Result<RawTable> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(RawTable {
                headers: kind.headers().iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            });
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| persistence(&path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| persistence(&path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| persistence(&path, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(RawTable { headers, rows })
    }

    fn load_rows<R, T>(&self, kind: RecordKind, convert: impl Fn(R) -> Result<T>) -> Result<Loaded<T>>
    where
        R: DeserializeOwned,
    {
        let path = self.path(kind);
        if !path.exists() {
            warn!(file = %path.display(), "record file missing, starting empty");
            return Ok(Loaded {
                records: Vec::new(),
                skipped: 0,
            });
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| persistence(&path, e))?;
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in reader.deserialize::<R>().enumerate() {
            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(|raw| convert(raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(record) => records.push(record),
                Err(reason) => {
                    // +2: one for the header line, one for 1-based numbering
                    warn!(file = %path.display(), line = row + 2, %reason, "skipping malformed row");
                    skipped += 1;
                }
            }
        }

        info!(file = %path.display(), loaded = records.len(), skipped, "records loaded");
        Ok(Loaded { records, skipped })
    }

    fn write_atomic<S: Serialize>(
        &self,
        kind: RecordKind,
        rows: impl IntoIterator<Item = S>,
    ) -> Result<()> {
        let path = self.path(kind);
        let tmp = path.with_extension("csv.tmp");

        let written = (|| -> std::result::Result<usize, csv::Error> {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp)?;
            writer.write_record(kind.headers())?;
            let mut count = 0usize;
            for row in rows {
                writer.serialize(row)?;
                count += 1;
            }
            writer.flush()?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(count)
        })();

        match written {
            Ok(count) => {
                debug!(file = %path.display(), rows = count, "record file rewritten");
                Ok(())
            }
            Err(source) => {
                let _ = fs::remove_file(&tmp);
                Err(persistence(&path, source))
            }
        }
    }
}

fn persistence(path: &Path, source: csv::Error) -> EngineError {
    EngineError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}
