use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod engine;
mod error;
mod graph;
mod heap;
mod models;
mod opportunities;
mod report;
mod standing;
mod store;
mod students;
mod users;

use config::Config;
use engine::{Engine, NewOpportunity, NewStudent};
use error::{EngineError, WriteOutcome};
use graph::Route;
use models::{Capability, Distance, Role, User};
use store::RecordKind;
use students::SortOrder;

#[derive(Parser)]
#[command(name = "placement-index")]
#[command(about = "Student, opportunity and user index for the campus placement office", long_about = None)]
struct Cli {
    /// Directory holding the CSV record files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Location all opportunity distances are measured from
    #[arg(long, global = true)]
    origin: Option<String>,
    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(flatten)]
    auth: Auth,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Auth {
    #[arg(long = "user", global = true, env = "PLACEMENT_USER")]
    user: Option<String>,
    #[arg(long, global = true, env = "PLACEMENT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and empty record files
    Init,
    /// Load a realistic campus graph and sample records
    Seed,
    /// Register students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Check a username and password
    Login,
    /// Register a student (placement office)
    RegisterStudent {
        #[arg(long)]
        reg_no: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        program: String,
        #[arg(long = "student-password")]
        student_password: String,
    },
    /// Post an opportunity (placement office)
    PostOpportunity {
        #[arg(long)]
        opp_id: String,
        #[arg(long)]
        title: String,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        min_cgpa: f64,
        #[arg(long)]
        link: String,
        #[arg(long, default_value = "")]
        details: String,
        #[arg(long)]
        location: String,
    },
    /// Record a new CGPA (examination office)
    UpdateGpa {
        #[arg(long)]
        reg_no: String,
        #[arg(long)]
        gpa: f64,
    },
    /// Add a staff or student login (placement office)
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long = "new-password")]
        new_password: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// List students by CGPA
    Students {
        /// Only students at or above this CGPA
        #[arg(long, conflicts_with = "ascending")]
        min_cgpa: Option<f64>,
        /// Weakest first
        #[arg(long)]
        ascending: bool,
    },
    /// Show one student and the opportunities open to them
    Student { reg_no: String },
    /// Show one opportunity
    Opportunity { opp_id: String },
    /// Highest ranked students
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Aggregate figures across all records
    Stats,
    /// Shortest road distance to a location
    Distance {
        target: String,
        #[arg(long)]
        from: Option<String>,
    },
    /// Dump a record file as stored
    List {
        #[arg(value_enum)]
        kind: RecordKind,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "placement-report.md")]
        out: PathBuf,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse().map_err(|err: EngineError| err.to_string())
}

fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.data_dir.clone(), cli.origin.clone());

    match &cli.command {
        Commands::Init => {
            let store = config.store();
            let created = store
                .init()
                .context("failed to initialise the data directory")?;
            println!(
                "Data directory {} ready ({} files created).",
                store.dir().display(),
                created.len()
            );
            return Ok(());
        }
        Commands::Seed => {
            let (inserted, skipped) = seed(&config)?;
            println!("Seed data inserted ({inserted} records, {skipped} already present).");
            return Ok(());
        }
        _ => {}
    }

    let engine = Engine::open(&config).with_context(|| {
        format!(
            "failed to load records from {}",
            config.data_dir.display()
        )
    })?;

    match cli.command {
        Commands::Init | Commands::Seed => {}
        Commands::Import { csv } => {
            authorize(&engine, &cli.auth, Capability::RegisterStudent)?;
            let inserted = import_students(&engine, &csv)?;
            println!("Registered {inserted} students from {}.", csv.display());
        }
        Commands::Login => {
            let user = authenticate(&engine, &cli.auth)?;
            println!("Welcome {} ({} dashboard).", user.username, user.role);
        }
        Commands::RegisterStudent {
            reg_no,
            name,
            email,
            program,
            student_password,
        } => {
            authorize(&engine, &cli.auth, Capability::RegisterStudent)?;
            finish(engine.register_new_student(NewStudent {
                reg_no,
                name,
                email,
                program,
                password: student_password,
            }))?;
        }
        Commands::PostOpportunity {
            opp_id,
            title,
            kind,
            min_cgpa,
            link,
            details,
            location,
        } => {
            authorize(&engine, &cli.auth, Capability::PostOpportunity)?;
            finish(engine.post_new_opportunity(NewOpportunity {
                opp_id,
                title,
                kind,
                min_cgpa,
                link,
                details,
                location,
            }))?;
        }
        Commands::UpdateGpa { reg_no, gpa } => {
            authorize(&engine, &cli.auth, Capability::UpdateGrades)?;
            finish(engine.update_student_gpa(&reg_no, gpa))?;
        }
        Commands::AddUser {
            username,
            new_password,
            role,
        } => {
            authorize(&engine, &cli.auth, Capability::ManageUsers)?;
            finish(engine.add_user(&username, &new_password, role))?;
        }
        Commands::Students {
            min_cgpa,
            ascending,
        } => {
            authorize(&engine, &cli.auth, Capability::ViewAll)?;
            let students = match (min_cgpa, ascending) {
                (Some(min), _) => engine.eligible_students(min),
                (None, true) => engine.students_sorted(SortOrder::Ascending),
                (None, false) => engine.students_sorted_by_cgpa(),
            };
            if cli.json {
                return print_json(&students);
            }
            if students.is_empty() {
                println!("No students found.");
            }
            for (rank, student) in students.iter().enumerate() {
                println!(
                    "{:>3}. {} {} ({}) CGPA {:.2}",
                    rank + 1,
                    student.reg_no,
                    student.name,
                    student.program,
                    student.cgpa.value()
                );
            }
        }
        Commands::Student { reg_no } => {
            let user = authenticate(&engine, &cli.auth)?;
            let own = user.role.allows(Capability::ViewOwn) && user.username == reg_no;
            if !own && !user.role.allows(Capability::ViewAll) {
                bail!("{} may only view their own record", user.username);
            }
            let Some(student) = engine.student_by_reg_no(&reg_no) else {
                bail!("Student record {reg_no} not found");
            };
            let opportunities = engine.eligible_opportunities(&reg_no)?;
            if cli.json {
                return print_json(&serde_json::json!({
                    "student": student,
                    "opportunities": opportunities,
                }));
            }

            let history: Vec<String> = student.gpa_history.iter().map(|c| c.to_string()).collect();
            println!("{} {} <{}>", student.reg_no, student.name, student.email);
            println!("Program: {}", student.program);
            println!(
                "CGPA {:.2} ({})",
                student.cgpa.value(),
                standing::standing(student.cgpa)
            );
            if !history.is_empty() {
                println!("History: {}", history.join(" -> "));
            }
            println!("Eligible opportunities, nearest first:");
            if opportunities.is_empty() {
                println!("  none");
            }
            for opportunity in opportunities {
                println!(
                    "- {} [{}] {} in {} ({}) {}",
                    opportunity.opp_id,
                    opportunity.kind,
                    opportunity.title,
                    opportunity.location,
                    distance_label(opportunity.distance_km),
                    opportunity.link
                );
            }
        }
        Commands::Opportunity { opp_id } => {
            authenticate(&engine, &cli.auth)?;
            let Some(opportunity) = engine.opportunity_by_id(&opp_id) else {
                bail!("Opportunity {opp_id} not found");
            };
            if cli.json {
                return print_json(&opportunity);
            }
            println!(
                "{} [{}] {}",
                opportunity.opp_id, opportunity.kind, opportunity.title
            );
            println!(
                "Location: {} ({})",
                opportunity.location,
                distance_label(opportunity.distance_km)
            );
            println!("Minimum CGPA: {:.2}", opportunity.min_cgpa.value());
            println!("Apply: {}", opportunity.link);
            if !opportunity.details.is_empty() {
                println!("{}", opportunity.details);
            }
        }
        Commands::Top { limit } => {
            authorize(&engine, &cli.auth, Capability::ViewAll)?;
            let top = engine.top_students(limit);
            if cli.json {
                return print_json(&top);
            }
            println!("Top {} students by CGPA:", top.len());
            for student in top {
                println!(
                    "- {} ({}) CGPA {:.2}",
                    student.name,
                    student.reg_no,
                    student.cgpa.value()
                );
            }
        }
        Commands::Stats => {
            authorize(&engine, &cli.auth, Capability::ViewAll)?;
            let stats = engine.system_statistics();
            if cli.json {
                return print_json(&stats);
            }
            let label = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
            println!("Students: {}", stats.student_count);
            println!("Opportunities: {}", stats.opportunity_count);
            println!("Average CGPA: {}", label(stats.average_cgpa));
            println!("Highest CGPA: {}", label(stats.highest_cgpa));
            println!("Lowest CGPA: {}", label(stats.lowest_cgpa));
        }
        Commands::Distance { target, from } => {
            let graph = engine.graph();
            let from = from.unwrap_or_else(|| graph.origin().to_string());
            match graph.shortest_distance(&from, &target) {
                Ok(distance) => println!("{from} -> {target}: {}", distance_label(distance)),
                Err(err) => {
                    let known: Vec<&str> = graph.locations().collect();
                    bail!("{err} (known locations: {})", known.join(", "));
                }
            }
        }
        Commands::List { kind } => {
            authorize(&engine, &cli.auth, Capability::ViewAll)?;
            let table = engine.read_all(kind)?;
            if cli.json {
                return print_json(&table);
            }
            println!("{}", table.headers.join(" | "));
            for row in table.rows {
                println!("{}", row.join(" | "));
            }
        }
        Commands::Report { out } => {
            authorize(&engine, &cli.auth, Capability::ViewAll)?;
            let stats = engine.system_statistics();
            let students = engine.students_sorted_by_cgpa();
            let opportunities = engine.opportunities();
            let report = report::build_report(&report::ReportInput {
                origin: engine.graph().origin(),
                generated_at: Local::now(),
                stats: &stats,
                students: &students,
                opportunities: &opportunities,
            });
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn authenticate(engine: &Engine, auth: &Auth) -> anyhow::Result<User> {
    let (Some(username), Some(password)) = (&auth.user, &auth.password) else {
        bail!("this command needs --user and --password (or PLACEMENT_USER / PLACEMENT_PASSWORD)");
    };
    engine
        .authenticate_user(username, password)
        .context("Invalid credentials")
}

fn authorize(engine: &Engine, auth: &Auth, capability: Capability) -> anyhow::Result<User> {
    let user = authenticate(engine, auth)?;
    if !user.role.allows(capability) {
        bail!(
            "{} ({} role) is not allowed to {capability:?}",
            user.username,
            user.role
        );
    }
    Ok(user)
}

fn finish(result: error::Result<String>) -> anyhow::Result<()> {
    let outcome = WriteOutcome::from(result);
    if !outcome.success {
        bail!("❌ {}", outcome.message);
    }
    println!("✅ {}", outcome.message);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn distance_label(distance: Distance) -> String {
    match distance {
        Distance::Km(km) => format!("{km} km"),
        Distance::Unreachable => "distance unknown".to_string(),
    }
}

/// Writes the campus road graph when none exists, then adds sample records
/// through the engine. Records already present are counted, not replaced.
fn seed(config: &Config) -> anyhow::Result<(usize, usize)> {
    let store = config.store();
    store.init()?;
    if store.load_routes()?.records.is_empty() {
        let origin = config.origin.as_str();
        let routes = vec![
            Route::new(origin, "Mianwali", 25),
            Route::new("Mianwali", "Talagang", 95),
            Route::new("Talagang", "Islamabad", 135),
            Route::new("Islamabad", "Rawalpindi", 15),
            Route::new("Mianwali", "Bhakkar", 110),
            Route::new("Mianwali", "Sargodha", 150),
            Route::new("Sargodha", "Faisalabad", 95),
            Route::new("Faisalabad", "Lahore", 180),
            Route::new("Islamabad", "Lahore", 375),
            Route::new("Islamabad", "Peshawar", 185),
            Route::new("Gilgit", "Skardu", 210),
        ];
        store.save_routes(&routes)?;
        info!(routes = routes.len(), "campus routes written");
    }

    let engine = Engine::open(config)?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;
    let mut tally = |result: error::Result<String>| -> anyhow::Result<()> {
        match result {
            Ok(_) => inserted += 1,
            Err(EngineError::DuplicateKey { .. }) => skipped += 1,
            Err(err) => return Err(err.into()),
        }
        Ok(())
    };

    for (username, password, role) in [
        ("placement", "placement123", Role::Placement),
        ("exam", "exam123", Role::Exam),
    ] {
        tally(engine.add_user(username, password, role))?;
    }

    let students = [
        ("21-1234", "Ayesha Khan", "BS Computer Science", 3.2),
        ("21-1187", "Hamza Niazi", "BS Electrical Engineering", 3.65),
        ("22-0451", "Fatima Rauf", "BS Mathematics", 3.9),
        ("22-0302", "Usman Tariq", "BS Computer Science", 2.45),
        ("23-0119", "Mahnoor Saleem", "BS Business Studies", 1.85),
    ];
    for (reg_no, name, program, cgpa) in students {
        let email = format!("{}@namal.edu.pk", reg_no.replace('-', ""));
        let registered = engine.register_new_student(NewStudent {
            reg_no: reg_no.to_string(),
            name: name.to_string(),
            email,
            program: program.to_string(),
            password: "student123".to_string(),
        });
        let fresh = registered.is_ok();
        tally(registered)?;
        if fresh {
            engine.update_student_gpa(reg_no, cgpa)?;
        }
    }

    let opportunities = [
        ("OPP-001", "Software Engineering Intern", "Internship", 3.0, "Islamabad"),
        ("OPP-002", "Graduate Trainee Engineer", "Job", 2.5, "Lahore"),
        ("OPP-003", "Merit Scholarship", "Scholarship", 3.5, "Mianwali"),
        ("OPP-004", "Field Research Workshop", "Workshop", 2.0, "Skardu"),
    ];
    for (opp_id, title, kind, min_cgpa, location) in opportunities {
        tally(engine.post_new_opportunity(NewOpportunity {
            opp_id: opp_id.to_string(),
            title: title.to_string(),
            kind: kind.to_string(),
            min_cgpa,
            link: format!("https://placement.namal.edu.pk/{}", opp_id.to_lowercase()),
            details: String::new(),
            location: location.to_string(),
        }))?;
    }

    Ok((inserted, skipped))
}

fn import_students(engine: &Engine, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        reg_no: String,
        name: String,
        email: String,
        program: String,
        password: String,
        cgpa: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let reg_no = row.reg_no.trim().to_string();
        let registered = engine.register_new_student(NewStudent {
            reg_no: row.reg_no,
            name: row.name,
            email: row.email,
            program: row.program,
            password: row.password,
        });

        match registered {
            Ok(_) => inserted += 1,
            Err(err @ EngineError::DuplicateKey { .. }) => {
                warn!(%err, "skipping import row");
                continue;
            }
            Err(err) => return Err(err).with_context(|| format!("failed to import {reg_no}")),
        }

        if let Some(cgpa) = row.cgpa {
            engine.update_student_gpa(&reg_no, cgpa)?;
        }
    }

    Ok(inserted)
}
