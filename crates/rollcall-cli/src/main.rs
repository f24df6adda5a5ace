use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rollcall_core::ScrfdDetector;
use rollcall_service::{
    spawn_engine, transport, AttendanceService, Config, EngineHandle, NewEnrollment,
};
use rollcall_store::{Db, MarkOutcome, RequestStatus};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-verified student attendance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student (admin action) from a face photo
    Enroll {
        /// Student id
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Class name, e.g. "10-B"
        #[arg(long)]
        class: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Path to the face image
        #[arg(long)]
        image: PathBuf,
    },
    /// File a self-registration request (needs admin approval)
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        class: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        image: PathBuf,
    },
    /// Verify a face against a student's enrolled descriptor
    Verify {
        #[arg(long)]
        id: String,
        #[arg(long)]
        image: PathBuf,
    },
    /// Mark attendance for today via face verification
    Mark {
        #[arg(long)]
        id: String,
        #[arg(long)]
        image: PathBuf,
        /// Claimed latitude (needed when a geofence is configured)
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        /// Claimed longitude
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },
    /// List enrolled students
    ListStudents,
    /// Show attendance records, optionally for one student
    Attendance {
        #[arg(long)]
        id: Option<String>,
    },
    /// Admin correction: mark a student present without face verification
    MarkPresent {
        #[arg(long)]
        id: String,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Admin correction: delete a student's record for a date
    MarkAbsent {
        #[arg(long)]
        id: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// List registration requests (pending by default)
    Requests {
        #[arg(long)]
        all: bool,
    },
    /// Approve a pending registration request
    Approve {
        request_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject a pending registration request
    Reject {
        request_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Enroll {
            id,
            name,
            class,
            password,
            email,
            image,
        } => {
            let engine = start_engine(&config)?;
            let payload = read_payload(&image)?;
            engine
                .enroll(
                    NewEnrollment {
                        id: id.clone(),
                        name,
                        class_name: class,
                        password,
                        email,
                    },
                    payload,
                )
                .await?;
            println!("Student {id} enrolled");
        }
        Commands::Register {
            id,
            name,
            class,
            password,
            email,
            image,
        } => {
            let engine = start_engine(&config)?;
            let payload = read_payload(&image)?;
            let request_id = engine
                .register(
                    NewEnrollment {
                        id,
                        name,
                        class_name: class,
                        password,
                        email,
                    },
                    payload,
                )
                .await?;
            println!("Registration request filed: {request_id}");
        }
        Commands::Verify { id, image } => {
            let engine = start_engine(&config)?;
            let payload = read_payload(&image)?;
            let report = engine.verify(id, payload).await?;
            match report.distance {
                Some(d) => println!(
                    "match: {} (distance {d:.2}, threshold {:.2})",
                    report.matched, config.match_threshold
                ),
                None => println!("match: false (descriptor length mismatch)"),
            }
        }
        Commands::Mark { id, image, lat, lon } => {
            let engine = start_engine(&config)?;
            let payload = read_payload(&image)?;
            let location = lat.zip(lon);
            let outcome = engine
                .mark(id.clone(), payload, location, Local::now().naive_local())
                .await?;
            match outcome {
                MarkOutcome::Marked(r) => {
                    println!("Attendance marked for {id} on {} at {}", r.date, r.time)
                }
                MarkOutcome::AlreadyMarked(r) => {
                    println!("Attendance already marked for today (at {})", r.time)
                }
            }
        }
        Commands::ListStudents => {
            let db = Db::open(&config.db_path)?;
            for s in db.list_students()? {
                let enrolled = if s.descriptor.is_some() { "enrolled" } else { "no descriptor" };
                println!("{}  {}  {}  [{enrolled}]", s.id, s.name, s.class_name);
            }
        }
        Commands::Attendance { id } => {
            let db = Db::open(&config.db_path)?;
            let records = match id {
                Some(id) => db.attendance_for_student(&id)?,
                None => db.list_attendance()?,
            };
            for r in records {
                println!("{}  {}  {}  {}", r.date, r.time, r.student_id, r.status);
            }
        }
        Commands::MarkPresent { id, date } => {
            let mut db = Db::open(&config.db_path)?;
            let date = parse_date_or_today(date.as_deref())?;
            match db.mark_attendance(&id, date, Local::now().time())? {
                MarkOutcome::Marked(_) => println!("Marked {id} present on {date}"),
                MarkOutcome::AlreadyMarked(_) => {
                    println!("Attendance already marked for {id} on {date}")
                }
            }
        }
        Commands::MarkAbsent { id, date } => {
            let db = Db::open(&config.db_path)?;
            let date = parse_date_or_today(date.as_deref())?;
            if db.remove_attendance(&id, date)? {
                println!("Marked {id} absent on {date}");
            } else {
                println!("No attendance record for {id} on {date}");
            }
        }
        Commands::Requests { all } => {
            let db = Db::open(&config.db_path)?;
            let filter = if all { None } else { Some(RequestStatus::Pending) };
            for r in db.list_requests(filter)? {
                println!("{}  {}  {}  [{}]", r.id, r.student_id, r.name, r.status);
            }
        }
        Commands::Approve { request_id, notes } => {
            let mut db = Db::open(&config.db_path)?;
            let r = db.approve_request(&request_id, notes.as_deref())?;
            println!("Approved request {} for student {}", r.id, r.student_id);
        }
        Commands::Reject { request_id, notes } => {
            let db = Db::open(&config.db_path)?;
            let r = db.reject_request(&request_id, notes.as_deref())?;
            println!("Rejected request {} for student {}", r.id, r.student_id);
        }
    }

    Ok(())
}

/// Open the database and detector, then move them onto the engine thread.
fn start_engine(config: &Config) -> Result<EngineHandle> {
    let db = Db::open(&config.db_path).context("opening database")?;
    let detector = ScrfdDetector::load(
        &config.detector_model_path(),
        config.detector_score_threshold,
    )
    .context("loading face detection model")?;
    let service = AttendanceService::new(
        Box::new(detector),
        db,
        rollcall_core::DescriptorExtractor::new(config.crop_size),
        rollcall_core::MatchPolicy::new(config.match_threshold),
        config.gates(),
    );
    Ok(spawn_engine(service))
}

fn read_payload(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    Ok(transport::encode_payload(&bytes))
}

fn parse_date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date: {s} (expected YYYY-MM-DD)")),
        None => Ok(Local::now().date_naive()),
    }
}
