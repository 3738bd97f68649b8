mod aggregate;
mod db;
mod error;
mod models;
mod parser;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::Regex;
use rusqlite::Connection;
use tracing::{error, warn};

// e.g. "202310_sections.html", "202310_catalogue.html"
static PAGE_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(10|20|30)_(sections|catalogue|attributes)\.html$").unwrap()
});

#[derive(Parser)]
#[command(
    name = "course_watcher",
    about = "Parses archived course section tables and aggregates per-course snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage downloaded term pages from a directory into the store
    Ingest {
        /// Directory of <year><term>_<kind>.html files
        dir: PathBuf,
    },
    /// Parse staged terms into section/schedule/summary/attribute records
    Parse {
        /// Max terms to parse (default: all staged)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Rebuild one snapshot per known course from all stored sources
    Build,
    /// Ingest + parse + build in one pipeline
    Run { dir: PathBuf },
    /// Show store statistics
    Stats,
    /// Export course snapshots as JSON
    Export {
        #[arg(short, long, default_value = "data/courses.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let conn = db::connect()?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Ingest { dir } => {
            ingest(&conn, &dir)?;
        }
        Commands::Parse { limit } => {
            parse_terms(&conn, limit)?;
        }
        Commands::Build => {
            build_snapshots(&conn)?;
        }
        Commands::Run { dir } => {
            ingest(&conn, &dir)?;
            parse_terms(&conn, None)?;
            build_snapshots(&conn)?;
        }
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("Staged terms:     {}", s.staged_terms);
            println!("Sections:         {}", s.sections);
            println!("Schedule entries: {}", s.schedule_entries);
            println!("Summaries:        {}", s.summaries);
            println!("Attributes:       {}", s.attributes);
            println!("Course pages:     {}", s.pages);
            println!("Transfers:        {}", s.transfers);
            println!("Courses:          {}", s.courses);
            println!("Snapshots:        {}", s.snapshots);
        }
        Commands::Export { out } => {
            export_snapshots(&conn, &out)?;
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn ingest(conn: &Connection, dir: &Path) -> Result<()> {
    let mut staged = 0;
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(caps) = PAGE_FILE_RE.captures(&name) else {
            continue;
        };
        let year: i32 = caps[1].parse()?;
        let term: i32 = caps[2].parse()?;
        let html = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        db::upsert_term_page(conn, year, term, &caps[3], &html)?;
        staged += 1;
    }
    println!("Staged {} term pages from {}", staged, dir.display());
    Ok(())
}

fn parse_terms(conn: &Connection, limit: Option<usize>) -> Result<()> {
    let blobs = db::fetch_term_blobs(conn, limit)?;
    if blobs.is_empty() {
        println!("No staged terms. Run 'ingest' first.");
        return Ok(());
    }
    println!("Parsing {} terms...", blobs.len());

    let pb = progress_bar(blobs.len());
    let mut parsed = 0;
    let mut failed = 0;

    // terms are independent: parse a chunk in parallel, then write the
    // batches sequentially on the one connection
    for chunk in blobs.chunks(32) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|b| (b.year, b.term, parser::process_term(b)))
            .collect();

        for (year, term, result) in results {
            match result {
                Ok(batch) => {
                    db::save_term_batch(conn, &batch)?;
                    parsed += 1;
                }
                Err(err) => {
                    warn!(year, term, error = %err, "term parse failed; batch discarded");
                    failed += 1;
                }
            }
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    println!("Parsed {} terms ({} failed).", parsed, failed);
    Ok(())
}

fn build_snapshots(conn: &Connection) -> Result<()> {
    let courses = db::load_course_list(conn)?;
    if courses.is_empty() {
        println!("No known courses. Run 'parse' first.");
        return Ok(());
    }
    println!("Building {} course snapshots...", courses.len());

    let pb = progress_bar(courses.len());
    let mut snapshots = Vec::with_capacity(courses.len());
    let mut skipped = 0;

    for key in &courses {
        let sources = db::load_course_sources(conn, key)?;
        match aggregate::build_snapshot(key, &sources) {
            Ok(snap) => snapshots.push(snap),
            Err(err) => {
                error!(
                    subject = %key.subject,
                    course_code = %key.course_code,
                    error = %err,
                    "stored records are inconsistent; snapshot skipped"
                );
                skipped += 1;
            }
        }
        pb.inc(1);
    }

    db::save_snapshots(conn, &snapshots)?;
    pb.finish_and_clear();
    println!("Built {} snapshots ({} skipped).", snapshots.len(), skipped);
    Ok(())
}

fn export_snapshots(conn: &Connection, out: &Path) -> Result<()> {
    #[derive(serde::Serialize)]
    struct ExportDoc<'a> {
        generated_at: String,
        courses: &'a [models::CourseSnapshot],
    }

    let snapshots = db::load_snapshots(conn)?;
    let doc = ExportDoc {
        generated_at: chrono::Utc::now().to_rfc3339(),
        courses: &snapshots,
    };
    if let Some(dir) = out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(out, serde_json::to_string_pretty(&doc)?)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Exported {} snapshots to {}", snapshots.len(), out.display());
    Ok(())
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
