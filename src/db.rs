//! SQLite store. All writes are idempotent upserts keyed by each record's
//! string primary key: the parser and aggregator always supply fully
//! populated records, so `INSERT OR REPLACE` gives the required merge
//! semantics. Writes for a term go through one transaction on one
//! connection, which serializes same-key writes from parallel term parses.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::aggregate::{CourseKey, CourseSources};
use crate::models::{
    CourseAttribute, CoursePage, CourseSnapshot, CourseSummary, RpStatus, SeatStatus, Section,
    Transfer, Waitlist,
};
use crate::parser::{TermBatch, TermBlobs};

pub fn path() -> PathBuf {
    match env::var("COURSE_DB_PATH") {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("data/courses.sqlite"),
    }
}

pub fn connect() -> Result<Connection> {
    let p = path();
    if let Some(dir) = p.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(&p).with_context(|| format!("Failed to open {:?}", p))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS term_pages (
            year       INTEGER NOT NULL,
            term       INTEGER NOT NULL,
            kind       TEXT NOT NULL CHECK(kind IN ('sections','catalogue','attributes')),
            html       TEXT NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (year, term, kind)
        );

        CREATE TABLE IF NOT EXISTS courses (
            subject     TEXT NOT NULL,
            course_code TEXT NOT NULL,
            PRIMARY KEY (subject, course_code)
        );

        CREATE TABLE IF NOT EXISTS sections (
            id                TEXT PRIMARY KEY,
            subject           TEXT NOT NULL,
            course_code       TEXT NOT NULL,
            year              INTEGER NOT NULL,
            term              INTEGER NOT NULL,
            crn               INTEGER NOT NULL,
            rp                TEXT,
            seats             TEXT,
            waitlist          TEXT,
            section           TEXT,
            credits           REAL NOT NULL,
            abbreviated_title TEXT,
            add_fees          REAL,
            rpt_limit         INTEGER,
            notes             TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sections_course ON sections(subject, course_code);
        CREATE INDEX IF NOT EXISTS idx_sections_term ON sections(year, term);

        CREATE TABLE IF NOT EXISTS schedule_entries (
            id           TEXT PRIMARY KEY,
            section_id   TEXT NOT NULL,
            subject      TEXT NOT NULL,
            course_code  TEXT NOT NULL,
            year         INTEGER NOT NULL,
            term         INTEGER NOT NULL,
            crn          INTEGER NOT NULL,
            seq          INTEGER NOT NULL,
            meeting_type TEXT,
            days         TEXT,
            time         TEXT,
            start_date   TEXT,
            end_date     TEXT,
            room         TEXT,
            instructor   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_schedule_section ON schedule_entries(section_id);
        CREATE INDEX IF NOT EXISTS idx_schedule_term ON schedule_entries(year, term);

        CREATE TABLE IF NOT EXISTS course_summaries (
            id                      TEXT PRIMARY KEY,
            subject                 TEXT NOT NULL,
            course_code             TEXT NOT NULL,
            year                    INTEGER NOT NULL,
            term                    INTEGER NOT NULL,
            title                   TEXT NOT NULL,
            description             TEXT,
            desc_replacement_course TEXT,
            desc_last_updated       TEXT,
            desc_requisites         TEXT,
            credits                 REAL NOT NULL,
            hours_lecture           REAL NOT NULL,
            hours_seminar           REAL NOT NULL,
            hours_lab               REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_summaries_course ON course_summaries(subject, course_code);

        CREATE TABLE IF NOT EXISTS course_pages (
            id                            TEXT PRIMARY KEY,
            subject                       TEXT NOT NULL,
            course_code                   TEXT NOT NULL,
            title                         TEXT NOT NULL,
            description                   TEXT,
            desc_replacement_course       TEXT,
            desc_duplicate_credit         TEXT,
            desc_registration_restriction TEXT,
            desc_prerequisite             TEXT,
            credits                       REAL NOT NULL,
            hours_lecture                 REAL NOT NULL,
            hours_seminar                 REAL NOT NULL,
            hours_lab                     REAL NOT NULL,
            university_transferrable      INTEGER NOT NULL,
            offered_online                INTEGER NOT NULL,
            preparatory_course            INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pages_course ON course_pages(subject, course_code);

        CREATE TABLE IF NOT EXISTS course_attributes (
            id          TEXT PRIMARY KEY,
            subject     TEXT NOT NULL,
            course_code TEXT NOT NULL,
            year        INTEGER NOT NULL,
            term        INTEGER NOT NULL,
            attr_ar     INTEGER NOT NULL,
            attr_sc     INTEGER NOT NULL,
            attr_hum    INTEGER NOT NULL,
            attr_lsc    INTEGER NOT NULL,
            attr_sci    INTEGER NOT NULL,
            attr_soc    INTEGER NOT NULL,
            attr_ut     INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attributes_course ON course_attributes(subject, course_code);

        CREATE TABLE IF NOT EXISTS transfers (
            id              TEXT PRIMARY KEY,
            subject         TEXT NOT NULL,
            course_code     TEXT NOT NULL,
            source          TEXT NOT NULL,
            source_credits  REAL,
            source_title    TEXT,
            destination     TEXT NOT NULL,
            destination_name TEXT NOT NULL,
            credit          TEXT NOT NULL,
            condition       TEXT,
            effective_start TEXT NOT NULL,
            effective_end   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_transfers_course ON transfers(subject, course_code);

        CREATE TABLE IF NOT EXISTS course_snapshots (
            id                            TEXT PRIMARY KEY,
            subject                       TEXT NOT NULL,
            course_code                   TEXT NOT NULL,
            title                         TEXT,
            credits                       REAL,
            description                   TEXT,
            desc_replacement_course       TEXT,
            desc_duplicate_credit         TEXT,
            desc_registration_restriction TEXT,
            desc_prerequisite             TEXT,
            hours_lecture                 REAL,
            hours_seminar                 REAL,
            hours_lab                     REAL,
            offered_online                INTEGER,
            preparatory_course            INTEGER,
            rp                            TEXT,
            abbreviated_title             TEXT,
            add_fees                      REAL,
            rpt_limit                     INTEGER,
            attr_ar                       INTEGER,
            attr_sc                       INTEGER,
            attr_hum                      INTEGER,
            attr_lsc                      INTEGER,
            attr_sci                      INTEGER,
            attr_soc                      INTEGER,
            attr_ut                       INTEGER,
            first_offered_year            INTEGER,
            first_offered_term            INTEGER,
            last_offered_year             INTEGER,
            last_offered_term             INTEGER,
            active                        INTEGER NOT NULL,
            transfer_destinations         TEXT
        );
        ",
    )?;
    Ok(())
}

// ── Raw page staging ──

pub fn upsert_term_page(
    conn: &Connection,
    year: i32,
    term: i32,
    kind: &str,
    html: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO term_pages (year, term, kind, html) VALUES (?1, ?2, ?3, ?4)",
        params![year, term, kind, html],
    )?;
    Ok(())
}

/// Staged pages grouped per term, oldest term first. `limit` bounds the
/// number of terms, not rows.
pub fn fetch_term_blobs(conn: &Connection, limit: Option<usize>) -> Result<Vec<TermBlobs>> {
    let mut stmt = conn
        .prepare("SELECT year, term, kind, html FROM term_pages ORDER BY year, term, kind")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut blobs: Vec<TermBlobs> = Vec::new();
    for (year, term, kind, html) in rows {
        let matches_last = blobs
            .last()
            .is_some_and(|b| b.year == year && b.term == term);
        if !matches_last {
            if let Some(max) = limit {
                if blobs.len() == max {
                    break;
                }
            }
            blobs.push(TermBlobs {
                year,
                term,
                sections_html: None,
                catalogue_html: None,
                attributes_html: None,
            });
        }
        let blob = blobs.last_mut().unwrap();
        match kind.as_str() {
            "sections" => blob.sections_html = Some(html),
            "catalogue" => blob.catalogue_html = Some(html),
            "attributes" => blob.attributes_html = Some(html),
            _ => {}
        }
    }
    Ok(blobs)
}

// ── Parsed records ──

pub fn save_term_batch(conn: &Connection, batch: &TermBatch) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        // schedule entries are owned by their sections: replace the whole
        // term's set rather than leaving stale ordinals behind
        tx.execute(
            "DELETE FROM schedule_entries WHERE year = ?1 AND term = ?2",
            params![batch.year, batch.term],
        )?;

        let mut sec_stmt = tx.prepare(
            "INSERT OR REPLACE INTO sections
             (id, subject, course_code, year, term, crn, rp, seats, waitlist,
              section, credits, abbreviated_title, add_fees, rpt_limit, notes)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
        )?;
        for s in &batch.sections {
            sec_stmt.execute(params![
                s.id,
                s.subject,
                s.course_code,
                s.year,
                s.term,
                s.crn,
                s.rp.map(RpStatus::as_str),
                s.seats.map(SeatStatus::to_db_string),
                s.waitlist.map(Waitlist::to_db_string),
                s.section,
                s.credits,
                s.abbreviated_title,
                s.add_fees,
                s.rpt_limit,
                s.notes,
            ])?;
        }

        let mut sch_stmt = tx.prepare(
            "INSERT OR REPLACE INTO schedule_entries
             (id, section_id, subject, course_code, year, term, crn, seq,
              meeting_type, days, time, start_date, end_date, room, instructor)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
        )?;
        for e in &batch.schedules {
            sch_stmt.execute(params![
                e.id,
                e.section_id,
                e.subject,
                e.course_code,
                e.year,
                e.term,
                e.crn,
                e.seq,
                e.meeting_type.map(|m| m.as_str()),
                e.days,
                e.time,
                e.start,
                e.end,
                e.room,
                e.instructor,
            ])?;
        }

        let mut sum_stmt = tx.prepare(
            "INSERT OR REPLACE INTO course_summaries
             (id, subject, course_code, year, term, title, description,
              desc_replacement_course, desc_last_updated, desc_requisites,
              credits, hours_lecture, hours_seminar, hours_lab)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
        )?;
        for c in &batch.summaries {
            sum_stmt.execute(params![
                c.id,
                c.subject,
                c.course_code,
                c.year,
                c.term,
                c.title,
                c.description,
                c.desc_replacement_course,
                c.desc_last_updated,
                c.desc_requisites,
                c.credits,
                c.hours_lecture,
                c.hours_seminar,
                c.hours_lab,
            ])?;
        }

        let mut attr_stmt = tx.prepare(
            "INSERT OR REPLACE INTO course_attributes
             (id, subject, course_code, year, term,
              attr_ar, attr_sc, attr_hum, attr_lsc, attr_sci, attr_soc, attr_ut)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        )?;
        for a in &batch.attributes {
            attr_stmt.execute(params![
                a.id, a.subject, a.course_code, a.year, a.term, a.attr_ar, a.attr_sc,
                a.attr_hum, a.attr_lsc, a.attr_sci, a.attr_soc, a.attr_ut,
            ])?;
        }

        let mut course_stmt = tx.prepare(
            "INSERT OR IGNORE INTO courses (subject, course_code) VALUES (?1, ?2)",
        )?;
        for (subject, code) in batch
            .sections
            .iter()
            .map(|s| (&s.subject, &s.course_code))
            .chain(batch.summaries.iter().map(|c| (&c.subject, &c.course_code)))
            .chain(batch.attributes.iter().map(|a| (&a.subject, &a.course_code)))
        {
            course_stmt.execute(params![subject, code])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Externally fetched sources ──

#[allow(dead_code)]
pub fn upsert_course_page(conn: &Connection, page: &CoursePage) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO course_pages
         (id, subject, course_code, title, description, desc_replacement_course,
          desc_duplicate_credit, desc_registration_restriction, desc_prerequisite,
          credits, hours_lecture, hours_seminar, hours_lab,
          university_transferrable, offered_online, preparatory_course)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        params![
            page.id,
            page.subject,
            page.course_code,
            page.title,
            page.description,
            page.desc_replacement_course,
            page.desc_duplicate_credit,
            page.desc_registration_restriction,
            page.desc_prerequisite,
            page.credits,
            page.hours_lecture,
            page.hours_seminar,
            page.hours_lab,
            page.university_transferrable,
            page.offered_online,
            page.preparatory_course,
        ],
    )?;
    Ok(())
}

#[allow(dead_code)]
pub fn upsert_transfer(conn: &Connection, t: &Transfer) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO transfers
         (id, subject, course_code, source, source_credits, source_title,
          destination, destination_name, credit, condition, effective_start, effective_end)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        params![
            t.id,
            t.subject,
            t.course_code,
            t.source,
            t.source_credits,
            t.source_title,
            t.destination,
            t.destination_name,
            t.credit,
            t.condition,
            t.effective_start,
            t.effective_end,
        ],
    )?;
    Ok(())
}

// ── Aggregation reads ──

pub fn load_course_list(conn: &Connection) -> Result<Vec<CourseKey>> {
    let mut stmt =
        conn.prepare("SELECT subject, course_code FROM courses ORDER BY subject, course_code")?;
    let keys = stmt
        .query_map([], |row| {
            Ok(CourseKey {
                subject: row.get(0)?,
                course_code: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

/// Snapshot-read every source for one course in one place, so the engine
/// never observes a half-written source set.
pub fn load_course_sources(conn: &Connection, key: &CourseKey) -> Result<CourseSources> {
    let mut stmt = conn.prepare(
        "SELECT id, subject, course_code, year, term, title, description,
                desc_replacement_course, desc_last_updated, desc_requisites,
                credits, hours_lecture, hours_seminar, hours_lab
         FROM course_summaries WHERE subject = ?1 AND course_code = ?2
         ORDER BY year DESC, term DESC LIMIT 5",
    )?;
    let summaries = stmt
        .query_map(params![key.subject, key.course_code], |row| {
            Ok(CourseSummary {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                year: row.get(3)?,
                term: row.get(4)?,
                title: row.get(5)?,
                description: row.get(6)?,
                desc_replacement_course: row.get(7)?,
                desc_last_updated: row.get(8)?,
                desc_requisites: row.get(9)?,
                credits: row.get(10)?,
                hours_lecture: row.get(11)?,
                hours_seminar: row.get(12)?,
                hours_lab: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, subject, course_code, title, description, desc_replacement_course,
                desc_duplicate_credit, desc_registration_restriction, desc_prerequisite,
                credits, hours_lecture, hours_seminar, hours_lab,
                university_transferrable, offered_online, preparatory_course
         FROM course_pages WHERE subject = ?1 AND course_code = ?2 LIMIT 1",
    )?;
    let page = stmt
        .query_map(params![key.subject, key.course_code], |row| {
            Ok(CoursePage {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                desc_replacement_course: row.get(5)?,
                desc_duplicate_credit: row.get(6)?,
                desc_registration_restriction: row.get(7)?,
                desc_prerequisite: row.get(8)?,
                credits: row.get(9)?,
                hours_lecture: row.get(10)?,
                hours_seminar: row.get(11)?,
                hours_lab: row.get(12)?,
                university_transferrable: row.get(13)?,
                offered_online: row.get(14)?,
                preparatory_course: row.get(15)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .next();

    let mut stmt = conn.prepare(
        "SELECT id, subject, course_code, year, term,
                attr_ar, attr_sc, attr_hum, attr_lsc, attr_sci, attr_soc, attr_ut
         FROM course_attributes WHERE subject = ?1 AND course_code = ?2
         ORDER BY year DESC, term DESC LIMIT 1",
    )?;
    let attributes = stmt
        .query_map(params![key.subject, key.course_code], |row| {
            Ok(CourseAttribute {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                year: row.get(3)?,
                term: row.get(4)?,
                attr_ar: row.get(5)?,
                attr_sc: row.get(6)?,
                attr_hum: row.get(7)?,
                attr_lsc: row.get(8)?,
                attr_sci: row.get(9)?,
                attr_soc: row.get(10)?,
                attr_ut: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let newest_section = query_section(conn, key, "DESC")?;
    let oldest_section = query_section(conn, key, "ASC")?;

    let mut stmt = conn.prepare(
        "SELECT id, subject, course_code, source, source_credits, source_title,
                destination, destination_name, credit, condition,
                effective_start, effective_end
         FROM transfers WHERE subject = ?1 AND course_code = ?2",
    )?;
    let transfers = stmt
        .query_map(params![key.subject, key.course_code], |row| {
            Ok(Transfer {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                source: row.get(3)?,
                source_credits: row.get(4)?,
                source_title: row.get(5)?,
                destination: row.get(6)?,
                destination_name: row.get(7)?,
                credit: row.get(8)?,
                condition: row.get(9)?,
                effective_start: row.get(10)?,
                effective_end: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CourseSources {
        summaries,
        page,
        attributes,
        newest_section,
        oldest_section,
        transfers,
    })
}

fn query_section(conn: &Connection, key: &CourseKey, order: &str) -> Result<Option<Section>> {
    let sql = format!(
        "SELECT id, subject, course_code, year, term, crn, rp, seats, waitlist,
                section, credits, abbreviated_title, add_fees, rpt_limit, notes
         FROM sections WHERE subject = ?1 AND course_code = ?2
         ORDER BY year {order}, term {order} LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let section = stmt
        .query_map(params![key.subject, key.course_code], |row| {
            Ok(Section {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                year: row.get(3)?,
                term: row.get(4)?,
                crn: row.get(5)?,
                rp: row
                    .get::<_, Option<String>>(6)?
                    .and_then(|s| RpStatus::parse(&s).ok()),
                seats: row
                    .get::<_, Option<String>>(7)?
                    .and_then(|s| SeatStatus::from_db_str(&s)),
                waitlist: row
                    .get::<_, Option<String>>(8)?
                    .and_then(|s| Waitlist::from_db_str(&s)),
                section: row.get(9)?,
                credits: row.get(10)?,
                abbreviated_title: row.get(11)?,
                add_fees: row.get(12)?,
                rpt_limit: row.get(13)?,
                notes: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .next();
    Ok(section)
}

// ── Snapshots ──

pub fn save_snapshots(conn: &Connection, snapshots: &[CourseSnapshot]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO course_snapshots
             (id, subject, course_code, title, credits, description,
              desc_replacement_course, desc_duplicate_credit,
              desc_registration_restriction, desc_prerequisite,
              hours_lecture, hours_seminar, hours_lab,
              offered_online, preparatory_course,
              rp, abbreviated_title, add_fees, rpt_limit,
              attr_ar, attr_sc, attr_hum, attr_lsc, attr_sci, attr_soc, attr_ut,
              first_offered_year, first_offered_term,
              last_offered_year, last_offered_term,
              active, transfer_destinations)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                     ?17,?18,?19,?20,?21,?22,?23,?24,?25,?26,?27,?28,?29,?30,?31,?32)",
        )?;
        for s in snapshots {
            stmt.execute(params![
                s.id,
                s.subject,
                s.course_code,
                s.title,
                s.credits,
                s.description,
                s.desc_replacement_course,
                s.desc_duplicate_credit,
                s.desc_registration_restriction,
                s.desc_prerequisite,
                s.hours_lecture,
                s.hours_seminar,
                s.hours_lab,
                s.offered_online,
                s.preparatory_course,
                s.rp.map(RpStatus::as_str),
                s.abbreviated_title,
                s.add_fees,
                s.rpt_limit,
                s.attr_ar,
                s.attr_sc,
                s.attr_hum,
                s.attr_lsc,
                s.attr_sci,
                s.attr_soc,
                s.attr_ut,
                s.first_offered_year,
                s.first_offered_term,
                s.last_offered_year,
                s.last_offered_term,
                s.active,
                s.transfer_destinations,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn load_snapshots(conn: &Connection) -> Result<Vec<CourseSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, subject, course_code, title, credits, description,
                desc_replacement_course, desc_duplicate_credit,
                desc_registration_restriction, desc_prerequisite,
                hours_lecture, hours_seminar, hours_lab,
                offered_online, preparatory_course,
                rp, abbreviated_title, add_fees, rpt_limit,
                attr_ar, attr_sc, attr_hum, attr_lsc, attr_sci, attr_soc, attr_ut,
                first_offered_year, first_offered_term,
                last_offered_year, last_offered_term,
                active, transfer_destinations
         FROM course_snapshots ORDER BY subject, course_code",
    )?;
    let snapshots = stmt
        .query_map([], |row| {
            Ok(CourseSnapshot {
                id: row.get(0)?,
                subject: row.get(1)?,
                course_code: row.get(2)?,
                title: row.get(3)?,
                credits: row.get(4)?,
                description: row.get(5)?,
                desc_replacement_course: row.get(6)?,
                desc_duplicate_credit: row.get(7)?,
                desc_registration_restriction: row.get(8)?,
                desc_prerequisite: row.get(9)?,
                hours_lecture: row.get(10)?,
                hours_seminar: row.get(11)?,
                hours_lab: row.get(12)?,
                offered_online: row.get(13)?,
                preparatory_course: row.get(14)?,
                rp: row
                    .get::<_, Option<String>>(15)?
                    .and_then(|s| RpStatus::parse(&s).ok()),
                abbreviated_title: row.get(16)?,
                add_fees: row.get(17)?,
                rpt_limit: row.get(18)?,
                attr_ar: row.get(19)?,
                attr_sc: row.get(20)?,
                attr_hum: row.get(21)?,
                attr_lsc: row.get(22)?,
                attr_sci: row.get(23)?,
                attr_soc: row.get(24)?,
                attr_ut: row.get(25)?,
                first_offered_year: row.get(26)?,
                first_offered_term: row.get(27)?,
                last_offered_year: row.get(28)?,
                last_offered_term: row.get(29)?,
                active: row.get(30)?,
                transfer_destinations: row.get(31)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(snapshots)
}

// ── Stats ──

pub struct Stats {
    pub staged_terms: usize,
    pub sections: usize,
    pub schedule_entries: usize,
    pub summaries: usize,
    pub attributes: usize,
    pub pages: usize,
    pub transfers: usize,
    pub courses: usize,
    pub snapshots: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        Ok(conn.query_row(sql, [], |r| r.get::<_, i64>(0))? as usize)
    };
    Ok(Stats {
        staged_terms: count("SELECT COUNT(DISTINCT year || '-' || term) FROM term_pages")?,
        sections: count("SELECT COUNT(*) FROM sections")?,
        schedule_entries: count("SELECT COUNT(*) FROM schedule_entries")?,
        summaries: count("SELECT COUNT(*) FROM course_summaries")?,
        attributes: count("SELECT COUNT(*) FROM course_attributes")?,
        pages: count("SELECT COUNT(*) FROM course_pages")?,
        transfers: count("SELECT COUNT(*) FROM transfers")?,
        courses: count("SELECT COUNT(*) FROM courses")?,
        snapshots: count("SELECT COUNT(*) FROM course_snapshots")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeetingType, ScheduleEntry};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn section(crn: u32, year: i32, term: i32) -> Section {
        Section {
            id: Section::make_id("CPSC", "1150", year, term, crn),
            subject: "CPSC".into(),
            course_code: "1150".into(),
            year,
            term,
            crn,
            rp: Some(RpStatus::R),
            seats: Some(SeatStatus::Available(10)),
            waitlist: None,
            section: Some("001".into()),
            credits: 3.0,
            abbreviated_title: Some("Program Design".into()),
            add_fees: None,
            rpt_limit: None,
            notes: None,
        }
    }

    fn entry(crn: u32, year: i32, term: i32, seq: u32) -> ScheduleEntry {
        ScheduleEntry {
            id: ScheduleEntry::make_id("CPSC", "1150", year, term, crn, seq),
            section_id: Section::make_id("CPSC", "1150", year, term, crn),
            subject: "CPSC".into(),
            course_code: "1150".into(),
            year,
            term,
            crn,
            seq,
            meeting_type: Some(MeetingType::Lecture),
            days: Some("M-W----".into()),
            time: Some("1030-1220".into()),
            start: None,
            end: None,
            room: Some("A136".into()),
            instructor: Some("Smith A".into()),
        }
    }

    fn batch(year: i32, term: i32) -> TermBatch {
        TermBatch {
            year,
            term,
            sections: vec![section(30001, year, term)],
            schedules: vec![entry(30001, year, term, 0), entry(30001, year, term, 1)],
            summaries: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn saving_the_same_batch_twice_does_not_duplicate() {
        let conn = test_conn();
        let b = batch(2023, 10);
        save_term_batch(&conn, &b).unwrap();
        save_term_batch(&conn, &b).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.sections, 1);
        assert_eq!(stats.schedule_entries, 2);
        assert_eq!(stats.courses, 1);
    }

    #[test]
    fn reparse_overwrites_fields_in_place() {
        let conn = test_conn();
        let mut b = batch(2023, 10);
        save_term_batch(&conn, &b).unwrap();

        b.sections[0].seats = Some(SeatStatus::Cancelled);
        save_term_batch(&conn, &b).unwrap();

        let key = CourseKey {
            subject: "CPSC".into(),
            course_code: "1150".into(),
        };
        let sources = load_course_sources(&conn, &key).unwrap();
        assert_eq!(
            sources.newest_section.unwrap().seats,
            Some(SeatStatus::Cancelled)
        );
        assert_eq!(get_stats(&conn).unwrap().sections, 1);
    }

    #[test]
    fn reparse_drops_stale_schedule_entries() {
        let conn = test_conn();
        let mut b = batch(2023, 10);
        save_term_batch(&conn, &b).unwrap();
        assert_eq!(get_stats(&conn).unwrap().schedule_entries, 2);

        b.schedules.truncate(1);
        save_term_batch(&conn, &b).unwrap();
        assert_eq!(get_stats(&conn).unwrap().schedule_entries, 1);
    }

    #[test]
    fn sources_pick_newest_and_oldest_sections() {
        let conn = test_conn();
        save_term_batch(&conn, &batch(2005, 30)).unwrap();
        save_term_batch(&conn, &batch(2023, 10)).unwrap();
        save_term_batch(&conn, &batch(2014, 20)).unwrap();

        let key = CourseKey {
            subject: "CPSC".into(),
            course_code: "1150".into(),
        };
        let sources = load_course_sources(&conn, &key).unwrap();
        let newest = sources.newest_section.unwrap();
        let oldest = sources.oldest_section.unwrap();
        assert_eq!((newest.year, newest.term), (2023, 10));
        assert_eq!((oldest.year, oldest.term), (2005, 30));
    }

    #[test]
    fn external_sources_round_trip_through_the_store() {
        let conn = test_conn();
        let page = CoursePage {
            id: CoursePage::make_id("CPSC", "1150"),
            subject: "CPSC".into(),
            course_code: "1150".into(),
            title: "Program Design".into(),
            description: Some("Canonical.".into()),
            desc_replacement_course: None,
            desc_duplicate_credit: None,
            desc_registration_restriction: None,
            desc_prerequisite: None,
            credits: 3.0,
            hours_lecture: 2.0,
            hours_seminar: 0.0,
            hours_lab: 2.0,
            university_transferrable: true,
            offered_online: true,
            preparatory_course: false,
        };
        upsert_course_page(&conn, &page).unwrap();
        upsert_course_page(&conn, &page).unwrap();

        let t = Transfer {
            id: "TNFR-CPSC-1150-SFU-1".into(),
            subject: "CPSC".into(),
            course_code: "1150".into(),
            source: "LANG".into(),
            source_credits: Some(3.0),
            source_title: Some("Program Design".into()),
            destination: "SFU".into(),
            destination_name: "Simon Fraser University".into(),
            credit: "SFU CMPT 1XX (3)".into(),
            condition: None,
            effective_start: "Sep/15".into(),
            effective_end: None,
        };
        upsert_transfer(&conn, &t).unwrap();

        let key = CourseKey {
            subject: "CPSC".into(),
            course_code: "1150".into(),
        };
        let sources = load_course_sources(&conn, &key).unwrap();
        assert_eq!(
            sources.page.unwrap().description.as_deref(),
            Some("Canonical.")
        );
        assert_eq!(sources.transfers.len(), 1);
        assert_eq!(get_stats(&conn).unwrap().pages, 1);
    }

    #[test]
    fn snapshots_round_trip() {
        let conn = test_conn();
        let snap = CourseSnapshot {
            id: CourseSnapshot::make_id("CPSC", "1150"),
            subject: "CPSC".into(),
            course_code: "1150".into(),
            title: Some("Program Design".into()),
            credits: Some(3.0),
            rp: Some(RpStatus::Rp),
            active: true,
            transfer_destinations: Some("SFU,TRU".into()),
            ..CourseSnapshot::default()
        };
        save_snapshots(&conn, &[snap.clone()]).unwrap();
        save_snapshots(&conn, &[snap]).unwrap();

        let loaded = load_snapshots(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].rp, Some(RpStatus::Rp));
        assert!(loaded[0].active);
        assert_eq!(loaded[0].transfer_destinations.as_deref(), Some("SFU,TRU"));
    }

    #[test]
    fn term_blobs_group_by_term() {
        let conn = test_conn();
        upsert_term_page(&conn, 2023, 10, "sections", "<html>a</html>").unwrap();
        upsert_term_page(&conn, 2023, 10, "catalogue", "<html>b</html>").unwrap();
        upsert_term_page(&conn, 2023, 30, "sections", "<html>c</html>").unwrap();

        let blobs = fetch_term_blobs(&conn, None).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].term, 10);
        assert!(blobs[0].sections_html.is_some());
        assert!(blobs[0].catalogue_html.is_some());
        assert!(blobs[0].attributes_html.is_none());

        let limited = fetch_term_blobs(&conn, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
