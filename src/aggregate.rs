//! Builds the reconciled per-course snapshot from all stored sources.
//!
//! The goal is the freshest value for every field: latest fees, latest
//! description, and so on, falling back through progressively less
//! authoritative sources. Snapshots are always rebuilt from scratch; the
//! precedence rules need the whole candidate set, not a delta.

use crate::error::AggregationError;
use crate::models::{
    CourseAttribute, CoursePage, CourseSnapshot, CourseSummary, Section, TermCode, Transfer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseKey {
    pub subject: String,
    pub course_code: String,
}

/// A consistent read of every source for one course, taken before the
/// engine runs. `summaries` and `attributes` are ordered newest term
/// first; sections are represented by the two rows the rules consult.
#[derive(Default)]
pub struct CourseSources {
    pub summaries: Vec<CourseSummary>,
    pub page: Option<CoursePage>,
    pub attributes: Vec<CourseAttribute>,
    pub newest_section: Option<Section>,
    pub oldest_section: Option<Section>,
    pub transfers: Vec<Transfer>,
}

/// How many catalogue terms the "discontinued" back-walk may consult.
const SUMMARY_LOOKBACK: usize = 5;

pub fn build_snapshot(
    key: &CourseKey,
    sources: &CourseSources,
) -> Result<CourseSnapshot, AggregationError> {
    for section in [&sources.newest_section, &sources.oldest_section]
        .into_iter()
        .flatten()
    {
        check_section(section)?;
    }

    let mut snap = CourseSnapshot {
        id: CourseSnapshot::make_id(&key.subject, &key.course_code),
        subject: key.subject.clone(),
        course_code: key.course_code.clone(),
        ..CourseSnapshot::default()
    };

    // 1. Seed from the most recent catalogue summary. A newest entry that
    // only says "discontinued" suppresses the real content, so walk back
    // through older terms for a description worth keeping and append it.
    let recent = &sources.summaries[..sources.summaries.len().min(SUMMARY_LOOKBACK)];
    if let Some(newest) = recent.first() {
        snap.credits = Some(newest.credits);
        snap.title = Some(newest.title.clone());
        snap.description = newest.description.clone();
        snap.hours_lecture = Some(newest.hours_lecture);
        snap.hours_seminar = Some(newest.hours_seminar);
        snap.hours_lab = Some(newest.hours_lab);

        if let (Some(d), Some(updated)) = (&newest.description, &newest.desc_last_updated) {
            snap.description = Some(format!("{}\n\n{}", d, updated));
        }

        let mut older: Option<&CourseSummary> = None;
        let mut cursor = newest.description.clone();
        let mut j = 1;
        while let Some(d) = &cursor {
            if !d.to_lowercase().contains("discontinued") || j >= recent.len() {
                break;
            }
            older = Some(&recent[j]);
            cursor = recent[j].description.clone();
            j += 1;
        }
        if let Some(older_desc) = older.and_then(|o| o.description.as_ref()) {
            snap.description = Some(match &snap.description {
                Some(cur) => format!("{}\n\n{}", cur, older_desc),
                None => older_desc.clone(),
            });
        }

        snap.desc_replacement_course = newest.desc_replacement_course.clone();
        snap.desc_prerequisite = newest.desc_requisites.clone();
    }

    // 2. The course page is authoritative when present: it overwrites the
    // summary values outright, because summaries still carry content for
    // some discontinued courses.
    if let Some(page) = &sources.page {
        snap.active = true;
        snap.title = Some(page.title.clone());
        snap.description = page.description.clone();
        snap.desc_duplicate_credit = page.desc_duplicate_credit.clone();
        snap.desc_registration_restriction = page.desc_registration_restriction.clone();
        snap.desc_prerequisite = page.desc_prerequisite.clone();
        snap.desc_replacement_course = page.desc_replacement_course.clone();
        snap.credits = Some(page.credits);
        snap.hours_lecture = Some(page.hours_lecture);
        snap.hours_seminar = Some(page.hours_seminar);
        snap.hours_lab = Some(page.hours_lab);
        snap.offered_online = Some(page.offered_online);
        snap.preparatory_course = Some(page.preparatory_course);
    } else {
        snap.active = false;
    }

    // 3. Attribute flags from the most recent attributes row only.
    if let Some(attrs) = sources.attributes.first() {
        snap.attr_ar = Some(attrs.attr_ar);
        snap.attr_sc = Some(attrs.attr_sc);
        snap.attr_hum = Some(attrs.attr_hum);
        snap.attr_lsc = Some(attrs.attr_lsc);
        snap.attr_sci = Some(attrs.attr_sci);
        snap.attr_soc = Some(attrs.attr_soc);
        snap.attr_ut = Some(attrs.attr_ut);
    }

    // 4. Registration-status fields from the most recent section only.
    if let Some(section) = &sources.newest_section {
        snap.rp = section.rp;
        snap.abbreviated_title = section.abbreviated_title.clone();
        snap.add_fees = section.add_fees;
        snap.rpt_limit = section.rpt_limit;
    }

    // 5. Transfer rows as a last resort for title/credits.
    if snap.title.is_none() || snap.credits.is_none() {
        for transfer in &sources.transfers {
            if snap.title.is_none() {
                if let Some(t) = &transfer.source_title {
                    snap.title = Some(t.clone());
                }
            }
            if snap.credits.is_none() {
                if let Some(c) = transfer.source_credits {
                    snap.credits = Some(c);
                }
            }
        }
    }

    // 6. Offered range from the oldest and newest sections.
    if let Some(section) = &sources.newest_section {
        snap.last_offered_year = Some(section.year);
        snap.last_offered_term = Some(section.term);
    }
    if let Some(section) = &sources.oldest_section {
        snap.first_offered_year = Some(section.year);
        snap.first_offered_term = Some(section.term);
    }

    // 7. Distinct transfer destinations, skipping agreements that grant
    // no credit. An empty set stays null rather than "".
    let mut destinations: Vec<&str> = Vec::new();
    for transfer in &sources.transfers {
        if transfer.credit.eq_ignore_ascii_case("no credit") {
            continue;
        }
        if !destinations.contains(&transfer.destination.as_str()) {
            destinations.push(&transfer.destination);
        }
    }
    snap.transfer_destinations = if destinations.is_empty() {
        None
    } else {
        Some(destinations.join(","))
    };

    Ok(snap)
}

/// A stored section the parser could not have produced means the store is
/// corrupt; report it rather than folding garbage into the snapshot.
fn check_section(section: &Section) -> Result<(), AggregationError> {
    let year_ok = (1900..2200).contains(&section.year);
    if !year_ok || TermCode::from_code(section.term).is_none() {
        return Err(AggregationError::InvalidStoredSection {
            id: section.id.clone(),
            year: section.year,
            term: section.term,
        });
    }
    Ok(())
}
