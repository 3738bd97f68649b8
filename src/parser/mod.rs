pub mod attributes;
pub mod catalogue;
pub mod dates;
pub mod html;
pub mod sections;
pub mod tokens;

use tracing::warn;

use crate::error::ParseError;
use crate::models::{CourseAttribute, CourseSummary, ScheduleEntry, Section, TermCode};

/// Raw page blobs staged for one term. Any of the three pages may be
/// missing; parsing degrades to the corresponding empty record set.
pub struct TermBlobs {
    pub year: i32,
    pub term: i32,
    pub sections_html: Option<String>,
    pub catalogue_html: Option<String>,
    pub attributes_html: Option<String>,
}

/// Everything parsed out of one term's pages.
pub struct TermBatch {
    pub year: i32,
    pub term: i32,
    pub sections: Vec<Section>,
    pub schedules: Vec<ScheduleEntry>,
    pub summaries: Vec<CourseSummary>,
    pub attributes: Vec<CourseAttribute>,
}

/// Parse one term end to end. The section page's own title wins over the
/// staged year/term if they disagree. Catalogue failures are recoverable
/// (pre-2012 layouts); everything else aborts the term.
pub fn process_term(blobs: &TermBlobs) -> Result<TermBatch, ParseError> {
    let mut year = blobs.year;
    let mut term = TermCode::from_code(blobs.term).ok_or_else(|| ParseError::InvalidField {
        field: "term code",
        value: blobs.term.to_string(),
    })?;

    let (sections, schedules) = match &blobs.sections_html {
        Some(src) => {
            let page = tokens::tokenize_sections_page(src)?;
            year = page.year;
            term = page.term;
            sections::parse_tokens(&page.tokens, page.year, page.term)?
        }
        None => (Vec::new(), Vec::new()),
    };

    let summaries = match &blobs.catalogue_html {
        Some(src) => match catalogue::parse_catalogue(src, year, term) {
            Ok(s) => s,
            Err(err @ ParseError::CatalogueFormat(_)) => {
                warn!(
                    year,
                    term = term.code(),
                    error = %err,
                    "catalogue not parsable; term continues with no summaries"
                );
                Vec::new()
            }
            Err(other) => return Err(other),
        },
        None => Vec::new(),
    };

    let attributes = match &blobs.attributes_html {
        Some(src) => attributes::parse_attributes(src, year, term)?,
        None => Vec::new(),
    };

    Ok(TermBatch {
        year,
        term: term.code(),
        sections,
        schedules,
        summaries,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONS_PAGE: &str = "<html><h2>Course Search For Fall 2019</h2>\
        <table class=\"dataentrytable\">\
        <td>&nbsp;</td><td>9</td><td>0</td><td>sel</td><td>30566</td>\
        <td>CPSC</td><td>1150</td><td>001</td><td>3.0</td><td>Program Design</td>\
        <td>&nbsp;</td><td>-</td>\
        <td>Lecture</td><td>M-W----</td><td>1030-1220</td><td>03-Sep-19</td>\
        <td>30-Nov-19</td><td>A136</td><td>Smith A</td>\
        </table></html>";

    #[test]
    fn year_and_term_come_from_the_page_title() {
        let blobs = TermBlobs {
            year: 1970,
            term: 10,
            sections_html: Some(SECTIONS_PAGE.to_string()),
            catalogue_html: None,
            attributes_html: None,
        };
        let batch = process_term(&blobs).unwrap();
        assert_eq!(batch.year, 2019);
        assert_eq!(batch.term, 30);
        assert_eq!(batch.sections.len(), 1);
        assert_eq!(batch.schedules.len(), 1);
        assert_eq!(batch.schedules[0].start.as_deref(), Some("2019-09-03"));
    }

    #[test]
    fn catalogue_failure_degrades_to_no_summaries() {
        let blobs = TermBlobs {
            year: 2019,
            term: 30,
            sections_html: Some(SECTIONS_PAGE.to_string()),
            catalogue_html: Some(
                r#"<div class="course"><h2>broken</h2><b>T</b>d</div>"#.to_string(),
            ),
            attributes_html: None,
        };
        let batch = process_term(&blobs).unwrap();
        assert!(batch.summaries.is_empty());
        assert_eq!(batch.sections.len(), 1);
    }

    #[test]
    fn missing_pages_degrade_to_empty_sets() {
        let blobs = TermBlobs {
            year: 2005,
            term: 20,
            sections_html: None,
            catalogue_html: None,
            attributes_html: None,
        };
        let batch = process_term(&blobs).unwrap();
        assert!(batch.sections.is_empty());
        assert!(batch.summaries.is_empty());
        assert!(batch.attributes.is_empty());
    }
}
