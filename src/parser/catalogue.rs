//! Parses the per-term course catalogue into summary records.
//!
//! Catalogues before 2012 use a different layout this parser does not
//! understand; callers treat any `CatalogueFormat` error as "no summaries
//! for this term" and carry on.

use crate::error::ParseError;
use crate::models::{CourseSummary, TermCode};

use super::html;

pub fn parse_catalogue(
    src: &str,
    year: i32,
    term: TermCode,
) -> Result<Vec<CourseSummary>, ParseError> {
    let mut summaries = Vec::new();
    for block in html::TagScanner::new(src, "div") {
        let class = html::attr_value(block.open, "class").unwrap_or_default();
        if !class.split_whitespace().any(|c| c == "course") {
            continue;
        }
        summaries.push(parse_course_div(block.inner, year, term)?);
    }
    Ok(summaries)
}

fn parse_course_div(inner: &str, year: i32, term: TermCode) -> Result<CourseSummary, ParseError> {
    let h2 = html::find_block(inner, "h2")
        .ok_or_else(|| ParseError::CatalogueFormat("course block has no h2 header".into()))?;
    let header = html::cell_text(h2.inner);

    // "ABST 1100 (3 credits) (3:0:0)"
    let words: Vec<&str> = header.split_whitespace().collect();
    if words.len() < 5 {
        return Err(ParseError::CatalogueFormat(format!(
            "unrecognized course header {:?}",
            header
        )));
    }
    let subject = words[0].to_string();
    let course_code = words[1].to_string();
    let credits: f64 = words[2]
        .trim_start_matches('(')
        .parse()
        .map_err(|_| ParseError::CatalogueFormat(format!("bad credits in {:?}", header)))?;

    // "(3:0:0)" -> lecture:seminar:lab
    let hours: Vec<f64> = words[4]
        .trim_matches(|c| c == '(' || c == ')')
        .split(':')
        .map(|h| h.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::CatalogueFormat(format!("bad hours in {:?}", header)))?;
    if hours.len() != 3 {
        return Err(ParseError::CatalogueFormat(format!(
            "bad hours in {:?}",
            header
        )));
    }

    let title_block = html::find_block(inner, "b")
        .ok_or_else(|| ParseError::CatalogueFormat("course block has no title".into()))?;
    let title = html::cell_text(title_block.inner);

    // The description is the bare text that follows the title element.
    let lc = inner.to_ascii_lowercase();
    let after_title = lc
        .find("</b")
        .and_then(|i| inner[i..].find('>').map(|j| i + j + 1))
        .map(|idx| &inner[idx..])
        .unwrap_or("");
    let desc = html::cell_text(after_title);
    let description = if desc.is_empty() { None } else { Some(desc) };

    Ok(CourseSummary {
        id: CourseSummary::make_id(&subject, &course_code, year, term.code()),
        subject,
        course_code,
        year,
        term: term.code(),
        title,
        description,
        desc_replacement_course: None,
        desc_last_updated: None,
        desc_requisites: None,
        credits,
        hours_lecture: hours[0],
        hours_seminar: hours[1],
        hours_lab: hours[2],
    })
}
