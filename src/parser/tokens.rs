//! Flattens the section-search table into an ordered token stream.
//!
//! The table is pure layout: record boundaries are not marked, so all
//! downstream structure is recovered from token content and blank-run
//! lengths. This stage only decides which cells carry data at all.

use crate::error::ParseError;
use crate::models::TermCode;

use super::html;

/// One table cell, reduced to what the section parser needs: either it is
/// visually blank or it carries text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Blank,
    Text(String),
}

impl Token {
    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Blank)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Token::Blank => None,
            Token::Text(s) => Some(s),
        }
    }
}

/// Tokenized section-search page for one term.
pub struct SectionsPage {
    pub year: i32,
    pub term: TermCode,
    pub tokens: Vec<Token>,
}

/// Number of column-header cells preceding the terminal "Instructor(s)"
/// cell in the banner that recurs before every course group.
const BANNER_CELLS_BEFORE_TERMINAL: usize = 18;

pub fn tokenize_sections_page(src: &str) -> Result<SectionsPage, ParseError> {
    let (year, term) = parse_term_title(src)?;

    let table = html::find_block_containing(src, "table", "dataentrytable")
        .ok_or(ParseError::MissingSectionTable)?;

    let mut tokens: Vec<Token> = Vec::new();
    for cell in html::TagScanner::new(table.inner, "td") {
        // grey separator rows
        if html::attr_value(cell.open, "class").is_some_and(|c| c.contains("deseparator")) {
            continue;
        }
        // full-row-width filler added under notes longer than two lines
        if html::attr_value(cell.open, "colspan").as_deref() == Some("22") {
            continue;
        }

        let txt = html::cell_text(cell.inner);

        // The yellow header banner ends in "Instructor(s)"; the preceding
        // cells have already been collected, so drop them too.
        if txt == "Instructor(s)" {
            tokens.truncate(tokens.len().saturating_sub(BANNER_CELLS_BEFORE_TERMINAL));
            continue;
        }
        // per-course heading, e.g. "CPSC 1150" -- a boundary marker, not data
        if is_course_header(&txt) {
            continue;
        }
        // non-standard heading, e.g. "BINF 4225 ***NEW COURSE***"
        if txt.ends_with("***") {
            continue;
        }

        if txt.is_empty() {
            tokens.push(Token::Blank);
        } else {
            tokens.push(Token::Text(txt));
        }
    }

    Ok(SectionsPage { year, term, tokens })
}

/// "Course Search For Spring 2023" is the only h2 on the page.
fn parse_term_title(src: &str) -> Result<(i32, TermCode), ParseError> {
    let h2 = html::find_block(src, "h2").ok_or(ParseError::MissingTermTitle)?;
    let title = html::cell_text(h2.inner);
    let words: Vec<&str> = title.split_whitespace().collect();

    let year = words
        .last()
        .and_then(|w| w.parse::<i32>().ok())
        .ok_or(ParseError::MissingTermTitle)?;
    let term = words
        .iter()
        .find_map(|w| TermCode::from_season(w))
        .ok_or(ParseError::MissingTermTitle)?;

    Ok((year, term))
}

fn is_course_header(txt: &str) -> bool {
    let b = txt.as_bytes();
    b.len() == 9
        && b[..4].iter().all(u8::is_ascii_alphabetic)
        && b[5..].iter().all(u8::is_ascii_digit)
}
