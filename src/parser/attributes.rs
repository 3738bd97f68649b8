//! Parses the course-attributes table: rows of eight cells, a course key
//! followed by seven Y/blank flags.

use crate::error::ParseError;
use crate::models::{CourseAttribute, TermCode};

use super::html;

pub fn parse_attributes(
    src: &str,
    year: i32,
    term: TermCode,
) -> Result<Vec<CourseAttribute>, ParseError> {
    // the first table on the page is the filter form
    let mut tables = html::TagScanner::new(src, "table");
    let _filter_form = tables.next();
    let table = tables
        .next()
        .ok_or_else(|| ParseError::AttributesFormat("expected a second table".into()))?;

    let cells: Vec<String> = html::TagScanner::new(table.inner, "td")
        .map(|c| html::cell_text(c.inner))
        .collect();
    if cells.len() % 8 != 0 {
        return Err(ParseError::AttributesFormat(format!(
            "{} cells do not form rows of eight",
            cells.len()
        )));
    }

    let mut attributes = Vec::new();
    for row in cells.chunks(8) {
        let mut key = row[0].split_whitespace();
        let (subject, course_code) = match (key.next(), key.next()) {
            (Some(s), Some(c)) => (s.to_string(), c.to_string()),
            _ => {
                return Err(ParseError::AttributesFormat(format!(
                    "unrecognized course key {:?}",
                    row[0]
                )))
            }
        };
        let flag = |i: usize| row[i] == "Y";

        attributes.push(CourseAttribute {
            id: CourseAttribute::make_id(&subject, &course_code, year, term.code()),
            subject,
            course_code,
            year,
            term: term.code(),
            attr_ar: flag(1),
            attr_sc: flag(2),
            attr_hum: flag(3),
            attr_lsc: flag(4),
            attr_sci: flag(5),
            attr_soc: flag(6),
            attr_ut: flag(7),
        });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            "<table><td>filter form</td></table><table>{}</table>",
            rows
        )
    }

    fn row(key: &str, flags: [&str; 7]) -> String {
        let mut cells = format!("<td>{}</td>", key);
        for f in flags {
            cells.push_str(&format!("<td>{}</td>", f));
        }
        cells
    }

    #[test]
    fn y_and_blank_flags() {
        let src = page(&(row("CPSC 1150", ["", "", "", "", "Y", "", "Y"])
            + &row("ENGL 1123", ["", "", "Y", "", "", "", "Y"])));
        let out = parse_attributes(&src, 2023, TermCode::Fall).unwrap();
        assert_eq!(out.len(), 2);

        let a = &out[0];
        assert_eq!(a.id, "ATRB-CPSC-1150-2023-30");
        assert!(a.attr_sci && a.attr_ut);
        assert!(!a.attr_ar && !a.attr_sc && !a.attr_hum && !a.attr_lsc && !a.attr_soc);

        let b = &out[1];
        assert!(b.attr_hum && b.attr_ut);
    }

    #[test]
    fn nbsp_cells_are_blank_flags() {
        let src = page(&row("MATH 2362", ["&nbsp;", "&nbsp;", "", "", "Y", "", ""]));
        let out = parse_attributes(&src, 2022, TermCode::Spring).unwrap();
        assert!(!out[0].attr_ar);
        assert!(out[0].attr_sci);
    }

    #[test]
    fn ragged_table_is_malformed() {
        let src = page("<td>CPSC 1150</td><td>Y</td>");
        assert!(matches!(
            parse_attributes(&src, 2023, TermCode::Fall),
            Err(ParseError::AttributesFormat(_))
        ));
    }

    #[test]
    fn missing_data_table_is_malformed() {
        let src = "<table><td>only the form</td></table>";
        assert!(matches!(
            parse_attributes(src, 2023, TermCode::Fall),
            Err(ParseError::AttributesFormat(_))
        ));
    }
}
