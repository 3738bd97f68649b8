//! Recovers section and schedule records from the flattened token stream.
//!
//! The source table has no record delimiters. A section is a fixed
//! 12-token window, each of its meeting patterns a 7-token window, and
//! everything between records is inferred from token content and the run
//! length of blank tokens. The blank-run rules were reverse-engineered
//! from two decades of archived terms; the fixtures below are the ground
//! truth for them, not any cleaner general rule.

use crate::error::ParseError;
use crate::models::{
    MeetingType, RpStatus, ScheduleEntry, SeatStatus, Section, TermCode, Waitlist,
};

use super::dates::format_date;
use super::tokens::Token;

/// What follows a schedule row, decided by the number of blank tokens
/// after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// The blank run is the leading empty cells of the next section row;
    /// rewind past it and read a section record.
    NewSection,
    /// A free-text note for the current section follows.
    SectionNote,
    /// More meeting patterns for the current section follow.
    Continuation,
    /// Anything else: stop consuming schedule rows and re-evaluate.
    End,
}

fn classify_gap(gap: usize) -> Boundary {
    match gap {
        0..=5 => Boundary::NewSection,
        9 => Boundary::SectionNote,
        12 => Boundary::Continuation,
        _ => Boundary::End,
    }
}

/// A course-wide note placed in front of a course's sections. It applies
/// to every following section with the same `SUBJ code` key; the first
/// section with a different key clears it for the rest of the parse.
struct PendingNote {
    key: String,
    text: String,
}

impl PendingNote {
    fn from_cell(cell: &str) -> PendingNote {
        let key: String = cell.chars().take(9).collect();
        let text: String = cell.chars().skip(10).collect::<String>().trim().to_string();
        PendingNote { key, text }
    }
}

pub fn parse_tokens(
    tokens: &[Token],
    year: i32,
    term: TermCode,
) -> Result<(Vec<Section>, Vec<ScheduleEntry>), ParseError> {
    let term = term.code();
    let mut sections: Vec<Section> = Vec::new();
    let mut schedules: Vec<ScheduleEntry> = Vec::new();
    let mut pending: Option<PendingNote> = None;
    let mut i = 0usize;

    while i + 1 < tokens.len() {
        // A token longer than the widest registration-status value at a
        // section-record start is a course-wide note cell.
        if let Token::Text(s) = &tokens[i] {
            if s.chars().count() > 2 {
                pending = Some(PendingNote::from_cell(s));
                i += 1;
            }
        }

        // Some historical terms drop one leading cell, leaving a bare
        // number where the registration status belongs; back up one token
        // so the 12-token window lines up again.
        if matches!(&tokens[i], Token::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        {
            i = i.saturating_sub(1);
        }

        let w = window(tokens, i, 12, "section")?;
        let mut section = read_section(w, year, term)?;
        if let Some(note) = &pending {
            if note.key == format!("{} {}", section.subject, section.course_code) {
                section.notes = Some(note.text.clone());
            } else {
                pending = None;
            }
        }
        i += 12;

        let mut seq: u32 = 0;
        loop {
            let w = window(tokens, i, 7, "schedule")?;
            schedules.push(read_schedule(w, &section, seq)?);
            seq += 1;
            i += 7;

            if i >= tokens.len() {
                break;
            }

            let gap = tokens[i..].iter().take_while(|t| t.is_blank()).count();
            if i + gap >= tokens.len() {
                i = tokens.len();
                break;
            }
            i += gap;

            match classify_gap(gap) {
                Boundary::NewSection => {
                    i -= gap;
                    break;
                }
                Boundary::SectionNote => {
                    let note = tokens[i].text().unwrap_or("").to_string();
                    // notes assemble newest-first
                    section.notes = Some(match section.notes.take() {
                        Some(existing) => format!("{}\n{}", note, existing),
                        None => note,
                    });
                    i += 5;
                    break;
                }
                Boundary::Continuation => continue,
                Boundary::End => break,
            }
        }

        sections.push(section);
    }

    Ok((sections, schedules))
}

fn window<'a>(
    tokens: &'a [Token],
    at: usize,
    len: usize,
    record: &'static str,
) -> Result<&'a [Token], ParseError> {
    tokens
        .get(at..at + len)
        .ok_or(ParseError::TruncatedStream { record, offset: at })
}

/// Decode a 12-token section record:
/// status, seats, waitlist, (select column), crn, subject, course code,
/// section label, credits, abbreviated title, fee, repeat limit.
fn read_section(w: &[Token], year: i32, term: i32) -> Result<Section, ParseError> {
    let rp = w[0].text().map(RpStatus::parse).transpose()?;
    let seats = w[1].text().map(SeatStatus::parse).transpose()?;
    let waitlist = w[2].text().map(Waitlist::parse).transpose()?;
    // w[3] is the registration form's select column; never data

    let crn_raw = required(&w[4], "crn")?;
    let crn: u32 = crn_raw.parse().map_err(|_| ParseError::InvalidField {
        field: "crn",
        value: crn_raw.to_string(),
    })?;
    let subject = required(&w[5], "subject")?.to_string();
    let course_code = required(&w[6], "course code")?.to_string();

    let section_label = w[7].text().map(str::to_string);
    let credits = match w[8].text() {
        None => 0.0,
        Some(s) => parse_number(s, "credits")?,
    };
    let abbreviated_title = w[9].text().map(str::to_string);
    // "$5,933.55" -> 5933.55
    let add_fees = match w[10].text() {
        None => None,
        Some(s) => Some(parse_number(&s.replace(['$', ','], ""), "additional fee")?),
    };
    let rpt_limit = match w[11].text() {
        None | Some("-") => None,
        Some(s) => Some(s.parse::<u32>().map_err(|_| ParseError::InvalidField {
            field: "repeat limit",
            value: s.to_string(),
        })?),
    };

    Ok(Section {
        id: Section::make_id(&subject, &course_code, year, term, crn),
        subject,
        course_code,
        year,
        term,
        crn,
        rp,
        seats,
        waitlist,
        section: section_label,
        credits,
        abbreviated_title,
        add_fees,
        rpt_limit,
        notes: None,
    })
}

/// Decode a 7-token schedule record:
/// meeting type, days, time, start date, end date, room, instructor.
fn read_schedule(w: &[Token], section: &Section, seq: u32) -> Result<ScheduleEntry, ParseError> {
    let meeting_type = match &w[0] {
        Token::Blank => None,
        Token::Text(s) => {
            Some(
                MeetingType::from_str(s).ok_or_else(|| ParseError::UnknownMeetingType {
                    token: s.clone(),
                    section_id: section.id.clone(),
                })?,
            )
        }
    };

    Ok(ScheduleEntry {
        id: ScheduleEntry::make_id(
            &section.subject,
            &section.course_code,
            section.year,
            section.term,
            section.crn,
            seq,
        ),
        section_id: section.id.clone(),
        subject: section.subject.clone(),
        course_code: section.course_code.clone(),
        year: section.year,
        term: section.term,
        crn: section.crn,
        seq,
        meeting_type,
        days: w[1].text().map(str::to_string),
        time: w[2].text().map(str::to_string),
        start: w[3].text().map(|s| format_date(s, section.year)),
        end: w[4].text().map(|s| format_date(s, section.year)),
        room: w[5].text().map(str::to_string),
        instructor: w[6].text().map(str::to_string),
    })
}

fn required<'a>(t: &'a Token, field: &'static str) -> Result<&'a str, ParseError> {
    t.text().ok_or(ParseError::InvalidField {
        field,
        value: String::new(),
    })
}

fn parse_number(s: &str, field: &'static str) -> Result<f64, ParseError> {
    s.parse::<f64>().map_err(|_| ParseError::InvalidField {
        field,
        value: s.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Token {
        if s.trim().is_empty() {
            Token::Blank
        } else {
            Token::Text(s.to_string())
        }
    }

    /// 12-token section record. `rp`/`seats`/`wait` may be "" for blank.
    fn sec(rp: &str, seats: &str, wait: &str, crn: &str, subj: &str, code: &str) -> Vec<Token> {
        vec![
            t(rp),
            t(seats),
            t(wait),
            t("sel"),
            t(crn),
            t(subj),
            t(code),
            t("001"),
            t("3.0"),
            t("Short Title"),
            t(""),
            t("-"),
        ]
    }

    /// 7-token schedule record.
    fn sched(kind: &str, instructor: &str) -> Vec<Token> {
        vec![
            t(kind),
            t("M-W----"),
            t("1030-1220"),
            t("11-Apr-23"),
            t(""),
            t("A136"),
            t(instructor),
        ]
    }

    fn blanks(n: usize) -> Vec<Token> {
        vec![Token::Blank; n]
    }

    fn parse(tokens: Vec<Token>) -> (Vec<Section>, Vec<ScheduleEntry>) {
        parse_tokens(&tokens, 2023, TermCode::Spring).unwrap()
    }

    #[test]
    fn single_section_with_schedule() {
        let mut stream = sec("RP", "12", "3", "10524", "CPSC", "1150");
        stream.extend(sched("Lecture", "Smith A"));

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 1);
        assert_eq!(schedules.len(), 1);

        let s = &sections[0];
        assert_eq!(s.id, "SECT-CPSC-1150-2023-10-10524");
        assert_eq!(s.rp, Some(RpStatus::Rp));
        assert_eq!(s.seats, Some(SeatStatus::Available(12)));
        assert_eq!(s.waitlist, Some(Waitlist::Count(3)));
        assert_eq!(s.credits, 3.0);
        assert_eq!(s.rpt_limit, None);

        let e = &schedules[0];
        assert_eq!(e.id, "SCHD-CPSC-1150-2023-10-10524-0");
        assert_eq!(e.section_id, s.id);
        assert_eq!(e.meeting_type, Some(MeetingType::Lecture));
        assert_eq!(e.start.as_deref(), Some("2023-04-11"));
        assert_eq!(e.end, None);
    }

    #[test]
    fn gap_of_three_starts_a_new_section() {
        // The three blanks are section 2's empty status/seats/waitlist
        // cells; the parser must rewind and read them as part of the
        // 12-token window.
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(blanks(3));
        stream.extend(vec![
            t("sel"),
            t("10002"),
            t("CPSC"),
            t("1150"),
            t("002"),
            t("3.0"),
            t("Short Title"),
            t(""),
            t("-"),
        ]);
        stream.extend(sched("Lab", "Jones B"));

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 2);
        assert_eq!(schedules.len(), 2);
        assert_eq!(sections[1].crn, 10002);
        assert_eq!(sections[1].rp, None);
        assert_eq!(sections[1].seats, None);
        assert_eq!(schedules[1].section_id, sections[1].id);
    }

    #[test]
    fn gap_of_nine_attaches_a_section_note() {
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(blanks(9));
        stream.push(t("This section has 2 hours as a WWW component"));
        stream.extend(blanks(4)); // trailing filler consumed with the note

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 1);
        assert_eq!(schedules.len(), 1);
        assert_eq!(
            sections[0].notes.as_deref(),
            Some("This section has 2 hours as a WWW component")
        );
    }

    #[test]
    fn gap_of_twelve_continues_the_schedule() {
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(blanks(12));
        stream.extend(sched("Lab", "Smith A"));

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 1);
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[0].seq, 0);
        assert_eq!(schedules[1].seq, 1);
        assert_eq!(schedules[1].meeting_type, Some(MeetingType::Lab));
        assert_eq!(schedules[1].id, "SCHD-CPSC-1150-2023-10-10001-1");
    }

    #[test]
    fn section_note_prepends_to_existing_note() {
        let mut stream = vec![t("CPSC 1150 Course-wide registration note")];
        stream.extend(sec("R", "5", "0", "10001", "CPSC", "1150"));
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(blanks(9));
        stream.push(t("Section note"));
        stream.extend(blanks(4));

        let (sections, _) = parse(stream);
        assert_eq!(
            sections[0].notes.as_deref(),
            Some("Section note\nCourse-wide registration note")
        );
    }

    #[test]
    fn pending_note_applies_until_course_changes() {
        let mut stream = vec![t("CPSC 1150 Applies to all CPSC 1150 sections")];
        stream.extend(sec("R", "5", "0", "10001", "CPSC", "1150"));
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(sec("R", "8", "0", "10002", "CPSC", "1150"));
        stream.extend(sched("Lecture", "Jones B"));
        stream.extend(sec("R", "9", "0", "20001", "MATH", "2362"));
        stream.extend(sched("Lecture", "Chan C"));
        // same course again: the note must not come back
        stream.extend(sec("R", "4", "0", "10003", "CPSC", "1150"));
        stream.extend(sched("Lecture", "Diaz D"));

        let (sections, _) = parse(stream);
        assert_eq!(sections.len(), 4);
        let note = Some("Applies to all CPSC 1150 sections".to_string());
        assert_eq!(sections[0].notes, note);
        assert_eq!(sections[1].notes, note);
        assert_eq!(sections[2].notes, None);
        assert_eq!(sections[3].notes, None);
    }

    #[test]
    fn numeric_status_cell_rewinds_one_token() {
        // A malformed row missing its leading cell: the seats count lands
        // where the status belongs. Backing up one token re-aligns the
        // window over the previous (blank) instructor cell.
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lecture", "")); // blank instructor
        stream.extend(vec![
            t("30"),
            t(""),
            t("sel"),
            t("30566"),
            t("CPSC"),
            t("2280"),
            t("001"),
            t("3.0"),
            t("Short Title"),
            t(""),
            t("-"),
        ]);
        stream.extend(sched("Lecture", "Smith A"));

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 2);
        assert_eq!(schedules.len(), 2);
        assert_eq!(sections[1].crn, 30566);
        assert_eq!(sections[1].rp, None);
        assert_eq!(sections[1].seats, Some(SeatStatus::Available(30)));
    }

    #[test]
    fn unknown_meeting_type_is_fatal() {
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lectur", "Smith A"));

        let err = parse_tokens(&stream, 2023, TermCode::Spring).unwrap_err();
        match err {
            ParseError::UnknownMeetingType { token, section_id } => {
                assert_eq!(token, "Lectur");
                assert_eq!(section_id, "SECT-CPSC-1150-2023-10-10001");
            }
            other => panic!("expected UnknownMeetingType, got {other:?}"),
        }
    }

    #[test]
    fn blank_meeting_type_is_allowed() {
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("", "Smith A"));

        let (_, schedules) = parse(stream);
        assert_eq!(schedules[0].meeting_type, None);
    }

    #[test]
    fn fee_strips_currency_formatting() {
        let mut stream = vec![
            t("R"),
            t("5"),
            t("0"),
            t("sel"),
            t("10001"),
            t("CPSC"),
            t("1150"),
            t("001"),
            t("3.0"),
            t("Short Title"),
            t("$5,933.55"),
            t("2"),
        ];
        stream.extend(sched("Lecture", "Smith A"));

        let (sections, _) = parse(stream);
        assert_eq!(sections[0].add_fees, Some(5933.55));
        assert_eq!(sections[0].rpt_limit, Some(2));
    }

    #[test]
    fn keys_tie_schedules_to_their_sections() {
        let mut stream = sec("R", "5", "0", "10001", "CPSC", "1150");
        stream.extend(sched("Lecture", "Smith A"));
        stream.extend(blanks(12));
        stream.extend(sched("Lab", "Smith A"));
        stream.extend(sec("P", "8", "0", "20001", "MATH", "2362"));
        stream.extend(sched("Seminar", "Chan C"));

        let (sections, schedules) = parse(stream);
        assert_eq!(sections.len(), 2);
        assert_eq!(schedules.len(), 3);
        for e in &schedules {
            let owner = sections.iter().find(|s| s.id == e.section_id).unwrap();
            assert_eq!(
                (e.subject.as_str(), e.course_code.as_str(), e.year, e.term, e.crn),
                (
                    owner.subject.as_str(),
                    owner.course_code.as_str(),
                    owner.year,
                    owner.term,
                    owner.crn
                )
            );
        }
    }
}
