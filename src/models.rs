use serde::Serialize;

use crate::error::ParseError;

/// One academic semester. The registration system numbers terms
/// 10/20/30 within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermCode {
    Spring,
    Summer,
    Fall,
}

impl TermCode {
    pub fn code(self) -> i32 {
        match self {
            TermCode::Spring => 10,
            TermCode::Summer => 20,
            TermCode::Fall => 30,
        }
    }

    pub fn from_code(code: i32) -> Option<TermCode> {
        match code {
            10 => Some(TermCode::Spring),
            20 => Some(TermCode::Summer),
            30 => Some(TermCode::Fall),
            _ => None,
        }
    }

    /// Match a season word from the page title ("Course Search For Spring 2023").
    pub fn from_season(word: &str) -> Option<TermCode> {
        match word {
            "Spring" => Some(TermCode::Spring),
            "Summer" => Some(TermCode::Summer),
            "Fall" => Some(TermCode::Fall),
            _ => None,
        }
    }
}

/// Registration-status column: R = restricted, P = priority, RP = both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RpStatus {
    R,
    P,
    #[serde(rename = "RP")]
    Rp,
}

impl RpStatus {
    /// The source cell sometimes carries internal whitespace ("R P").
    pub fn parse(raw: &str) -> Result<RpStatus, ParseError> {
        let joined: String = raw.split_whitespace().collect();
        match joined.as_str() {
            "R" => Ok(RpStatus::R),
            "P" => Ok(RpStatus::P),
            "RP" => Ok(RpStatus::Rp),
            _ => Err(ParseError::InvalidField {
                field: "registration status",
                value: raw.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RpStatus::R => "R",
            RpStatus::P => "P",
            RpStatus::Rp => "RP",
        }
    }
}

/// Seat-count column. "Inact" means registration is not open yet,
/// "Cancel" means the section was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatStatus {
    Available(u32),
    Inactive,
    Cancelled,
}

impl SeatStatus {
    pub fn parse(raw: &str) -> Result<SeatStatus, ParseError> {
        match raw {
            "Inact" => Ok(SeatStatus::Inactive),
            "Cancel" => Ok(SeatStatus::Cancelled),
            s => s
                .parse::<u32>()
                .map(SeatStatus::Available)
                .map_err(|_| ParseError::InvalidField {
                    field: "seats",
                    value: raw.to_string(),
                }),
        }
    }

    pub fn to_db_string(self) -> String {
        match self {
            SeatStatus::Available(n) => n.to_string(),
            SeatStatus::Inactive => "Inact".to_string(),
            SeatStatus::Cancelled => "Cancel".to_string(),
        }
    }

    pub fn from_db_str(s: &str) -> Option<SeatStatus> {
        SeatStatus::parse(s).ok()
    }
}

/// Waitlist column. "N/A" means the section has no waitlist at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waitlist {
    Count(u32),
    NotApplicable,
}

impl Waitlist {
    pub fn parse(raw: &str) -> Result<Waitlist, ParseError> {
        match raw {
            "N/A" => Ok(Waitlist::NotApplicable),
            s => s
                .parse::<u32>()
                .map(Waitlist::Count)
                .map_err(|_| ParseError::InvalidField {
                    field: "waitlist",
                    value: raw.to_string(),
                }),
        }
    }

    pub fn to_db_string(self) -> String {
        match self {
            Waitlist::Count(n) => n.to_string(),
            Waitlist::NotApplicable => "N/A".to_string(),
        }
    }

    pub fn from_db_str(s: &str) -> Option<Waitlist> {
        Waitlist::parse(s).ok()
    }
}

/// Meeting-type column of a schedule row. This set is closed: a token
/// outside it means the column alignment has drifted and the whole term
/// parse must be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingType {
    Lecture,
    Lab,
    Seminar,
    Practicum,
    Tutorial,
    Www,
    Exam,
    GuidedIndependentStudy,
    FlexibleAssessment,
    FieldSchool,
    OnSiteWork,
    ExchangeInternational,
    CoOp,
}

impl MeetingType {
    pub fn from_str(s: &str) -> Option<MeetingType> {
        match s {
            "Lecture" => Some(MeetingType::Lecture),
            "Lab" => Some(MeetingType::Lab),
            "Seminar" => Some(MeetingType::Seminar),
            "Practicum" => Some(MeetingType::Practicum),
            "Tutorial" => Some(MeetingType::Tutorial),
            "WWW" => Some(MeetingType::Www),
            "Exam" => Some(MeetingType::Exam),
            "GIS Guided Independent Study" => Some(MeetingType::GuidedIndependentStudy),
            "Flexible Assessment" => Some(MeetingType::FlexibleAssessment),
            "Field School" => Some(MeetingType::FieldSchool),
            "On Site Work" => Some(MeetingType::OnSiteWork),
            "Exchange-International" => Some(MeetingType::ExchangeInternational),
            "CO-OP(on site work experience)" => Some(MeetingType::CoOp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeetingType::Lecture => "Lecture",
            MeetingType::Lab => "Lab",
            MeetingType::Seminar => "Seminar",
            MeetingType::Practicum => "Practicum",
            MeetingType::Tutorial => "Tutorial",
            MeetingType::Www => "WWW",
            MeetingType::Exam => "Exam",
            MeetingType::GuidedIndependentStudy => "GIS Guided Independent Study",
            MeetingType::FlexibleAssessment => "Flexible Assessment",
            MeetingType::FieldSchool => "Field School",
            MeetingType::OnSiteWork => "On Site Work",
            MeetingType::ExchangeInternational => "Exchange-International",
            MeetingType::CoOp => "CO-OP(on site work experience)",
        }
    }
}

// ── Parsed records ──

/// One offering of a course in one term.
#[derive(Debug, Clone)]
pub struct Section {
    pub id: String,
    pub subject: String,
    pub course_code: String,
    pub year: i32,
    pub term: i32,
    pub crn: u32,
    pub rp: Option<RpStatus>,
    pub seats: Option<SeatStatus>,
    pub waitlist: Option<Waitlist>,
    pub section: Option<String>,
    pub credits: f64,
    pub abbreviated_title: Option<String>,
    pub add_fees: Option<f64>,
    pub rpt_limit: Option<u32>,
    pub notes: Option<String>,
}

impl Section {
    pub fn make_id(subject: &str, course_code: &str, year: i32, term: i32, crn: u32) -> String {
        format!("SECT-{}-{}-{}-{}-{}", subject, course_code, year, term, crn)
    }
}

/// One meeting pattern within a section. `seq` is the zero-based position
/// within the owning section and forms part of the synthetic key.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub id: String,
    pub section_id: String,
    pub subject: String,
    pub course_code: String,
    pub year: i32,
    pub term: i32,
    pub crn: u32,
    pub seq: u32,
    pub meeting_type: Option<MeetingType>,
    pub days: Option<String>,
    pub time: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub room: Option<String>,
    pub instructor: Option<String>,
}

impl ScheduleEntry {
    pub fn make_id(
        subject: &str,
        course_code: &str,
        year: i32,
        term: i32,
        crn: u32,
        seq: u32,
    ) -> String {
        format!(
            "SCHD-{}-{}-{}-{}-{}-{}",
            subject, course_code, year, term, crn, seq
        )
    }
}

/// Per-term course catalogue entry.
#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub id: String,
    pub subject: String,
    pub course_code: String,
    pub year: i32,
    pub term: i32,
    pub title: String,
    pub description: Option<String>,
    pub desc_replacement_course: Option<String>,
    pub desc_last_updated: Option<String>,
    pub desc_requisites: Option<String>,
    pub credits: f64,
    pub hours_lecture: f64,
    pub hours_seminar: f64,
    pub hours_lab: f64,
}

impl CourseSummary {
    pub fn make_id(subject: &str, course_code: &str, year: i32, term: i32) -> String {
        format!("CSMR-{}-{}-{}-{}", subject, course_code, year, term)
    }
}

/// The course's standalone page on the institution website. Singleton per
/// course; fetched by an external collaborator and read here for aggregation.
#[derive(Debug, Clone)]
pub struct CoursePage {
    pub id: String,
    pub subject: String,
    pub course_code: String,
    pub title: String,
    pub description: Option<String>,
    pub desc_replacement_course: Option<String>,
    pub desc_duplicate_credit: Option<String>,
    pub desc_registration_restriction: Option<String>,
    pub desc_prerequisite: Option<String>,
    pub credits: f64,
    pub hours_lecture: f64,
    pub hours_seminar: f64,
    pub hours_lab: f64,
    pub university_transferrable: bool,
    pub offered_online: bool,
    pub preparatory_course: bool,
}

impl CoursePage {
    pub fn make_id(subject: &str, course_code: &str) -> String {
        format!("CPGE-{}-{}", subject, course_code)
    }
}

/// Per-term attribute flags (2AR, 2SC, HUM, LSC, SCI, SOC, UT).
#[derive(Debug, Clone)]
pub struct CourseAttribute {
    pub id: String,
    pub subject: String,
    pub course_code: String,
    pub year: i32,
    pub term: i32,
    pub attr_ar: bool,
    pub attr_sc: bool,
    pub attr_hum: bool,
    pub attr_lsc: bool,
    pub attr_sci: bool,
    pub attr_soc: bool,
    pub attr_ut: bool,
}

impl CourseAttribute {
    pub fn make_id(subject: &str, course_code: &str, year: i32, term: i32) -> String {
        format!("ATRB-{}-{}-{}-{}", subject, course_code, year, term)
    }
}

/// One transfer agreement row from the provincial transfer guide.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
    pub subject: String,
    pub course_code: String,
    pub source: String,
    pub source_credits: Option<f64>,
    pub source_title: Option<String>,
    pub destination: String,
    pub destination_name: String,
    pub credit: String,
    pub condition: Option<String>,
    pub effective_start: String,
    pub effective_end: Option<String>,
}

/// The reconciled "current best known" record for a course, rebuilt from
/// scratch whenever any source changes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseSnapshot {
    pub id: String,
    pub subject: String,
    pub course_code: String,

    pub title: Option<String>,
    pub credits: Option<f64>,
    pub description: Option<String>,
    pub desc_replacement_course: Option<String>,
    pub desc_duplicate_credit: Option<String>,
    pub desc_registration_restriction: Option<String>,
    pub desc_prerequisite: Option<String>,
    pub hours_lecture: Option<f64>,
    pub hours_seminar: Option<f64>,
    pub hours_lab: Option<f64>,
    pub offered_online: Option<bool>,
    pub preparatory_course: Option<bool>,

    pub rp: Option<RpStatus>,
    pub abbreviated_title: Option<String>,
    pub add_fees: Option<f64>,
    pub rpt_limit: Option<u32>,

    pub attr_ar: Option<bool>,
    pub attr_sc: Option<bool>,
    pub attr_hum: Option<bool>,
    pub attr_lsc: Option<bool>,
    pub attr_sci: Option<bool>,
    pub attr_soc: Option<bool>,
    pub attr_ut: Option<bool>,

    pub first_offered_year: Option<i32>,
    pub first_offered_term: Option<i32>,
    pub last_offered_year: Option<i32>,
    pub last_offered_term: Option<i32>,

    pub active: bool,
    pub transfer_destinations: Option<String>,
}

impl CourseSnapshot {
    pub fn make_id(subject: &str, course_code: &str) -> String {
        format!("CMAX-{}-{}", subject, course_code)
    }
}
