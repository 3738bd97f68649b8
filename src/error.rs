use thiserror::Error;

/// Failures raised while turning one term's raw pages into records.
///
/// Everything except `CatalogueFormat` is fatal for the term being parsed:
/// the source table has no delimiters, so a single misread cell means the
/// rest of the stream cannot be trusted. Other terms are unaffected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("page has no recognizable term title (expected \"Course Search For <season> <year>\")")]
    MissingTermTitle,

    #[error("page has no section data table")]
    MissingSectionTable,

    #[error("token stream ended inside a {record} record at token {offset}")]
    TruncatedStream { record: &'static str, offset: usize },

    #[error("unexpected meeting type {token:?} in section {section_id}")]
    UnknownMeetingType { token: String, section_id: String },

    #[error("could not read {field} from {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// Pre-2012 catalogues use a different layout. Callers catch this and
    /// continue the term with an empty summary set.
    #[error("catalogue page is not in the expected layout: {0}")]
    CatalogueFormat(String),

    #[error("attributes table is malformed: {0}")]
    AttributesFormat(String),
}

/// Defensive invariant violations found while aggregating stored records.
/// Missing sources are never an error; a record that could not have been
/// written by the parser is.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("stored section {id} has impossible year/term {year}/{term}")]
    InvalidStoredSection { id: String, year: i32, term: i32 },
}
