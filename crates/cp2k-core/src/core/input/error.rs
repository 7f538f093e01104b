use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Multiple {name} sections found")]
    AmbiguousSection { name: String },

    #[error("Section parameter of section {section} already set")]
    DuplicateSectionParameter { section: String },

    #[error("Section parameter line for section {section} has no value")]
    EmptySectionParameter { section: String },

    #[error("Keyword {keyword} already present in section {section}")]
    DuplicateKeyword { keyword: String, section: String },

    #[error("Cannot add an empty keyword line to section {section}")]
    EmptyKeyword { section: String },

    #[error("Section path '{path}' contains an empty segment")]
    EmptyPathSegment { path: String },

    #[error("Section {path} exists already")]
    SectionExists { path: String },

    #[error("Unbalanced &END on line {line}: no open section to close")]
    UnbalancedSectionEnd { line: usize },

    #[error("Section opening on line {line} has no name")]
    MissingSectionName { line: usize },
}
