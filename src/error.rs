use crate::types::Year;
use thiserror::Error;

/// Errors raised while validating or querying a dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset has no records")]
    EmptyDataset,

    #[error("dataset declares no years")]
    NoYears,

    #[error("record '{name}' has years [{}], expected [{}]", join_years(.found), join_years(.expected))]
    DataShape {
        name: String,
        expected: Vec<Year>,
        found: Vec<Year>,
    },

    #[error("year {0} is not part of this dataset")]
    UnknownYear(Year),

    #[error("population total for {0} does not fit in 64 bits")]
    TotalOverflow(Year),

    #[error("invalid year '{0}'")]
    InvalidYear(String),

    #[error("invalid geo code '{0}'")]
    InvalidGeoCode(String),

    #[error("duplicate record name '{0}'")]
    DuplicateName(String),
}

fn join_years(years: &[Year]) -> String {
    years
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
