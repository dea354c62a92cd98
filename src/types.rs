use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Years the diaspora estimates were compiled for.
pub const DEFAULT_YEARS: [u16; 5] = [2000, 2009, 2014, 2020, 2023];

const MAX_GEO_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub u16);

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Year {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .map(Year)
            .map_err(|_| DatasetError::InvalidYear(s.to_string()))
    }
}

/// The fixed, ordered set of years every record must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct YearSet(Vec<Year>);

impl YearSet {
    pub fn new(years: impl IntoIterator<Item = Year>) -> Result<Self, DatasetError> {
        let mut years: Vec<Year> = years.into_iter().collect();
        years.sort_unstable();
        years.dedup();
        if years.is_empty() {
            return Err(DatasetError::NoYears);
        }
        Ok(Self(years))
    }

    pub fn contains(&self, year: Year) -> bool {
        self.0.binary_search(&year).is_ok()
    }

    /// Returns `year` back if it belongs to the set.
    pub fn check(&self, year: Year) -> Result<Year, DatasetError> {
        if self.contains(year) {
            Ok(year)
        } else {
            Err(DatasetError::UnknownYear(year))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Year> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Year] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Year {
        // Never empty: enforced by `new`.
        self.0[self.0.len() - 1]
    }
}

impl Default for YearSet {
    fn default() -> Self {
        Self(DEFAULT_YEARS.iter().copied().map(Year).collect())
    }
}

/// Short geographic identifier, normally an ISO 3166 alpha-3 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeoCode(String);

impl GeoCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GeoCode {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        let well_formed = !code.is_empty()
            && code.len() <= MAX_GEO_CODE_LEN
            && code.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(DatasetError::InvalidGeoCode(s.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for GeoCode {
    type Error = DatasetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GeoCode> for String {
    fn from(code: GeoCode) -> Self {
        code.0
    }
}

impl fmt::Display for GeoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One country or aggregate region in wide form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    // None for aggregate buckets like "Rest of Arab Countries".
    pub geo_code: Option<GeoCode>,
    #[serde(rename = "years")]
    pub population_by_year: BTreeMap<Year, u64>,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        geo_code: Option<GeoCode>,
        population_by_year: BTreeMap<Year, u64>,
    ) -> Self {
        Self {
            name: name.into(),
            geo_code,
            population_by_year,
        }
    }

    pub fn years(&self) -> Vec<Year> {
        self.population_by_year.keys().copied().collect()
    }

    pub fn is_mappable(&self) -> bool {
        self.geo_code.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub title: String,
    pub description: String,
    pub years: YearSet,
    pub records: Vec<Record>,
}

impl Dataset {
    /// Checks the dataset is non-empty, rectangular and keyed by unique names.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.records.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }

        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert(record.name.as_str()) {
                return Err(DatasetError::DuplicateName(record.name.clone()));
            }
            let found = record.years();
            if found.as_slice() != self.years.as_slice() {
                return Err(DatasetError::DataShape {
                    name: record.name.clone(),
                    expected: self.years.as_slice().to_vec(),
                    found,
                });
            }
        }

        Ok(())
    }
}

/// One (record, year) pair in long form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub name: String,
    pub geo_code: Option<GeoCode>,
    pub year: Year,
    pub population: u64,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
