use crate::config::AppConfig;
use crate::error::DatasetError;
use crate::types::{Dataset, GeoCode, Record, Year, YearSet, DEFAULT_YEARS};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const DEFAULT_TITLE: &str = "Tunisian Diaspora Population";

pub const DEFAULT_DESCRIPTION: &str = "Diaspora population estimates compiled from a \
country fiche by the European Training Foundation, migration studies from the Arab \
Planning Institute and DIAL, and analysis of irregular migration from Perceptions of \
the EU. Aggregate regions have no single-country code and appear in the table only.";

// Columns follow DEFAULT_YEARS.
const DIASPORA: &[(&str, Option<&str>, [u64; 5])] = &[
    ("France", Some("FRA"), [400_000, 577_998, 728_094, 950_000, 1_100_000]),
    ("Italy", Some("ITA"), [100_000, 141_907, 197_160, 250_000, 280_000]),
    ("Germany", Some("DEU"), [60_000, 82_635, 94_536, 120_000, 150_000]),
    ("USA", Some("USA"), [5_000, 13_377, 16_654, 20_000, 25_000]),
    ("Canada", Some("CAN"), [10_000, 14_202, 27_427, 30_000, 35_000]),
    ("Belgium", Some("BEL"), [20_000, 19_441, 28_809, 35_000, 40_000]),
    ("Switzerland", Some("CHE"), [15_000, 12_318, 18_847, 25_000, 30_000]),
    ("UK", Some("GBR"), [5_000, 6_526, 10_444, 15_000, 18_000]),
    ("Netherlands", Some("NLD"), [3_000, 8_222, 9_474, 12_000, 15_000]),
    ("Sweden", Some("SWE"), [5_000, 7_593, 9_231, 11_000, 14_000]),
    ("Austria", Some("AUT"), [2_000, 5_870, 3_722, 4_000, 5_000]),
    ("Spain", Some("ESP"), [1_000, 2_512, 1_803, 2_000, 2_500]),
    ("Norway", Some("NOR"), [500, 1_242, 1_420, 1_500, 2_000]),
    ("Denmark", Some("DNK"), [50_000, 1_191, 68_952, 70_000, 75_000]),
    ("Libya", Some("LBY"), [15_000, 83_633, 39_238, 40_000, 45_000]),
    ("Saudi Arabia", Some("SAU"), [5_000, 20_017, 17_750, 20_000, 22_000]),
    ("Algeria", Some("DZA"), [10_000, 15_898, 21_086, 25_000, 28_000]),
    ("UAE", Some("ARE"), [10_000, 12_420, 21_420, 25_000, 30_000]),
    ("Qatar", Some("QAT"), [2_000, 5_926, 5_693, 6_000, 7_000]),
    ("Morocco", Some("MAR"), [1_000, 3_035, 4_570, 5_000, 6_000]),
    ("Oman", Some("OMN"), [1_000, 2_478, 3_413, 4_000, 5_000]),
    ("Syria", Some("SYR"), [1_500, 2_250, 3_500, 4_000, 5_000]),
    ("Japan", Some("JPN"), [50, 624, 1_323, 800, 1_000]),
    ("China", Some("CHN"), [100, 198, 642, 400, 500]),
    ("Rest of Arab Countries", None, [500, 7_296, 1_723, 2_000, 2_500]),
    ("Sub-Saharan Africa", None, [500, 1_057, 1_605, 2_000, 2_500]),
    ("Indonesia", Some("IDN"), [100, 329, 950, 800, 1_000]),
];

/// The embedded diaspora dataset used when no input file is configured.
pub fn default_dataset() -> Result<Dataset, DatasetError> {
    dataset_from_table(DIASPORA)
}

fn dataset_from_table(rows: &[(&str, Option<&str>, [u64; 5])]) -> Result<Dataset, DatasetError> {
    let records = rows
        .iter()
        .map(|(name, code, values)| {
            let population_by_year = DEFAULT_YEARS
                .iter()
                .copied()
                .map(Year)
                .zip(values.iter().copied())
                .collect();
            Ok(Record {
                name: (*name).to_string(),
                geo_code: code.map(str::parse::<GeoCode>).transpose()?,
                population_by_year,
            })
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    Ok(Dataset {
        title: DEFAULT_TITLE.to_string(),
        description: DEFAULT_DESCRIPTION.to_string(),
        years: YearSet::default(),
        records,
    })
}

/// Loads the configured dataset, or the embedded one, and validates its shape.
pub fn load_data(config: &AppConfig) -> Result<Dataset> {
    let dataset = match &config.input.dataset {
        Some(path) => load_dataset(path)?,
        None => {
            tracing::info!("no dataset file configured, using embedded diaspora data");
            default_dataset()?
        }
    };

    dataset.validate().context("dataset failed validation")?;
    tracing::info!(
        records = dataset.records.len(),
        years = dataset.years.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| anyhow!("dataset file has no extension: {:?}", path))?;

    let file = File::open(path).with_context(|| format!("Failed to open dataset: {:?}", path))?;
    let reader = BufReader::new(file);

    tracing::info!(?path, format = %extension, "loading dataset");
    match extension.as_str() {
        "json" => parse_json(reader).with_context(|| format!("Failed to parse JSON dataset: {:?}", path)),
        "csv" => parse_csv(reader).with_context(|| format!("Failed to parse CSV dataset: {:?}", path)),
        _ => Err(anyhow!("Unsupported dataset format: {}", extension)),
    }
}

#[derive(Deserialize)]
struct DatasetFile {
    title: Option<String>,
    description: Option<String>,
    years: Option<Vec<Year>>,
    records: Vec<Record>,
}

pub fn parse_json<R: Read>(reader: R) -> Result<Dataset> {
    let file: DatasetFile = serde_json::from_reader(reader)?;

    // Without an explicit list, the union of record years is the schema and
    // validation catches ragged records.
    let years = match file.years {
        Some(years) => YearSet::new(years)?,
        None => YearSet::new(file.records.iter().flat_map(Record::years))?,
    };

    Ok(Dataset {
        title: file.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: file.description.unwrap_or_default(),
        years,
        records: file.records,
    })
}

/// Wide CSV: `name`, `geo_code` and one column per year.
pub fn parse_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = headers
        .iter()
        .position(|h| h == "name")
        .ok_or_else(|| anyhow!("Column 'name' not found in CSV"))?;
    let code_idx = headers
        .iter()
        .position(|h| h == "geo_code")
        .ok_or_else(|| anyhow!("Column 'geo_code' not found in CSV"))?;

    let mut year_columns: Vec<(usize, Year)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if idx == name_idx || idx == code_idx {
            continue;
        }
        match header.parse::<Year>() {
            Ok(year) => year_columns.push((idx, year)),
            Err(_) => tracing::warn!(column = header, "ignoring non-year CSV column"),
        }
    }
    let years = YearSet::new(year_columns.iter().map(|(_, y)| *y))?;

    let mut records = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let row = result?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        let name = row.get(name_idx).unwrap_or("").to_string();
        if name.is_empty() {
            return Err(anyhow!("row {}: missing name", line + 2));
        }

        let geo_code = match row.get(code_idx).unwrap_or("") {
            "" => None,
            raw => Some(raw.parse::<GeoCode>()?),
        };

        let mut population_by_year = BTreeMap::new();
        for (idx, year) in &year_columns {
            let cell = row.get(*idx).unwrap_or("");
            // Blank cells are left out so shape validation names the record.
            if cell.is_empty() {
                continue;
            }
            let value: u64 = cell.parse().with_context(|| {
                format!("row {}: bad population '{}' for {} in {}", line + 2, cell, name, year)
            })?;
            population_by_year.insert(*year, value);
        }

        records.push(Record {
            name,
            geo_code,
            population_by_year,
        });
    }

    Ok(Dataset {
        title: DEFAULT_TITLE.to_string(),
        description: String::new(),
        years,
        records,
    })
}

#[cfg(test)]
#[path = "data_test.rs"]
mod tests;
