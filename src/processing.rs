use crate::error::DatasetError;
use crate::types::{Dataset, Observation, Year, YearSet};
use serde::Serialize;
use std::collections::BTreeMap;

/// Long-form views of a dataset: every (record, year) pair, and the subset
/// that can be placed on a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationSets {
    pub all: Vec<Observation>,
    pub mappable: Vec<Observation>,
}

/// Flattens the wide-form records into observations, record by record and
/// year by year.
///
/// Records without a geo code only go into `all`; they stay visible in the
/// table but never reach the map.
pub fn build_observations(dataset: &Dataset) -> Result<ObservationSets, DatasetError> {
    dataset.validate()?;

    let mut sets = ObservationSets::default();
    for record in &dataset.records {
        for (&year, &population) in &record.population_by_year {
            let observation = Observation {
                name: record.name.clone(),
                geo_code: record.geo_code.clone(),
                year,
                population,
            };
            if record.is_mappable() {
                sets.mappable.push(observation.clone());
            }
            sets.all.push(observation);
        }
    }

    tracing::debug!(
        all = sets.all.len(),
        mappable = sets.mappable.len(),
        "built observations"
    );
    Ok(sets)
}

/// Keeps observations for `year`, in input order.
pub fn filter_by_year(
    observations: &[Observation],
    years: &YearSet,
    year: Year,
) -> Result<Vec<Observation>, DatasetError> {
    let year = years.check(year)?;
    Ok(observations
        .iter()
        .filter(|o| o.year == year)
        .cloned()
        .collect())
}

/// Largest population first; equal populations keep their input order.
pub fn sort_for_display(observations: &[Observation]) -> Vec<Observation> {
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| b.population.cmp(&a.population));
    sorted
}

/// Per-year population sums. Populations are unbounded, so a sum that does
/// not fit in `u64` is an error rather than a wrap.
pub fn year_totals(observations: &[Observation]) -> Result<BTreeMap<Year, u64>, DatasetError> {
    let mut totals: BTreeMap<Year, u64> = BTreeMap::new();
    for o in observations {
        let total = totals.entry(o.year).or_insert(0);
        *total = total
            .checked_add(o.population)
            .ok_or(DatasetError::TotalOverflow(o.year))?;
    }
    Ok(totals)
}

/// Sum of `observations`, all assumed to belong to `year`.
pub fn sum_population(observations: &[Observation], year: Year) -> Result<u64, DatasetError> {
    observations
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.population))
        .ok_or(DatasetError::TotalOverflow(year))
}

/// Everything the dashboard shows for one selected year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearView {
    pub year: Year,
    pub table: Vec<Observation>,
    pub map: Vec<Observation>,
    pub total: u64,
    pub unmapped: usize,
}

pub fn year_view(sets: &ObservationSets, years: &YearSet, year: Year) -> Result<YearView, DatasetError> {
    let table = sort_for_display(&filter_by_year(&sets.all, years, year)?);
    let map = filter_by_year(&sets.mappable, years, year)?;
    let total = sum_population(&table, year)?;
    let unmapped = table.len() - map.len();

    Ok(YearView {
        year,
        table,
        map,
        total,
        unmapped,
    })
}

#[cfg(test)]
#[path = "processing_test.rs"]
mod tests;
