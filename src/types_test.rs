use super::*;

fn years(values: &[u16]) -> BTreeMap<Year, u64> {
    values.iter().map(|&y| (Year(y), u64::from(y))).collect()
}

fn dataset(records: Vec<Record>) -> Dataset {
    Dataset {
        title: "test".into(),
        description: String::new(),
        years: YearSet::default(),
        records,
    }
}

#[test]
fn year_parses_trimmed_digits() {
    assert_eq!(" 2014 ".parse::<Year>().unwrap(), Year(2014));
    assert!(matches!("20x4".parse::<Year>(), Err(DatasetError::InvalidYear(_))));
}

#[test]
fn year_set_sorts_and_dedups() {
    let set = YearSet::new([Year(2023), Year(2000), Year(2023)]).unwrap();
    assert_eq!(set.as_slice(), &[Year(2000), Year(2023)]);
    assert_eq!(set.latest(), Year(2023));
    assert!(set.contains(Year(2000)));
    assert!(!set.contains(Year(2001)));
}

#[test]
fn year_set_rejects_empty() {
    assert_eq!(YearSet::new(Vec::<Year>::new()), Err(DatasetError::NoYears));
}

#[test]
fn year_set_check_reports_unknown_year() {
    let set = YearSet::default();
    assert_eq!(set.check(Year(2009)), Ok(Year(2009)));
    assert_eq!(set.check(Year(1999)), Err(DatasetError::UnknownYear(Year(1999))));
}

#[test]
fn geo_code_is_normalised_to_uppercase() {
    let code: GeoCode = " fra ".parse().unwrap();
    assert_eq!(code.as_str(), "FRA");
}

#[test]
fn geo_code_rejects_malformed_values() {
    for bad in ["", "  ", "FR A", "TOOLONGCODE", "F-R"] {
        assert!(bad.parse::<GeoCode>().is_err(), "{bad:?} should be rejected");
    }
}

#[test]
fn record_deserializes_null_geo_code_and_string_year_keys() {
    let json = r#"{"name":"Rest of Arab Countries","geo_code":null,"years":{"2023":2500}}"#;
    let record: Record = serde_json::from_str(json).unwrap();
    assert_eq!(record.geo_code, None);
    assert!(!record.is_mappable());
    assert_eq!(record.population_by_year.get(&Year(2023)), Some(&2500));
}

#[test]
fn record_deserialization_rejects_bad_geo_code() {
    let json = r#"{"name":"Nowhere","geo_code":"??","years":{"2023":1}}"#;
    assert!(serde_json::from_str::<Record>(json).is_err());
}

#[test]
fn validate_accepts_rectangular_dataset() {
    let ds = dataset(vec![
        Record::new("France", Some("FRA".parse().unwrap()), years(&DEFAULT_YEARS)),
        Record::new("Rest", None, years(&DEFAULT_YEARS)),
    ]);
    assert_eq!(ds.validate(), Ok(()));
}

#[test]
fn validate_rejects_missing_year() {
    let ds = dataset(vec![Record::new("France", None, years(&[2000, 2009, 2014, 2020]))]);
    let err = ds.validate().unwrap_err();
    assert!(matches!(err, DatasetError::DataShape { ref name, .. } if name == "France"));
    assert!(err.to_string().contains("expected [2000, 2009, 2014, 2020, 2023]"));
}

#[test]
fn validate_rejects_empty_and_duplicate_names() {
    assert_eq!(dataset(vec![]).validate(), Err(DatasetError::EmptyDataset));

    let ds = dataset(vec![
        Record::new("Italy", None, years(&DEFAULT_YEARS)),
        Record::new("Italy", None, years(&DEFAULT_YEARS)),
    ]);
    assert_eq!(ds.validate(), Err(DatasetError::DuplicateName("Italy".into())));
}
