use super::*;
use crate::data::default_dataset;
use crate::processing::{build_observations, year_view};

fn view_for(year: u16) -> (Dataset, YearView) {
    let ds = default_dataset().unwrap();
    let sets = build_observations(&ds).unwrap();
    let view = year_view(&sets, &ds.years, Year(year)).unwrap();
    (ds, view)
}

#[test]
fn figure_only_contains_mappable_locations() {
    let (_, view) = view_for(2023);
    let fig = choropleth_figure(&view, "Diaspora", &DashboardConfig::default());
    let trace = &fig["data"][0];

    assert_eq!(trace["type"], "choropleth");
    assert_eq!(trace["locations"].as_array().unwrap().len(), 25);
    assert_eq!(trace["z"].as_array().unwrap().len(), 25);
    assert_eq!(trace["locations"][0], "FRA");
    assert_eq!(trace["z"][0], 1_100_000);
    assert_eq!(trace["colorscale"], "Plasma");
    assert!(!trace["text"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n == "Rest of Arab Countries"));
}

#[test]
fn figure_layout_names_year_and_projection() {
    let (_, view) = view_for(2009);
    let fig = choropleth_figure(&view, "Diaspora", &DashboardConfig::default());
    assert_eq!(fig["layout"]["title"]["text"], "Diaspora in 2009");
    assert_eq!(fig["layout"]["geo"]["projection"]["type"], "natural earth");
    assert_eq!(fig["data"][0]["colorbar"]["title"]["text"], "Number of People");
}

#[test]
fn page_selects_default_year_and_lists_all_years() {
    let ds = default_dataset().unwrap();
    let page = dashboard_page(&ds, &DashboardConfig::default(), Year(2014));
    for year in ds.years.iter() {
        assert!(page.contains(&format!("<option value=\"{year}\"")));
    }
    assert!(page.contains("<option value=\"2014\" selected>"));
    assert!(page.contains("/api/view?year="));
    assert!(page.contains("<h1>Tunisian Diaspora Population</h1>"));
}

#[test]
fn page_script_keeps_id_selectors_intact() {
    let page = dashboard_page(&default_dataset().unwrap(), &DashboardConfig::default(), Year(2023));
    assert!(page.contains(r##"document.querySelector("#table tbody")"##));
    assert!(page.contains(r##"document.querySelectorAll("#table th")"##));
    assert!(page.trim_end().ends_with("</html>"));
}

#[test]
fn page_title_is_escaped() {
    let ds = default_dataset().unwrap();
    let config = DashboardConfig {
        title: Some("<script>x</script>".into()),
        ..DashboardConfig::default()
    };
    let page = dashboard_page(&ds, &config, Year(2023));
    assert!(page.contains("<h1>&lt;script&gt;x&lt;/script&gt;</h1>"));
}

#[test]
fn text_table_lists_rows_and_total() {
    let (_, view) = view_for(2023);
    let text = format_table(&view.table, view.total);
    let lines: Vec<&str> = text.lines().collect();

    assert!(lines[0].starts_with("Country"));
    assert!(lines[2].starts_with("France"));
    assert!(lines[2].ends_with("1100000"));
    assert!(lines.last().unwrap().starts_with("Total"));
    assert_eq!(lines.len(), view.table.len() + 3);
}

#[test]
fn csv_export_writes_empty_geo_code_for_aggregates() {
    let (_, view) = view_for(2023);
    let mut buf = Vec::new();
    write_observations_csv(&mut buf, &view.table).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.starts_with("name,geo_code,year,population\n"));
    assert!(text.contains("France,FRA,2023,1100000\n"));
    assert!(text.contains("Rest of Arab Countries,,2023,2500\n"));
}
