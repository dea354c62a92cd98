use crate::config::DashboardConfig;
use crate::processing::YearView;
use crate::types::{Dataset, Observation, Year};
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub fn dashboard_title<'a>(dataset: &'a Dataset, config: &'a DashboardConfig) -> &'a str {
    config.title.as_deref().unwrap_or(&dataset.title)
}

/// Plotly figure description for the map. Only mappable rows of the view are
/// drawn; the browser library does the actual rendering.
pub fn choropleth_figure(view: &YearView, title: &str, config: &DashboardConfig) -> Value {
    let locations: Vec<&str> = view
        .map
        .iter()
        .filter_map(|o| o.geo_code.as_ref().map(|c| c.as_str()))
        .collect();
    let values: Vec<u64> = view.map.iter().map(|o| o.population).collect();
    let names: Vec<&str> = view.map.iter().map(|o| o.name.as_str()).collect();

    json!({
        "data": [{
            "type": "choropleth",
            "locationmode": "ISO-3",
            "locations": locations,
            "z": values,
            "text": names,
            "colorscale": config.color_scale,
            "hovertemplate": "<b>%{text}</b><br>Population Estimate: %{z:,}<extra></extra>",
            "colorbar": {
                "title": { "text": "Number of People", "side": "right" }
            }
        }],
        "layout": {
            "title": { "text": format!("{} in {}", title, view.year) },
            "margin": { "r": 0, "t": 50, "l": 0, "b": 0 },
            "geo": {
                "projection": { "type": config.projection },
                "showcoastlines": true,
                "coastlinecolor": "black",
                "showland": true,
                "landcolor": "lightgray",
                "showocean": true,
                "oceancolor": "lightblue",
                "showframe": false,
                "bgcolor": "rgba(0,0,0,0)"
            }
        }
    })
}

/// Single self-contained page. The selector asks `/api/view` for every change.
pub fn dashboard_page(dataset: &Dataset, config: &DashboardConfig, default_year: Year) -> String {
    let title = escape_html(dashboard_title(dataset, config));
    let description = escape_html(&dataset.description);
    let options: String = dataset
        .years
        .iter()
        .map(|y| {
            let selected = if y == default_year { " selected" } else { "" };
            format!("<option value=\"{y}\"{selected}>{y}</option>")
        })
        .collect();

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
<style>
body {{ font-family: sans-serif; margin: 0 2rem; }}
#map {{ width: 100%; height: 560px; }}
table {{ border-collapse: collapse; min-width: 24rem; }}
th, td {{ padding: 0.25rem 0.75rem; border-bottom: 1px solid #ddd; }}
td.num {{ text-align: right; }}
th {{ cursor: pointer; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{description}</p>
<label for="year">Select Year</label>
<select id="year">{options}</select>
<div id="map"></div>
<h2>Data Table</h2>
<table id="table"><thead><tr><th data-key="name">Country</th><th data-key="population">Population</th></tr></thead><tbody></tbody></table>
<p id="total"></p>
<script>
let rows = [];
let sortKey = "population";
let ascending = false;

function renderTable() {{
  const sorted = rows.slice().sort((a, b) => {{
    const x = a[sortKey], y = b[sortKey];
    const cmp = x < y ? -1 : x > y ? 1 : 0;
    return ascending ? cmp : -cmp;
  }});
  const body = document.querySelector("#table tbody");
  body.innerHTML = "";
  for (const row of sorted) {{
    const tr = document.createElement("tr");
    const name = document.createElement("td");
    name.textContent = row.name;
    const pop = document.createElement("td");
    pop.className = "num";
    pop.textContent = row.population.toLocaleString();
    tr.append(name, pop);
    body.append(tr);
  }}
}}

async function load(year) {{
  const res = await fetch(`/api/view?year=${{year}}`);
  if (!res.ok) return;
  const payload = await res.json();
  Plotly.react("map", payload.figure.data, payload.figure.layout, {{ responsive: true }});
  rows = payload.view.table;
  sortKey = "population";
  ascending = false;
  renderTable();
  document.getElementById("total").textContent =
    `Total: ${{payload.view.total.toLocaleString()}} (${{payload.view.unmapped}} regions not shown on the map)`;
}}

document.querySelectorAll("#table th").forEach(th => th.addEventListener("click", () => {{
  const key = th.dataset.key;
  ascending = key === sortKey ? !ascending : key === "name";
  sortKey = key;
  renderTable();
}}));
const select = document.getElementById("year");
select.addEventListener("change", () => load(select.value));
load(select.value);
</script>
</body>
</html>
"##
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text table for terminal output.
pub fn format_table(rows: &[Observation], total: u64) -> String {
    let width = rows
        .iter()
        .map(|o| o.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Country".len());

    let mut out = format!("{:<width$}  {:>12}\n", "Country", "Population");
    out.push_str(&format!("{}\n", "-".repeat(width + 14)));
    for o in rows {
        out.push_str(&format!("{:<width$}  {:>12}\n", o.name, o.population));
    }
    out.push_str(&format!("{:<width$}  {:>12}\n", "Total", total));
    out
}

#[derive(Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    geo_code: &'a str,
    year: Year,
    population: u64,
}

/// Long-form CSV; absent geo codes are written as empty cells.
pub fn write_observations_csv<W: Write>(writer: W, observations: &[Observation]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for o in observations {
        wtr.serialize(CsvRow {
            name: &o.name,
            geo_code: o.geo_code.as_ref().map_or("", |c| c.as_str()),
            year: o.year,
            population: o.population,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
