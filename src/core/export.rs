use crate::app::state::AppState;
use crate::domain::model::Table;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, SentinelError};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const SITREP_FILE: &str = "sitrep.txt";

pub fn seismic_table(state: &AppState) -> Table {
    let mut table = Table::new(
        "seismic_events",
        &[
            "id",
            "time",
            "place",
            "latitude",
            "longitude",
            "magnitude",
            "depth_km",
            "anomaly_score",
            "tsunami_probability",
            "status",
            "tag",
            "zone",
            "estimated_yield",
            "impact_radius_km",
            "url",
        ],
    );
    for a in &state.seismic_log {
        table.push_row(vec![
            a.event.id.clone(),
            a.event.timestamp.to_rfc3339(),
            a.event.place.clone(),
            format!("{:.4}", a.event.latitude),
            format!("{:.4}", a.event.longitude),
            format!("{:.1}", a.event.magnitude),
            format!("{:.1}", a.event.depth_km),
            format!("{:.4}", a.anomaly_score),
            format!("{:.2}", a.tsunami_probability),
            a.status(),
            a.classification.tag().to_string(),
            a.zone.clone().unwrap_or_default(),
            a.estimated_yield.clone().unwrap_or_default(),
            format!("{:.1}", a.impact_radius_km),
            a.event.source_url.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn flare_table(state: &AppState) -> Table {
    let mut table = Table::new(
        "solar_flares",
        &["begin_time", "peak_time", "class", "source_location", "active_region", "geoeffective", "threat"],
    );
    for f in &state.flares {
        table.push_row(vec![
            f.begin_time.clone(),
            f.peak_time.clone().unwrap_or_default(),
            f.class_type.clone(),
            f.source_location.clone().unwrap_or_default(),
            f.active_region_num.map(|n| n.to_string()).unwrap_or_default(),
            f.geoeffective.to_string(),
            f.is_threat().to_string(),
        ]);
    }
    table
}

pub fn cme_table(state: &AppState) -> Table {
    let mut table = Table::new(
        "cme_events",
        &["start_time", "arrival_time", "speed_km_s", "kp_forecast", "storm_risk", "risk_tag", "impactor", "link"],
    );
    for c in &state.cmes.earth_bound {
        table.push_row(vec![
            c.start_time.clone(),
            c.arrival_time.clone(),
            format!("{:.0}", c.speed_km_s),
            c.kp_forecast.map(|kp| format!("{:.1}", kp)).unwrap_or_default(),
            c.storm_risk.label().to_string(),
            c.storm_risk.tag().to_string(),
            c.is_impactor.to_string(),
            c.link.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn asteroid_table(state: &AppState) -> Table {
    let mut table = Table::new(
        "close_approaches",
        &["designation", "approach_date", "distance_km", "diameter_m", "risk"],
    );
    for a in &state.close_approaches {
        table.push_row(vec![
            a.designation.clone(),
            a.approach_date.clone(),
            format!("{:.0}", a.distance_km),
            format!("{:.1}", a.diameter_m),
            a.risk.label().to_string(),
        ]);
    }
    table
}

pub fn disaster_table(state: &AppState) -> Table {
    let mut table = Table::new(
        "disasters",
        &["published", "event_type", "country", "alert_level", "latitude", "longitude", "link"],
    );
    for d in &state.disasters {
        table.push_row(vec![
            d.published.clone(),
            d.event_type.clone(),
            d.country.clone(),
            d.alert_level.clone(),
            d.latitude.map(|v| v.to_string()).unwrap_or_default(),
            d.longitude.map(|v| v.to_string()).unwrap_or_default(),
            d.link.clone(),
        ]);
    }
    table
}

pub fn alert_table(state: &AppState) -> Table {
    let mut table = Table::new("alerts", &["raised_at", "source", "title", "message"]);
    for alert in &state.alerts {
        let source = serde_json::to_value(alert.source)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        table.push_row(vec![
            alert.raised_at.to_rfc3339(),
            source,
            alert.title.clone(),
            alert.message.clone(),
        ]);
    }
    table
}

pub fn all_tables(state: &AppState) -> Vec<Table> {
    vec![
        seismic_table(state),
        flare_table(state),
        cme_table(state),
        asteroid_table(state),
        disaster_table(state),
        alert_table(state),
    ]
}

pub fn table_to_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|e| SentinelError::ProcessingError {
        message: format!("Failed to flush CSV for {}: {}", table.name, e),
    })
}

/// Reads a CSV produced by `table_to_csv` back into a table.
pub fn table_from_csv(name: &str, data: &[u8]) -> Result<Table> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(Table {
        name: name.to_string(),
        headers,
        rows,
    })
}

pub fn build_bundle(tables: &[Table], sitrep: &str) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for table in tables {
        zip.start_file::<_, ()>(format!("{}.csv", table.name), FileOptions::default())?;
        zip.write_all(&table_to_csv(table)?)?;
    }

    zip.start_file::<_, ()>(SITREP_FILE, FileOptions::default())?;
    zip.write_all(sitrep.as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Writes every table as CSV plus the bundle; returns the written locations.
pub async fn export_snapshot<S: Storage>(
    storage: &S,
    state: &AppState,
    sitrep: &str,
    bundle_name: &str,
) -> Result<Vec<String>> {
    let tables = all_tables(state);
    let mut written = Vec::with_capacity(tables.len() + 1);

    for table in &tables {
        let path = format!("{}.csv", table.name);
        let data = table_to_csv(table)?;
        tracing::debug!("Writing {} ({} rows)", path, table.len());
        storage.write_file(&path, &data).await?;
        written.push(storage.location(&path));
    }

    let bundle = build_bundle(&tables, sitrep)?;
    tracing::debug!("Writing ZIP bundle ({} bytes)", bundle.len());
    storage.write_file(bundle_name, &bundle).await?;
    written.push(storage.location(bundle_name));

    tracing::info!("📦 Exported {} tables and bundle {}", tables.len(), storage.location(bundle_name));
    Ok(written)
}
