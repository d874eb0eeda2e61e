//! Per-operation flattening of monitoring API responses into tabular rows.
//!
//! Every rule reads the raw response by reference and builds new rows, so the
//! raw document stays intact for the JSON export.

use serde_json::{Map, Value};

use crate::operation::Operation;

/// A flat mapping from column name to scalar value.
pub type Row = Map<String, Value>;

pub const SERIES_FIELDS: [&str; 4] = ["date", "value", "timeUnit", "unit"];
pub const SENSOR_LIST_FIELDS: [&str; 4] = ["gateway", "name", "measurement", "type"];
pub const SENSOR_DATA_FIELDS: [&str; 4] = ["gateway", "date", "measurement_type", "value"];
pub const METERS_FIELDS: [&str; 7] = [
    "date",
    "value",
    "meterSerialNumber",
    "model",
    "meterType",
    "timeUnit",
    "unit",
];

/// Rows plus the ordered column list used as the CSV header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub rows: Vec<Row>,
    pub fields: Vec<String>,
}

impl Flattened {
    /// An empty row list always comes with an empty field list.
    fn new(rows: Vec<Row>, fields: Vec<String>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        Self { rows, fields }
    }

    fn fixed(rows: Vec<Row>, fields: &[&str]) -> Self {
        Self::new(rows, fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Flatten `raw` according to the rule for `operation`.
pub fn flatten(operation: Operation, raw: &Value) -> Flattened {
    match operation {
        Operation::SiteDetails => site_details(raw),
        Operation::SiteEnergy  => series(raw, "energy"),
        Operation::SitePower   => series(raw, "power"),
        Operation::SensorList  => sensor_list(raw),
        Operation::SensorData  => sensor_data(raw),
        Operation::MetersData  => meters(raw),
    }
}

// ------------------------------------------------------------------ //
//  Rules                                                              //
// ------------------------------------------------------------------ //

fn site_details(raw: &Value) -> Flattened {
    let Some(details) = raw.get("details").and_then(Value::as_object) else {
        return Flattened::default();
    };

    let mut row = Row::new();

    for (key, value) in details {
        let is_prefixed = matches!(key.as_str(), "location" | "publicSettings" | "uris");
        if is_prefixed && nested(details, key).is_some() {
            continue;
        }
        row.insert(key.clone(), value.clone());
    }
    if let Some(location) = nested(details, "location") {
        for (key, value) in location {
            row.insert(format!("location_{key}"), value.clone());
        }
    }
    if let Some(public) = nested(details, "publicSettings") {
        for (key, value) in public {
            row.insert(format!("public_{key}"), value.clone());
        }
    }
    if let Some(uris) = nested(details, "uris") {
        for (key, value) in uris {
            row.insert(format!("uri_{}", lower_snake(key)), value.clone());
        }
    }

    if row.is_empty() {
        return Flattened::default();
    }
    let mut fields: Vec<String> = row.keys().cloned().collect();
    fields.sort();
    Flattened::new(vec![row], fields)
}

/// `energy` and `power` share one shape: `{timeUnit, unit, values: [...]}`.
fn series(raw: &Value, key: &str) -> Flattened {
    let Some(parent) = raw.get(key) else {
        return Flattened::default();
    };
    let rows = array(parent, "values")
        .iter()
        .filter_map(Value::as_object)
        .map(|value| {
            let mut row = value.clone();
            copy(&mut row, "timeUnit", parent, "timeUnit");
            copy(&mut row, "unit", parent, "unit");
            row
        })
        .collect();
    Flattened::fixed(rows, &SERIES_FIELDS)
}

fn sensor_list(raw: &Value) -> Flattened {
    let Some(parent) = raw.get("SiteSensors").or_else(|| raw.get("siteSensors")) else {
        return Flattened::default();
    };

    let mut rows = Vec::new();
    for gateway in array(parent, "list") {
        for sensor in array(gateway, "sensors") {
            let mut row = Row::new();
            copy(&mut row, "gateway", gateway, "connectedTo");
            copy(&mut row, "name", sensor, "name");
            copy(&mut row, "measurement", sensor, "measurement");
            copy(&mut row, "type", sensor, "type");
            rows.push(row);
        }
    }
    Flattened::fixed(rows, &SENSOR_LIST_FIELDS)
}

fn sensor_data(raw: &Value) -> Flattened {
    let Some(parent) = raw.get("siteSensors").or_else(|| raw.get("SiteSensors")) else {
        return Flattened::default();
    };

    let mut rows = Vec::new();
    for gateway in array(parent, "data") {
        for telemetry in array(gateway, "telemetries") {
            let Some(readings) = telemetry.as_object() else {
                continue;
            };
            for (field, value) in readings.iter().filter(|(k, _)| k.as_str() != "date") {
                let mut row = Row::new();
                copy(&mut row, "gateway", gateway, "connectedTo");
                copy(&mut row, "date", telemetry, "date");
                row.insert("measurement_type".to_string(), Value::String(field.clone()));
                row.insert("value".to_string(), value.clone());
                rows.push(row);
            }
        }
    }
    Flattened::fixed(rows, &SENSOR_DATA_FIELDS)
}

fn meters(raw: &Value) -> Flattened {
    let Some(parent) = raw.get("meterEnergyDetails") else {
        return Flattened::default();
    };

    let mut rows = Vec::new();
    for meter in array(parent, "meters") {
        for value in array(meter, "values").iter().filter_map(Value::as_object) {
            let mut row = value.clone();
            copy(&mut row, "timeUnit", parent, "timeUnit");
            copy(&mut row, "unit", parent, "unit");
            copy(&mut row, "meterSerialNumber", meter, "meterSerialNumber");
            copy(&mut row, "model", meter, "model");
            copy(&mut row, "meterType", meter, "meterType");
            rows.push(row);
        }
    }
    Flattened::fixed(rows, &METERS_FIELDS)
}

// ------------------------------------------------------------------ //
//  Helpers                                                            //
// ------------------------------------------------------------------ //

fn nested<'a>(parent: &'a Row, key: &str) -> Option<&'a Row> {
    parent.get(key).and_then(Value::as_object)
}

fn array<'a>(parent: &'a Value, key: &str) -> &'a [Value] {
    parent
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Copy `source[from]` into `row[to]` when present.
fn copy(row: &mut Row, to: &str, source: &Value, from: &str) {
    if let Some(value) = source.get(from) {
        row.insert(to.to_string(), value.clone());
    }
}

/// `SITE_IMAGE` and `siteImage` both become `site_image`.
fn lower_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        match c {
            ' ' | '-' => out.push('_'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
