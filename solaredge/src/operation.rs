//! The fixed set of monitoring API operations and their parameter schemas.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// One of the vendor API queries the downloader can run against a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    SiteDetails,
    SiteEnergy,
    SitePower,
    SensorList,
    SensorData,
    MetersData,
}

/// Which parameters an operation needs from the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSchema {
    None,
    DateRange { time_unit: bool },
    DateTimeRange { time_unit: bool },
}

/// Aggregation granularity accepted by the energy and meters endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    QuarterOfAnHour,
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("cannot parse {field} from {value:?}")]
    Malformed { field: &'static str, value: String },
    #[error("start {start} is after end {end}")]
    Inverted { start: String, end: String },
    #[error("unknown time unit {0:?}")]
    UnknownTimeUnit(String),
}

impl ParamError {
    pub fn user_message(&self) -> String {
        match self {
            ParamError::Missing(field) => format!("Please provide the {field}."),
            ParamError::Malformed { field, .. } => format!("The {field} is not a valid value."),
            ParamError::Inverted { .. } => "The start must not be after the end.".to_string(),
            ParamError::UnknownTimeUnit(unit) => format!("'{unit}' is not a supported time unit."),
        }
    }
}

/// Raw, unvalidated parameter values as submitted by the form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_unit: Option<String>,
}

/// A validated call ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub operation: Operation,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    /// Set only when the operation consumed a time-unit parameter.
    pub time_unit: Option<TimeUnit>,
}

// ------------------------------------------------------------------ //
//  Operation                                                          //
// ------------------------------------------------------------------ //

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::SiteDetails,
        Operation::SiteEnergy,
        Operation::SitePower,
        Operation::SensorList,
        Operation::SensorData,
        Operation::MetersData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Operation::SiteDetails => "Site Details",
            Operation::SiteEnergy  => "Site Energy",
            Operation::SitePower   => "Site Power",
            Operation::SensorList  => "Get Sensor List",
            Operation::SensorData  => "Get Sensor Data",
            Operation::MetersData  => "Get Meters Data",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::SiteDetails => {
                "Site metadata: name, status, peak power, installation date, location and public settings."
            }
            Operation::SiteEnergy => {
                "Energy produced over a date range, aggregated by the chosen time unit."
            }
            Operation::SitePower => {
                "Power readings in 15 minute resolution over a date and time range (at most one month)."
            }
            Operation::SensorList => "Sensors installed at the site, grouped by the gateway they are connected to.",
            Operation::SensorData => {
                "Sensor telemetry over a date and time range (at most one week), one row per measurement."
            }
            Operation::MetersData => {
                "Lifetime energy readings of each meter over a date and time range, aggregated by time unit."
            }
        }
    }

    /// Label lowercased with spaces replaced by underscores.
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "_")
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.slug() == slug)
    }

    pub fn schema(self) -> ParamSchema {
        match self {
            Operation::SiteDetails | Operation::SensorList => ParamSchema::None,
            Operation::SiteEnergy => ParamSchema::DateRange { time_unit: true },
            Operation::SitePower | Operation::SensorData => {
                ParamSchema::DateTimeRange { time_unit: false }
            }
            Operation::MetersData => ParamSchema::DateTimeRange { time_unit: true },
        }
    }

    pub fn endpoint(self, site_id: &str) -> String {
        match self {
            Operation::SiteDetails => format!("site/{site_id}/details"),
            Operation::SiteEnergy  => format!("site/{site_id}/energy"),
            Operation::SitePower   => format!("site/{site_id}/power"),
            Operation::SensorList  => format!("equipment/{site_id}/sensors"),
            Operation::SensorData  => format!("site/{site_id}/sensors"),
            Operation::MetersData  => format!("site/{site_id}/meters"),
        }
    }

    /// Query parameter names for the start and end of the range.
    fn range_keys(self) -> (&'static str, &'static str) {
        match self {
            Operation::SitePower | Operation::MetersData => ("startTime", "endTime"),
            _ => ("startDate", "endDate"),
        }
    }

    /// Validate form input against this operation's schema and build the call.
    pub fn prepare(self, site_id: &str, raw: &RawParams) -> Result<PreparedCall, ParamError> {
        let (start_key, end_key) = self.range_keys();
        let mut query = Vec::new();

        let wants_unit = match self.schema() {
            ParamSchema::None => false,
            ParamSchema::DateRange { time_unit } => {
                let start = parse_date("start date", raw.start_date.as_deref())?;
                let end = parse_date("end date", raw.end_date.as_deref())?;
                if start > end {
                    return Err(ParamError::Inverted {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
                query.push((start_key.to_string(), start.format(DATE_FORMAT).to_string()));
                query.push((end_key.to_string(), end.format(DATE_FORMAT).to_string()));
                time_unit
            }
            ParamSchema::DateTimeRange { time_unit } => {
                let start = parse_datetime(
                    "start date",
                    raw.start_date.as_deref(),
                    raw.start_time.as_deref(),
                    NaiveTime::default(),
                )?;
                let end = parse_datetime(
                    "end date",
                    raw.end_date.as_deref(),
                    raw.end_time.as_deref(),
                    end_of_day(),
                )?;
                if start > end {
                    return Err(ParamError::Inverted {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
                query.push((start_key.to_string(), start.format(DATETIME_FORMAT).to_string()));
                query.push((end_key.to_string(), end.format(DATETIME_FORMAT).to_string()));
                time_unit
            }
        };

        let time_unit = if wants_unit {
            let unit = match non_blank(raw.time_unit.as_deref()) {
                Some(s) => s.parse::<TimeUnit>()?,
                None => TimeUnit::default(),
            };
            query.push(("timeUnit".to_string(), unit.as_str().to_string()));
            Some(unit)
        } else {
            None
        };

        Ok(PreparedCall {
            operation: self,
            endpoint: self.endpoint(site_id),
            query,
            time_unit,
        })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ------------------------------------------------------------------ //
//  TimeUnit                                                           //
// ------------------------------------------------------------------ //

impl TimeUnit {
    pub const ALL: [TimeUnit; 6] = [
        TimeUnit::QuarterOfAnHour,
        TimeUnit::Hour,
        TimeUnit::Day,
        TimeUnit::Week,
        TimeUnit::Month,
        TimeUnit::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::QuarterOfAnHour => "QUARTER_OF_AN_HOUR",
            TimeUnit::Hour            => "HOUR",
            TimeUnit::Day             => "DAY",
            TimeUnit::Week            => "WEEK",
            TimeUnit::Month           => "MONTH",
            TimeUnit::Year            => "YEAR",
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        TimeUnit::ALL
            .into_iter()
            .find(|u| u.as_str() == wanted)
            .ok_or_else(|| ParamError::UnknownTimeUnit(s.to_string()))
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------------------------------------------ //
//  Parsing helpers                                                    //
// ------------------------------------------------------------------ //

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

fn parse_date(field: &'static str, value: Option<&str>) -> Result<NaiveDate, ParamError> {
    let value = non_blank(value).ok_or(ParamError::Missing(field))?;
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ParamError::Malformed {
        field,
        value: value.to_string(),
    })
}

fn parse_datetime(
    field: &'static str,
    date: Option<&str>,
    time: Option<&str>,
    default_time: NaiveTime,
) -> Result<NaiveDateTime, ParamError> {
    let date = parse_date(field, date)?;
    let time = match non_blank(time) {
        None => default_time,
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .map_err(|_| ParamError::Malformed {
                field: "time",
                value: t.to_string(),
            })?,
    };
    Ok(date.and_time(time))
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
