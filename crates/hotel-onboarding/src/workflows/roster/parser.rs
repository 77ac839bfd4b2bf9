use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize)]
pub(crate) struct EmployeeRow {
    #[serde(rename = "Employee ID")]
    pub(crate) employee_id: String,
    #[serde(rename = "Property ID")]
    pub(crate) property_id: String,
    #[serde(rename = "Start Date", default, deserialize_with = "empty_string_as_none")]
    pub(crate) start_date: Option<String>,
    #[serde(
        rename = "Assigned Manager",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) assigned_manager: Option<String>,
    #[serde(
        rename = "Section 1 Completed At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) section1_completed_at: Option<String>,
    #[serde(
        rename = "Section 2 Completed At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) section2_completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManagerRow {
    #[serde(rename = "Manager ID")]
    pub(crate) manager_id: String,
    #[serde(rename = "Property ID")]
    pub(crate) property_id: String,
    #[serde(rename = "Name", default, deserialize_with = "empty_string_as_none")]
    pub(crate) name: Option<String>,
    #[serde(rename = "Active", default, deserialize_with = "empty_string_as_none")]
    pub(crate) active: Option<String>,
}

pub(crate) fn parse_rows<R, T>(reader: R) -> Result<Vec<T>, csv::Error>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader.deserialize::<T>().collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// RFC 3339 timestamps, or a bare date read as midnight UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    parse_date(trimmed)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Missing values count as active; `false`, `no`, `0` and `inactive` do not.
pub(crate) fn parse_active(value: Option<&str>) -> bool {
    !matches!(
        value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref(),
        Some("false" | "no" | "n" | "0" | "inactive")
    )
}
