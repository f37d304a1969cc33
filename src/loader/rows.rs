//! Row derivation for application records
//!
//! Turns one artifact element into the `applications` row, flattening the
//! frequently queried nested fields into columns and keeping the rest as
//! JSON text.

use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Application types kept as-is; anything else is stored as NULL
const KNOWN_TYPES: &[&str] = &[
    "game",
    "dlc",
    "software",
    "video",
    "demo",
    "music",
    "advertising",
    "mod",
    "episode",
    "series",
];

/// Nested fields stored verbatim as JSON text
const JSON_COLUMNS: &[&str] = &[
    "price_overview",
    "pc_requirements",
    "mac_requirements",
    "linux_requirements",
    "content_descriptors",
    "package_groups",
    "achievements",
    "screenshots",
    "movies",
    "ratings",
];

/// Column order of [`ApplicationRow::into_values`]
pub const APPLICATION_COLUMNS: &[&str] = &[
    "appid",
    "name_from_applist",
    "steam_appid",
    "name",
    "type",
    "is_free",
    "release_date",
    "required_age",
    "metacritic_score",
    "recommendations_total",
    "header_image",
    "background",
    "detailed_description",
    "short_description",
    "about_the_game",
    "supported_languages",
    "price_overview",
    "pc_requirements",
    "mac_requirements",
    "linux_requirements",
    "content_descriptors",
    "package_groups",
    "achievements",
    "screenshots",
    "movies",
    "ratings",
    "base_app_id",
    "success",
    "fetched_at",
    "supports_windows",
    "supports_mac",
    "supports_linux",
    "initial_price",
    "final_price",
    "discount_percent",
    "currency",
    "achievement_count",
];

/// What a single artifact element turned out to be
#[derive(Debug)]
pub enum AppElement<'a> {
    /// A successful envelope with an id and a name
    Valid {
        appid: u64,
        name: &'a str,
        data: &'a Value,
        fetched_at: Option<&'a str>,
    },
    /// A well-formed envelope whose success flag is not true
    Unsuccessful,
    /// Anything else
    Malformed(&'static str),
}

/// Validates one element of an application artifact
pub fn classify_element(element: &Value) -> AppElement<'_> {
    let envelope = match element.as_object() {
        Some(envelope) => envelope,
        None => return AppElement::Malformed("element is not an object"),
    };

    match envelope.get("success") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return AppElement::Unsuccessful,
        _ => return AppElement::Malformed("missing or non-boolean success flag"),
    }

    let data = match envelope.get("data") {
        Some(data) if data.is_object() => data,
        _ => return AppElement::Malformed("missing data object"),
    };

    let appid = match data.get("steam_appid").and_then(as_id) {
        Some(appid) if appid > 0 => appid,
        _ => return AppElement::Malformed("missing steam_appid"),
    };

    let name = match data.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name,
        _ => return AppElement::Malformed("missing name"),
    };

    AppElement::Valid {
        appid,
        name,
        data,
        fetched_at: envelope.get("fetched_at").and_then(Value::as_str),
    }
}

/// One `applications` row
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRow {
    pub appid: u64,
    pub name: String,
    pub app_type: Option<String>,
    pub is_free: Option<bool>,
    pub release_date: Option<String>,
    pub required_age: String,
    pub metacritic_score: Option<i64>,
    pub recommendations_total: Option<i64>,
    pub header_image: Option<String>,
    pub background: Option<String>,
    pub detailed_description: Option<String>,
    pub short_description: Option<String>,
    pub about_the_game: Option<String>,
    pub supported_languages: Option<String>,
    /// Same order as the JSON columns of [`APPLICATION_COLUMNS`]
    pub json_columns: Vec<Option<String>>,
    pub base_app_id: Option<u64>,
    pub fetched_at: Option<String>,
    pub supports_windows: bool,
    pub supports_mac: bool,
    pub supports_linux: bool,
    pub initial_price: Option<i64>,
    pub final_price: Option<i64>,
    pub discount_percent: Option<i64>,
    pub currency: Option<String>,
    pub achievement_count: Option<i64>,
}

impl ApplicationRow {
    pub fn derive(appid: u64, name: &str, data: &Value, fetched_at: Option<&str>) -> Self {
        let price = data.get("price_overview");
        let platforms = data.get("platforms");

        Self {
            appid,
            name: name.to_string(),
            app_type: data
                .get("type")
                .and_then(Value::as_str)
                .filter(|t| KNOWN_TYPES.contains(t))
                .map(str::to_string),
            is_free: data.get("is_free").and_then(Value::as_bool),
            release_date: data
                .pointer("/release_date/date")
                .and_then(Value::as_str)
                .and_then(parse_release_date),
            required_age: sanitize_required_age(data.get("required_age")),
            metacritic_score: data.pointer("/metacritic/score").and_then(Value::as_i64),
            recommendations_total: data.pointer("/recommendations/total").and_then(Value::as_i64),
            header_image: text(data, "header_image"),
            background: text(data, "background"),
            detailed_description: text(data, "detailed_description"),
            short_description: text(data, "short_description"),
            about_the_game: text(data, "about_the_game"),
            supported_languages: text(data, "supported_languages"),
            json_columns: JSON_COLUMNS
                .iter()
                .map(|key| json_text(data.get(*key)))
                .collect(),
            base_app_id: data.pointer("/fullgame/appid").and_then(as_id),
            fetched_at: fetched_at.map(str::to_string),
            supports_windows: flag(platforms, "windows"),
            supports_mac: flag(platforms, "mac"),
            supports_linux: flag(platforms, "linux"),
            initial_price: price.and_then(|p| p.get("initial")).and_then(Value::as_i64),
            final_price: price.and_then(|p| p.get("final")).and_then(Value::as_i64),
            discount_percent: price
                .and_then(|p| p.get("discount_percent"))
                .and_then(Value::as_i64),
            currency: price
                .and_then(|p| p.get("currency"))
                .and_then(Value::as_str)
                .map(str::to_string),
            achievement_count: data.pointer("/achievements/total").and_then(Value::as_i64),
        }
    }

    /// Bound values in [`APPLICATION_COLUMNS`] order
    pub fn into_values(self) -> Vec<SqlValue> {
        let mut values = Vec::with_capacity(APPLICATION_COLUMNS.len());
        values.push(SqlValue::Integer(self.appid as i64));
        values.push(SqlValue::Text(self.name.clone()));
        values.push(SqlValue::Integer(self.appid as i64));
        values.push(SqlValue::Text(self.name));
        values.push(opt_text(self.app_type));
        values.push(opt_bool(self.is_free));
        values.push(opt_text(self.release_date));
        values.push(SqlValue::Text(self.required_age));
        values.push(opt_int(self.metacritic_score));
        values.push(opt_int(self.recommendations_total));
        values.push(opt_text(self.header_image));
        values.push(opt_text(self.background));
        values.push(opt_text(self.detailed_description));
        values.push(opt_text(self.short_description));
        values.push(opt_text(self.about_the_game));
        values.push(opt_text(self.supported_languages));
        values.extend(self.json_columns.into_iter().map(opt_text));
        values.push(opt_int(self.base_app_id.map(|id| id as i64)));
        values.push(SqlValue::Integer(1));
        values.push(opt_text(self.fetched_at));
        values.push(SqlValue::Integer(self.supports_windows as i64));
        values.push(SqlValue::Integer(self.supports_mac as i64));
        values.push(SqlValue::Integer(self.supports_linux as i64));
        values.push(opt_int(self.initial_price));
        values.push(opt_int(self.final_price));
        values.push(opt_int(self.discount_percent));
        values.push(opt_text(self.currency));
        values.push(opt_int(self.achievement_count));
        values
    }
}

/// Parses the store's "d Mon, YYYY" or "Mon d, YYYY" into ISO `YYYY-MM-DD`
///
/// Placeholders such as "TBA" or "Coming soon" yield `None`.
pub fn parse_release_date(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.contains("TBA") || raw.contains("announced") {
        return None;
    }

    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    NaiveDate::parse_from_str(cleaned, "%d %b %Y")
        .or_else(|_| NaiveDate::parse_from_str(cleaned, "%b %d %Y"))
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// `required_age` arrives as a number or a string; missing means "0"
pub fn sanitize_required_age(age: Option<&Value>) -> String {
    match age {
        None | Some(Value::Null) => "0".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// An id given as a number or a numeric string
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn flag(parent: Option<&Value>, key: &str) -> bool {
    parent
        .and_then(|p| p.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Serializes a nested field, treating empty and falsy values as absent
fn json_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let empty = match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(true) => false,
    };
    if empty {
        None
    } else {
        Some(value.to_string())
    }
}

fn opt_text(value: Option<String>) -> SqlValue {
    value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn opt_int(value: Option<i64>) -> SqlValue {
    value.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
}

fn opt_bool(value: Option<bool>) -> SqlValue {
    value
        .map(|b| SqlValue::Integer(b as i64))
        .unwrap_or(SqlValue::Null)
}
