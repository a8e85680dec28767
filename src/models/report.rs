// src/models/report.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::location::{BoundingBox, Coordinates};
use super::{Collection, Record};
use crate::error::AppError;
use crate::utils::image;

/// Lifecycle state of a report. Any state may be set from any other.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Nuevo,
    EnRevision,
    Atendido,
}

impl ReportState {
    pub const ALL: [ReportState; 3] = [ReportState::Nuevo, ReportState::EnRevision, ReportState::Atendido];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportState::Nuevo => "nuevo",
            ReportState::EnRevision => "en_revision",
            ReportState::Atendido => "atendido",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportState::Nuevo => "Nuevo",
            ReportState::EnRevision => "En Revisión",
            ReportState::Atendido => "Atendido",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ReportState::Nuevo => "Reporte recién creado, pendiente de revisión",
            ReportState::EnRevision => "El reporte está siendo evaluado por las autoridades",
            ReportState::Atendido => "El problema ha sido resuelto",
        }
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "nuevo" => Ok(ReportState::Nuevo),
            "en_revision" => Ok(ReportState::EnRevision),
            "atendido" => Ok(ReportState::Atendido),
            other => Err(AppError::validation(
                "state",
                format!("unknown state '{other}', expected nuevo, en_revision or atendido"),
            )),
        }
    }
}

/// Road-issue category. Values outside the submission form are kept verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Bache,
    SemaforoDanado,
    SenalizacionDeficiente,
    AlcantarillaDanada,
    IluminacionDeficiente,
    Otro,
    Unlisted(String),
}

impl Category {
    /// Categories offered by the submission form.
    pub const FORM: [Category; 6] = [
        Category::Bache,
        Category::SemaforoDanado,
        Category::SenalizacionDeficiente,
        Category::AlcantarillaDanada,
        Category::IluminacionDeficiente,
        Category::Otro,
    ];

    pub fn value(&self) -> &str {
        match self {
            Category::Bache => "bache",
            Category::SemaforoDanado => "semaforo_danado",
            Category::SenalizacionDeficiente => "senalizacion_deficiente",
            Category::AlcantarillaDanada => "alcantarilla_danada",
            Category::IluminacionDeficiente => "iluminacion_deficiente",
            Category::Otro => "otro",
            Category::Unlisted(value) => value,
        }
    }

    /// Stored value with underscores shown as spaces.
    pub fn display_name(&self) -> String {
        self.value().replace('_', " ")
    }

    pub fn label(&self) -> String {
        match self {
            Category::Bache => "Bache".to_string(),
            Category::SemaforoDanado => "Semáforo dañado".to_string(),
            Category::SenalizacionDeficiente => "Señalización deficiente".to_string(),
            Category::AlcantarillaDanada => "Alcantarilla dañada".to_string(),
            Category::IluminacionDeficiente => "Iluminación deficiente".to_string(),
            Category::Otro => "Otro".to_string(),
            Category::Unlisted(_) => self.display_name(),
        }
    }

    /// Report title derived from the category: capitalised, underscores as spaces.
    pub fn title(&self) -> String {
        let name = self.display_name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "bache" => Category::Bache,
            "semaforo_danado" => Category::SemaforoDanado,
            "senalizacion_deficiente" => Category::SenalizacionDeficiente,
            "alcantarilla_danada" => Category::AlcantarillaDanada,
            "iluminacion_deficiente" => Category::IluminacionDeficiente,
            "otro" => Category::Otro,
            _ => Category::Unlisted(value),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.value().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub state: ReportState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// ISO-8601 creation instant, kept as received.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::optional_string_or_number"
    )]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "fechaCreacion", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "fechaResolucion", default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl Record for Report {
    const COLLECTION: Collection = Collection::Reports;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Report {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.lat?, self.lng?))
    }

    pub fn created(&self) -> Option<DateTime<FixedOffset>> {
        parse_instant(&self.timestamp)
    }

    /// Calendar day of the timestamp in `tz`.
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        self.created().map(|instant| instant.with_timezone(tz).date_naive())
    }
}

pub(crate) fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

/// Form contents of a citizen submission, before id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub category: Option<Category>,
    pub description: String,
    pub location: Coordinates,
    pub photos: Vec<String>,
    pub user_id: Option<String>,
}

impl NewReport {
    /// Checks performed before any network call.
    pub fn validate(&self, region: &BoundingBox) -> Result<(), AppError> {
        match &self.category {
            None => return Err(AppError::validation("category", "select a category")),
            Some(category) if category.value().trim().is_empty() => {
                return Err(AppError::validation("category", "select a category"))
            }
            Some(_) => {}
        }
        if self.description.trim().is_empty() {
            return Err(AppError::validation("description", "describe the problem"));
        }
        if !region.contains(self.location) {
            return Err(AppError::validation(
                "location",
                format!(
                    "({}, {}) is outside the supported region",
                    self.location.lat, self.location.lng
                ),
            ));
        }
        if let Some(bad) = self.photos.iter().position(|p| !image::is_valid_data_url(p)) {
            return Err(AppError::validation(
                "photos",
                format!("photo #{} is not a supported image", bad + 1),
            ));
        }
        Ok(())
    }

    pub fn into_report(self, id: String, timestamp: DateTime<chrono::Utc>) -> Report {
        let category = self.category.unwrap_or(Category::Otro);
        Report {
            id,
            title: category.title(),
            description: self.description.trim().to_string(),
            category,
            state: ReportState::Nuevo,
            lat: Some(self.location.lat),
            lng: Some(self.location.lng),
            timestamp: timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            photos: (!self.photos.is_empty()).then_some(self.photos),
            user_id: self.user_id,
            rating: None,
            contact: None,
            created_at: None,
            resolved_at: None,
        }
    }
}
