#![deny(warnings)]

//! Core domain models for the 3D-print quoting dashboard.
//!
//! This crate defines the serializable records exchanged with the projects
//! service: production parameters with their default baseline and partial
//! merge rules, the derived cost breakdown, and the remote project record
//! split into the field groups each writer owns.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod edit;
mod lenient;

pub use edit::ParamField;

/// Printing process. Informational only; the pricing formula does not branch on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    /// Fused Deposition Modeling
    #[default]
    FDM,
    /// Stereolithography
    SLA,
    /// Selective Laser Sintering
    SLS,
    /// Direct Metal Laser Sintering. Older records use the "Metal (DMLS)" label.
    #[serde(rename = "Metal-DMLS", alias = "Metal (DMLS)")]
    MetalDmls,
}

impl Technology {
    pub fn as_str(self) -> &'static str {
        match self {
            Technology::FDM => "FDM",
            Technology::SLA => "SLA",
            Technology::SLS => "SLS",
            Technology::MetalDmls => "Metal-DMLS",
        }
    }
}

impl FromStr for Technology {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FDM" => Ok(Technology::FDM),
            "SLA" => Ok(Technology::SLA),
            "SLS" => Ok(Technology::SLS),
            "Metal-DMLS" | "Metal (DMLS)" => Ok(Technology::MetalDmls),
            other => Err(ValidationError::InvalidChoice {
                field: "technology",
                value: other.to_string(),
            }),
        }
    }
}

/// Display currency. Changes the symbol shown, never the arithmetic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    USD,
    EUR,
    RUB,
    GBP,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::RUB => "RUB",
            Currency::GBP => "GBP",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::RUB => "₽",
            Currency::GBP => "£",
        }
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "RUB" => Ok(Currency::RUB),
            "GBP" => Ok(Currency::GBP),
            other => Err(ValidationError::InvalidChoice {
                field: "currency",
                value: other.to_string(),
            }),
        }
    }
}

/// Material label used when a project has no stored parameters.
pub const DEFAULT_MATERIAL: &str = "PLA";

/// User-editable inputs to the pricing formula.
///
/// Percent fields are plain percentages (20 means 20%) and are not clamped.
/// Serialized with the camelCase keys the projects service stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionParameters {
    pub technology: Technology,
    /// Free-text material label, e.g. "PLA".
    pub material: String,
    /// Material density in g/cm³.
    pub density: f64,
    /// Material price per kilogram.
    pub price_per_kg: f64,
    pub waste_percent: f64,
    pub infill: f64,
    pub supports: f64,
    pub print_time_hours: f64,
    pub post_process_hours: f64,
    pub model_prep_mins: f64,
    /// Batch size.
    pub quantity: u32,
    pub markup_percent: f64,
    /// Defect surcharge in percent. The stored key keeps its historical name.
    #[serde(rename = "defectRateRate")]
    pub defect_rate_percent: f64,
    pub tax_rate_percent: f64,
    /// Machine amortization per print hour.
    pub amortization_cost_per_hour: f64,
    /// Electricity per print hour.
    pub electricity_cost_per_hour: f64,
    pub currency: Currency,
}

impl Default for ProductionParameters {
    /// The baseline applied when a project has nothing stored.
    fn default() -> Self {
        Self {
            technology: Technology::FDM,
            material: DEFAULT_MATERIAL.to_string(),
            density: 1.24,
            price_per_kg: 25.0,
            waste_percent: 5.0,
            infill: 20.0,
            supports: 10.0,
            print_time_hours: 2.0,
            post_process_hours: 0.5,
            model_prep_mins: 15.0,
            quantity: 1,
            markup_percent: 30.0,
            defect_rate_percent: 5.0,
            tax_rate_percent: 20.0,
            amortization_cost_per_hour: 0.5,
            electricity_cost_per_hour: 0.2,
            currency: Currency::USD,
        }
    }
}

/// Partial parameter set as stored on a remote project record.
///
/// Any field may be missing; merging only overwrites the fields present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParamsPatch {
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub technology: Option<Technology>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub price_per_kg: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub waste_percent: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub infill: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub supports: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub print_time_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub post_process_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub model_prep_mins: Option<f64>,
    #[serde(deserialize_with = "lenient::quantity", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub markup_percent: Option<f64>,
    #[serde(
        rename = "defectRateRate",
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub defect_rate_percent: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub tax_rate_percent: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub amortization_cost_per_hour: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub electricity_cost_per_hour: Option<f64>,
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl From<&ProductionParameters> for ParamsPatch {
    fn from(p: &ProductionParameters) -> Self {
        Self {
            technology: Some(p.technology),
            material: Some(p.material.clone()),
            density: Some(p.density),
            price_per_kg: Some(p.price_per_kg),
            waste_percent: Some(p.waste_percent),
            infill: Some(p.infill),
            supports: Some(p.supports),
            print_time_hours: Some(p.print_time_hours),
            post_process_hours: Some(p.post_process_hours),
            model_prep_mins: Some(p.model_prep_mins),
            quantity: Some(p.quantity),
            markup_percent: Some(p.markup_percent),
            defect_rate_percent: Some(p.defect_rate_percent),
            tax_rate_percent: Some(p.tax_rate_percent),
            amortization_cost_per_hour: Some(p.amortization_cost_per_hour),
            electricity_cost_per_hour: Some(p.electricity_cost_per_hour),
            currency: Some(p.currency),
        }
    }
}

impl ProductionParameters {
    /// Default baseline with a stored patch merged over it.
    pub fn from_stored(patch: Option<&ParamsPatch>) -> Self {
        match patch {
            Some(p) => Self::default().merged(p),
            None => Self::default(),
        }
    }

    /// Return a copy with every field present in `patch` overwritten.
    pub fn merged(&self, patch: &ParamsPatch) -> Self {
        let mut out = self.clone();
        out.merge(patch);
        out
    }

    /// Overwrite fields present in `patch`, leaving the rest untouched.
    pub fn merge(&mut self, patch: &ParamsPatch) {
        fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
            if let Some(v) = src {
                *dst = v.clone();
            }
        }
        set(&mut self.technology, &patch.technology);
        set(&mut self.material, &patch.material);
        set(&mut self.density, &patch.density);
        set(&mut self.price_per_kg, &patch.price_per_kg);
        set(&mut self.waste_percent, &patch.waste_percent);
        set(&mut self.infill, &patch.infill);
        set(&mut self.supports, &patch.supports);
        set(&mut self.print_time_hours, &patch.print_time_hours);
        set(&mut self.post_process_hours, &patch.post_process_hours);
        set(&mut self.model_prep_mins, &patch.model_prep_mins);
        set(&mut self.quantity, &patch.quantity);
        set(&mut self.markup_percent, &patch.markup_percent);
        set(&mut self.defect_rate_percent, &patch.defect_rate_percent);
        set(&mut self.tax_rate_percent, &patch.tax_rate_percent);
        set(
            &mut self.amortization_cost_per_hour,
            &patch.amortization_cost_per_hour,
        );
        set(
            &mut self.electricity_cost_per_hour,
            &patch.electricity_cost_per_hour,
        );
        set(&mut self.currency, &patch.currency);
    }

    /// Advisory check for the editing boundary. The calculator does not call this.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let non_negative = [
            ("pricePerKg", self.price_per_kg),
            ("wastePercent", self.waste_percent),
            ("infill", self.infill),
            ("supports", self.supports),
            ("printTimeHours", self.print_time_hours),
            ("postProcessHours", self.post_process_hours),
            ("modelPrepMins", self.model_prep_mins),
            ("markupPercent", self.markup_percent),
            ("defectRateRate", self.defect_rate_percent),
            ("taxRatePercent", self.tax_rate_percent),
            ("amortizationCostPerHour", self.amortization_cost_per_hour),
            ("electricityCostPerHour", self.electricity_cost_per_hour),
        ];
        if !self.density.is_finite() {
            return Err(ValidationError::NonFinite("density"));
        }
        if self.density <= 0.0 {
            return Err(ValidationError::NonPositiveDensity);
        }
        for (name, value) in non_negative {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite(name));
            }
            if value < 0.0 {
                return Err(ValidationError::Negative(name));
            }
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        Ok(())
    }
}

/// Derived cost and price figures for one unit and one batch.
///
/// Always recomputed from parameters and volume; stored only as a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostBreakdown {
    /// Material weight including waste, in grams.
    pub weight_grams: f64,
    pub material_cost: f64,
    /// Machine amortization over the print time.
    pub print_cost: f64,
    pub power_cost: f64,
    /// Model preparation plus post-processing labor.
    pub labor_cost: f64,
    /// Unit cost including the defect surcharge.
    pub unit_cost: f64,
    pub profit_per_unit: f64,
    /// Unit selling price including tax.
    pub total_unit_price: f64,
    pub final_batch_price: f64,
}

/// Server-side geometry analysis state of the uploaded model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Processing,
    Ready,
    Error,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Ready => "ready",
            FileStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Opaque project identifier assigned by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId(s.to_string())
    }
}

/// Remote project record.
///
/// Three writers touch disjoint field groups: geometry (status polling and
/// uploads), parameters (autosave) and AI texts (generation).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,

    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_status: FileStatus,
    #[serde(default)]
    pub poly_count: Option<u64>,
    #[serde(default)]
    pub volume_mm3: Option<f64>,
    #[serde(default)]
    pub dim_x: Option<f64>,
    #[serde(default)]
    pub dim_y: Option<f64>,
    #[serde(default)]
    pub dim_z: Option<f64>,

    #[serde(default, deserialize_with = "lenient::or_none")]
    pub production_params: Option<ParamsPatch>,
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub calculated_results: Option<CostBreakdown>,

    #[serde(default)]
    pub ai_description: Option<String>,
    #[serde(default)]
    pub ai_commercial_text: Option<String>,
}

impl Project {
    pub fn is_ready(&self) -> bool {
        self.file_status == FileStatus::Ready
    }

    pub fn is_processing(&self) -> bool {
        self.file_status == FileStatus::Processing
    }

    /// Copy the geometry group from `other`. Returns true when the volume changed.
    pub fn merge_geometry(&mut self, other: &Project) -> bool {
        let volume_changed = self.volume_mm3 != other.volume_mm3;
        self.file_path = other.file_path.clone();
        self.file_status = other.file_status;
        self.poly_count = other.poly_count;
        self.volume_mm3 = other.volume_mm3;
        self.dim_x = other.dim_x;
        self.dim_y = other.dim_y;
        self.dim_z = other.dim_z;
        volume_changed
    }

    /// Record a saved parameter snapshot.
    pub fn set_committed(&mut self, params: &ProductionParameters, results: &CostBreakdown) {
        self.production_params = Some(ParamsPatch::from(params));
        self.calculated_results = Some(results.clone());
    }

    /// Copy the AI text group from `other`.
    pub fn merge_ai_texts(&mut self, other: &Project) {
        self.ai_description = other.ai_description.clone();
        self.ai_commercial_text = other.ai_commercial_text.clone();
    }
}

/// Body of `POST /projects`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewProject {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Authenticated account as returned by the auth service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Validation errors raised at the parameter-editing boundary.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown parameter field: {0}")]
    UnknownField(String),
    #[error("invalid value {value:?} for {field}")]
    InvalidChoice { field: &'static str, value: String },
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("density must be > 0")]
    NonPositiveDensity,
    #[error("quantity must be at least 1")]
    ZeroQuantity,
}
