//! Form-field edits applied to production parameters.

use crate::lenient::clamp_quantity;
use crate::{ProductionParameters, ValidationError};
use std::str::FromStr;

/// Editable parameter, addressed by its stored key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamField {
    Technology,
    Material,
    Density,
    PricePerKg,
    WastePercent,
    Infill,
    Supports,
    PrintTimeHours,
    PostProcessHours,
    ModelPrepMins,
    Quantity,
    MarkupPercent,
    DefectRatePercent,
    TaxRatePercent,
    AmortizationCostPerHour,
    ElectricityCostPerHour,
    Currency,
}

impl ParamField {
    pub const ALL: [ParamField; 17] = [
        ParamField::Technology,
        ParamField::Material,
        ParamField::Density,
        ParamField::PricePerKg,
        ParamField::WastePercent,
        ParamField::Infill,
        ParamField::Supports,
        ParamField::PrintTimeHours,
        ParamField::PostProcessHours,
        ParamField::ModelPrepMins,
        ParamField::Quantity,
        ParamField::MarkupPercent,
        ParamField::DefectRatePercent,
        ParamField::TaxRatePercent,
        ParamField::AmortizationCostPerHour,
        ParamField::ElectricityCostPerHour,
        ParamField::Currency,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ParamField::Technology => "technology",
            ParamField::Material => "material",
            ParamField::Density => "density",
            ParamField::PricePerKg => "pricePerKg",
            ParamField::WastePercent => "wastePercent",
            ParamField::Infill => "infill",
            ParamField::Supports => "supports",
            ParamField::PrintTimeHours => "printTimeHours",
            ParamField::PostProcessHours => "postProcessHours",
            ParamField::ModelPrepMins => "modelPrepMins",
            ParamField::Quantity => "quantity",
            ParamField::MarkupPercent => "markupPercent",
            ParamField::DefectRatePercent => "defectRateRate",
            ParamField::TaxRatePercent => "taxRatePercent",
            ParamField::AmortizationCostPerHour => "amortizationCostPerHour",
            ParamField::ElectricityCostPerHour => "electricityCostPerHour",
            ParamField::Currency => "currency",
        }
    }

    fn number_slot(self, p: &mut ProductionParameters) -> Option<&mut f64> {
        let slot = match self {
            ParamField::Density => &mut p.density,
            ParamField::PricePerKg => &mut p.price_per_kg,
            ParamField::WastePercent => &mut p.waste_percent,
            ParamField::Infill => &mut p.infill,
            ParamField::Supports => &mut p.supports,
            ParamField::PrintTimeHours => &mut p.print_time_hours,
            ParamField::PostProcessHours => &mut p.post_process_hours,
            ParamField::ModelPrepMins => &mut p.model_prep_mins,
            ParamField::MarkupPercent => &mut p.markup_percent,
            ParamField::DefectRatePercent => &mut p.defect_rate_percent,
            ParamField::TaxRatePercent => &mut p.tax_rate_percent,
            ParamField::AmortizationCostPerHour => &mut p.amortization_cost_per_hour,
            ParamField::ElectricityCostPerHour => &mut p.electricity_cost_per_hour,
            _ => return None,
        };
        Some(slot)
    }
}

impl FromStr for ParamField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamField::ALL
            .into_iter()
            .find(|f| f.key() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Lenient number parsing for form input: blank or unparsable text becomes 0.
fn parse_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Batch size from form input: fractions are floored, anything below 1 becomes 1.
fn parse_quantity(raw: &str) -> u32 {
    clamp_quantity(parse_number(raw))
}

impl ProductionParameters {
    /// Apply a raw form value to one field.
    ///
    /// Numeric fields never fail; enum fields reject values outside their set
    /// and leave the parameters unchanged.
    pub fn apply_edit(&mut self, field: ParamField, raw: &str) -> Result<(), ValidationError> {
        if let Some(slot) = field.number_slot(self) {
            *slot = parse_number(raw);
            return Ok(());
        }
        match field {
            ParamField::Technology => self.technology = raw.parse()?,
            ParamField::Currency => self.currency = raw.parse()?,
            ParamField::Material => self.material = raw.to_string(),
            ParamField::Quantity => self.quantity = parse_quantity(raw),
            _ => {}
        }
        Ok(())
    }
}
