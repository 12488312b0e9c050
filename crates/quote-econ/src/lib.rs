#![deny(warnings)]

//! Pricing for 3D-print jobs.
//!
//! [`calculate`] turns a model volume and a set of production parameters
//! into a full cost and price breakdown. It is pure and deterministic: no
//! validation, no rounding, no I/O. Rounding and currency symbols live in
//! [`summary`], which is presentation only.

use quote_core::{CostBreakdown, ProductionParameters};

pub mod summary;

/// Model preparation labor rate, per hour.
pub const PREP_LABOR_RATE_PER_HOUR: f64 = 20.0;
/// Post-processing labor rate, per hour.
pub const POST_LABOR_RATE_PER_HOUR: f64 = 15.0;

const MM3_PER_CM3: f64 = 1000.0;
const GRAMS_PER_KG: f64 = 1000.0;

fn pct(value: f64) -> f64 {
    value / 100.0
}

/// Compute the cost breakdown for one model.
///
/// Returns `None` when the volume is absent or zero: the model has not been
/// analyzed yet and nothing partial is produced. Negative or otherwise odd
/// parameters propagate arithmetically.
///
/// Infill and supports each scale a full copy of the raw volume and are
/// summed. This is the pricing convention, not a geometric model.
///
/// Example:
/// let p = ProductionParameters::default();
/// let q = calculate(&p, Some(10_000.0)).unwrap();
/// assert_eq!(q.final_batch_price, q.total_unit_price * p.quantity as f64);
pub fn calculate(params: &ProductionParameters, volume_mm3: Option<f64>) -> Option<CostBreakdown> {
    let volume_mm3 = volume_mm3.filter(|v| *v != 0.0 && !v.is_nan())?;
    let vol_cm3 = volume_mm3 / MM3_PER_CM3;

    let effective_vol_cm3 = vol_cm3 * pct(params.infill) + vol_cm3 * pct(params.supports);

    let base_weight = effective_vol_cm3 * params.density;
    let weight_grams = base_weight * (1.0 + pct(params.waste_percent));

    let material_cost = (weight_grams / GRAMS_PER_KG) * params.price_per_kg;

    let print_cost = params.print_time_hours * params.amortization_cost_per_hour;
    let power_cost = params.print_time_hours * params.electricity_cost_per_hour;
    let prep_cost = (params.model_prep_mins / 60.0) * PREP_LABOR_RATE_PER_HOUR;
    let post_cost = params.post_process_hours * POST_LABOR_RATE_PER_HOUR;

    let unit_cost_pre_defect = material_cost + print_cost + power_cost + prep_cost + post_cost;
    let cost_with_defects = unit_cost_pre_defect * (1.0 + pct(params.defect_rate_percent));

    let selling_price_pre_tax = cost_with_defects * (1.0 + pct(params.markup_percent));
    let profit_per_unit = selling_price_pre_tax - cost_with_defects;

    let total_unit_price = selling_price_pre_tax * (1.0 + pct(params.tax_rate_percent));
    let final_batch_price = total_unit_price * f64::from(params.quantity);

    Some(CostBreakdown {
        weight_grams,
        material_cost,
        print_cost,
        power_cost,
        labor_cost: prep_cost + post_cost,
        unit_cost: cost_with_defects,
        profit_per_unit,
        total_unit_price,
        final_batch_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCENARIO_VOLUME: f64 = 10_000.0;

    #[test]
    fn absent_or_zero_volume_yields_nothing() {
        let p = ProductionParameters::default();
        assert_eq!(calculate(&p, None), None);
        assert_eq!(calculate(&p, Some(0.0)), None);
        assert_eq!(calculate(&p, Some(f64::NAN)), None);
    }

    #[test]
    fn scenario_defaults_ten_cubic_cm() {
        let p = ProductionParameters::default();
        let q = calculate(&p, Some(SCENARIO_VOLUME)).unwrap();

        assert!((q.weight_grams - 3.906).abs() < 1e-12);
        assert!((q.material_cost - 0.09765).abs() < 1e-12);
        assert_eq!(q.print_cost, 1.0);
        assert!((q.power_cost - 0.4).abs() < 1e-12);
        assert_eq!(q.labor_cost, 12.5);
        assert!((q.unit_cost - 14.6975325).abs() < 1e-9);
        assert!((q.profit_per_unit - 4.40925975).abs() < 1e-9);
        assert!((q.total_unit_price - 22.9281507).abs() < 1e-9);
        assert_eq!(q.final_batch_price, q.total_unit_price);
        assert!((q.final_batch_price - 22.9281507).abs() < 1e-9);
    }

    #[test]
    fn scenario_batch_of_ten() {
        let single = calculate(&ProductionParameters::default(), Some(SCENARIO_VOLUME)).unwrap();
        let p = ProductionParameters {
            quantity: 10,
            ..ProductionParameters::default()
        };
        let batch = calculate(&p, Some(SCENARIO_VOLUME)).unwrap();
        assert_eq!(batch.total_unit_price, single.total_unit_price);
        assert_eq!(batch.final_batch_price, single.total_unit_price * 10.0);
    }

    #[test]
    fn infill_and_supports_are_summed() {
        let p = ProductionParameters {
            infill: 100.0,
            supports: 50.0,
            waste_percent: 0.0,
            density: 1.0,
            ..ProductionParameters::default()
        };
        // 10 cm³ at 100% infill plus a 50% support copy
        let q = calculate(&p, Some(SCENARIO_VOLUME)).unwrap();
        assert_eq!(q.weight_grams, 15.0);
    }

    #[test]
    fn labor_rates_are_fixed() {
        let p = ProductionParameters {
            model_prep_mins: 90.0,
            post_process_hours: 2.0,
            ..ProductionParameters::default()
        };
        let q = calculate(&p, Some(1.0)).unwrap();
        assert_eq!(q.labor_cost, 1.5 * 20.0 + 2.0 * 15.0);
    }

    #[test]
    fn negative_inputs_propagate() {
        let p = ProductionParameters {
            price_per_kg: -25.0,
            ..ProductionParameters::default()
        };
        let q = calculate(&p, Some(SCENARIO_VOLUME)).unwrap();
        assert!(q.material_cost < 0.0);
    }

    fn params_strategy() -> impl Strategy<Value = ProductionParameters> {
        (
            0.1f64..20.0,
            0.0f64..500.0,
            (0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0),
            (0.0f64..200.0, 0.0f64..20.0, 0.0f64..600.0),
            1u32..10_000,
            (0.0f64..300.0, 0.0f64..100.0, 0.0f64..50.0),
            (0.0f64..20.0, 0.0f64..5.0),
        )
            .prop_map(
                |(density, price, (waste, infill, supports), (hours, post, prep), qty, (markup, defect, tax), (amort, power))| {
                    ProductionParameters {
                        density,
                        price_per_kg: price,
                        waste_percent: waste,
                        infill,
                        supports,
                        print_time_hours: hours,
                        post_process_hours: post,
                        model_prep_mins: prep,
                        quantity: qty,
                        markup_percent: markup,
                        defect_rate_percent: defect,
                        tax_rate_percent: tax,
                        amortization_cost_per_hour: amort,
                        electricity_cost_per_hour: power,
                        ..ProductionParameters::default()
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn all_fields_finite_and_batch_exact(p in params_strategy(), v in 1.0f64..5.0e7) {
            let q = calculate(&p, Some(v)).unwrap();
            for x in [q.weight_grams, q.material_cost, q.print_cost, q.power_cost, q.labor_cost,
                      q.unit_cost, q.profit_per_unit, q.total_unit_price, q.final_batch_price] {
                prop_assert!(x.is_finite());
            }
            prop_assert_eq!(q.final_batch_price, q.total_unit_price * f64::from(p.quantity));
        }

        #[test]
        fn identical_inputs_identical_bits(p in params_strategy(), v in 1.0f64..5.0e7) {
            let a = calculate(&p, Some(v)).unwrap();
            let b = calculate(&p, Some(v)).unwrap();
            prop_assert_eq!(a.final_batch_price.to_bits(), b.final_batch_price.to_bits());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn markup_strictly_increases_price(p in params_strategy(), v in 1.0f64..5.0e7, bump in 1.0f64..100.0) {
            // Only meaningful when there is a positive cost to mark up.
            let base = calculate(&p, Some(v)).unwrap();
            prop_assume!(base.unit_cost > 1e-6);
            let higher = ProductionParameters { markup_percent: p.markup_percent + bump, ..p.clone() };
            let up = calculate(&higher, Some(v)).unwrap();
            prop_assert!(up.profit_per_unit > base.profit_per_unit);
            prop_assert!(up.total_unit_price > base.total_unit_price);
        }

        #[test]
        fn batch_scales_with_quantity(p in params_strategy(), v in 1.0f64..5.0e7, k in 2u32..50) {
            let single = calculate(&ProductionParameters { quantity: 1, ..p.clone() }, Some(v)).unwrap();
            let many = calculate(&ProductionParameters { quantity: k, ..p.clone() }, Some(v)).unwrap();
            prop_assert_eq!(many.total_unit_price, single.total_unit_price);
            prop_assert_eq!(many.final_batch_price, single.final_batch_price * f64::from(k));
        }
    }
}
