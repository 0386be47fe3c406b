use serde::Serialize;

use crate::error::ServiceError;
use crate::settings::{FertilizerProduct, Settings};

/// Total nutrient demand in kilograms for the whole area.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientPlan {
    pub nitrogen_kg: f64,
    pub phosphorus_kg: f64,
    pub potassium_kg: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub plan: NutrientPlan,
    pub product: FertilizerProduct,
    pub product_kg: f64,
    pub bags: u32,
    pub alternatives: Vec<FertilizerProduct>,
}

fn normalized(n: f64, p: f64, k: f64) -> [f64; 3] {
    let magnitude = (n * n + p * p + k * k).sqrt();
    if magnitude == 0.0 {
        return [0.0; 3];
    }
    [n / magnitude, p / magnitude, k / magnitude]
}

/// Distance between the product's N-P-K ratio and the demanded ratio.
/// Smaller is a better match.
fn ratio_distance(product: &FertilizerProduct, plan: &NutrientPlan) -> f64 {
    let want = normalized(plan.nitrogen_kg, plan.phosphorus_kg, plan.potassium_kg);
    let have = normalized(product.nitrogen, product.phosphorus, product.potassium);
    want.iter()
        .zip(have.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}

fn rank_products<'a>(
    products: &'a [FertilizerProduct],
    plan: &NutrientPlan,
) -> Vec<&'a FertilizerProduct> {
    let mut ranked: Vec<&FertilizerProduct> = products.iter().collect();
    ranked.sort_by(|a, b| {
        ratio_distance(a, plan)
            .partial_cmp(&ratio_distance(b, plan))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Kilograms of product needed so every nutrient demand is covered,
/// driven by whichever nutrient the product is weakest in.
fn required_product_kg(product: &FertilizerProduct, plan: &NutrientPlan) -> f64 {
    [
        (plan.nitrogen_kg, product.nitrogen),
        (plan.phosphorus_kg, product.phosphorus),
        (plan.potassium_kg, product.potassium),
    ]
    .iter()
    .filter(|(need, content)| *need > 0.0 && *content > 0.0)
    .map(|(need, content)| need / (content / 100.0))
    .fold(0.0, f64::max)
}

pub fn recommend(
    s: &Settings,
    crop_type: &str,
    disease: Option<&str>,
    area_hectares: f64,
) -> Result<Recommendation, ServiceError> {
    if !area_hectares.is_finite() || area_hectares <= 0.0 {
        return Err(ServiceError::Invalid("area must be positive".into()));
    }
    let requirement = s
        .fertilizer
        .crops
        .iter()
        .find(|c| c.crop_type.eq_ignore_ascii_case(crop_type))
        .ok_or_else(|| ServiceError::Invalid(format!("unknown crop type: {crop_type}")))?;

    let (n_factor, p_factor, k_factor) = disease
        .and_then(|d| {
            s.fertilizer
                .disease_adjustments
                .iter()
                .find(|a| a.disease.eq_ignore_ascii_case(d))
        })
        .map(|a| (a.n_factor, a.p_factor, a.k_factor))
        .unwrap_or((1.0, 1.0, 1.0));

    let plan = NutrientPlan {
        nitrogen_kg: requirement.n_per_ha * n_factor * area_hectares,
        phosphorus_kg: requirement.p_per_ha * p_factor * area_hectares,
        potassium_kg: requirement.k_per_ha * k_factor * area_hectares,
    };

    let ranked = rank_products(&s.fertilizer.products, &plan);
    let product = ranked
        .first()
        .copied()
        .ok_or_else(|| ServiceError::Invalid("no fertilizer products configured".into()))?;

    let product_kg = required_product_kg(product, &plan);
    let bags = if product.bag_kg > 0.0 {
        (product_kg / product.bag_kg).ceil() as u32
    } else {
        0
    };

    Ok(Recommendation {
        plan,
        product: product.clone(),
        product_kg,
        bags,
        alternatives: ranked.iter().skip(1).take(2).map(|p| (*p).clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Settings {
        Settings::default()
    }

    #[test]
    fn test_maize_two_hectares() {
        let s = defaults();
        let rec = recommend(&s, "maize", None, 2.0).unwrap();

        assert!((rec.plan.nitrogen_kg - 300.0).abs() < 1e-9);
        assert!((rec.plan.phosphorus_kg - 120.0).abs() < 1e-9);
        assert!((rec.plan.potassium_kg - 180.0).abs() < 1e-9);

        // A balanced NPK blend beats straight urea for a 150-60-90 demand.
        assert_eq!(rec.product.name, "NPK 20-20-15");

        // Covering every nutrient is driven by nitrogen here:
        // 300 / 0.20 = 1500 kg of product, i.e. 30 bags of 50 kg.
        assert!((rec.product_kg - 1500.0).abs() < 1e-6);
        assert_eq!(rec.bags, 30);
        assert_eq!(rec.alternatives.len(), 2);
    }

    #[test]
    fn test_disease_adjustment_scales_demand() {
        let s = defaults();
        let rec = recommend(&s, "maize", Some("Gray_Leaf_Spot"), 1.0).unwrap();

        assert!((rec.plan.nitrogen_kg - 150.0 * 0.85).abs() < 1e-9);
        assert!((rec.plan.phosphorus_kg - 60.0 * 1.1).abs() < 1e-9);
        assert!((rec.plan.potassium_kg - 90.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_disease_is_ignored() {
        let s = defaults();
        let base = recommend(&s, "maize", None, 1.0).unwrap();
        let with_unknown = recommend(&s, "maize", Some("made-up"), 1.0).unwrap();
        assert!((base.plan.nitrogen_kg - with_unknown.plan.nitrogen_kg).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_crop_is_invalid() {
        let s = defaults();
        let err = recommend(&s, "dragonfruit", None, 1.0).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[test]
    fn test_bad_area_is_invalid() {
        let s = defaults();
        assert!(matches!(
            recommend(&s, "maize", None, 0.0).unwrap_err(),
            ServiceError::Invalid(_)
        ));
        assert!(matches!(
            recommend(&s, "maize", None, f64::NAN).unwrap_err(),
            ServiceError::Invalid(_)
        ));
    }

    #[test]
    fn test_ratio_distance_prefers_matching_blend() {
        let plan = NutrientPlan {
            nitrogen_kg: 100.0,
            phosphorus_kg: 0.0,
            potassium_kg: 0.0,
        };
        let urea = FertilizerProduct {
            name: "Urea".into(),
            nitrogen: 46.0,
            phosphorus: 0.0,
            potassium: 0.0,
            bag_kg: 50.0,
        };
        let potash = FertilizerProduct {
            name: "Potash".into(),
            nitrogen: 0.0,
            phosphorus: 0.0,
            potassium: 60.0,
            bag_kg: 50.0,
        };
        assert!(ratio_distance(&urea, &plan) < ratio_distance(&potash, &plan));
    }
}
