use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

static SETTINGS: OnceLock<Settings> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub community: Community,
    pub geofence: Geofence,
    pub scan: Scan,
    pub weather: Weather,
    pub disease_api: DiseaseApi,
    pub image_host: ImageHost,
    pub fertilizer: Fertilizer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_content_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub min_radius_meters: f64,
    pub max_radius_meters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub min_health: i32,
    pub healthy_threshold: i32,
    pub warning_threshold: i32,
    pub issue_pool: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    pub base_url: String,
    pub geocode_url: String,
    pub units: String,
    pub lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseApi {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHost {
    pub base_url: String,
    pub upload_preset: String,
    pub folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fertilizer {
    pub products: Vec<FertilizerProduct>,
    pub crops: Vec<CropRequirement>,
    pub disease_adjustments: Vec<DiseaseAdjustment>,
}

/// N/P/K percentages as printed on the bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FertilizerProduct {
    pub name: String,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub bag_kg: f64,
}

/// Nutrient demand in kg per hectare for one season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropRequirement {
    pub crop_type: String,
    pub n_per_ha: f64,
    pub p_per_ha: f64,
    pub k_per_ha: f64,
}

/// Multipliers applied to the base requirement when a disease is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseAdjustment {
    pub disease: String,
    pub n_factor: f64,
    pub p_factor: f64,
    pub k_factor: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: Server {
                cors_origin: "*".to_string(),
            },
            community: Community {
                default_limit: 50,
                max_limit: 200,
                max_content_length: 4000,
            },
            geofence: Geofence {
                min_radius_meters: 50.0,
                max_radius_meters: 50_000.0,
            },
            scan: Scan {
                min_health: 55,
                healthy_threshold: 85,
                warning_threshold: 70,
                issue_pool: vec![
                    "Leaf discoloration patches".into(),
                    "Suspected fungal lesions".into(),
                    "Uneven canopy growth".into(),
                    "Dry patches near field edge".into(),
                    "Pest activity on lower leaves".into(),
                ],
            },
            weather: Weather {
                base_url: "https://api.openweathermap.org/data/2.5".into(),
                geocode_url: "https://api.openweathermap.org/geo/1.0".into(),
                units: "metric".into(),
                lang: "en".into(),
            },
            disease_api: DiseaseApi {
                base_url: "http://localhost:8001".into(),
            },
            image_host: ImageHost {
                base_url: "https://api.cloudinary.com/v1_1/demo".into(),
                upload_preset: "cropwise".into(),
                folder: "cropwise/community".into(),
            },
            fertilizer: Fertilizer {
                products: vec![
                    FertilizerProduct {
                        name: "Urea".into(),
                        nitrogen: 46.0,
                        phosphorus: 0.0,
                        potassium: 0.0,
                        bag_kg: 50.0,
                    },
                    FertilizerProduct {
                        name: "DAP 18-46-0".into(),
                        nitrogen: 18.0,
                        phosphorus: 46.0,
                        potassium: 0.0,
                        bag_kg: 50.0,
                    },
                    FertilizerProduct {
                        name: "NPK 20-20-15".into(),
                        nitrogen: 20.0,
                        phosphorus: 20.0,
                        potassium: 15.0,
                        bag_kg: 50.0,
                    },
                    FertilizerProduct {
                        name: "NPK 16-16-8".into(),
                        nitrogen: 16.0,
                        phosphorus: 16.0,
                        potassium: 8.0,
                        bag_kg: 50.0,
                    },
                    FertilizerProduct {
                        name: "Potassium chloride".into(),
                        nitrogen: 0.0,
                        phosphorus: 0.0,
                        potassium: 60.0,
                        bag_kg: 50.0,
                    },
                ],
                crops: vec![
                    CropRequirement {
                        crop_type: "maize".into(),
                        n_per_ha: 150.0,
                        p_per_ha: 60.0,
                        k_per_ha: 90.0,
                    },
                    CropRequirement {
                        crop_type: "rice".into(),
                        n_per_ha: 100.0,
                        p_per_ha: 50.0,
                        k_per_ha: 50.0,
                    },
                    CropRequirement {
                        crop_type: "soybean".into(),
                        n_per_ha: 30.0,
                        p_per_ha: 60.0,
                        k_per_ha: 60.0,
                    },
                    CropRequirement {
                        crop_type: "vegetables".into(),
                        n_per_ha: 120.0,
                        p_per_ha: 80.0,
                        k_per_ha: 100.0,
                    },
                ],
                disease_adjustments: vec![
                    DiseaseAdjustment {
                        disease: "Blight".into(),
                        n_factor: 0.9,
                        p_factor: 1.1,
                        k_factor: 1.2,
                    },
                    DiseaseAdjustment {
                        disease: "Common_Rust".into(),
                        n_factor: 0.9,
                        p_factor: 1.0,
                        k_factor: 1.15,
                    },
                    DiseaseAdjustment {
                        disease: "Gray_Leaf_Spot".into(),
                        n_factor: 0.85,
                        p_factor: 1.1,
                        k_factor: 1.2,
                    },
                ],
            },
        }
    }
}

impl Settings {
    pub fn load() -> &'static Settings {
        SETTINGS.get_or_init(Self::load_from_files)
    }

    fn load_from_files() -> Settings {
        let default_path = Path::new("settings.default.ron");
        let override_path = Path::new("settings.ron");

        let mut settings = if default_path.exists() {
            fs::read_to_string(default_path)
                .ok()
                .and_then(|content| ron::from_str(&content).ok())
                .unwrap_or_default()
        } else {
            Settings::default()
        };

        if override_path.exists() {
            if let Ok(content) = fs::read_to_string(override_path) {
                if let Ok(overrides) = ron::from_str::<Settings>(&content) {
                    settings = overrides;
                }
            }
        }

        settings
    }
}

pub fn settings() -> &'static Settings {
    Settings::load()
}
