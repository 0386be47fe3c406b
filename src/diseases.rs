use serde::Serialize;

use crate::outbreak::Severity;

/// Reference entry for one classifier label. The classification endpoint
/// is an opaque oracle; this catalog is what the app shows alongside its
/// predictions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub symptoms: &'static [&'static str],
    pub treatment: &'static [&'static str],
    pub prevention: &'static [&'static str],
}

pub const CATALOG: &[DiseaseInfo] = &[
    DiseaseInfo {
        id: "Blight",
        name: "Northern leaf blight",
        description: "Fungal disease that dries leaves out from the lower canopy up, cutting yield sharply in wet seasons.",
        severity: Severity::High,
        symptoms: &[
            "Long gray-green lesions that turn tan",
            "Lesions run parallel to the leaf veins",
            "Lower leaves dry out and die first",
        ],
        treatment: &[
            "Spray a fungicide containing azoxystrobin or propiconazole",
            "Remove and destroy heavily infected leaves",
            "Improve drainage to shorten leaf wetness",
        ],
        prevention: &[
            "Rotate with soybean or wheat",
            "Plant resistant hybrids",
            "Clear crop residue after harvest",
        ],
    },
    DiseaseInfo {
        id: "Common_Rust",
        name: "Common rust",
        description: "Fungal disease producing orange pustules on both leaf surfaces; spreads quickly in cool, humid weather.",
        severity: Severity::Medium,
        symptoms: &[
            "Small cinnamon-brown pustules on both leaf sides",
            "Pustules darken as the season progresses",
            "Severe cases yellow the whole leaf",
        ],
        treatment: &[
            "Spray mancozeb or chlorothalonil at first pustules",
            "Repeat after 10-14 days if pressure stays high",
        ],
        prevention: &[
            "Plant early so grain fill beats peak rust season",
            "Choose resistant hybrids",
        ],
    },
    DiseaseInfo {
        id: "Gray_Leaf_Spot",
        name: "Gray leaf spot",
        description: "One of the most damaging maize leaf diseases; rectangular gray lesions can take 30-50% of yield in bad years.",
        severity: Severity::High,
        symptoms: &[
            "Rectangular gray-brown lesions bounded by veins",
            "Leaves die from the bottom of the plant upward",
            "Shows up after long humid spells",
        ],
        treatment: &[
            "Spray strobilurin or triazole fungicides",
            "Apply preventively once plants reach knee height",
        ],
        prevention: &[
            "Rotate away from maize for at least a year",
            "Avoid dense planting, keep the canopy airy",
            "Balance fertilization, avoid excess nitrogen",
        ],
    },
    DiseaseInfo {
        id: "Healthy",
        name: "Healthy",
        description: "No disease signs detected; the plant looks healthy.",
        severity: Severity::Low,
        symptoms: &[],
        treatment: &["Keep up the current care routine and monitor regularly"],
        prevention: &[],
    },
];

pub fn by_label(label: &str) -> Option<&'static DiseaseInfo> {
    CATALOG.iter().find(|d| d.id.eq_ignore_ascii_case(label))
}
