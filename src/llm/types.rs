use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDetection {
    pub description: String,
    pub objects: Vec<String>,
    pub era: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSwatch {
    pub hex: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorationStep {
    pub step: String,
    pub action: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scene_detection: SceneDetection,
    pub color_palette: Vec<ColorSwatch>,
    pub restoration_guide: Vec<RestorationStep>,
    pub imagen_prompt: String,
}

#[cfg(test)]
pub fn sample_result() -> AnalysisResult {
    AnalysisResult {
        scene_detection: SceneDetection {
            description: "Family portrait in front of a timber farmhouse".to_string(),
            objects: vec![
                "wooden porch".to_string(),
                "wool coats".to_string(),
                "horse cart".to_string(),
            ],
            era: "1920s".to_string(),
            context: "Rural Central Europe".to_string(),
            text_analysis: Some("Handwritten note: 'Leto 1926'".to_string()),
        },
        color_palette: vec![
            ColorSwatch {
                hex: "#8B5A2B".to_string(),
                label: "Weathered timber".to_string(),
                description: "Sun-bleached spruce boards".to_string(),
            },
            ColorSwatch {
                hex: "#E0B89A".to_string(),
                label: "Skin tone".to_string(),
                description: "Warm outdoor complexion".to_string(),
            },
        ],
        restoration_guide: vec![
            RestorationStep {
                step: "Remove dust and scratches".to_string(),
                action: "Cleanup".to_string(),
                details: "Spot-heal the emulsion scratches across the sky".to_string(),
            },
            RestorationStep {
                step: "Reduce grain".to_string(),
                action: "Denoise".to_string(),
                details: "Apply luminance noise reduction before sharpening".to_string(),
            },
        ],
        imagen_prompt: "Colorize this 1920s rural family portrait with natural tones".to_string(),
    }
}
