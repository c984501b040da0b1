use serde_json::{json, Map, Value};

use crate::config::SafetyProfile;
use crate::llm::media::EncodedImage;
use crate::llm::schema::ANALYSIS_SCHEMA;

const BASE_INSTRUCTION: &str = "\
As a \"ChromaRestore AI Expert\", analyze this historical black-and-white photograph.
Your goal is to provide a comprehensive plan for digital reconstruction and colorization.

Tasks:
1. Scene Detection: Identify objects, textures, period, and geographical context. Analyze any visible text or handwritten notes.
2. Color Palette: Create a set of colors (HEX) for accurate colorization based on historical research or the provided reference.
3. Restoration Guide: List technical steps to repair damage, noise, or loss of sharpness.
4. Imagen Prompt: Generate a professional English technical prompt for image-to-image colorization.";

const REFERENCE_CLAUSE: &str = "\
A second image is provided as a COLOR REFERENCE.
Analyze its chromatic characteristics (skin tones, lighting, contrast)
and suggest how to transfer these specific colors to the black-and-white photograph.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub primary: EncodedImage,
    pub reference: Option<EncodedImage>,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: Option<f32>,
    pub safety: SafetyProfile,
}

impl AnalysisRequest {
    pub fn new(primary: EncodedImage, reference: Option<EncodedImage>) -> Self {
        AnalysisRequest { primary, reference }
    }

    pub fn image_count(&self) -> usize {
        1 + usize::from(self.reference.is_some())
    }
}

pub fn build_instruction(has_reference: bool) -> String {
    let mut text = String::from(BASE_INSTRUCTION);
    if has_reference {
        text.push_str("\n\n");
        text.push_str(REFERENCE_CLAUSE);
    }
    text.push_str(
        "\n\nReturn the response strictly as a JSON object with the following structure:\n",
    );
    text.push_str(&ANALYSIS_SCHEMA.describe());
    text
}

fn inline_image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.media_type,
            "data": image.payload
        }
    })
}

pub fn build_safety_settings(profile: SafetyProfile) -> Vec<Value> {
    let threshold = match profile {
        SafetyProfile::Standard => "BLOCK_MEDIUM_AND_ABOVE",
        SafetyProfile::Permissive => "OFF",
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

/// Parts go primary image, reference image (if any), then the instruction.
pub fn build_gemini_parts(request: &AnalysisRequest) -> Vec<Value> {
    let mut parts = vec![inline_image_part(&request.primary)];
    if let Some(reference) = &request.reference {
        parts.push(inline_image_part(reference));
    }
    parts.push(json!({ "text": build_instruction(request.reference.is_some()) }));
    parts
}

pub fn build_generation_config(settings: &GenerationSettings) -> Value {
    let mut config = Map::new();
    config.insert("responseMimeType".to_string(), json!("application/json"));
    config.insert(
        "responseSchema".to_string(),
        ANALYSIS_SCHEMA.to_response_schema(),
    );
    if let Some(temperature) = settings.temperature {
        config.insert("temperature".to_string(), json!(temperature));
    }
    Value::Object(config)
}

pub fn build_payload(request: &AnalysisRequest, settings: &GenerationSettings) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": build_gemini_parts(request) }],
        "generationConfig": build_generation_config(settings),
        "safetySettings": build_safety_settings(settings.safety),
    })
}
