//! Declarative description of the JSON document Gemini must return.
//!
//! The same tree is rendered into the request's `responseSchema`, into the
//! shape sketch quoted in the instruction text, and walked again to check the
//! decoded response before it is deserialized into [`AnalysisResult`].
//!
//! [`AnalysisResult`]: crate::llm::types::AnalysisResult

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy)]
pub enum Schema {
    String,
    Array(&'static Schema),
    Object(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, schema: Schema) -> Self {
        Field {
            name,
            schema,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, schema: Schema) -> Self {
        Field {
            name,
            schema,
            required: false,
        }
    }
}

const SCENE_DETECTION_FIELDS: &[Field] = &[
    Field::required("description", Schema::String),
    Field::required("objects", Schema::Array(&Schema::String)),
    Field::required("era", Schema::String),
    Field::required("context", Schema::String),
    Field::optional("textAnalysis", Schema::String),
];

const COLOR_SWATCH_FIELDS: &[Field] = &[
    Field::required("hex", Schema::String),
    Field::required("label", Schema::String),
    Field::required("description", Schema::String),
];

const RESTORATION_STEP_FIELDS: &[Field] = &[
    Field::required("step", Schema::String),
    Field::required("action", Schema::String),
    Field::required("details", Schema::String),
];

const ANALYSIS_FIELDS: &[Field] = &[
    Field::required("sceneDetection", Schema::Object(SCENE_DETECTION_FIELDS)),
    Field::required(
        "colorPalette",
        Schema::Array(&Schema::Object(COLOR_SWATCH_FIELDS)),
    ),
    Field::required(
        "restorationGuide",
        Schema::Array(&Schema::Object(RESTORATION_STEP_FIELDS)),
    ),
    Field::required("imagenPrompt", Schema::String),
];

pub const ANALYSIS_SCHEMA: Schema = Schema::Object(ANALYSIS_FIELDS);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("response does not match schema at {path}: {problem}")]
pub struct SchemaViolation {
    pub path: String,
    pub problem: String,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Schema {
    fn type_name(&self) -> &'static str {
        match self {
            Schema::String => "string",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
        }
    }

    /// Gemini `responseSchema` (OpenAPI subset, upper-case type names).
    pub fn to_response_schema(&self) -> Value {
        match self {
            Schema::String => json!({ "type": "STRING" }),
            Schema::Array(items) => json!({
                "type": "ARRAY",
                "items": items.to_response_schema(),
            }),
            Schema::Object(fields) => {
                let mut properties = Map::new();
                for field in fields.iter() {
                    properties.insert(field.name.to_string(), field.schema.to_response_schema());
                }
                let ordering: Vec<&str> = fields.iter().map(|field| field.name).collect();
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|field| field.required)
                    .map(|field| field.name)
                    .collect();
                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "propertyOrdering": ordering,
                    "required": required,
                })
            }
        }
    }

    /// Indented JSON-like sketch used inside the instruction text.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0, false);
        out
    }

    fn describe_into(&self, out: &mut String, indent: usize, optional: bool) {
        match self {
            Schema::String => {
                if optional {
                    out.push_str("\"string (optional)\"");
                } else {
                    out.push_str("\"string\"");
                }
            }
            Schema::Array(items) => {
                out.push('[');
                items.describe_into(out, indent, false);
                out.push(']');
            }
            Schema::Object(fields) => {
                let pad = "  ".repeat(indent + 1);
                out.push_str("{\n");
                for (index, field) in fields.iter().enumerate() {
                    out.push_str(&pad);
                    out.push('"');
                    out.push_str(field.name);
                    out.push_str("\": ");
                    field.schema.describe_into(out, indent + 1, !field.required);
                    if index + 1 < fields.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                out.push_str(&"  ".repeat(indent));
                out.push('}');
            }
        }
    }

    /// Checks types and required fields. Unknown extra fields are tolerated;
    /// an optional field may be absent or `null`.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let mismatch = || SchemaViolation {
            path: path.to_string(),
            problem: format!("expected {}, found {}", self.type_name(), json_type_name(value)),
        };

        match (self, value) {
            (Schema::String, Value::String(_)) => Ok(()),
            (Schema::Array(items), Value::Array(elements)) => {
                for (index, element) in elements.iter().enumerate() {
                    items.validate_at(element, &format!("{path}[{index}]"))?;
                }
                Ok(())
            }
            (Schema::Object(fields), Value::Object(map)) => {
                for field in fields.iter() {
                    let field_path = format!("{path}.{}", field.name);
                    match map.get(field.name) {
                        None | Some(Value::Null) if field.required => {
                            return Err(SchemaViolation {
                                path: field_path,
                                problem: "missing required field".to_string(),
                            });
                        }
                        None | Some(Value::Null) => {}
                        Some(inner) => field.schema.validate_at(inner, &field_path)?,
                    }
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::sample_result;

    #[test]
    fn response_schema_marks_only_text_analysis_optional() {
        let schema = ANALYSIS_SCHEMA.to_response_schema();
        assert_eq!(
            schema["required"],
            json!(["sceneDetection", "colorPalette", "restorationGuide", "imagenPrompt"])
        );

        let scene = &schema["properties"]["sceneDetection"];
        assert_eq!(scene["type"], "OBJECT");
        assert_eq!(scene["required"], json!(["description", "objects", "era", "context"]));
        assert_eq!(scene["properties"]["textAnalysis"], json!({ "type": "STRING" }));
        assert_eq!(scene["properties"]["objects"]["items"]["type"], "STRING");

        let swatch = &schema["properties"]["colorPalette"]["items"];
        assert_eq!(swatch["required"], json!(["hex", "label", "description"]));

        let step = &schema["properties"]["restorationGuide"]["items"];
        assert_eq!(step["required"], json!(["step", "action", "details"]));
        assert_eq!(
            step["propertyOrdering"],
            json!(["step", "action", "details"])
        );
    }

    #[test]
    fn typed_result_serializes_to_a_conforming_document() {
        let value = serde_json::to_value(sample_result()).unwrap();
        assert_eq!(ANALYSIS_SCHEMA.validate(&value), Ok(()));

        let Schema::Object(fields) = ANALYSIS_SCHEMA else {
            panic!("analysis schema must be an object");
        };
        let object = value.as_object().unwrap();
        for field in fields {
            assert!(object.contains_key(field.name), "missing {}", field.name);
        }
        assert_eq!(object.len(), fields.len());
    }

    #[test]
    fn missing_required_nested_field_is_reported_with_path() {
        let mut value = serde_json::to_value(sample_result()).unwrap();
        value["colorPalette"][1]
            .as_object_mut()
            .unwrap()
            .remove("label");

        let err = ANALYSIS_SCHEMA.validate(&value).unwrap_err();
        assert_eq!(err.path, "$.colorPalette[1].label");
        assert_eq!(err.problem, "missing required field");
    }

    #[test]
    fn optional_field_may_be_absent_or_null_but_not_mistyped() {
        let mut value = serde_json::to_value(sample_result()).unwrap();
        value["sceneDetection"]
            .as_object_mut()
            .unwrap()
            .remove("textAnalysis");
        assert!(ANALYSIS_SCHEMA.validate(&value).is_ok());

        value["sceneDetection"]["textAnalysis"] = Value::Null;
        assert!(ANALYSIS_SCHEMA.validate(&value).is_ok());

        value["sceneDetection"]["textAnalysis"] = json!(12);
        let err = ANALYSIS_SCHEMA.validate(&value).unwrap_err();
        assert_eq!(err.path, "$.sceneDetection.textAnalysis");
        assert_eq!(err.problem, "expected string, found number");
    }

    #[test]
    fn empty_object_is_rejected() {
        let err = ANALYSIS_SCHEMA.validate(&json!({})).unwrap_err();
        assert_eq!(err.path, "$.sceneDetection");
    }

    #[test]
    fn description_lists_every_field_and_flags_optional_ones() {
        let sketch = ANALYSIS_SCHEMA.describe();
        assert!(sketch.contains("\"textAnalysis\": \"string (optional)\""));
        assert!(sketch.contains("\"objects\": [\"string\"]"));
        assert!(sketch.contains("\"imagenPrompt\": \"string\""));
        assert!(sketch.starts_with("{\n  \"sceneDetection\": {\n"));
        assert!(sketch.ends_with("\n}"));
    }
}
