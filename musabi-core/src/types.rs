use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::PipelineError;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GenText,
    GenImg,
    SelectImg,
    EditImg,
    PubImg,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: &'static [Stage] = &[
        Stage::GenText,
        Stage::GenImg,
        Stage::SelectImg,
        Stage::EditImg,
        Stage::PubImg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::GenText => "gen_text",
            Stage::GenImg => "gen_img",
            Stage::SelectImg => "select_img",
            Stage::EditImg => "edit_img",
            Stage::PubImg => "pub_img",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.replace('-', "_").as_str() {
            "gen_text" => Some(Stage::GenText),
            "gen_img" => Some(Stage::GenImg),
            "select_img" => Some(Stage::SelectImg),
            "edit_img" => Some(Stage::EditImg),
            "pub_img" => Some(Stage::PubImg),
            _ => None,
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ALL.iter().position(|s| s == self)?;
        Stage::ALL.get(idx + 1).copied()
    }
}

/// Identifies one pipeline run; every stored artifact lives under its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    name: String,
}

impl ExecutionContext {
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::validation("ExecName must not be empty"));
        }
        if trimmed.contains('/') {
            return Err(PipelineError::validation(format!(
                "ExecName must not contain '/': {}",
                trimmed
            )));
        }
        Ok(Self {
            name: trimmed.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A generated dish. Step order is significant and is kept as generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DishRecord {
    pub dish_name: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl DishRecord {
    pub fn validate(&self) -> Result<(), PipelineError> {
        require_text("DishName", &self.dish_name)?;
        require_items("Ingredients", &self.ingredients)?;
        require_items("Steps", &self.steps)
    }
}

/// A typed stage input, checked before any side effect happens.
pub trait StageInput: DeserializeOwned {
    fn validate(&self) -> Result<(), PipelineError>;
}

/// Deserialize and validate a stage input from the running payload.
pub fn parse_input<T: StageInput>(payload: &JsonValue) -> Result<T, PipelineError> {
    let input: T = serde_json::from_value(payload.clone())
        .map_err(|e| PipelineError::validation(format!("Invalid stage input: {}", e)))?;
    input.validate()?;
    Ok(input)
}

/// Serialize a stage output into the JSON merged back into the payload.
pub fn to_output<T: Serialize>(output: &T) -> Result<JsonValue, PipelineError> {
    serde_json::to_value(output)
        .map_err(|e| PipelineError::internal(format!("Failed to serialize output: {}", e)))
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(PipelineError::validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

pub(crate) fn require_items(field: &str, values: &[String]) -> Result<(), PipelineError> {
    if values.is_empty() {
        return Err(PipelineError::validation(format!(
            "{} must not be empty",
            field
        )));
    }
    if let Some(pos) = values.iter().position(|v| v.trim().is_empty()) {
        return Err(PipelineError::validation(format!(
            "{}[{}] must not be empty",
            field, pos
        )));
    }
    Ok(())
}

/// Output from the gen_text stage
pub type GenTextOutput = DishRecord;

/// Input to the gen_img stage.
///
/// With `ParallelIndex` set, one branch runs and `ImgKey` is returned; otherwise
/// `ParallelCount` branches (or the configured default) run and `ImageKeys` is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenImgInput {
    pub dish_name: String,
    pub ingredients: Vec<String>,
    pub exec_name: String,
    #[serde(default)]
    pub parallel_index: Option<usize>,
    #[serde(default)]
    pub parallel_count: Option<usize>,
}

impl StageInput for GenImgInput {
    fn validate(&self) -> Result<(), PipelineError> {
        require_text("DishName", &self.dish_name)?;
        require_items("Ingredients", &self.ingredients)?;
        ExecutionContext::new(self.exec_name.as_str())?;
        if self.parallel_count == Some(0) {
            return Err(PipelineError::validation("ParallelCount must be at least 1"));
        }
        Ok(())
    }
}

/// Output from a single gen_img branch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenImgBranchOutput {
    pub img_key: String,
}

/// Output from a gen_img fan-out, in branch order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenImgFanOutOutput {
    pub image_keys: Vec<String>,
}

/// Input to the select_img stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectImgInput {
    pub image_keys: Vec<String>,
}

impl StageInput for SelectImgInput {
    fn validate(&self) -> Result<(), PipelineError> {
        require_items("ImageKeys", &self.image_keys)
    }
}

/// Output from the select_img stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectImgOutput {
    pub img_key: String,
}

/// Input to the edit_img stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EditImgInput {
    pub img_key: String,
    pub dish_name: String,
    pub exec_name: String,
}

impl StageInput for EditImgInput {
    fn validate(&self) -> Result<(), PipelineError> {
        require_text("ImgKey", &self.img_key)?;
        require_text("DishName", &self.dish_name)?;
        ExecutionContext::new(self.exec_name.as_str()).map(|_| ())
    }
}

/// Output from the edit_img stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EditImgOutput {
    pub title_img_key: String,
    pub origin_img_key: String,
}

/// Input to the pub_img stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PubImgInput {
    #[serde(flatten)]
    pub dish: DishRecord,
    pub title_img_key: String,
    pub origin_img_key: String,
    #[serde(default)]
    pub dry_run: bool,
}

impl StageInput for PubImgInput {
    fn validate(&self) -> Result<(), PipelineError> {
        self.dish.validate()?;
        require_text("TitleImgKey", &self.title_img_key)?;
        require_text("OriginImgKey", &self.origin_img_key)
    }
}

/// Output from the pub_img stage. Empty on dry runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PubImgOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::GenText.next(), Some(Stage::GenImg));
        assert_eq!(Stage::EditImg.next(), Some(Stage::PubImg));
        assert_eq!(Stage::PubImg.next(), None);
        assert_eq!(Stage::parse("select-img"), Some(Stage::SelectImg));
        assert_eq!(Stage::parse("publish"), None);
    }

    #[test]
    fn test_execution_context_validation() {
        assert_eq!(ExecutionContext::new(" run-42 ").unwrap().name(), "run-42");
        assert!(ExecutionContext::new("").is_err());
        assert!(ExecutionContext::new("a/b").is_err());
    }

    #[test]
    fn test_dish_record_field_names() {
        let dish = DishRecord {
            dish_name: "Tomato Basil Pasta".to_string(),
            ingredients: vec!["Pasta 200g".to_string()],
            steps: vec!["Boil pasta".to_string()],
            genres: None,
            main_food: Some("Pasta".to_string()),
            theme: None,
        };
        let value = serde_json::to_value(&dish).unwrap();
        assert_eq!(value["DishName"], "Tomato Basil Pasta");
        assert_eq!(value["MainFood"], "Pasta");
        assert!(value.get("Genres").is_none());
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let payload = json!({ "DishName": "Soup", "ExecName": "run-1" });
        let result = parse_input::<GenImgInput>(&payload);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_empty_dish_name_rejected() {
        let payload = json!({ "ImgKey": "run-1/candidates/0.png", "DishName": " ", "ExecName": "run-1" });
        let result = parse_input::<EditImgInput>(&payload);
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_pub_img_input_from_merged_payload() {
        let payload = json!({
            "DishName": "Tomato Basil Pasta",
            "Ingredients": ["Pasta 200g", "Tomato 2"],
            "Steps": ["Boil pasta", "Add tomato"],
            "Theme": "Summer",
            "TitleImgKey": "run-42/0.png",
            "OriginImgKey": "run-42/1.png",
            "ImgKey": "run-42/candidates/2.png",
            "ExecName": "run-42"
        });
        let input = parse_input::<PubImgInput>(&payload).unwrap();
        assert_eq!(input.dish.steps, vec!["Boil pasta", "Add tomato"]);
        assert_eq!(input.dish.theme.as_deref(), Some("Summer"));
        assert!(!input.dry_run);
    }
}
