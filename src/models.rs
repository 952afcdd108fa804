use serde::{Serialize, Deserialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    None,
    Low,
    Medium,
    High,
}

impl EnergyLevel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    Clarify,
    #[default]
    #[serde(other)]
    Text,
}

/// JSON form of an extraction request (typed input or a clarification answer).
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextRequest {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub text: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub mode: ExtractMode,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub prior_ingredients: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractionResult {
    pub ingredients: Vec<String>,
    pub confidence: f64,
    pub question: Option<String>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateRequest {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub energy: Option<String>,
}

impl GenerateRequest {
    /// Raw energy label as sent by the client, `low` when absent.
    pub fn energy_label(&self) -> &str {
        self.energy.as_deref().unwrap_or(EnergyLevel::Low.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MealDetail {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub temp: String,
    #[serde(default)]
    pub tips: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MealOption {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub why: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub substitutions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<MealDetail>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationResult {
    pub meals: Vec<MealOption>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_mode_is_treated_as_text() {
        let req: ExtractTextRequest = serde_json::from_value(json!({ "text": "eggs", "mode": "shout" })).unwrap();
        assert_eq!(req.mode, ExtractMode::Text);
        let req: ExtractTextRequest = serde_json::from_value(json!({ "text": "eggs", "mode": "clarify" })).unwrap();
        assert_eq!(req.mode, ExtractMode::Clarify);
    }

    #[test]
    fn non_array_prior_ingredients_become_empty() {
        let req: ExtractTextRequest =
            serde_json::from_value(json!({ "text": "eggs", "priorIngredients": "rice" })).unwrap();
        assert!(req.prior_ingredients.is_empty());
        let req: ExtractTextRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.text, "");
        assert_eq!(req.mode, ExtractMode::Text);
    }

    #[test]
    fn generate_request_defaults() {
        let req: GenerateRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.ingredients.is_empty());
        assert_eq!(req.energy_label(), "low");
        let req: GenerateRequest = serde_json::from_value(json!({ "ingredients": null, "energy": null })).unwrap();
        assert!(req.ingredients.is_empty());
        assert_eq!(req.energy_label(), "low");
        let req: GenerateRequest = serde_json::from_value(json!({ "energy": "turbo" })).unwrap();
        assert_eq!(req.energy_label(), "turbo");
    }

    #[test]
    fn meal_option_defaults_missing_fields_and_hides_missing_detail() {
        let meal: MealOption = serde_json::from_value(json!({ "name": "Toast" })).unwrap();
        assert_eq!(meal.why, "");
        assert!(meal.steps.is_empty());
        assert!(meal.detail.is_none());
        let out = serde_json::to_value(&meal).unwrap();
        assert!(out.get("detail").is_none());
    }

    #[test]
    fn question_serializes_as_null() {
        let result = ExtractionResult { ingredients: vec![], confidence: 0.9, question: None };
        assert_eq!(serde_json::to_value(&result).unwrap()["question"], serde_json::Value::Null);
    }

    #[test]
    fn energy_labels() {
        assert_eq!(EnergyLevel::from_label("medium"), Some(EnergyLevel::Medium));
        assert_eq!(EnergyLevel::from_label("HIGH"), None);
        assert!(EnergyLevel::None < EnergyLevel::High);
        assert_eq!(EnergyLevel::High.as_str(), "high");
    }
}
