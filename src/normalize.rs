//! Tolerant decoding of model replies and ingredient list cleanup.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};

use crate::models::MealOption;

/// Parses JSON out of free-form model text.
///
/// Models often wrap their JSON in prose or code fences, so when the text is not
/// JSON as a whole the span from the first `{` to the last `}` is tried instead.
/// The span is taken verbatim: several objects in one reply are not told apart.
/// If no such span exists the original parse error is returned.
pub fn parse_model_json(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) => match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end]),
            _ => Err(err),
        },
    }
}

pub fn parse_model_output<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(parse_model_json(text)?)
}

/// Trims and lowercases each entry, drops blanks and keeps the first occurrence
/// of every remaining value.
pub fn canonicalize_ingredients<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let cleaned = item.as_ref().trim().to_lowercase();
        if !cleaned.is_empty() && !out.contains(&cleaned) {
            out.push(cleaned);
        }
    }
    out
}

/// Prior ingredients first, then anything new.
pub fn merge_ingredients(prior: &[String], extracted: &[String]) -> Vec<String> {
    canonicalize_ingredients(prior.iter().chain(extracted))
}

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// What the extraction prompt asks the model to return.
#[serde_as]
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelExtraction {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde_as(as = "DefaultOnError<Option<_>>")]
    #[serde(default)]
    confidence: Option<f64>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub question: Option<String>,
}

impl ModelExtraction {
    pub fn confidence(&self) -> f64 {
        self.confidence.unwrap_or_else(default_confidence)
    }
}

/// What the generation prompt asks the model to return.
#[serde_as]
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelGeneration {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub meals: Vec<MealOption>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn well_formed_json_parses_directly() {
        let text = r#"{"ingredients":["egg"],"confidence":0.9,"question":null}"#;
        let value = parse_model_json(text).unwrap();
        assert_eq!(value, serde_json::from_str::<Value>(text).unwrap());
    }

    #[test]
    fn json_wrapped_in_prose_is_extracted() {
        let value = parse_model_json(r#"Sure! Here it is: {"a":1} Hope that helps."#).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn json_in_code_fence_is_extracted() {
        let text = "```json\n{\"meals\": [{\"name\": \"Toastie\"}]}\n```";
        let value = parse_model_json(text).unwrap();
        assert_eq!(value["meals"][0]["name"], "Toastie");
    }

    #[test]
    fn text_without_braces_fails() {
        assert!(parse_model_json("no json here, sorry").is_err());
        assert!(parse_model_json("only an opener {").is_err());
        assert!(parse_model_json("} backwards {").is_err());
    }

    #[test]
    fn two_objects_are_not_disambiguated() {
        // first `{` to last `}` spans both objects, which is not valid JSON
        assert!(parse_model_json(r#"{"a":1} and also {"b":2}"#).is_err());
    }

    #[test]
    fn canonicalize_folds_case_and_whitespace() {
        assert_eq!(canonicalize_ingredients([" Tuna ", "tuna", "TUNA"]), vec!["tuna"]);
    }

    #[test]
    fn canonicalize_drops_blanks_and_keeps_first_seen_order() {
        let out = canonicalize_ingredients(["Rice", "  ", "Soy Sauce", "", "rice", "Cheddar Cheese"]);
        assert_eq!(out, vec!["rice", "soy sauce", "cheddar cheese"]);
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let lists: Vec<Vec<&str>> = vec![
            vec![],
            vec![" Tuna ", "tuna", "TUNA"],
            vec!["2 cans of Tuna", "Half a Pumpkin ", "half a pumpkin", "\tEggs\n"],
        ];
        for list in lists {
            let once = canonicalize_ingredients(&list);
            let twice = canonicalize_ingredients(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn merge_keeps_prior_first() {
        let merged = merge_ingredients(&["rice".to_string()], &["egg".to_string(), "Rice".to_string()]);
        assert_eq!(merged, vec!["rice", "egg"]);
    }

    #[test]
    fn extraction_defaults() {
        let parsed: ModelExtraction = parse_model_output("{}").unwrap();
        assert!(parsed.ingredients.is_empty());
        assert_eq!(parsed.confidence(), 0.5);
        assert_eq!(parsed.question, None);

        let parsed: ModelExtraction =
            parse_model_output(r#"{"ingredients": null, "confidence": "high", "question": 7}"#).unwrap();
        assert!(parsed.ingredients.is_empty());
        assert_eq!(parsed.confidence(), 0.5);
        assert_eq!(parsed.question, None);
    }

    #[test]
    fn extraction_passes_through_model_values() {
        let parsed: ModelExtraction = parse_model_output(
            r#"Here you go: {"ingredients": ["Egg"], "confidence": 0.4, "question": "Any bread?"}"#,
        )
        .unwrap();
        assert_eq!(parsed.ingredients, vec!["Egg"]);
        assert_eq!(parsed.confidence(), 0.4);
        assert_eq!(parsed.question.as_deref(), Some("Any bread?"));
    }

    #[test]
    fn generation_without_meals_is_empty() {
        let parsed: ModelGeneration = parse_model_output(r#"{"note": "nothing"}"#).unwrap();
        assert!(parsed.meals.is_empty());
    }
}
