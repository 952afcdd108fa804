//! Canned data served when the app runs without provider access.

use anyhow::{anyhow, Context};
use include_dir::{include_dir, Dir};

use crate::models::{EnergyLevel, MealOption};

static DEMO_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/demo");

pub const DEMO_CONFIDENCE: f64 = 0.85;

fn load<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let file = DEMO_DIR
        .get_file(path)
        .ok_or_else(|| anyhow!("missing demo file {path}"))?;
    let text = file
        .contents_utf8()
        .ok_or_else(|| anyhow!("demo file {path} is not UTF-8"))?;
    serde_json::from_str(text).with_context(|| format!("invalid demo file {path}"))
}

pub fn demo_ingredients() -> anyhow::Result<Vec<String>> {
    load("ingredients.json")
}

/// Static meal set for an energy label. Unknown labels get the `low` set.
pub fn demo_meals(energy: &str) -> anyhow::Result<Vec<MealOption>> {
    let level = EnergyLevel::from_label(energy).unwrap_or(EnergyLevel::Low);
    load(&format!("meals/{}.json", level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_energy_level_has_a_meal_set() {
        for level in [EnergyLevel::None, EnergyLevel::Low, EnergyLevel::Medium, EnergyLevel::High] {
            let meals = demo_meals(level.as_str()).unwrap();
            assert!(!meals.is_empty(), "no meals for {}", level.as_str());
            assert!(meals.len() <= 3);
            for meal in &meals {
                assert!(!meal.name.is_empty());
                assert!(!meal.steps.is_empty());
                assert!(meal.detail.is_some());
            }
        }
    }

    #[test]
    fn step_count_grows_with_energy() {
        let steps = |label: &str| demo_meals(label).unwrap()[0].steps.len();
        assert!(steps("none") <= steps("medium"));
        assert!(steps("medium") <= steps("high"));
    }

    #[test]
    fn unknown_energy_falls_back_to_low() {
        assert_eq!(demo_meals("exhausted").unwrap(), demo_meals("low").unwrap());
        assert_eq!(demo_meals("High").unwrap(), demo_meals("low").unwrap());
        assert_eq!(demo_meals("high").unwrap()[0].name, "Schnitzel Parmigiana");
    }

    #[test]
    fn demo_ingredients_are_canonical() {
        let items = demo_ingredients().unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(crate::normalize::canonicalize_ingredients(&items), items);
    }
}
