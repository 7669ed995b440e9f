//! Turns raw model text into a recipe. Never fails: unusable output becomes a
//! draft that carries the raw text for a human to fix up.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::recipes::repo_types::{Difficulty, NewRecipe};

pub const DEFAULT_DIFFICULTY: Difficulty = Difficulty::Easy;
pub const DRAFT_DESCRIPTION: &str = "Auto-generated draft. The AI output could not be parsed as \
structured JSON. Raw output is included in instructions.";

const DRAFT_TITLE_CHARS: usize = 60;
const DRAFT_RAW_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecipe {
    /// Parsed cleanly; ingredients and instructions are both non-empty.
    WellFormed(NewRecipe),
    /// Fallback: no ingredients, one instruction holding the raw output.
    Draft(NewRecipe),
}

pub fn parse_recipe(raw: &str, prompt: &str, cuisine: Option<&str>) -> ParsedRecipe {
    match locate_object(raw).and_then(|obj| from_object(&obj, cuisine)) {
        Some(recipe) => ParsedRecipe::WellFormed(recipe),
        None => {
            warn!(chars = raw.len(), "model output unusable; building draft recipe");
            ParsedRecipe::Draft(draft(raw, prompt, cuisine))
        }
    }
}

/// Whole text first, then the widest `{ .. }` span inside it.
fn locate_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if let Ok(Value::Object(obj)) = serde_json::from_str(trimmed) {
        return Some(obj);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(obj)) => {
            debug!("recovered JSON object embedded in model output");
            Some(obj)
        }
        _ => None,
    }
}

fn from_object(obj: &Map<String, Value>, requested_cuisine: Option<&str>) -> Option<NewRecipe> {
    let title = text(obj.get("title"))?;
    let ingredients = lines(obj.get("ingredients"));
    let instructions = lines(obj.get("instructions"));
    if ingredients.is_empty() || instructions.is_empty() {
        return None;
    }

    let difficulty = obj
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(Difficulty::parse_level)
        .unwrap_or(DEFAULT_DIFFICULTY);

    Some(NewRecipe {
        title,
        description: text(obj.get("description")),
        cuisine: text(obj.get("cuisine")).or_else(|| clean(requested_cuisine)),
        prep_time: minutes(obj.get("prep_time")),
        cook_time: minutes(obj.get("cook_time")),
        servings: minutes(obj.get("servings")).filter(|s| *s > 0),
        difficulty: Some(difficulty),
        ingredients,
        instructions,
        image_url: None,
        user_id: None,
    })
}

fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn text(v: Option<&Value>) -> Option<String> {
    clean(v.and_then(Value::as_str))
}

fn lines(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => clean(Some(s.as_str())),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Non-negative whole number from a JSON number or a string like "15 minutes".
fn minutes(v: Option<&Value>) -> Option<i32> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?.round(),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (0.0..=i32::MAX as f64).contains(&n).then_some(n as i32)
}

fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

fn draft(raw: &str, prompt: &str, cuisine: Option<&str>) -> NewRecipe {
    let (head, cut) = truncate_chars(prompt, DRAFT_TITLE_CHARS);
    let base = if head.is_empty() { "AI Recipe Draft" } else { head };
    let title = format!("{base}{} (AI draft)", if cut { "..." } else { "" });
    let (raw_head, _) = truncate_chars(raw, DRAFT_RAW_CHARS);

    NewRecipe {
        title,
        description: Some(DRAFT_DESCRIPTION.to_string()),
        cuisine: clean(cuisine),
        prep_time: None,
        cook_time: None,
        servings: None,
        difficulty: Some(Difficulty::Unknown),
        ingredients: Vec::new(),
        instructions: vec![raw_head.to_string()],
        image_url: None,
        user_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "title": "Spicy Chicken Pasta",
        "description": "Weeknight pasta with a kick.",
        "cuisine": "Italian",
        "prep_time": 15,
        "cook_time": 20,
        "servings": 4,
        "difficulty": "Medium",
        "ingredients": ["200g penne", "2 chicken breasts", "1 tsp chili flakes"],
        "instructions": ["Boil pasta.", "Sear chicken.", "Toss with chili."]
    }"#;

    fn well_formed(p: ParsedRecipe) -> NewRecipe {
        match p {
            ParsedRecipe::WellFormed(r) => r,
            ParsedRecipe::Draft(r) => panic!("expected well-formed, got draft {r:?}"),
        }
    }

    fn drafted(p: ParsedRecipe) -> NewRecipe {
        match p {
            ParsedRecipe::Draft(r) => r,
            ParsedRecipe::WellFormed(r) => panic!("expected draft, got {r:?}"),
        }
    }

    #[test]
    fn schema_json_keeps_every_field() {
        let r = well_formed(parse_recipe(VALID, "spicy chicken pasta", None));
        assert_eq!(r.title, "Spicy Chicken Pasta");
        assert_eq!(r.description.as_deref(), Some("Weeknight pasta with a kick."));
        assert_eq!(r.cuisine.as_deref(), Some("Italian"));
        assert_eq!((r.prep_time, r.cook_time, r.servings), (Some(15), Some(20), Some(4)));
        assert_eq!(r.difficulty, Some(Difficulty::Medium));
        assert_eq!(r.ingredients.len(), 3);
        assert_eq!(r.instructions, vec!["Boil pasta.", "Sear chicken.", "Toss with chili."]);
        assert!(r.user_id.is_none() && r.image_url.is_none());
    }

    #[test]
    fn json_wrapped_in_prose_or_fences_is_recovered() {
        let raw = format!("Here you go!\n```json\n{VALID}\n```\nEnjoy.");
        let r = well_formed(parse_recipe(&raw, "pasta", None));
        assert_eq!(r.title, "Spicy Chicken Pasta");
    }

    #[test]
    fn unknown_or_missing_difficulty_defaults() {
        let raw = VALID.replace("\"Medium\"", "\"expert\"");
        assert_eq!(well_formed(parse_recipe(&raw, "p", None)).difficulty, Some(Difficulty::Easy));
        let raw = VALID.replace("\"difficulty\": \"Medium\",", "");
        assert_eq!(well_formed(parse_recipe(&raw, "p", None)).difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn lenient_numbers() {
        let raw = VALID
            .replace("\"prep_time\": 15", "\"prep_time\": \"15 minutes\"")
            .replace("\"cook_time\": 20", "\"cook_time\": -5")
            .replace("\"servings\": 4", "\"servings\": 0");
        let r = well_formed(parse_recipe(&raw, "p", None));
        assert_eq!((r.prep_time, r.cook_time, r.servings), (Some(15), None, None));
    }

    #[test]
    fn missing_cuisine_uses_requested_one() {
        let raw = VALID.replace("\"cuisine\": \"Italian\",", "");
        let r = well_formed(parse_recipe(&raw, "p", Some("Thai")));
        assert_eq!(r.cuisine.as_deref(), Some("Thai"));
    }

    #[test]
    fn refusal_text_becomes_draft() {
        let r = drafted(parse_recipe("Sorry, I can't help", "spicy chicken pasta", Some("Italian")));
        assert_eq!(r.title, "spicy chicken pasta (AI draft)");
        assert_eq!(r.description.as_deref(), Some(DRAFT_DESCRIPTION));
        assert_eq!(r.cuisine.as_deref(), Some("Italian"));
        assert_eq!(r.difficulty, Some(Difficulty::Unknown));
        assert!(r.ingredients.is_empty());
        assert_eq!(r.instructions, vec!["Sorry, I can't help"]);
        assert_eq!((r.prep_time, r.cook_time, r.servings), (None, None, None));
    }

    #[test]
    fn object_without_steps_is_not_usable() {
        let r = drafted(parse_recipe(r#"{"title":"Toast","ingredients":["bread"],"instructions":[]}"#, "toast", None));
        assert!(r.ingredients.is_empty());
        assert_eq!(r.instructions.len(), 1);
        let r = drafted(parse_recipe("[1,2,3]", "list", Some("  ")));
        assert!(r.cuisine.is_none());
    }

    #[test]
    fn draft_truncates_title_and_raw_text() {
        let prompt = "é".repeat(75);
        let raw = "x".repeat(2500);
        let r = drafted(parse_recipe(&raw, &prompt, None));
        assert_eq!(r.title, format!("{}... (AI draft)", "é".repeat(60)));
        assert_eq!(r.instructions[0].chars().count(), 2000);
    }

    #[test]
    fn sixty_char_prompt_is_not_marked_truncated() {
        let prompt = "a".repeat(60);
        let r = drafted(parse_recipe("nope", &prompt, None));
        assert_eq!(r.title, format!("{prompt} (AI draft)"));
    }
}
