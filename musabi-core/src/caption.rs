//! Social caption assembly.

use crate::types::DishRecord;

/// Disclaimer placed right after the dish name.
pub const DISCLAIMER: &str = "* This recipe and photo were created automatically by AI.\n\
The recipe has not been checked, so the dish may not turn out edible.";

/// Hashtags present on every post.
pub const FIXED_HASHTAGS: &[&str] = &["#recipe", "#cooking", "#food", "#AI", "#AIrecipe"];

/// Build the post caption: name, disclaimer, bulleted ingredients, numbered steps, hashtags.
pub fn build_caption(dish: &DishRecord) -> String {
    let ingredients = dish
        .ingredients
        .iter()
        .map(|i| format!("- {}", i.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let steps = dish
        .steps
        .iter()
        .enumerate()
        .map(|(n, s)| format!("{}. {}", n + 1, s.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{name}\n\n{disclaimer}\n\nIngredients\n{ingredients}\n\nSteps\n{steps}\n\n{hashtags}",
        name = dish.dish_name.trim(),
        disclaimer = DISCLAIMER,
        ingredients = ingredients,
        steps = steps,
        hashtags = hashtag_line(dish),
    )
}

/// Fixed hashtags followed by genre, main ingredient and theme when present.
pub fn hashtag_line(dish: &DishRecord) -> String {
    let dynamic = [&dish.genres, &dish.main_food, &dish.theme]
        .into_iter()
        .flatten()
        .filter_map(|value| to_hashtag(value));

    FIXED_HASHTAGS
        .iter()
        .map(|t| t.to_string())
        .chain(dynamic)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hashtags cannot contain whitespace or punctuation other than underscores.
fn to_hashtag(value: &str) -> Option<String> {
    let tag: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if tag.is_empty() {
        None
    } else {
        Some(format!("#{}", tag))
    }
}
