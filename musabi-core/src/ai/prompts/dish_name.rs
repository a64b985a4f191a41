//! Dish name prompt. The model answers with the name wrapped in 「」.

/// Prompt name for logging.
pub const DISH_NAME_PROMPT_NAME: &str = "dish_name";

pub const DISH_NAME_SYSTEM_PROMPT: &str =
    "You are a world-class chef who knows every cuisine and constantly invents original dishes.";

/// Render the dish name prompt.
pub fn render_dish_name_prompt() -> String {
    r#"Propose one original, stylish dish name.
The dish name must contain the name of at least one ingredient.
Do not include the names of animals or other living creatures.
Reply with the dish name only, wrapped in 「」, for example: 「Yuzu Pepper Carbonara」"#
        .to_string()
}
