//! Recipe prompt for a named dish, answered as JSON.

/// Prompt name for logging.
pub const RECIPE_PROMPT_NAME: &str = "recipe";

pub const RECIPE_SYSTEM_PROMPT: &str =
    "You are a recipe writer. If no such dish exists, invent a plausible fictional recipe.";

/// Render the recipe prompt for `dish_name`.
pub fn render_recipe_prompt(dish_name: &str) -> String {
    format!(
        r#"Write the recipe for the dish "{dish_name}".

Respond with JSON only, no other text:
{{"genre": "cuisine genre", "main_food": "main ingredient", "theme": "one-word theme", "ingredients": ["ingredient with amount", ...], "steps": ["step", ...]}}

List the steps in the order they are performed. Do not number them."#,
        dish_name = dish_name
    )
}
