//! Dish photo prompt.

/// Prompt name for logging.
pub const DISH_IMAGE_PROMPT_NAME: &str = "dish_image";

/// Render the image prompt from the dish name and its ingredients.
pub fn render_dish_image_prompt(dish_name: &str, ingredients: &[String]) -> String {
    format!(
        r#"A photorealistic, appetizing photo of the dish "{dish_name}", plated and shot from a slight angle in soft natural light.
Ingredients: {ingredients}
No text, no labels, no people."#,
        dish_name = dish_name,
        ingredients = ingredients.join(", ")
    )
}
