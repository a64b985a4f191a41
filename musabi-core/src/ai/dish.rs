//! Dish invention: a name first, then a recipe for that name.

use regex::Regex;
use serde::Deserialize;

use crate::ai::prompts::dish_name::{
    render_dish_name_prompt, DISH_NAME_PROMPT_NAME, DISH_NAME_SYSTEM_PROMPT,
};
use crate::ai::prompts::recipe::{render_recipe_prompt, RECIPE_PROMPT_NAME, RECIPE_SYSTEM_PROMPT};
use crate::ai::{ChatMessage, ChatRequest, GenerativeClient};
use crate::error::PipelineError;
use crate::types::DishRecord;

/// Response format from the recipe prompt.
#[derive(Debug, Deserialize)]
struct RecipeResponse {
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    main_food: Option<String>,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    steps: Vec<String>,
}

/// First non-empty text between `open` and `close`, trimmed.
pub fn extract_quoted_text(text: &str, open: &str, close: &str) -> Option<String> {
    let pattern = format!("{}(.*?){}", regex::escape(open), regex::escape(close));
    let re = Regex::new(&pattern).ok()?;
    let found = re
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|s| !s.is_empty());
    found
}

/// Ask for a dish name. A reply without a 「」-quoted name is a hard failure.
pub async fn generate_dish_name(client: &dyn GenerativeClient) -> Result<String, PipelineError> {
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(DISH_NAME_SYSTEM_PROMPT),
            ChatMessage::user(render_dish_name_prompt()),
        ],
        temperature: Some(0.7),
        ..Default::default()
    };

    let response = client.complete(DISH_NAME_PROMPT_NAME, request).await?;

    extract_quoted_text(&response.content, "「", "」").ok_or_else(|| {
        PipelineError::validation(format!(
            "Failed to extract dish name from response: {}",
            response.content.chars().take(100).collect::<String>()
        ))
    })
}

/// Ask for the recipe of `dish_name`.
pub async fn generate_recipe(
    client: &dyn GenerativeClient,
    dish_name: &str,
) -> Result<DishRecord, PipelineError> {
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(RECIPE_SYSTEM_PROMPT),
            ChatMessage::user(render_recipe_prompt(dish_name)),
        ],
        json_response: true,
        temperature: Some(0.7),
        ..Default::default()
    };

    let response = client.complete(RECIPE_PROMPT_NAME, request).await?;

    let recipe: RecipeResponse = serde_json::from_str(&response.content).map_err(|e| {
        PipelineError::validation(format!("Failed to parse recipe response: {}", e))
    })?;

    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let dish = DishRecord {
        dish_name: dish_name.to_string(),
        ingredients: recipe.ingredients.into_iter().map(|s| s.trim().to_string()).collect(),
        steps: recipe.steps.into_iter().map(|s| s.trim().to_string()).collect(),
        genres: non_blank(recipe.genre),
        main_food: non_blank(recipe.main_food),
        theme: non_blank(recipe.theme),
    };
    dish.validate()?;
    Ok(dish)
}

/// Invent a dish: name, then recipe.
pub async fn generate_dish(client: &dyn GenerativeClient) -> Result<DishRecord, PipelineError> {
    let dish_name = generate_dish_name(client).await?;
    tracing::info!(dish_name = %dish_name, "Generated dish name");

    let dish = generate_recipe(client, &dish_name).await?;
    tracing::info!(
        ingredients = dish.ingredients.len(),
        steps = dish.steps.len(),
        "Generated recipe"
    );
    Ok(dish)
}
