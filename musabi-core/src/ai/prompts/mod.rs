//! Prompt templates.

pub mod dish_image;
pub mod dish_name;
pub mod recipe;
pub mod select_image;

pub use dish_image::render_dish_image_prompt;
pub use dish_name::{render_dish_name_prompt, DISH_NAME_SYSTEM_PROMPT};
pub use recipe::{render_recipe_prompt, RECIPE_SYSTEM_PROMPT};
pub use select_image::SELECT_IMAGE_PROMPT;
