//! Judge prompt for picking the best candidate image.

/// Prompt name for logging.
pub const SELECT_IMAGE_PROMPT_NAME: &str = "select_image";

pub const SELECT_IMAGE_PROMPT: &str = r#"You are tasked with selecting the best food image from the provided options.
Please analyze each image and select the one that best meets these criteria:
1. Visual appeal and presentation quality
2. Clarity and sharpness of the image
3. Proper lighting and color balance
4. Appetizing appearance that would make viewers want to try the food
5. Overall composition and aesthetic quality

The images are numbered from 0 in the order given.
Respond with JSON only, no other text: {"index": 0}"#;
