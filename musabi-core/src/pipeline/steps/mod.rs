//! Pipeline step implementations, one per stage.

mod edit_img;
mod gen_img;
mod gen_text;
mod pub_img;
mod select_img;

pub use edit_img::EditImgStep;
pub use gen_img::GenImgStep;
pub use gen_text::GenTextStep;
pub use pub_img::PubImgStep;
pub use select_img::{validate_selection, SelectImgStep};
