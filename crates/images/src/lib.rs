pub mod thumbnail;
pub mod vector;

pub use thumbnail::{PLACEHOLDER, fetch_thumbnail, rewrite_icon_url};
pub use vector::{FsTemplates, Rendered, Renderer, TemplateId, TemplateStore, Theme};
