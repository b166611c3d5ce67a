pub mod auth;
pub mod entries;
pub mod flash;
pub mod landing;
pub mod nakshatras;
pub mod router;
pub mod state;
pub mod templates;
pub mod uploads;

pub use state::AppState;
pub use templates::escape_html;
