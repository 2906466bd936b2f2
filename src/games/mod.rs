pub mod catalog;
pub mod types;

pub use catalog::GameCatalog;
pub use types::{Game, GameKnobs, Outcome};
