/// Quadratic-extension ring group used by the guessing game.
pub mod loak;

pub use loak::{LoakElement, LoakGroup};
