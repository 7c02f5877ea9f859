pub mod constants;
pub mod recipe;

pub use recipe::{
    CompletionType, Glossary, GlossaryEntry, Recipe, RecipeItem, Stage, StageType, Step, Track,
};
