pub mod commands;
pub mod completions;
pub mod hydrate;
pub mod models;
pub mod session;
pub mod utils;

/// ASCII art logo for sous CLI
pub const LOGO: &str = "\
   ┌─┐┌─┐┬ ┬┌─┐
   └─┐│ ││ │└─┐
   └─┘└─┘└─┘└─┘";
