pub mod arguments;
pub mod procedures;

pub use arguments::{Arguments, Command};
