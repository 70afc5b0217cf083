pub mod emit;
pub mod handlers;
