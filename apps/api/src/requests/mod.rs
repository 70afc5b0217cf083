pub mod handlers;
pub mod workflow;
