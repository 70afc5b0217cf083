pub mod handlers;
pub mod reconcile;
