pub mod allocation;
pub mod notification;
pub mod project;
pub mod resource_request;
pub mod skill;
pub mod user;
