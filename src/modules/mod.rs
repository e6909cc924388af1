pub mod account;
pub mod admin;
pub mod auth;
pub mod ownership;
pub mod panel;
pub mod servers;
pub mod system;
