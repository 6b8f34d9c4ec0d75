pub mod admin;
pub mod extract;
pub mod federation;
pub mod local;
pub mod reset;
pub mod views;
