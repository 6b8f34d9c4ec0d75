pub mod admin;
pub mod audit;
pub mod authenticate;
pub mod binder;
pub mod id_token;
pub mod initiate;
pub mod password;
pub mod policy;
pub mod reset;
pub mod secret;
pub mod session;
