pub mod geo;
pub mod user;
