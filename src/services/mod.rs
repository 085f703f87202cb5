pub mod account;
pub mod document;
pub mod extract;
pub mod media;
pub mod session;
