pub mod cache;
pub mod publish;
pub mod validate;
