pub mod formatting;
pub mod member;
