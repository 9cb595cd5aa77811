pub mod clarify;
pub mod inspect;
pub mod resolve;
