pub mod code_host;
pub mod language_model;

pub use code_host::{CodeHostService, Release};
pub use language_model::LanguageModelService;
