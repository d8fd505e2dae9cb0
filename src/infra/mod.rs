pub mod github;
pub mod openai;
