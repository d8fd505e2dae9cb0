pub mod attribution;
pub mod orchestrate;
pub mod release;
pub mod resolve;
pub mod summarize;
