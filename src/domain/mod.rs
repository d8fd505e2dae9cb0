pub mod change;
pub mod commit;
pub mod conventional;
pub mod issue;
pub mod line;
pub mod notes;
pub mod pull_request;
pub mod repository;
