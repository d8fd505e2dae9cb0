use clap::{Args, Subcommand};

use crate::cache::{open_store, store_path};
use crate::config::AppConfig;
use crate::domain::repository::Repository;
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommand {
    /// Forget the stored summary of one change so the next run regenerates it.
    Delete {
        owner: String,
        repo: String,
        /// Pull request number (the backport origin's, for backports) or commit sha.
        key: String,
    },
}

pub fn run(command: CacheCommand, config: &AppConfig) -> AppResult<()> {
    match command {
        CacheCommand::Delete { owner, repo, key } => {
            let path = store_path(config.cache.backend, &config.cache.name)?;
            let store = open_store(config.cache.backend, &path)?;
            let repository = Repository::new(owner, repo);
            store.delete(&repository, &key)?;
            println!("Deleted summary {key} of {repository} from {}", path.display());
            Ok(())
        }
    }
}
