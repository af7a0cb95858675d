pub mod archive;
pub mod chain;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod context;
pub mod crypto;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod notes;
pub mod pomodoro;
pub mod profile;
pub mod store;
pub mod tasks;
pub mod templates;
pub mod utils;
pub mod vault;
pub mod workspace;

pub use chain::{ChainConnector, LocalLedger};
pub use config::Config;
pub use context::Context;
pub use database::Database;
pub use error::ArcError;
pub use models::{ColumnId, HistoryItem, Note, Task, Workspace};
pub use notes::NotesManager;
pub use profile::ProfileManager;
pub use store::{Store, StoreEvent};
pub use tasks::TaskManager;
pub use utils::Profile;
