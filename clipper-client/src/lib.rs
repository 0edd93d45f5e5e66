mod analytics;
pub use analytics::{AnalyticsSink, GatedAnalytics};

mod cache;
pub use cache::{Entry, Fetcher, KeyPart, QueryCache, QueryData, QueryKey};

mod client;
pub use client::Client;

pub mod clips;
pub mod comments;

mod config;
pub use config::ClientConfig;

pub mod consent;
pub use consent::{ConsentChoice, ConsentGate, ConsentPreferences, ConsentRecord, ConsentStorage};

pub mod counter;
pub mod discovery;

mod error;
pub use error::Error;

pub mod list;

mod optimistic;
pub use optimistic::{run_optimistic, Snapshot};

pub mod queue;

pub mod tree;
pub use tree::{patch_forest, patch_tree};

mod vote;
pub use vote::{transition, Votable};

mod fuzz;

pub mod api {
    pub use clipper_api::*;
}
