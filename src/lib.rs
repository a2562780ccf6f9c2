pub mod config;
pub mod context;
pub mod display;
pub mod error;
pub mod models;
pub mod parser;
pub mod profile;
pub mod requester;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;
pub mod transport;

pub use crate::config::Config;
pub use crate::error::{MosesError, Result};
pub use crate::models::{DrinkRecommendation, MosesContext, ParsedRecommendation};
pub use crate::service::MosesService;
