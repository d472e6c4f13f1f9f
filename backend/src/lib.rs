pub mod config;
pub mod controllers;
pub mod entities;
pub use entities::*;
pub mod gateway;
pub mod knowledge;
pub mod service;
pub use service::*;
pub mod session;
pub mod utils;
pub use utils::*;

use std::collections::BTreeMap;

use config::{ConfigSummary, InitArgs, ModelId};
use ic_cdk::api::management_canister::http_request::{HttpResponse, TransformArgs};
use service::errors::AppError;
use session::SessionOverview;

// Export the interface for the smart contract.
ic_cdk::export_candid!();
