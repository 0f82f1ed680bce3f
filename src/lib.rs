#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]

pub mod codec;
pub mod config;
pub mod dirs;
pub mod error;
pub mod json;
pub mod kdf;
pub mod locked;
mod prelude;
pub mod record;
pub mod refresh;
pub mod store;
pub mod totp;
pub mod uri;
pub mod vault;
