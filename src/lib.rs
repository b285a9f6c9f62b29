pub mod config;
pub mod constants;
pub mod data_backend;
pub mod data_types;
pub mod errors;
pub mod gourmet_api;
pub mod http_session;
pub mod shared_main;
pub mod ventopay_api;

pub use config::SiteConfig;
pub use errors::{ClientError, Result};
pub use gourmet_api::GourmetApi;
pub use ventopay_api::VentopayApi;
