pub mod error;
pub mod logger;
pub mod netinfo;
pub mod resolver;
pub mod scan;
pub mod services;
