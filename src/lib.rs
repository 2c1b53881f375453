// Library exports for healthgate

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logs;
pub mod preflight;
pub mod process;
pub mod signals;
pub mod supervisor;

#[doc(hidden)]
pub mod testing;
