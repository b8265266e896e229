pub mod config;
pub mod matching;
pub mod session;
pub mod verifier;
