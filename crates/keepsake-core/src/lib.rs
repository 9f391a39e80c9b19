//! Core types and orchestration logic for Keepsake biographical interviews.
//!
//! This crate has no database or CLI dependencies. It owns
//! the relationship model, theme tracking, mode selection and the per-turn
//! planner; persistence is reached only through [`archive::SessionArchive`]
//! and text generation only through [`interview::Generator`].

pub mod archive;
pub mod config;
pub mod directive;
pub mod error;
pub mod features;
pub mod interview;
pub mod mode;
pub mod person;
pub mod planner;
pub mod probe;
pub mod relationship;
pub mod session;
pub mod theme;

pub use error::{Error, Result};
