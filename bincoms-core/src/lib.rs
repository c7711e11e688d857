//! Core types and utilities for the bincoms protocol
//!
//! This crate provides the error taxonomy, the device status table, the
//! struct-style field layouts used to pack arguments and unpack results, and
//! the dynamically typed [`Value`] exchanged with firmware functions.

pub mod error;
pub mod layout;
pub mod status;
pub mod value;

pub use error::{BincomsError, BincomsResult};
pub use layout::{ArgumentLayout, FieldCode, ReturnLayout};
pub use status::StatusCode;
pub use value::Value;
