// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! Core types and traits for Rubbl.
//!
//! This crate provides the pieces shared by the format crates: a basic error
//! type, byte-order-aware binary streams, helpers for array shapes, and a
//! small framework for notifying users about what tools are doing.

pub mod errors;
pub mod io;
pub mod notify;
pub mod num;

pub use errors::{Error, Result};
pub use ndarray::{Array, Array1, Array2, Array3};
