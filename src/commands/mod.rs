//! Handlers generated from catalog operations

pub mod binder;
pub mod handler;
