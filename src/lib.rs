//! Core library for the aideon-roomsync command line application.
//!
//! The library reconciles a heating and a ventilation room schedule into one
//! merged dataset. IO adapters live under [`aideon::roomsync::io`], data
//! representations inside [`aideon::roomsync::model`], the per-stage logic in
//! [`aideon::roomsync::detect`], [`aideon::roomsync::normalize`],
//! [`aideon::roomsync::merge`], [`aideon::roomsync::optimize`] and
//! [`aideon::roomsync::metrics`], and the orchestration under
//! [`aideon::roomsync::pipeline`].

pub mod aideon;

pub use aideon::roomsync::{
    Result, ToolError, config, detect, error, io, merge, metrics, model, normalize, optimize,
    pipeline, store, vocabulary,
};
