#![warn(clippy::all)]
//! Shared parts of the sweep command line tools.

// Bird's-eye PNG rendering of the clouds a pipeline presents.
pub mod plot_sink;

// Loading sweeps from files or generating them, for the binaries.
pub mod sources;
