//! Test fixtures: cheap mining config and throwaway accounts

pub mod test_utils;

pub use test_utils::*;
