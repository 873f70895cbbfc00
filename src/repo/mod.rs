//! Version-control actions for the data repository.

pub mod git;

pub use git::{DataRepository, GitError, GitOptions};
