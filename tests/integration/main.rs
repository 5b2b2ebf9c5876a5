//! Integration test modules.

mod failure_test;
mod ordering_test;
mod photo_index_test;
