//! Collection test suite


mod index_tests;
mod lifecycle_tests;
