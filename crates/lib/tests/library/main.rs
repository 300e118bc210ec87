//! Library integration tests: whole builds of throwaway projects through the
//! public API.

mod build_tests;
mod common;
mod multi_package_tests;
