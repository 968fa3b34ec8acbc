mod admission_tests;
mod common;
mod shutdown_tests;
