pub mod support;

mod store_tests;
mod sync_tests;
