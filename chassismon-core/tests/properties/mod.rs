//! Property test modules

mod parser_tests;
mod schema_tests;
