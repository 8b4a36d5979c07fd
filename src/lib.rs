pub mod compiler;
pub mod error;
pub mod mutants;
pub mod operators;
pub mod parser;
pub mod report;
pub mod runner;
pub mod schemata;
pub mod tree_print;
pub mod workspace;

pub use error::{Error, Result};

/// Environment variable the woven test binaries read to select the active
/// mutant. `0` or absence means baseline behavior.
pub const MUTANT_ID_ENV: &str = "GORGON_MUTANT_ID";

pub fn is_go_source(path: &std::path::Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("go")
}

pub fn is_go_test_file(path: &std::path::Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_test.go"))
}
