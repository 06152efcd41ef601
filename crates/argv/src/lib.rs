//! Compiler-invocation analysis: classifying argv into distributable vs.
//! local-only work, deriving dependency-file (dotd) expectations,
//! stripping client-local flags, driving the local preprocessor, and the
//! optional cross-compiler argv[0] rewrite. See spec.md §4.4–§4.5.

pub mod analyzer;
pub mod cross_compiler;
pub mod dotd_info;
pub mod error;
pub mod preprocess;
pub mod strip;

pub use analyzer::{classify, expand_preprocessor_options, preprocessed_suffix_for, AnalyzeOptions, Analysis};
pub use cross_compiler::rewrite_cross_compiler;
pub use dotd_info::{get_dotd_info, DotdInfo};
pub use error::ArgvError;
pub use preprocess::{cpp_argv, preprocessed_temp_path, spawn_cpp};
pub use strip::strip_local_args;
