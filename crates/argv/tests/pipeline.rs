//! End-to-end argv pipeline: classify → strip local args → dotd-info,
//! exercising the modules together rather than in isolation.

use std::path::Path;

use distcc_argv::{classify, get_dotd_info, strip_local_args, AnalyzeOptions};
use distcc_core::model::Disposition;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn distributable_compile_survives_local_arg_stripping() {
    let cmd = argv(&["gcc", "-Wall", "-march=native", "-c", "hello.c", "-o", "hello.o"]);

    let analysis = classify(&cmd, AnalyzeOptions::default()).unwrap();
    assert_eq!(analysis.verdict, Disposition::Distribute);
    assert_eq!(analysis.input_file.as_deref().unwrap(), Path::new("hello.c"));
    assert_eq!(analysis.output_file.as_deref().unwrap(), Path::new("hello.o"));

    let stripped = strip_local_args(&cmd);
    assert!(!stripped.contains(&"-march=native".to_string()));
    assert!(stripped.contains(&"-Wall".to_string()));
    assert!(stripped.contains(&"hello.c".to_string()));
}

#[test]
fn conftest_style_source_is_forced_local() {
    let cmd = argv(&["cc", "-c", "conftest.c", "-o", "conftest.o"]);
    let analysis = classify(&cmd, AnalyzeOptions::default()).unwrap();
    assert_eq!(analysis.verdict, Disposition::LocalAll);
}

#[test]
fn dotd_target_is_derived_from_output_when_no_explicit_mf() {
    let cmd = argv(&["gcc", "-MMD", "-c", "widget.c", "-o", "widget.o"]);
    let analysis = classify(&cmd, AnalyzeOptions::default()).unwrap();

    let info = get_dotd_info(&cmd, None, analysis.output_file.as_deref(), analysis.input_file.as_deref());
    assert!(info.needs_dotd);
    assert_eq!(info.dotd_filename.unwrap(), Path::new("widget.d"));
}

#[test]
fn dependencies_output_env_overrides_derived_name() {
    let cmd = argv(&["gcc", "-MMD", "-c", "widget.c", "-o", "widget.o"]);
    let info = get_dotd_info(&cmd, Some("custom.d my-target"), Some(Path::new("widget.o")), None);
    assert!(info.needs_dotd);
    assert_eq!(info.dotd_filename.unwrap(), Path::new("custom.d"));
    assert_eq!(info.dotd_target.unwrap(), "my-target");
}

#[test]
fn explicit_mt_target_survives_alongside_derived_filename() {
    let cmd = argv(&["gcc", "-MMD", "-MT", "renamed.o", "-c", "widget.c", "-o", "widget.o"]);
    let info = get_dotd_info(&cmd, None, Some(Path::new("widget.o")), None);
    assert_eq!(info.dotd_target.unwrap(), "renamed.o");
    assert_eq!(info.dotd_filename.unwrap(), Path::new("widget.d"));
}
