//! Derives whether a dotd (dependency file) is expected and where it
//! will land, matching `examples/original_source/src/dotd.c`'s
//! `dcc_get_dotd_info` exactly: scans argv for `-MT`/`-MQ` (records the
//! rewritten dotd target), any `-M...` sets `needs_dotd`, `-MF`
//! (separate or glued) gives the explicit filename, `DEPENDENCIES_OUTPUT`
//! is consulted when no `-MF` is present, and otherwise the name is
//! derived from `-o`'s basename (or the input's) with a `.d` suffix.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct DotdInfo {
    pub needs_dotd: bool,
    pub dotd_filename: Option<PathBuf>,
    /// Set by `-MT`/`-MQ`: the target name the dependency rule should
    /// use instead of the real object path.
    pub dotd_target: Option<String>,
}

pub fn get_dotd_info(
    argv: &[String],
    dependencies_output_env: Option<&str>,
    output_file: Option<&Path>,
    input_file: Option<&Path>,
) -> DotdInfo {
    let mut needs_dotd = false;
    let mut dotd_filename = None;
    let mut dotd_target = None;
    let mut has_dash_o = false;

    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        if arg == "-MT" || arg == "-MQ" {
            if let Some(next) = argv.get(i + 1) {
                dotd_target = Some(next.clone());
                i += 1;
            }
        } else if let Some(rest) = arg.strip_prefix("-MT").or_else(|| arg.strip_prefix("-MQ")) {
            if !rest.is_empty() {
                dotd_target = Some(rest.to_string());
            }
        } else if arg == "-MF" {
            if let Some(next) = argv.get(i + 1) {
                dotd_filename = Some(PathBuf::from(next));
                i += 1;
            }
        } else if let Some(rest) = arg.strip_prefix("-MF") {
            if !rest.is_empty() {
                dotd_filename = Some(PathBuf::from(rest));
            }
        } else if arg == "-o" {
            has_dash_o = true;
        } else if arg.starts_with("-M") {
            needs_dotd = true;
        }
        i += 1;
    }
    let _ = has_dash_o;

    if needs_dotd && dotd_filename.is_none() {
        if let Some(env_val) = dependencies_output_env {
            // "filename target" or just "filename".
            let (file, target) = match env_val.split_once(' ') {
                Some((f, t)) => (f, Some(t.to_string())),
                None => (env_val, None),
            };
            dotd_filename = Some(PathBuf::from(file));
            if dotd_target.is_none() {
                dotd_target = target;
            }
        } else if let Some(out) = output_file {
            dotd_filename = Some(out.with_extension("d"));
        } else if let Some(inp) = input_file {
            dotd_filename = Some(inp.with_extension("d"));
        }
    }

    DotdInfo {
        needs_dotd,
        dotd_filename,
        dotd_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_mf_wins() {
        let info = get_dotd_info(
            &argv(&["-MD", "-MF", "explicit.d"]),
            Some("env.d"),
            Some(Path::new("hello.o")),
            Some(Path::new("hello.c")),
        );
        assert_eq!(info.dotd_filename.unwrap(), PathBuf::from("explicit.d"));
    }

    #[test]
    fn env_var_used_when_no_mf() {
        let info = get_dotd_info(
            &argv(&["-MMD"]),
            Some("env.d target-name"),
            Some(Path::new("hello.o")),
            Some(Path::new("hello.c")),
        );
        assert_eq!(info.dotd_filename.unwrap(), PathBuf::from("env.d"));
        assert_eq!(info.dotd_target.unwrap(), "target-name");
    }

    #[test]
    fn derives_from_output_file_when_no_mf_or_env() {
        let info = get_dotd_info(
            &argv(&["-MMD"]),
            None,
            Some(Path::new("hello.o")),
            Some(Path::new("hello.c")),
        );
        assert_eq!(info.dotd_filename.unwrap(), PathBuf::from("hello.d"));
    }

    #[test]
    fn derives_from_input_when_no_output() {
        let info = get_dotd_info(&argv(&["-MMD"]), None, None, Some(Path::new("hello.c")));
        assert_eq!(info.dotd_filename.unwrap(), PathBuf::from("hello.d"));
    }

    #[test]
    fn no_dotd_needed_without_m_flags() {
        let info = get_dotd_info(&argv(&["-c"]), None, Some(Path::new("hello.o")), None);
        assert!(!info.needs_dotd);
        assert!(info.dotd_filename.is_none());
    }

    #[test]
    fn mt_records_target() {
        let info = get_dotd_info(
            &argv(&["-MMD", "-MT", "custom_target"]),
            None,
            Some(Path::new("hello.o")),
            None,
        );
        assert_eq!(info.dotd_target.unwrap(), "custom_target");
    }
}
