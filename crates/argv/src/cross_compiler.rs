//! Cross-compiler rewrite heuristic (spec.md §4.4, optional, controlled
//! by `DISTCC_NO_REWRITE_CROSS`): best-effort normalization of argv[0]
//! so client and server agree on which real compiler they mean.

use std::path::Path;

/// Rewrites `argv[0]` (and, for clang, inserts `-target <triple>`).
/// `resolve_symlink` and `exists_on_path` are injected so callers
/// without a real filesystem/PATH (tests) can fake the environment.
#[must_use]
pub fn rewrite_cross_compiler(
    argv: &[String],
    resolve_symlink: impl Fn(&str) -> Option<String>,
    exists_on_path: impl Fn(&str) -> bool,
    native_triple: &str,
) -> Vec<String> {
    if argv.is_empty() {
        return Vec::new();
    }
    let argv0 = argv[0].clone();
    let basename = Path::new(&argv0)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&argv0)
        .to_string();

    let mut out = argv.to_vec();

    match basename.as_str() {
        "cc" | "c++" => {
            if let Some(real) = resolve_symlink(&argv0) {
                let real_basename = Path::new(&real)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(&real)
                    .to_string();
                if matches!(real_basename.as_str(), "gcc" | "g++" | "clang" | "clang++") {
                    out[0] = real_basename;
                }
            }
        }
        "gcc" | "g++" => {
            let triple_name = format!("{native_triple}-{basename}");
            if exists_on_path(&triple_name) {
                out[0] = triple_name;
            }
        }
        "clang" | "clang++" => {
            let already_targeted = out.iter().any(|a| a == "-target" || a.starts_with("-target="));
            if !already_targeted {
                out.insert(1, "-target".to_string());
                out.insert(2, native_triple.to_string());
            }
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_cc_symlink_to_gcc() {
        let out = rewrite_cross_compiler(
            &argv(&["cc", "-c", "hello.c"]),
            |_| Some("/usr/bin/gcc".to_string()),
            |_| false,
            "x86_64-linux-gnu",
        );
        assert_eq!(out[0], "gcc");
    }

    #[test]
    fn prepends_triple_for_gcc_when_present_on_path() {
        let out = rewrite_cross_compiler(
            &argv(&["gcc", "-c", "hello.c"]),
            |_| None,
            |name| name == "x86_64-linux-gnu-gcc",
            "x86_64-linux-gnu",
        );
        assert_eq!(out[0], "x86_64-linux-gnu-gcc");
    }

    #[test]
    fn appends_target_for_clang() {
        let out = rewrite_cross_compiler(
            &argv(&["clang", "-c", "hello.c"]),
            |_| None,
            |_| false,
            "x86_64-linux-gnu",
        );
        assert_eq!(out[1], "-target");
        assert_eq!(out[2], "x86_64-linux-gnu");
    }

    #[test]
    fn does_not_duplicate_target_for_clang() {
        let out = rewrite_cross_compiler(
            &argv(&["clang", "-target", "aarch64-linux-gnu", "-c", "hello.c"]),
            |_| None,
            |_| false,
            "x86_64-linux-gnu",
        );
        assert_eq!(out, argv(&["clang", "-target", "aarch64-linux-gnu", "-c", "hello.c"]));
    }
}
