//! The argv analyzer (spec.md §4.4): classifies a compiler invocation
//! and extracts its input/output files.

use std::path::{Path, PathBuf};

use distcc_core::model::Disposition;

use crate::error::ArgvError;

const SOURCE_EXTS: &[&str] = &[
    "c", "cc", "cpp", "cxx", "cp", "c++", "C", "i", "ii", "m", "mm", "mi", "mii",
];
/// Gated on `allow_assembly`: `M`, `S`, `s` are only source extensions
/// when remote assembly is explicitly enabled.
const ASSEMBLY_SOURCE_EXTS: &[&str] = &["M", "S", "s"];

const PREPROCESSED_EXTS: &[&str] = &["i", "ii", "mi", "mii"];
const ASSEMBLY_PREPROCESSED_EXT: &str = "s";

const KNOWN_LANGS: &[&str] = &["c", "c++", "objective-c", "objective-c++", "go"];

/// `forced_local`'s reason text for `-E`, used to tell "we'd just be
/// running cpp" apart from every other forced-local reason (spec.md
/// §4.4 rule 1 wants `LocalCppOnly` here, not `LocalAll`).
const CPP_ONLY_REASON: &str = "cpp-only invocation (-E)";

#[derive(Debug, Clone)]
pub struct Analysis {
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    /// argv after `-Wp,` expansion (spec.md §4.4's `expand_preprocessor_options`).
    pub filtered_argv: Vec<String>,
    pub verdict: Disposition,
    /// Whether the input was already in preprocessed form (`.i`/`.ii`/...).
    pub already_preprocessed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub allow_assembly: bool,
}

pub fn classify(argv: &[String], opts: AnalyzeOptions) -> Result<Analysis, ArgvError> {
    if argv.is_empty() {
        return Err(ArgvError::EmptyArgv);
    }

    let argv = expand_preprocessor_options(argv);

    let mut input_file: Option<PathBuf> = None;
    let mut output_file: Option<PathBuf> = None;
    let mut seen_c = false;
    let mut seen_s = false;
    let mut forced_local: Option<&'static str> = None;

    let mut i = 1; // argv[0] is the compiler itself
    while i < argv.len() {
        let arg = argv[i].as_str();

        if arg == "-E" {
            forced_local.get_or_insert(CPP_ONLY_REASON);
        } else if matches!(arg, "-MD" | "-MMD" | "-MG" | "-MP") {
            // side effects only, argument kept verbatim
        } else if matches!(arg, "-MF" | "-MT" | "-MQ") {
            if i + 1 < argv.len() {
                i += 1;
            } else {
                return Err(ArgvError::MissingOptionArgument(arg.to_string()));
            }
        } else if starts_with_glued(arg, &["-MF", "-MT", "-MQ"]) {
            // glued form, single token, nothing to skip
        } else if arg.starts_with("-M") {
            forced_local.get_or_insert("-M... other than -MD/-MMD/-MG/-MP/-MF/-MT/-MQ implies -E");
        } else if arg == "-march=native" || arg == "-mtune=native" {
            forced_local.get_or_insert("native-targeted codegen flag");
        } else if arg.starts_with("-Wa,") && (arg.contains(",-a") || arg.contains("--MD")) {
            forced_local.get_or_insert("-Wa, assembler pass-through with -a/--MD");
        } else if arg.starts_with("-specs=") {
            forced_local.get_or_insert("-specs=");
        } else if arg == "-S" {
            seen_s = true;
        } else if arg.starts_with("-fprofile-")
            || arg == "-ftest-coverage"
            || arg == "--coverage"
            || arg == "-fauto-profile"
            || arg == "-frepo"
        {
            forced_local.get_or_insert("profiling/coverage/repo flag");
        } else if arg == "-x" {
            if i + 1 < argv.len() {
                let lang = argv[i + 1].as_str();
                if !KNOWN_LANGS.contains(&lang) {
                    forced_local.get_or_insert("-x with an unsupported language");
                }
                i += 1;
            } else {
                return Err(ArgvError::MissingOptionArgument(arg.to_string()));
            }
        } else if arg.starts_with("-dr") {
            forced_local.get_or_insert("-dr... RTL dump flag");
        } else if arg == "-c" {
            seen_c = true;
        } else if arg == "-o" {
            if i + 1 < argv.len() {
                output_file = Some(PathBuf::from(&argv[i + 1]));
                i += 1;
            } else {
                return Err(ArgvError::MissingOptionArgument(arg.to_string()));
            }
        } else if arg.starts_with("-o") && arg.len() > 2 && !is_other_dash_o_flag(arg) {
            output_file = Some(PathBuf::from(&arg[2..]));
        } else if !arg.starts_with('-') {
            if has_source_extension(arg, opts.allow_assembly) {
                if input_file.is_some() {
                    forced_local.get_or_insert("more than one input file");
                } else {
                    input_file = Some(PathBuf::from(arg));
                }
            } else if arg.ends_with(".o") {
                output_file = Some(PathBuf::from(arg));
            }
        }

        i += 1;
    }

    if let Some(reason) = forced_local {
        let verdict = if reason == CPP_ONLY_REASON {
            Disposition::LocalCppOnly
        } else {
            Disposition::LocalAll
        };
        tracing::trace!(reason, ?verdict, "argv analyzer: forcing local disposition");
        return Ok(Analysis {
            input_file,
            output_file,
            filtered_argv: argv,
            verdict,
            already_preprocessed: false,
        });
    }

    if !seen_c && !seen_s {
        return local_all(argv, input_file, output_file);
    }
    let Some(input) = input_file.clone() else {
        return local_all(argv, input_file, output_file);
    };

    let basename = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if basename.starts_with("conftest.") || basename.starts_with("tmp.conftest.") {
        return local_all(argv, input_file, output_file);
    }

    if let Some(out) = &output_file {
        if out.as_os_str() == "-" {
            return local_all(argv, input_file, output_file);
        }
    }

    let ext = extension(&input);
    let already_preprocessed = is_preprocessed_extension(&ext, opts.allow_assembly);

    let output_file = output_file.or_else(|| Some(default_output_path(&input)));

    Ok(Analysis {
        input_file: Some(input),
        output_file,
        filtered_argv: argv,
        verdict: Disposition::Distribute,
        already_preprocessed,
    })
}

fn local_all(
    argv: Vec<String>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
) -> Result<Analysis, ArgvError> {
    Ok(Analysis {
        input_file,
        output_file,
        filtered_argv: argv,
        verdict: Disposition::LocalAll,
        already_preprocessed: false,
    })
}

/// Flags that start with `-o` but are not the glued form of `-o FILE`.
fn is_other_dash_o_flag(arg: &str) -> bool {
    const KNOWN: &[&str] = &[
        "-omit-frame-pointer",
        "-object",
        "-operator",
        "-optimize",
    ];
    KNOWN.iter().any(|k| arg.starts_with(k))
}

fn starts_with_glued(arg: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| arg.starts_with(p) && arg.len() > p.len())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

fn has_source_extension(arg: &str, allow_assembly: bool) -> bool {
    let ext = extension(Path::new(arg));
    SOURCE_EXTS.contains(&ext.as_str())
        || (allow_assembly && ASSEMBLY_SOURCE_EXTS.contains(&ext.as_str()))
}

fn is_preprocessed_extension(ext: &str, allow_assembly: bool) -> bool {
    PREPROCESSED_EXTS.contains(&ext)
        || (allow_assembly && ext == ASSEMBLY_PREPROCESSED_EXT)
}

/// The preprocessed-form suffix for a given source extension
/// (`.c`→`.i`, `.cc/.cpp/.cxx/.cp/.c++/.C/.ii`→`.ii`, `.m/.mi`→`.mi`,
/// `.mm/.mii/.M`→`.mii`, `.s/.S`→`.s`), used by the preprocessor driver
/// (§4.5) to name its temp file.
#[must_use]
pub fn preprocessed_suffix_for(ext: &str) -> &'static str {
    match ext {
        "c" => ".i",
        "cc" | "cpp" | "cxx" | "cp" | "c++" | "C" | "ii" => ".ii",
        "m" | "mi" => ".mi",
        "mm" | "mii" | "M" => ".mii",
        "s" | "S" => ".s",
        _ => ".i",
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("o")
}

/// Expands `-Wp,a,b,c` into its constituent options, with the
/// `-Wp,-MD,<file>` special case rewritten to `-MD -MF <file>`.
pub fn expand_preprocessor_options(argv: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    for arg in argv {
        if let Some(rest) = arg.strip_prefix("-Wp,") {
            let parts: Vec<&str> = rest.split(',').collect();
            if parts.as_slice() == ["-MD", "-MF"] {
                // malformed, fall through to generic expansion below
            }
            if parts.len() == 2 && parts[0] == "-MD" {
                out.push("-MD".to_string());
                out.push("-MF".to_string());
                out.push(parts[1].to_string());
                continue;
            }
            for part in parts {
                out.push(part.to_string());
            }
        } else {
            out.push(arg.clone());
        }
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
    fn distributes_simple_compile() {
        let a = classify(&argv(&["cc", "-c", "hello.c", "-o", "hello.o"]), AnalyzeOptions::default())
            .unwrap();
        assert_eq!(a.verdict, Disposition::Distribute);
        assert_eq!(a.input_file.unwrap(), PathBuf::from("hello.c"));
        assert_eq!(a.output_file.unwrap(), PathBuf::from("hello.o"));
    }

    #[test]
    fn synthesizes_output_when_missing() {
        let a = classify(&argv(&["cc", "-c", "hello.c"]), AnalyzeOptions::default()).unwrap();
        assert_eq!(a.output_file.unwrap(), PathBuf::from("hello.o"));
    }

    #[test]
    fn dash_e_is_local_cpp_only() {
        let a = classify(&argv(&["cc", "-E", "hello.c"]), AnalyzeOptions::default()).unwrap();
        assert_eq!(a.verdict, Disposition::LocalCppOnly);
    }

    #[test]
    fn no_c_or_s_is_local_all() {
        let a = classify(&argv(&["cc", "hello.c", "-o", "hello"]), AnalyzeOptions::default()).unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn march_native_is_local_all() {
        let a = classify(
            &argv(&["cc", "-c", "-march=native", "hello.c"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn conftest_input_is_local_all() {
        let a = classify(
            &argv(&["cc", "-c", "conftest.c"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn two_inputs_is_local_all() {
        let a = classify(
            &argv(&["cc", "-c", "a.c", "b.c"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn output_dash_is_local_all() {
        let a = classify(
            &argv(&["cc", "-c", "hello.c", "-o", "-"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn mf_separate_argument_is_kept() {
        let a = classify(
            &argv(&["cc", "-c", "hello.c", "-MF", "hello.d", "-MD"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::Distribute);
    }

    #[test]
    fn unknown_x_language_is_local_all() {
        let a = classify(
            &argv(&["cc", "-c", "-x", "fortran", "hello.f"]),
            AnalyzeOptions::default(),
        )
        .unwrap();
        assert_eq!(a.verdict, Disposition::LocalAll);
    }

    #[test]
    fn expands_wp_md_special_case() {
        let expanded = expand_preprocessor_options(&argv(&["-Wp,-MD,.deps/x.pp"]));
        assert_eq!(expanded, vec!["-MD", "-MF", ".deps/x.pp"]);
    }

    #[test]
    fn already_preprocessed_input_is_detected() {
        let a = classify(&argv(&["cc", "-c", "hello.i"]), AnalyzeOptions::default()).unwrap();
        assert!(a.already_preprocessed);
    }
}
