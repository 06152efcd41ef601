//! Strips client-local-only flags before sending argv across the wire,
//! matching `examples/original_source/src/strip.c`'s `dcc_strip_local_args`.
//! These options either only affect local-only phases (`-D`/`-I`/`-U`/
//! `-L`/`-l`/include-path flags) or only affect cpp (`-MD`/`-MMD`/`-MG`/
//! `-MP`/`-undef`/`-nostdinc`/`-nostdinc++`) and so carry no meaning once
//! the server already has the (possibly already-preprocessed) source.

const WITH_SEPARATE_ARG: &[&str] = &[
    "-D", "-I", "-U", "-L", "-l", "-MF", "-MT", "-MQ", "-include", "-imacros", "-iprefix",
    "-iwithprefix", "-isystem", "-iwithprefixbefore", "-idirafter", "-Xpreprocessor",
];

const GLUED_PREFIXES: &[&str] = &[
    "-Wp,", "-Wl,", "-D", "-U", "-I", "-l", "-L", "-MF", "-MT", "-MQ", "-isystem", "-stdlib",
];

const CPP_ONLY_FLAGS: &[&str] = &[
    "-undef", "-nostdinc", "-nostdinc++", "-MD", "-MMD", "-MG", "-MP",
];

/// Returns a new argv with local-only options (and their operands)
/// removed. The result aliases none of the input; callers send this
/// instead of the original argv.
#[must_use]
pub fn strip_local_args(argv: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        if WITH_SEPARATE_ARG.contains(&arg) {
            if i + 1 < argv.len() {
                i += 1;
            }
        } else if GLUED_PREFIXES.iter().any(|p| arg.starts_with(p)) {
            // glued form, e.g. "-DNDEBUG" or "-Wp,-MD,.deps/x.pp" — drop whole token
        } else if CPP_ONLY_FLAGS.contains(&arg) {
            // cpp-only, drop
        } else {
            out.push(arg.to_string());
        }
        i += 1;
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
    fn strips_define_and_include_flags() {
        let out = strip_local_args(&argv(&[
            "cc1", "-DNDEBUG", "-I", "/usr/include", "-c", "hello.i", "-o", "hello.o",
        ]));
        assert_eq!(out, argv(&["cc1", "-c", "hello.i", "-o", "hello.o"]));
    }

    #[test]
    fn strips_cpp_only_flags() {
        let out = strip_local_args(&argv(&["cc1", "-MD", "-MF", "hello.d", "-c", "hello.i"]));
        assert_eq!(out, argv(&["cc1", "-c", "hello.i"]));
    }
}
