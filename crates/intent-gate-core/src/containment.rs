//! Path resolution and containment.
//!
//! Every filesystem argument of a mutating command goes through, in order:
//!
//! 1. lexical rejection (`/`, `.`, `..`, `~`, absolute paths outside the root,
//!    `sandbox/...` self-references)
//! 2. canonical resolution: each component is resolved in turn and every
//!    symlink, final or intermediate, is followed
//! 3. containment: the real path must lie below the root, compared
//!    component-wise on resolved paths; the root itself is never a target
//! 4. deny-glob matching on the path relative to the root
//!
//! and finally the number of in-scope arguments is compared to `max_files`.
//! The first violation (argument order, then check order) is reported.

use crate::merge::EffectiveConstraints;
use crate::verdict::{EscapeKind, Violation};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Upper bound on symlinks followed while resolving one argument (Linux `MAXSYMLINKS`).
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Options whose value is not a path, per program.
const NON_PATH_VALUE_OPTIONS: &[(&str, &[&str])] = &[
    ("truncate", &["-s", "--size"]),
    ("cp", &["--backup", "--preserve", "--no-preserve", "--reflink", "--sparse", "--update"]),
    ("mv", &["--backup", "--update"]),
    ("rm", &["--interactive"]),
];

/// Short options whose attached value is a path, per program.
const PATH_VALUE_SHORT_OPTIONS: &[(&str, &[char])] = &[("cp", &['t']), ("mv", &['t'])];

const DANGEROUS_TARGETS: &[&str] = &[".", "..", "~"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("too many levels of symbolic links (> {MAX_SYMLINK_HOPS})")]
    TooManyLinks,

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Canonical sandbox root and working directory for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
    workdir: PathBuf,
}

impl Sandbox {
    /// Canonicalize `root` and `workdir`. Both must exist.
    pub fn new(root: &Path, workdir: &Path) -> Result<Self, ResolveError> {
        let canon = |p: &Path| {
            std::fs::canonicalize(p).map_err(|source| ResolveError::Io {
                path: p.display().to_string(),
                source,
            })
        };
        Ok(Self {
            root: canon(root)?,
            workdir: canon(workdir)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

/// One argument that passed every per-argument check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub argument: String,
    pub real_path: String,
    /// Real path relative to the sandbox root, `/`-separated.
    pub relative: String,
    pub via_symlink: bool,
}

/// Result of [`resolve_real_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub real_path: PathBuf,
    pub via_symlink: bool,
}

/// Command arguments after local glob expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedArgs {
    /// Full argument list to execute, in order.
    pub argv: Vec<String>,
    /// The subset of `argv` that names filesystem paths.
    pub operands: Vec<String>,
}

/// Expand glob operands against `workdir` and pick out the path operands.
///
/// Options (leading `-`) are skipped until `--`; values of known non-path
/// options are skipped too. A value embedded in an option token
/// (`--target-directory=DIR`, `-tDIR`, `-x/some/path`) is an operand unless
/// the option is known not to take a path. A pattern that matches nothing
/// stays literal.
pub fn prepare_args(program: &str, args: &[String], workdir: &Path) -> PreparedArgs {
    let value_options: &[&str] = lookup(NON_PATH_VALUE_OPTIONS, program);
    let path_short = lookup(PATH_VALUE_SHORT_OPTIONS, program);

    let mut argv = Vec::with_capacity(args.len());
    let mut operands = Vec::new();
    let mut options_done = false;
    let mut skip_value = false;

    for arg in args {
        if skip_value {
            skip_value = false;
            argv.push(arg.clone());
            continue;
        }
        if !options_done {
            if arg == "--" {
                options_done = true;
                argv.push(arg.clone());
                continue;
            }
            if arg.starts_with('-') && arg.len() > 1 {
                skip_value = value_options.contains(&arg.as_str());
                argv.push(arg.clone());
                if let Some(value) = embedded_value(arg, value_options, path_short) {
                    operands.push(value.to_string());
                }
                continue;
            }
        }
        for expanded in expand_glob(arg, workdir) {
            operands.push(expanded.clone());
            argv.push(expanded);
        }
    }

    PreparedArgs { argv, operands }
}

fn lookup<T>(table: &[(&str, &'static [T])], program: &str) -> &'static [T] {
    table
        .iter()
        .find(|(p, _)| *p == program)
        .map(|(_, values)| *values)
        .unwrap_or_default()
}

/// The value carried inside an option token, when it may name a path.
fn embedded_value<'a>(arg: &'a str, value_options: &[&str], path_short: &[char]) -> Option<&'a str> {
    if let Some(long) = arg.strip_prefix("--") {
        let (name, value) = long.split_once('=')?;
        let known_non_path = value_options
            .iter()
            .any(|o| o.strip_prefix("--") == Some(name));
        return (!known_non_path).then_some(value);
    }

    let cluster = &arg[1..];
    if let Some(i) = cluster.find(|c: char| path_short.contains(&c)) {
        let value = &cluster[i + 1..];
        return (!value.is_empty()).then_some(value);
    }
    let known_non_path = value_options
        .iter()
        .filter(|o| !o.starts_with("--"))
        .any(|o| arg.starts_with(*o));
    if known_non_path || !cluster.contains('/') {
        return None;
    }
    // Unknown letter with an attached path: treat everything after the
    // option letter as the value.
    let mut chars = cluster.chars();
    chars.next();
    Some(chars.as_str())
}

fn expand_glob(token: &str, workdir: &Path) -> Vec<String> {
    if !token.contains(['*', '?', '[']) {
        return vec![token.to_string()];
    }

    let relative = Path::new(token).is_relative();
    let pattern = if relative {
        format!(
            "{}/{}",
            glob::Pattern::escape(&workdir.to_string_lossy()),
            token
        )
    } else {
        token.to_string()
    };
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let Ok(paths) = glob::glob_with(&pattern, options) else {
        return vec![token.to_string()];
    };

    let matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|p| {
            if relative {
                p.strip_prefix(workdir)
                    .map(|r| r.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| p.to_string_lossy().into_owned())
            } else {
                p.to_string_lossy().into_owned()
            }
        })
        .collect();

    if matches.is_empty() {
        vec![token.to_string()]
    } else {
        matches
    }
}

enum Step {
    Parent,
    Name(OsString),
}

/// Split a path into its root portion (if absolute) and its remaining steps.
fn split(path: &Path) -> (Option<PathBuf>, Vec<Step>) {
    let mut root = PathBuf::new();
    let mut steps = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => root.push(component),
            Component::CurDir => {}
            Component::ParentDir => steps.push(Step::Parent),
            Component::Normal(name) => steps.push(Step::Name(name.to_os_string())),
        }
    }
    let root = (!root.as_os_str().is_empty()).then_some(root);
    (root, steps)
}

/// Resolve `token` relative to `base` into a real path.
///
/// Every component is checked with `symlink_metadata`; a symlink's target is
/// spliced into the remaining components, so links in intermediate directories
/// are followed as well as the final one. `..` pops the resolved parent.
/// Components that do not exist are appended lexically. `base` must already
/// be canonical.
pub fn resolve_real_path(base: &Path, token: &Path) -> Result<Resolution, ResolveError> {
    let (root, steps) = split(token);
    let mut current = root.unwrap_or_else(|| base.to_path_buf());
    // Stack of remaining steps, next step on top.
    let mut pending: Vec<Step> = steps.into_iter().rev().collect();
    let mut hops = 0usize;
    let mut via_symlink = false;

    while let Some(step) = pending.pop() {
        let name = match step {
            Step::Parent => {
                current.pop();
                continue;
            }
            Step::Name(name) => name,
        };

        let candidate = current.join(&name);
        match std::fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(ResolveError::TooManyLinks);
                }
                via_symlink = true;
                let target = std::fs::read_link(&candidate).map_err(|source| ResolveError::Io {
                    path: candidate.display().to_string(),
                    source,
                })?;
                let (target_root, target_steps) = split(&target);
                if let Some(r) = target_root {
                    current = r;
                }
                pending.extend(target_steps.into_iter().rev());
            }
            Ok(_) => current = candidate,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => current = candidate,
            Err(source) => {
                return Err(ResolveError::Io {
                    path: candidate.display().to_string(),
                    source,
                })
            }
        }
    }

    Ok(Resolution {
        real_path: current,
        via_symlink,
    })
}

/// Lexical normalization: drop `.`, fold `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            _ => clean.push(component),
        }
    }
    clean
}

fn relative_to_root(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn lexical_rejection(token: &str, sandbox: &Sandbox) -> Option<EscapeKind> {
    let trimmed = token.trim_end_matches('/');
    if token.is_empty() || trimmed.is_empty() || DANGEROUS_TARGETS.contains(&trimmed) {
        return Some(EscapeKind::DangerousTarget);
    }
    if token.starts_with("~/") {
        return Some(EscapeKind::HomeRelative);
    }

    let path = Path::new(token);
    if path.is_absolute() {
        let normalized = normalize_lexically(path);
        if normalized == sandbox.root() {
            return Some(EscapeKind::DangerousTarget);
        }
        if !normalized.starts_with(sandbox.root()) {
            return Some(EscapeKind::AbsoluteOutsideRoot);
        }
        return None;
    }

    let first = path.components().find_map(|c| match c {
        Component::Normal(name) => Some(name),
        _ => None,
    });
    if let (Some(first), Some(root_name)) = (first, sandbox.root().file_name()) {
        if first == root_name && path.components().count() > 1 {
            return Some(EscapeKind::SandboxSelfReference);
        }
    }
    None
}

/// Compiled deny-globs, kept alongside their source patterns for reporting.
pub struct DenyGlobs {
    patterns: Vec<String>,
    set: GlobSet,
}

impl DenyGlobs {
    pub fn compile<'a>(patterns: impl IntoIterator<Item = &'a String>) -> Result<Self, Violation> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let normalized = pattern.replace('\\', "/");
            let glob = Glob::new(&normalized).map_err(|e| Violation::InvalidDenyGlob {
                pattern: pattern.clone(),
                error: e.to_string(),
            })?;
            builder.add(glob);
            kept.push(pattern.clone());
        }
        let set = builder.build().map_err(|e| Violation::InvalidDenyGlob {
            pattern: kept.join(", "),
            error: e.to_string(),
        })?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    /// First pattern (in sorted pattern order) matching `relative`.
    pub fn first_match(&self, relative: &str) -> Option<&str> {
        self.set
            .matches(relative)
            .into_iter()
            .min()
            .map(|i| self.patterns[i].as_str())
    }
}

/// Run the per-argument checks and the max-files ceiling.
pub fn check_arguments(
    sandbox: &Sandbox,
    operands: &[String],
    constraints: &EffectiveConstraints,
) -> Result<Vec<ResolvedTarget>, Violation> {
    let deny = DenyGlobs::compile(&constraints.deny_globs)?;
    let mut targets = Vec::with_capacity(operands.len());

    for argument in operands {
        targets.push(check_one(sandbox, argument, &deny)?);
    }

    let count = targets.len() as u64;
    if count > constraints.max_files {
        return Err(Violation::MaxFilesExceeded {
            count,
            max: constraints.max_files,
        });
    }
    Ok(targets)
}

fn check_one(sandbox: &Sandbox, argument: &str, deny: &DenyGlobs) -> Result<ResolvedTarget, Violation> {
    if let Some(kind) = lexical_rejection(argument, sandbox) {
        return Err(Violation::PathEscape {
            argument: argument.to_string(),
            resolved: None,
            kind,
        });
    }

    let resolution = match resolve_real_path(sandbox.workdir(), Path::new(argument)) {
        Ok(r) => r,
        Err(ResolveError::TooManyLinks) => {
            return Err(Violation::SymlinkEscape {
                argument: argument.to_string(),
                resolved: None,
                kind: EscapeKind::SymlinkLoop,
            })
        }
        Err(e) => {
            return Err(Violation::PathEscape {
                argument: argument.to_string(),
                resolved: None,
                kind: EscapeKind::Unresolvable {
                    error: e.to_string(),
                },
            })
        }
    };

    let Some(relative) = relative_to_root(&resolution.real_path, sandbox.root()) else {
        let resolved = Some(resolution.real_path.display().to_string());
        let argument = argument.to_string();
        return Err(if resolution.via_symlink {
            Violation::SymlinkEscape {
                argument,
                resolved,
                kind: EscapeKind::OutsideRoot,
            }
        } else {
            Violation::PathEscape {
                argument,
                resolved,
                kind: EscapeKind::OutsideRoot,
            }
        });
    };

    if relative.is_empty() {
        return Err(Violation::PathEscape {
            argument: argument.to_string(),
            resolved: Some(resolution.real_path.display().to_string()),
            kind: EscapeKind::DangerousTarget,
        });
    }

    // The name as written is checked too: removing `a.pem` removes that link
    // even when it points at an allowed file.
    let lexical = relative_to_root(
        &normalize_lexically(&sandbox.workdir().join(argument)),
        sandbox.root(),
    );
    let candidates = std::iter::once(relative.as_str()).chain(lexical.as_deref());
    for candidate in candidates {
        if let Some(pattern) = deny.first_match(candidate) {
            return Err(Violation::DenyGlobMatch {
                argument: argument.to_string(),
                pattern: pattern.to_string(),
                matched: candidate.to_string(),
            });
        }
    }

    Ok(ResolvedTarget {
        argument: argument.to_string(),
        real_path: resolution.real_path.display().to_string(),
        relative,
        via_symlink: resolution.via_symlink,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Classification;
    use std::collections::BTreeSet;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sandbox");
        fs::create_dir(&root).unwrap();
        let sandbox = Sandbox::new(&root, &root).unwrap();
        (dir, sandbox)
    }

    fn constraints(globs: &[&str], max_files: u64) -> EffectiveConstraints {
        EffectiveConstraints {
            deny_globs: globs.iter().map(|g| g.to_string()).collect::<BTreeSet<_>>(),
            max_files,
        }
    }

    fn check(sandbox: &Sandbox, args: &[&str], c: &EffectiveConstraints) -> Result<Vec<ResolvedTarget>, Violation> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        check_arguments(sandbox, &args, c)
    }

    fn class_of(r: Result<Vec<ResolvedTarget>, Violation>) -> Option<Classification> {
        r.err().map(|v| v.classification())
    }

    #[test]
    fn test_prepare_args_skips_options_and_values() {
        let (_d, sb) = setup();
        let args: Vec<String> = ["-s", "0", "-f", "a.txt", "--", "-weird"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let prepared = prepare_args("truncate", &args, sb.workdir());
        assert_eq!(prepared.operands, vec!["a.txt", "-weird"]);
        assert_eq!(prepared.argv, args);

        // `-s` is only a value option for truncate.
        let prepared = prepare_args("rm", &["-s".into(), "0".into()], sb.workdir());
        assert_eq!(prepared.operands, vec!["0"]);
    }

    fn operands(program: &str, args: &[&str], workdir: &Path) -> Vec<String> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        prepare_args(program, &args, workdir).operands
    }

    #[test]
    fn test_prepare_args_option_embedded_paths_are_operands() {
        let (_d, sb) = setup();
        let wd = sb.workdir();
        assert_eq!(
            operands("mv", &["--target-directory=/outside", "foo.txt"], wd),
            vec!["/outside", "foo.txt"]
        );
        assert_eq!(operands("cp", &["-t/outside", "foo.txt"], wd), vec!["/outside", "foo.txt"]);
        assert_eq!(operands("cp", &["-ft", "dest", "foo.txt"], wd), vec!["dest", "foo.txt"]);
        assert_eq!(operands("cp", &["-fvtdest", "foo.txt"], wd), vec!["dest", "foo.txt"]);
        // Unknown options with an attached path fail closed.
        assert_eq!(operands("sed", &["-x/etc/passwd"], wd), vec!["/etc/passwd"]);
        assert_eq!(operands("rm", &["--anything=../up"], wd), vec!["../up"]);
    }

    #[test]
    fn test_prepare_args_non_path_option_values_stay_options() {
        let (_d, sb) = setup();
        let wd = sb.workdir();
        assert_eq!(operands("truncate", &["--size=0", "a.txt"], wd), vec!["a.txt"]);
        assert_eq!(operands("truncate", &["-s0", "a.txt"], wd), vec!["a.txt"]);
        assert_eq!(operands("cp", &["--backup=numbered", "a", "b"], wd), vec!["a", "b"]);
        assert_eq!(operands("rm", &["-rf", "--interactive=never", "a"], wd), vec!["a"]);
    }

    #[test]
    fn test_option_embedded_path_outside_root_is_denied() {
        let (dir, sb) = setup();
        fs::write(sb.root().join("foo.txt"), "x").unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        let c = constraints(&[], 50);

        for opt in [
            format!("--target-directory={}", outside.display()),
            format!("-t{}", outside.display()),
        ] {
            let prepared = prepare_args("mv", &[opt.clone(), "foo.txt".into()], sb.workdir());
            let err = check_arguments(&sb, &prepared.operands, &c).unwrap_err();
            assert_eq!(err.classification(), Classification::PathEscape, "{opt}");
        }
    }

    #[test]
    fn test_prepare_args_expands_globs() {
        let (_d, sb) = setup();
        for name in ["a.log", "b.log", ".hidden.log", "c.txt"] {
            fs::write(sb.root().join(name), "x").unwrap();
        }
        let prepared = prepare_args("rm", &["*.log".into(), "*.none".into()], sb.workdir());
        assert_eq!(prepared.operands, vec!["a.log", "b.log", "*.none"]);
        assert_eq!(prepared.argv, prepared.operands);
    }

    #[test]
    fn test_lexical_rejections() {
        let (_d, sb) = setup();
        let c = constraints(&[], 50);
        for arg in ["/", ".", "..", "~", "./", "../", "//", "~/notes.txt", "/etc/passwd", "sandbox/foo.txt"] {
            let err = check(&sb, &[arg], &c).unwrap_err();
            assert_eq!(err.classification(), Classification::PathEscape, "{arg}");
        }
    }

    #[test]
    fn test_sandbox_root_is_never_a_target() {
        let (_d, sb) = setup();
        fs::create_dir(sb.root().join("d")).unwrap();
        let c = constraints(&[], 50);
        let abs = sb.root().display().to_string();
        let abs_slash = format!("{abs}/");
        let abs_dot = format!("{abs}/d/..");
        for arg in [abs.as_str(), abs_slash.as_str(), abs_dot.as_str(), "d/..", "./.", "d/../."] {
            let err = check(&sb, &[arg], &c).unwrap_err();
            assert!(
                matches!(
                    err,
                    Violation::PathEscape {
                        kind: EscapeKind::DangerousTarget,
                        ..
                    }
                ),
                "{arg}: {err:?}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_root_is_never_a_target() {
        let (_d, sb) = setup();
        std::os::unix::fs::symlink(".", sb.root().join("self")).unwrap();
        let err = check(&sb, &["self"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::PathEscape);
    }

    #[test]
    fn test_absolute_path_inside_root_is_checked_not_rejected() {
        let (_d, sb) = setup();
        fs::write(sb.root().join("f.txt"), "x").unwrap();
        let abs = sb.root().join("f.txt").display().to_string();
        let targets = check(&sb, &[&abs], &constraints(&[], 50)).unwrap();
        assert_eq!(targets[0].relative, "f.txt");
    }

    #[test]
    fn test_dotdot_escape_is_path_escape() {
        let (dir, sb) = setup();
        fs::write(dir.path().join("outside.txt"), "x").unwrap();
        assert_eq!(
            class_of(check(&sb, &["../outside.txt"], &constraints(&[], 50))),
            Some(Classification::PathEscape)
        );
        // Round trips that stay inside are fine.
        fs::create_dir(sb.root().join("d")).unwrap();
        assert!(check(&sb, &["d/../x.txt"], &constraints(&[], 50)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_final_component_symlink_escape() {
        let (dir, sb) = setup();
        let victim = dir.path().join("victim.txt");
        fs::write(&victim, "TOP_SECRET").unwrap();
        std::os::unix::fs::symlink(&victim, sb.root().join("link.txt")).unwrap();

        let err = check(&sb, &["link.txt"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::SymlinkEscape);
        assert!(err.to_string().contains("resolves outside sandbox"));
    }

    #[cfg(unix)]
    #[test]
    fn test_intermediate_directory_symlink_escape() {
        let (dir, sb) = setup();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("data.txt"), "x").unwrap();
        // sandbox/dirlink -> ../outside ; target names a regular file.
        std::os::unix::fs::symlink("../outside", sb.root().join("dirlink")).unwrap();

        let err = check(&sb, &["dirlink/data.txt"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::SymlinkEscape);
        // Even a not-yet-existing file below the link escapes.
        let err = check(&sb, &["dirlink/new.txt"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_link_then_dotdot_uses_physical_parent() {
        let (dir, sb) = setup();
        let deep = dir.path().join("elsewhere/deep");
        fs::create_dir_all(&deep).unwrap();
        std::os::unix::fs::symlink(&deep, sb.root().join("jump")).unwrap();
        // Lexically `jump/../x` is `x` inside the root; physically it is
        // `elsewhere/x`.
        let err = check(&sb, &["jump/../x"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::SymlinkEscape);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_allowed() {
        let (_d, sb) = setup();
        fs::write(sb.root().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink("real.txt", sb.root().join("alias.txt")).unwrap();
        let targets = check(&sb, &["alias.txt"], &constraints(&[], 50)).unwrap();
        assert_eq!(targets[0].relative, "real.txt");
        assert!(targets[0].via_symlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop() {
        let (_d, sb) = setup();
        std::os::unix::fs::symlink("b", sb.root().join("a")).unwrap();
        std::os::unix::fs::symlink("a", sb.root().join("b")).unwrap();
        let err = check(&sb, &["a"], &constraints(&[], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::SymlinkEscape);
    }

    #[test]
    fn test_deny_glob_at_root_and_nested() {
        let (_d, sb) = setup();
        fs::write(sb.root().join("secret.pem"), "x").unwrap();
        fs::create_dir_all(sb.root().join("a/.git")).unwrap();
        let c = constraints(&["**/*.pem", "**/.git/**"], 50);

        let err = check(&sb, &["secret.pem"], &c).unwrap_err();
        assert_eq!(
            err,
            Violation::DenyGlobMatch {
                argument: "secret.pem".to_string(),
                pattern: "**/*.pem".to_string(),
                matched: "secret.pem".to_string(),
            }
        );
        assert_eq!(
            class_of(check(&sb, &["a/.git/config"], &c)),
            Some(Classification::DenyGlobMatch)
        );
        assert!(check(&sb, &["notes.txt"], &c).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_deny_glob_follows_symlink_target() {
        let (_d, sb) = setup();
        fs::write(sb.root().join("secret.pem"), "x").unwrap();
        fs::create_dir(sb.root().join("link")).unwrap();
        std::os::unix::fs::symlink("../secret.pem", sb.root().join("link/target")).unwrap();

        let err = check(&sb, &["link/target"], &constraints(&["**/*.pem"], 50)).unwrap_err();
        assert_eq!(err.classification(), Classification::DenyGlobMatch);
    }

    #[test]
    fn test_invalid_deny_glob_denies() {
        let (_d, sb) = setup();
        let err = check(&sb, &["a.txt"], &constraints(&["a[.txt"], 50)).unwrap_err();
        assert!(matches!(err, Violation::InvalidDenyGlob { .. }));
        assert_eq!(err.classification(), Classification::DenyGlobMatch);
    }

    #[test]
    fn test_max_files_boundary() {
        let (_d, sb) = setup();
        let c = constraints(&[], 3);
        assert_eq!(check(&sb, &["a", "b", "c"], &c).unwrap().len(), 3);
        assert_eq!(
            check(&sb, &["a", "b", "c", "d"], &c).unwrap_err(),
            Violation::MaxFilesExceeded { count: 4, max: 3 }
        );
    }

    #[test]
    fn test_first_violation_in_argument_order() {
        let (_d, sb) = setup();
        let c = constraints(&["**/*.pem"], 1);
        // Second argument escapes, third matches a glob, and there are too
        // many files; the escape is reported.
        let err = check(&sb, &["ok.txt", "/etc/hosts", "x.pem"], &c).unwrap_err();
        assert_eq!(err.classification(), Classification::PathEscape);
    }

    #[test]
    fn test_workdir_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sandbox");
        fs::create_dir_all(root.join("sub")).unwrap();
        let sb = Sandbox::new(&root, &root.join("sub")).unwrap();
        let targets = check(&sb, &["f.txt", "../g.txt"], &constraints(&[], 50)).unwrap();
        assert_eq!(targets[0].relative, "sub/f.txt");
        assert_eq!(targets[1].relative, "g.txt");
        assert!(check(&sb, &["../../h.txt"], &constraints(&[], 50)).is_err());
        // The parent of the workdir is the root itself.
        assert!(check(&sb, &["../"], &constraints(&[], 50)).is_err());
        assert!(check(&sb, &["../sub/.."], &constraints(&[], 50)).is_err());
    }
}
