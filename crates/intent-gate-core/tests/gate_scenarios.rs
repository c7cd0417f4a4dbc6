//! End-to-end decision scenarios against real sandboxes.
//!
//! Each test builds a sandbox in a temp dir, writes a policy and an intent
//! record in one of the two encodings, and checks the verdict the engine
//! reaches. Nothing here executes a command.

use chrono::{DateTime, TimeZone, Utc};
use intent_gate_core::{
    builtin_default, evaluate, AuthorizationRecord, Classification, CommandRequest, DenialSnapshot,
    Policy, RecordInput, Verdict,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

struct Sandbox {
    _dir: tempfile::TempDir,
    base: PathBuf,
    root: PathBuf,
}

fn sandbox() -> Sandbox {
    let dir = tempfile::tempdir().unwrap();
    let base = fs::canonicalize(dir.path()).unwrap();
    let root = base.join("sandbox");
    fs::create_dir(&root).unwrap();
    Sandbox {
        _dir: dir,
        base,
        root,
    }
}

fn front_matter(root: &Path, actions: &[&str], extra: &str) -> String {
    format!(
        "---\nid: IR-20300601-000000Z\ncreated_utc: 20300601-000000Z\nexpires_utc: 2030-06-02T00:00:00Z\nscope:\n  root: {}\nactions_allowed: [{}]\n{extra}signature: \"Operator\"\n---\n\n# Intent\nhousekeeping\n",
        root.display(),
        actions.join(", ")
    )
}

fn record(text: &str) -> RecordInput {
    AuthorizationRecord::parse(text).into()
}

fn run(policy: &Policy, rec: &RecordInput, root: &Path, argv: &[&str]) -> intent_gate_core::Decision {
    let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    evaluate(policy, rec, root, &CommandRequest::from_argv(&argv, None), at()).decision
}

/// Content of every file below `dir`, keyed by relative path.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            let meta = fs::symlink_metadata(&path).unwrap();
            if meta.is_dir() {
                stack.push(path);
            } else if meta.is_file() {
                out.insert(path.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&path).unwrap());
            }
        }
    }
    out
}

#[test]
fn rm_with_matching_record_is_authorized() {
    let sb = sandbox();
    fs::write(sb.root.join("foo.txt"), "bye").unwrap();
    let rec = record(&front_matter(&sb.root, &["delete"], "constraints:\n  max_files: 20\n"));

    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "foo.txt"]);
    assert_eq!(d.verdict, Verdict::Allow, "{}", d.reason);
    assert_eq!(d.classification, Classification::Authorized);
    assert_eq!(d.targets[0].relative, "foo.txt");
}

#[test]
fn read_only_allows_with_any_record_state() {
    let sb = sandbox();
    let policy = builtin_default();
    let states = [
        RecordInput::Absent,
        record("---\nid: [unclosed\n"),
        record(&front_matter(Path::new("/tmp"), &[], "")),
    ];
    for rec in &states {
        let cases: [&[&str]; 3] = [&["ls", "-la"], &["cat", "/etc/passwd"], &["grep", "-r", "x", ".."]];
        for argv in cases {
            let d = run(&policy, rec, &sb.root, argv);
            assert_eq!(d.classification, Classification::ReadOnly, "{argv:?}");
        }
    }
}

#[test]
fn scope_root_elsewhere_is_scope_mismatch() {
    let sb = sandbox();
    fs::write(sb.root.join("foo.txt"), "x").unwrap();
    let rec = record(&front_matter(Path::new("/tmp"), &["delete"], ""));
    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "foo.txt"]);
    assert_eq!(d.classification, Classification::ScopeMismatch);
    assert!(d.reason.contains("scope.root mismatch"), "{}", d.reason);
}

#[test]
fn legacy_record_authorizes_like_front_matter() {
    let sb = sandbox();
    fs::write(sb.root.join("a.txt"), "x").unwrap();
    let legacy = format!(
        "# Intent Record\n\n## Scope\nroot: {}\nexpires: 2030-06-02T00:00:00Z\n\n## Allowed action classes\n- copy\n\n## Constraints\n- max_files: 2\n\n## Signature\nsignature: Operator\n",
        sb.root.display()
    );
    let front = front_matter(&sb.root, &["copy"], "constraints:\n  max_files: 2\n");

    for text in [legacy, front] {
        let rec = record(&text);
        let d = run(&builtin_default(), &rec, &sb.root, &["cp", "a.txt", "b.txt"]);
        assert_eq!(d.classification, Classification::Authorized, "{}", d.reason);
        let d = run(&builtin_default(), &rec, &sb.root, &["cp", "a.txt", "b.txt", "c.txt"]);
        assert_eq!(d.classification, Classification::MaxFilesExceeded);
    }
}

#[cfg(unix)]
#[test]
fn symlink_escape_leaves_victim_untouched() {
    let sb = sandbox();
    let victim = sb.base.join("victim.txt");
    fs::write(&victim, "TOP_SECRET").unwrap();
    std::os::unix::fs::symlink(&victim, sb.root.join("innocent.txt")).unwrap();
    let rec = record(&front_matter(&sb.root, &["write_over_existing"], ""));

    let before = snapshot(&sb.base);
    let d = run(&builtin_default(), &rec, &sb.root, &["truncate", "-s", "0", "innocent.txt"]);
    assert_eq!(d.classification, Classification::SymlinkEscape);
    assert_eq!(snapshot(&sb.base), before);
    assert_eq!(fs::read_to_string(&victim).unwrap(), "TOP_SECRET");

    let snap = DenialSnapshot::from_decision(&d).unwrap();
    assert!(snap.observed.ends_with("victim.txt"), "{}", snap.observed);
}

#[test]
fn dotdot_argument_is_path_escape() {
    let sb = sandbox();
    fs::write(sb.base.join("outside.txt"), "x").unwrap();
    let rec = record(&front_matter(&sb.root, &["delete"], ""));
    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "../outside.txt"]);
    assert_eq!(d.classification, Classification::PathEscape);
}

#[test]
fn policy_only_deny_glob_applies_with_empty_record_list() {
    let sb = sandbox();
    fs::write(sb.root.join("server.key"), "k").unwrap();
    let rec = record(&front_matter(&sb.root, &["delete"], "constraints:\n  deny_globs: []\n"));
    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "server.key"]);
    assert_eq!(d.classification, Classification::DenyGlobMatch);
    assert!(d.reason.contains("'**/*.key'"), "{}", d.reason);
}

#[test]
fn record_only_deny_glob_applies_when_policy_lacks_it() {
    let sb = sandbox();
    fs::create_dir(sb.root.join("build")).unwrap();
    fs::write(sb.root.join("build/out.o"), "o").unwrap();
    let policy = Policy::from_yaml_str("mutating_commands: {rm: delete}\n").unwrap();
    assert!(policy.default_deny_globs.is_empty());

    let rec = record(&front_matter(
        &sb.root,
        &["delete"],
        "constraints:\n  deny_globs: [\"build/**\"]\n",
    ));
    let d = run(&policy, &rec, &sb.root, &["rm", "build/out.o"]);
    assert_eq!(d.classification, Classification::DenyGlobMatch);
}

#[test]
fn glob_argument_is_expanded_before_counting() {
    let sb = sandbox();
    for i in 0..3 {
        fs::write(sb.root.join(format!("f{i}.log")), "x").unwrap();
    }
    let rec = record(&front_matter(&sb.root, &["delete"], "constraints:\n  max_files: 2\n"));
    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "*.log"]);
    assert_eq!(d.classification, Classification::MaxFilesExceeded);
    assert!(d.reason.contains("3 > max_files=2"), "{}", d.reason);
}

#[test]
fn malformed_max_files_is_malformed_record() {
    let sb = sandbox();
    let rec = record(&front_matter(&sb.root, &["delete"], "constraints:\n  max_files: lots\n"));
    let d = run(&builtin_default(), &rec, &sb.root, &["rm", "a"]);
    assert_eq!(d.classification, Classification::MalformedIntentRecord);
}

#[test]
fn expired_record_denies() {
    let sb = sandbox();
    let text = front_matter(&sb.root, &["delete"], "").replace("2030-06-02", "2030-05-01");
    let d = run(&builtin_default(), &record(&text), &sb.root, &["rm", "a"]);
    assert_eq!(d.classification, Classification::Expired);
}

#[test]
fn path_qualified_program_is_unknown() {
    let sb = sandbox();
    let rec = record(&front_matter(&sb.root, &["delete"], ""));
    let d = run(&builtin_default(), &rec, &sb.root, &["/bin/rm", "a"]);
    assert_eq!(d.classification, Classification::UnknownCommand);
}

#[test]
fn every_spelling_of_the_root_is_denied() {
    let sb = sandbox();
    fs::create_dir(sb.root.join("d")).unwrap();
    fs::write(sb.root.join("d/keep.txt"), "keep").unwrap();
    let rec = record(&front_matter(&sb.root, &["delete"], ""));
    let abs = sb.root.display().to_string();

    for target in [abs.as_str(), "d/..", "./."] {
        let d = run(&builtin_default(), &rec, &sb.root, &["rm", "-rf", target]);
        assert_eq!(d.verdict, Verdict::Deny, "{target}");
        assert_eq!(d.classification, Classification::PathEscape, "{target}");
    }
    assert!(sb.root.join("d/keep.txt").exists());
}

#[test]
fn option_embedded_destination_outside_root_is_denied() {
    let sb = sandbox();
    fs::write(sb.root.join("foo.txt"), "x").unwrap();
    let outside = sb.base.join("outside");
    fs::create_dir(&outside).unwrap();
    let long = format!("--target-directory={}", outside.display());
    let short = format!("-t{}", outside.display());

    let mv = record(&front_matter(&sb.root, &["move_or_rename"], ""));
    let d = run(&builtin_default(), &mv, &sb.root, &["mv", &long, "foo.txt"]);
    assert_eq!(d.classification, Classification::PathEscape, "{}", d.reason);

    let cp = record(&front_matter(&sb.root, &["copy"], ""));
    let d = run(&builtin_default(), &cp, &sb.root, &["cp", &short, "foo.txt"]);
    assert_eq!(d.classification, Classification::PathEscape, "{}", d.reason);

    // The same option pointing inside the root is fine.
    fs::create_dir(sb.root.join("dest")).unwrap();
    let d = run(&builtin_default(), &cp, &sb.root, &["cp", "--target-directory=dest", "foo.txt"]);
    assert_eq!(d.classification, Classification::Authorized, "{}", d.reason);
    assert_eq!(d.targets.len(), 2);
}
