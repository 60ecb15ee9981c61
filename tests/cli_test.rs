use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use stencil::cli::{Args, Command, DEFAULT_CANONICAL_DIR, DEFAULT_TEMPLATE_DIR, DEFAULT_TIMEOUT_SECS};

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("stencil")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_render_args() {
    let parsed = Args::try_parse_from(make_args(&["render", "./template", "./output"])).unwrap();

    assert!(!parsed.verbose);
    match parsed.command {
        Command::Render {
            template,
            output_dir,
            config,
            set,
            interactive,
            force,
        } => {
            assert_eq!(template, "./template");
            assert_eq!(output_dir, PathBuf::from("./output"));
            assert_eq!(config, None);
            assert!(set.is_empty());
            assert!(!interactive);
            assert!(!force);
        }
        other => panic!("expected Render, got {other:?}"),
    }
}

#[test]
fn test_render_flags_and_repeated_set() {
    let parsed = Args::try_parse_from(make_args(&[
        "-v",
        "render",
        "https://github.com/user/template.git",
        "./output",
        "--config",
        "values.yaml",
        "--set",
        "project_name=demo",
        "--set",
        "use_docs=false",
        "--interactive",
        "--force",
    ]))
    .unwrap();

    assert!(parsed.verbose);
    match parsed.command {
        Command::Render {
            template,
            config,
            set,
            interactive,
            force,
            ..
        } => {
            assert_eq!(template, "https://github.com/user/template.git");
            assert_eq!(config, Some(PathBuf::from("values.yaml")));
            assert_eq!(set, vec!["project_name=demo", "use_docs=false"]);
            assert!(interactive);
            assert!(force);
        }
        other => panic!("expected Render, got {other:?}"),
    }
}

#[test]
fn test_render_requires_template_and_output() {
    assert!(Args::try_parse_from(make_args(&["render"])).is_err());
    assert!(Args::try_parse_from(make_args(&["render", "./template"])).is_err());
}

#[test]
fn test_refresh_canonical_defaults() {
    let parsed = Args::try_parse_from(make_args(&["refresh-canonical"])).unwrap();
    match parsed.command {
        Command::RefreshCanonical { template, canonical } => {
            assert_eq!(template, PathBuf::from(DEFAULT_TEMPLATE_DIR));
            assert_eq!(canonical, PathBuf::from(DEFAULT_CANONICAL_DIR));
        }
        other => panic!("expected RefreshCanonical, got {other:?}"),
    }
}

#[test]
fn test_refresh_canonical_overrides() {
    let parsed = Args::try_parse_from(make_args(&[
        "refresh-canonical",
        "--template",
        "tpl",
        "--canonical",
        "ref",
    ]))
    .unwrap();
    match parsed.command {
        Command::RefreshCanonical { template, canonical } => {
            assert_eq!(template, PathBuf::from("tpl"));
            assert_eq!(canonical, PathBuf::from("ref"));
        }
        other => panic!("expected RefreshCanonical, got {other:?}"),
    }
}

#[test]
fn test_verify_defaults_and_timeout() {
    let parsed = Args::try_parse_from(make_args(&["verify"])).unwrap();
    match parsed.command {
        Command::Verify {
            dir,
            template,
            timeout_secs,
        } => {
            assert_eq!(dir, PathBuf::from(DEFAULT_CANONICAL_DIR));
            assert_eq!(template, PathBuf::from(DEFAULT_TEMPLATE_DIR));
            assert_eq!(timeout_secs, DEFAULT_TIMEOUT_SECS);
        }
        other => panic!("expected Verify, got {other:?}"),
    }

    let parsed =
        Args::try_parse_from(make_args(&["verify", "./proj", "--timeout-secs", "5"])).unwrap();
    match parsed.command {
        Command::Verify { dir, timeout_secs, .. } => {
            assert_eq!(dir, PathBuf::from("./proj"));
            assert_eq!(timeout_secs, 5);
        }
        other => panic!("expected Verify, got {other:?}"),
    }
}

#[test]
fn test_check_drift_args() {
    let parsed = Args::try_parse_from(make_args(&["check-drift", "--template", "tpl"])).unwrap();
    match parsed.command {
        Command::CheckDrift { template, canonical } => {
            assert_eq!(template, PathBuf::from("tpl"));
            assert_eq!(canonical, PathBuf::from(DEFAULT_CANONICAL_DIR));
        }
        other => panic!("expected CheckDrift, got {other:?}"),
    }
}

#[test]
fn test_verbose_is_global() {
    let parsed = Args::try_parse_from(make_args(&["check-drift", "--verbose"])).unwrap();
    assert!(parsed.verbose);
}

#[test]
fn test_missing_subcommand_is_an_error() {
    assert!(Args::try_parse_from(make_args(&[])).is_err());
}
