#![allow(clippy::unwrap_used, clippy::expect_used)]

use flakediff_core::errors::{ExError, ExErrorKind, FlakeDiffError};

#[test]
fn test_every_variant_maps_to_a_stable_code() {
    let cases = [
        (
            FlakeDiffError::GitWorktree {
                operation: "fetch".to_string(),
                message: "m".to_string(),
            },
            "ERR_GIT_WORKTREE",
        ),
        (
            FlakeDiffError::PathInfo {
                reference: ".#a".to_string(),
                message: "m".to_string(),
            },
            "ERR_PATH_INFO",
        ),
        (
            FlakeDiffError::Build {
                reference: ".#a".to_string(),
                message: "m".to_string(),
            },
            "ERR_BUILD",
        ),
        (
            FlakeDiffError::GitHubApi {
                operation: "create_comment".to_string(),
                message: "m".to_string(),
            },
            "ERR_GITHUB_API",
        ),
        (
            FlakeDiffError::Artifact {
                name: "results.json".to_string(),
                message: "m".to_string(),
            },
            "ERR_ARTIFACT",
        ),
        (
            FlakeDiffError::DiffTool {
                base_path: "/nix/store/a".to_string(),
                head_path: "/nix/store/b".to_string(),
                message: "m".to_string(),
            },
            "ERR_DIFF_TOOL",
        ),
        (FlakeDiffError::invalid_config("mode", "m"), "ERR_INVALID_CONFIG"),
        (
            FlakeDiffError::Io {
                operation: "write_output".to_string(),
                message: "m".to_string(),
            },
            "ERR_IO",
        ),
        (
            FlakeDiffError::Serialization {
                message: "m".to_string(),
            },
            "ERR_SERIALIZATION",
        ),
    ];

    let mut reached = std::collections::HashSet::new();
    for (err, code) in cases {
        assert_eq!(err.code(), code, "wrong code for {:?}", err);
        reached.insert(ExError::from(err).kind());
    }

    // every kind is produced by some variant
    for kind in ALL_KINDS {
        assert!(reached.contains(&kind), "{:?} is never produced", kind);
    }
}

const ALL_KINDS: [ExErrorKind; 9] = [
    ExErrorKind::InvalidConfig,
    ExErrorKind::GitWorktree,
    ExErrorKind::PathInfo,
    ExErrorKind::Build,
    ExErrorKind::DiffTool,
    ExErrorKind::GitHubApi,
    ExErrorKind::Artifact,
    ExErrorKind::Io,
    ExErrorKind::Serialization,
];

#[test]
fn test_kind_list_is_exhaustive() {
    for kind in ALL_KINDS {
        match kind {
            ExErrorKind::InvalidConfig
            | ExErrorKind::GitWorktree
            | ExErrorKind::PathInfo
            | ExErrorKind::Build
            | ExErrorKind::DiffTool
            | ExErrorKind::GitHubApi
            | ExErrorKind::Artifact
            | ExErrorKind::Io
            | ExErrorKind::Serialization => {}
        }
    }
}

#[test]
fn test_path_info_error_keeps_reference() {
    let ex: ExError = FlakeDiffError::PathInfo {
        reference: "/tmp/co#hosts.web".to_string(),
        message: "path-info returned no output".to_string(),
    }
    .into();

    assert_eq!(ex.kind(), ExErrorKind::PathInfo);
    assert_eq!(ex.op(), Some("path_info"));
    assert_eq!(ex.reference(), Some("/tmp/co#hosts.web"));
    assert!(ex.to_string().contains("(reference: /tmp/co#hosts.web)"));
}

#[test]
fn test_invalid_config_names_field() {
    let err = FlakeDiffError::invalid_config("attributes", "duplicate DisplayName 'a'");
    assert_eq!(
        err.to_string(),
        "invalid input 'attributes': duplicate DisplayName 'a'"
    );
    let ex: ExError = err.into();
    assert_eq!(ex.reference(), Some("attributes"));
}

#[test]
fn test_json_errors_become_serialization_errors() {
    let parse: Result<Vec<u8>, _> = serde_json::from_str::<Vec<u8>>("not json");
    let err: FlakeDiffError = parse.unwrap_err().into();
    assert!(matches!(err, FlakeDiffError::Serialization { .. }));
}
