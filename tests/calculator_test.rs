// tests/calculator_test.rs
use git_tagver::analyzer::{bump, from_tag_information, next_version, resolve_version};
use git_tagver::domain::{Commit, SemVer, VersionCalculationOptions, VersionPart};
use git_tagver::git::MockRepoInspector;
use git_tagver::TagverError;

fn v(s: &str) -> SemVer {
    SemVer::parse(s).unwrap()
}

fn with_minimum(minimum: Option<&str>) -> VersionCalculationOptions {
    let mut options = VersionCalculationOptions::default();
    if let Some(minimum) = minimum {
        options.minimum_version = v(minimum);
    }
    options
}

#[test]
fn test_version_calculation_table() {
    let cases = [
        ("0.1.0-rc.1", None, 1, "0.1.0-rc.1.1"),
        ("1.0.0-rc.2", Some("1.0.0"), 2, "1.0.0-rc.2.2"),
        ("0.1.0-rc.1", Some("1.0.0"), 3, "1.0.0-alpha.3"),
        ("1.0.0", Some("1.0.0"), 1, "1.0.1-alpha.1"),
        ("1.0.0", Some("2.0.0"), 1, "2.0.0-alpha.1"),
        ("1.2.3", None, 5, "1.2.4-alpha.5"),
    ];

    for (last, minimum, height, expected) in cases {
        let options = with_minimum(minimum);
        let actual = from_tag_information(Some(&v(last)), &options, height).unwrap();
        assert_eq!(
            actual.to_string(),
            expected,
            "last tag {} with minimum {:?} at height {}",
            last,
            minimum,
            height
        );
    }
}

#[test]
fn test_no_tag_starts_from_minimum() {
    let options = VersionCalculationOptions::default();
    assert_eq!(from_tag_information(None, &options, 1).unwrap(), v("0.1.0-alpha.1"));
    assert_eq!(from_tag_information(None, &options, 4).unwrap(), v("0.1.0-alpha.4"));
}

#[test]
fn test_direct_tag_is_returned_as_is() {
    let options = VersionCalculationOptions::default();
    assert_eq!(from_tag_information(Some(&v("1.2.3-rc.1")), &options, 0).unwrap(), v("1.2.3-rc.1"));
}

#[test]
fn test_direct_tag_below_minimum_is_an_error() {
    let options = with_minimum(Some("2.0.0"));
    let err = from_tag_information(Some(&SemVer::new(1, 0, 0)), &options, 0).unwrap_err();
    assert!(matches!(err, TagverError::VersionCalculation(_)));
}

#[test]
fn test_build_metadata_policy() {
    let options = VersionCalculationOptions {
        build_metadata: Some("git.abc".to_string()),
        ..VersionCalculationOptions::default()
    };

    let direct = from_tag_information(Some(&v("1.2.3+4")), &options, 0).unwrap();
    assert_eq!(direct.build_metadata(), Some("4-git.abc"));

    let later = from_tag_information(Some(&v("1.2.3+4")), &options, 2).unwrap();
    assert_eq!(later.build_metadata(), Some("git.abc"));
}

#[test]
fn test_minor_and_major_auto_increment() {
    let mut options = VersionCalculationOptions {
        auto_increment: VersionPart::Minor,
        ..VersionCalculationOptions::default()
    };
    assert_eq!(from_tag_information(Some(&v("1.2.3")), &options, 1).unwrap(), v("1.3.0-alpha.1"));

    options.auto_increment = VersionPart::Major;
    assert_eq!(from_tag_information(Some(&v("1.2.3")), &options, 1).unwrap(), v("2.0.0-alpha.1"));
}

#[test]
fn test_auto_increment_none_keeps_tag_version() {
    let options = VersionCalculationOptions {
        auto_increment: VersionPart::None,
        ..VersionCalculationOptions::default()
    };
    assert_eq!(from_tag_information(Some(&v("1.2.3")), &options, 7).unwrap(), v("1.2.3"));
}

#[test]
fn test_custom_phase_and_base_height() {
    let options = VersionCalculationOptions {
        default_prerelease_phase: "beta".to_string(),
        prerelease_base_height: 10,
        ..VersionCalculationOptions::default()
    };
    assert_eq!(from_tag_information(Some(&v("1.0.0")), &options, 1).unwrap(), v("1.0.1-beta.10"));
}

#[test]
fn test_invalid_phase_is_rejected() {
    let options = VersionCalculationOptions {
        default_prerelease_phase: "not valid".to_string(),
        ..VersionCalculationOptions::default()
    };
    assert!(bump(&v("1.0.0"), &options, 1).is_err());
}

#[test]
fn test_malformed_phase_is_rejected() {
    for phase in ["", "01", "a..b", "alpha."] {
        let options = VersionCalculationOptions {
            default_prerelease_phase: phase.to_string(),
            ..VersionCalculationOptions::default()
        };
        assert!(bump(&v("1.0.0"), &options, 1).is_err(), "phase {:?}", phase);
        assert!(from_tag_information(Some(&v("1.0.0")), &options, 2).is_err(), "phase {:?}", phase);
    }
}

#[test]
fn test_malformed_build_metadata_is_rejected() {
    let options = VersionCalculationOptions {
        build_metadata: Some("a..b".to_string()),
        ..VersionCalculationOptions::default()
    };
    assert!(from_tag_information(Some(&v("1.2.3+4")), &options, 0).is_err());
    assert!(from_tag_information(Some(&v("1.2.3")), &options, 0).is_err());
    assert!(bump(&v("1.0.0"), &options, 1).is_err());
}

#[test]
fn test_produced_versions_round_trip() {
    let options = VersionCalculationOptions {
        build_metadata: Some("sha.0abc".to_string()),
        ..VersionCalculationOptions::default()
    };
    for last in ["0.0.1", "1.2.3-rc.1", "9.9.9+x", "1.0.0-0.3.7"] {
        let next = next_version(&v(last), &options).unwrap();
        let bumped = bump(&next, &options, 3).unwrap();
        assert_eq!(SemVer::parse(&bumped.to_string()).unwrap(), bumped);
        assert_eq!(SemVer::parse(&next.to_string()).unwrap(), next);
    }
}

#[tokio::test]
async fn test_resolve_version_from_repository() {
    let mut repo = MockRepoInspector::linear(&["a", "b", "c"]);
    repo.add_tag("v1.0.0", "a");
    let options = VersionCalculationOptions::default();

    let resolution = resolve_version(&repo, Some(&Commit::new("c")), &options, None)
        .await
        .unwrap();

    assert_eq!(resolution.version, v("1.0.1-alpha.2"));
    assert_eq!(resolution.height, Some(2));
    assert_eq!(resolution.commit, Some(Commit::new("c")));
    assert_eq!(resolution.last_tag.unwrap().version, v("1.0.0"));
}

#[tokio::test]
async fn test_version_override_skips_repository() {
    // Unknown start commit would fail if the repository were consulted
    let repo = MockRepoInspector::new();
    let options = VersionCalculationOptions {
        version_override: Some(v("3.1.4")),
        ..VersionCalculationOptions::default()
    };

    let resolution = resolve_version(&repo, Some(&Commit::new("missing")), &options, None)
        .await
        .unwrap();
    assert_eq!(resolution.version, v("3.1.4"));
    assert_eq!(resolution.height, None);
    assert!(resolution.last_tag.is_none());
}

#[tokio::test]
async fn test_resolve_surfaces_shallow_history() {
    let mut repo = MockRepoInspector::new();
    repo.add_commit("c", &["b"]);
    let options = VersionCalculationOptions::default();

    let err = resolve_version(&repo, Some(&Commit::new("c")), &options, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TagverError::RepoTooShallow(_)));
}
