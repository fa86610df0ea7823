use matrix_ci::core::error::MatrixError;
use matrix_ci::core::matrix::{expand, expand_braces, MatrixRow};
use matrix_ci::core::models::{EnvTag, Flag, Framework, Interpreter};

fn names(envlist: &[&str]) -> Vec<String> {
    let envlist: Vec<String> = envlist.iter().map(|s| s.to_string()).collect();
    expand(&envlist, &[], &[])
        .unwrap()
        .tags
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_pinax_envlist_expansion() {
    let tags = names(&[
        "py27-dj{18,110,111}{,-pytest}",
        "py36-dj{111,20,master}",
    ]);
    assert_eq!(
        tags,
        vec![
            "py27-dj18",
            "py27-dj18-pytest",
            "py27-dj110",
            "py27-dj110-pytest",
            "py27-dj111",
            "py27-dj111-pytest",
            "py36-dj111",
            "py36-dj20",
            "py36-djmaster",
        ]
    );
}

#[test]
fn test_expansion_is_deterministic() {
    let envlist = ["py{34,35}-dj{18,20}", "py36-dj20-postgres"];
    assert_eq!(names(&envlist), names(&envlist));
}

#[test]
fn test_duplicates_keep_first_position() {
    let tags = names(&["py36-dj20", "py35-dj20", "py36-dj{111,20}"]);
    assert_eq!(tags, vec!["py36-dj20", "py35-dj20", "py36-dj111"]);
}

#[test]
fn test_factor_order_does_not_matter() {
    let tags = names(&["py27-pytest-dj18", "py27-dj18-pytest"]);
    assert_eq!(tags, vec!["py27-dj18-pytest"]);
}

#[test]
fn test_unsupported_and_excluded_are_counted() {
    let envlist = vec!["py{27,36}-dj{18,20}".to_string()];
    let exclude = vec!["py36-dj20".to_string()];
    let expansion = expand(&envlist, &[], &exclude).unwrap();
    // py27-dj20 and py36-dj18 are unsupported, py36-dj20 is excluded.
    assert_eq!(expansion.excluded, 3);
    assert_eq!(
        expansion.tags,
        vec![EnvTag::new(Interpreter::Py27, Framework::Dj18)]
    );
}

#[test]
fn test_typed_rows_cross_product() {
    let row = MatrixRow {
        interpreters: vec![Interpreter::Py36, Interpreter::Py37],
        frameworks: vec![Framework::Dj20],
        flags: vec![vec![], vec![Flag::Postgres]],
    };
    let expansion = expand(&[], &[row], &[]).unwrap();
    let tags: Vec<String> = expansion.tags.iter().map(ToString::to_string).collect();
    assert_eq!(
        tags,
        vec![
            "py36-dj20",
            "py36-dj20-postgres",
            "py37-dj20",
            "py37-dj20-postgres",
        ]
    );
}

#[test]
fn test_unknown_factor_is_error() {
    let envlist = vec!["py27-dj18-mysql".to_string()];
    assert!(matches!(
        expand(&envlist, &[], &[]),
        Err(MatrixError::UnknownFactor { factor, .. }) if factor == "mysql"
    ));
}

#[test]
fn test_brace_errors() {
    assert!(matches!(
        expand_braces("py27-dj{18"),
        Err(MatrixError::UnbalancedBraces { .. })
    ));
    assert!(matches!(
        expand_braces("py27-dj18}"),
        Err(MatrixError::UnbalancedBraces { .. })
    ));
    assert!(matches!(
        expand_braces("py27-dj{}"),
        Err(MatrixError::EmptyGroup { .. })
    ));
    assert!(matches!(
        expand_braces("py{27,{34}}"),
        Err(MatrixError::NestedBraces { .. })
    ));
}

#[test]
fn test_missing_interpreter_or_framework() {
    assert!(matches!(
        "dj18".parse::<EnvTag>(),
        Err(MatrixError::MissingInterpreter { .. })
    ));
    assert!(matches!(
        "py27-pytest".parse::<EnvTag>(),
        Err(MatrixError::MissingFramework { .. })
    ));
}
