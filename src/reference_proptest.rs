//! Property-based tests for reference parsing.
//!
//! These tests use proptest to generate random references and verify that
//! the parsing invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::error::ErrorKind;
    use crate::reference::{is_commit_id, parse, LfsMode, RefSpec};
    use proptest::prelude::*;

    const BASE: &str = "https://example.com/rpms/pkg.git";

    // ============================================================================
    // fragment classification
    // ============================================================================

    proptest! {
        /// Property: any 40 lowercase hex digits are taken as a commit id
        #[test]
        fn forty_hex_fragment_is_commit(commit in "[0-9a-f]{40}") {
            let target = parse(&format!("{}#{}", BASE, commit)).unwrap();
            prop_assert_eq!(target.ref_spec(), &RefSpec::Commit(commit));
        }

        /// Property: fragments that are not 40 hex digits are named refs
        #[test]
        fn other_fragments_are_named_refs(name in "[a-zA-Z0-9._-]{1,39}") {
            let target = parse(&format!("{}#{}", BASE, name)).unwrap();
            prop_assert_eq!(target.ref_spec(), &RefSpec::NamedRef(name));
        }

        /// Property: longer hex strings are never mistaken for a commit id
        #[test]
        fn long_hex_is_not_commit(value in "[0-9a-f]{41,64}") {
            prop_assert!(!is_commit_id(&value));
        }

        /// Property: the clone URL never carries query or fragment
        #[test]
        fn clone_url_is_bare(subdir in "[a-z]{1,8}(/[a-z]{1,8}){0,2}", fragment in "[a-z0-9]{1,12}") {
            let target = parse(&format!("{}?subdir={}&lfs=1#{}", BASE, subdir, fragment)).unwrap();
            prop_assert_eq!(target.clone_url(), BASE);
            prop_assert_eq!(target.lfs_mode(), LfsMode::ForceOn);
        }
    }

    // ============================================================================
    // subdir validation
    // ============================================================================

    proptest! {
        /// Property: a subdir climbing out of the repository is always rejected
        #[test]
        fn parent_segments_are_rejected(prefix in "([a-z]{1,6}/){0,2}", suffix in "(/[a-z]{1,6}){0,2}") {
            let reference = format!("{}?subdir={}..{}", BASE, prefix, suffix);
            let err = parse(&reference).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidReference);
        }

        /// Property: with_subdir produces a reference that parses back to that subdir
        #[test]
        fn with_subdir_parses_back(
            original in "[a-z]{1,8}",
            package in "[a-z][a-z0-9_+-]{0,15}",
            fragment in "[a-z]{1,8}",
        ) {
            let target = parse(&format!("{}?subdir={}&lfs=0#{}", BASE, original, fragment)).unwrap();
            let nested = format!("{}/{}", original, package);
            let reparsed = parse(&target.with_subdir(&nested)).unwrap();

            prop_assert_eq!(reparsed.subdir(), Some(nested.as_str()));
            prop_assert_eq!(reparsed.lfs_mode(), LfsMode::ForceOff);
            prop_assert_eq!(reparsed.ref_spec(), target.ref_spec());
            prop_assert_eq!(reparsed.clone_url(), target.clone_url());
        }
    }
}
