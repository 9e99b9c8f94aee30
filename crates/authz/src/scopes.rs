//! Static M2M scope matching.
//!
//! Machine-to-machine tokens carry scopes of the form `verb:resource`. A
//! required scope is satisfied when it is granted verbatim, or when it has a
//! `verb:` prefix and `verb:*` is granted. Bare scopes (no colon) only match
//! exactly. Matching is case-sensitive and splits on the first colon only, so
//! `read:*` satisfies `read:users:archived`.
//!
//! No policy document is involved.

const WILDCARD_SUFFIX: &str = ":*";

/// Returns `true` if every scope in `required` is satisfied by `granted`.
///
/// An empty `required` list is always satisfied.
///
/// ```
/// use warden_authz::scopes_authorized;
///
/// assert!(scopes_authorized(&["read:*", "write:*"], &["read:users"]));
/// assert!(!scopes_authorized(&["read:users"], &["read"]));
/// assert!(!scopes_authorized(&["read"], &["read:users"]));
/// ```
#[must_use]
pub fn scopes_authorized<G: AsRef<str>, R: AsRef<str>>(granted: &[G], required: &[R]) -> bool {
    first_unmet_scope(granted, required).is_none()
}

/// Returns the first scope in `required` that `granted` does not satisfy.
#[must_use]
pub fn first_unmet_scope<'r, G: AsRef<str>, R: AsRef<str>>(
    granted: &[G],
    required: &'r [R],
) -> Option<&'r str> {
    required.iter().map(AsRef::as_ref).find(|scope| !scope_satisfied(granted, scope))
}

fn scope_satisfied<G: AsRef<str>>(granted: &[G], required: &str) -> bool {
    let verb = required.split_once(':').map(|(verb, _)| verb);
    granted.iter().map(AsRef::as_ref).any(|g| {
        g == required
            || verb.is_some_and(|verb| g.strip_suffix(WILDCARD_SUFFIX) == Some(verb))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::wildcard_verb(&["read:*", "write:*"], &["read:users"], true)]
    #[case::scoped_does_not_grant_bare(&["read:users"], &["read"], false)]
    #[case::bare_does_not_grant_scoped(&["read"], &["read:users"], false)]
    #[case::exact(&["read:users"], &["read:users"], true)]
    #[case::bare_exact(&["admin"], &["admin"], true)]
    #[case::other_verb(&["write:*"], &["read:users"], false)]
    #[case::case_sensitive(&["READ:*"], &["read:users"], false)]
    #[case::first_colon_only(&["read:*"], &["read:users:archived"], true)]
    #[case::nested_wildcard_is_not_verb(&["read:users:*"], &["read:users:archived"], false)]
    #[case::all_required(&["read:*"], &["read:users", "write:users"], false)]
    #[case::nothing_required(&[], &[], true)]
    fn test_scopes_authorized(
        #[case] granted: &[&str],
        #[case] required: &[&str],
        #[case] expected: bool,
    ) {
        assert_eq!(scopes_authorized(granted, required), expected);
    }

    #[test]
    fn test_first_unmet_scope_reports_first_failure() {
        let granted = ["read:*"];
        let required = ["read:users", "write:users", "delete:users"];
        assert_eq!(first_unmet_scope(&granted, &required), Some("write:users"));
    }

    #[test]
    fn test_owned_strings() {
        let granted: Vec<String> = "read:* write:users".split(' ').map(String::from).collect();
        let required = vec!["write:users".to_owned()];
        assert!(scopes_authorized(&granted, &required));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_part() -> impl Strategy<Value = String> {
            "[a-z]{1,6}"
        }

        proptest! {
            /// Every scope satisfies itself.
            #[test]
            fn scope_satisfies_itself(verb in arb_part(), resource in arb_part()) {
                let scope = format!("{verb}:{resource}");
                prop_assert!(scopes_authorized(&[scope.as_str()], &[scope.as_str()]));
            }

            /// `verb:*` satisfies every `verb:resource`.
            #[test]
            fn verb_wildcard_covers_resources(verb in arb_part(), resource in arb_part()) {
                let granted = format!("{verb}:*");
                let required = format!("{verb}:{resource}");
                prop_assert!(scopes_authorized(&[granted], &[required]));
            }

            /// A bare scope never satisfies a different required scope.
            #[test]
            fn bare_scope_matches_only_itself(granted in arb_part(), required in arb_part()) {
                prop_assume!(granted != required);
                prop_assert!(!scopes_authorized(&[granted.as_str()], &[required.as_str()]));
            }

            /// Adding granted scopes never turns an allow into a deny.
            #[test]
            fn granting_more_is_monotonic(
                granted in prop::collection::vec("[a-z]{1,3}(:[a-z*]{1,3})?", 0..5),
                extra in "[a-z]{1,3}(:[a-z*]{1,3})?",
                required in prop::collection::vec("[a-z]{1,3}(:[a-z]{1,3})?", 0..4),
            ) {
                if scopes_authorized(&granted, &required) {
                    let mut more = granted.clone();
                    more.push(extra);
                    prop_assert!(scopes_authorized(&more, &required));
                }
            }
        }
    }
}
