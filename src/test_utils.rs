//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a project name (letters, digits, spaces, dashes)
    pub fn project_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 _-]{0,24}[A-Za-z0-9]?"
    }

    /// Generate a pip requirement such as `requests` or `rich>=13.2`
    pub fn dependency_spec() -> impl Strategy<Value = String> {
        (
            "[a-z][a-z0-9_-]{0,15}[a-z0-9]",
            prop::option::of((
                prop_oneof![Just("=="), Just(">="), Just("<"), Just("~=")],
                1u32..30,
                0u32..20,
            )),
        )
            .prop_map(|(name, pin)| match pin {
                Some((op, major, minor)) => format!("{name}{op}{major}.{minor}"),
                None => name,
            })
    }

    /// Generate a dotted Windows version with one to four components
    pub fn dotted_version() -> impl Strategy<Value = String> {
        prop::collection::vec(0u32..65535, 1..=4).prop_map(|parts| {
            parts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(crate::config::defaults::MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_project_name_generator(name in project_name()) {
            prop_assert!(!name.trim().is_empty());
        }

        #[test]
        fn test_dependency_spec_generator(spec in dependency_spec()) {
            prop_assert!(spec.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
            prop_assert!(!spec.contains(' '));
        }

        #[test]
        fn test_dotted_version_generator(version in dotted_version()) {
            let parts: Vec<&str> = version.split('.').collect();
            prop_assert!((1..=4).contains(&parts.len()));
            for part in parts {
                prop_assert!(part.parse::<u32>().is_ok());
            }
        }
    }
}
