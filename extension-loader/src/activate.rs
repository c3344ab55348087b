use std::cmp::Ordering;
use std::collections::HashSet;

use crate::class_registry::ActivateSpec;
use crate::url::Url;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolves the ordered list of extension names to load for one call site
/// (§4.6). `names` is the caller-supplied, possibly-empty list that may
/// contain `-x` suppressions and the `default` splice marker; `activates`
/// is every auto-activated class's metadata, as registered via
/// `#[activate(...)]`.
pub fn get_activate_extension(
    url: &Url,
    names: &[&str],
    group: &str,
    activates: &[(String, ActivateSpec)],
) -> Vec<String> {
    let suppressed: HashSet<&str> = names
        .iter()
        .filter_map(|n| n.strip_prefix('-'))
        .collect();
    let explicit: HashSet<&str> = names
        .iter()
        .copied()
        .filter(|n| !n.starts_with('-') && *n != "default")
        .collect();

    // Phase A runs unless the caller suppresses it with "-default" (§4.6
    // bullet 1); it is not gated on the presence of a "default" marker,
    // which only controls *where* phase A lands among the user's names.
    let phase_a = if suppressed.contains("default") {
        Vec::new()
    } else {
        select_phase_a(url, group, activates, &suppressed, &explicit)
    };

    if names.is_empty() {
        return phase_a;
    }

    let has_default_marker = names.contains(&"default");

    let mut out = Vec::new();
    // No explicit "default" marker: phase A sits at the head and the
    // caller's names follow, matching dubbo's "append user items to the
    // tail of the phase-A list".
    if !has_default_marker {
        out.extend(phase_a.iter().cloned());
    }

    let mut spliced = false;
    for name in names {
        if name.starts_with('-') {
            continue;
        }
        if *name == "default" {
            // Splice phase A in at the first "default" marker only; a
            // degenerate caller list with more than one marker must not
            // duplicate the auto-activated items.
            if !spliced {
                out.extend(phase_a.iter().cloned());
                spliced = true;
            }
        } else {
            out.push((*name).to_owned());
        }
    }
    out
}

/// Phase A: classes auto-activated by group/URL-key match, in
/// `ActivateComparator` order, excluding anything suppressed with `-name`
/// or already placed explicitly by the caller (§4.6 bullets 1-3).
fn select_phase_a(
    url: &Url,
    group: &str,
    activates: &[(String, ActivateSpec)],
    suppressed: &HashSet<&str>,
    explicit: &HashSet<&str>,
) -> Vec<String> {
    let mut matched: Vec<&(String, ActivateSpec)> = activates
        .iter()
        .filter(|(name, spec)| {
            !suppressed.contains(name.as_str())
                && !explicit.contains(name.as_str())
                && group_matches(spec, group)
                && value_matches(spec, url)
        })
        .collect();

    matched.sort_by(|(name_a, a), (name_b, b)| compare_activate(name_a, a, name_b, b));
    matched.into_iter().map(|(name, _)| name.clone()).collect()
}

fn group_matches(spec: &ActivateSpec, group: &str) -> bool {
    spec.group.is_empty() || spec.group.iter().any(|g| *g == group)
}

/// A value key `k` matches if some URL parameter key either equals `k` or
/// ends with `"." + k` (the group-prefixed form, e.g. `"foo.timeout"`
/// matching key `"timeout"`), and that parameter's value is non-empty
/// (§4.6 bullet 2).
fn value_matches(spec: &ActivateSpec, url: &Url) -> bool {
    if spec.value.is_empty() {
        return true;
    }
    spec.value.iter().any(|key| {
        url.parameter_keys().any(|pk| {
            let key_matches = pk == *key || pk.strip_suffix(key).is_some_and(|rest| rest.ends_with('.'));
            key_matches && url.parameter(pk).is_some_and(|v| !v.is_empty())
        })
    })
}

/// Stable ordering: `order` ascending, then `before`/`after` hints (a name
/// in `before` sorts earlier, a name in `after` sorts later), then name
/// (§4.6 bullet 3, the `ActivateComparator` equivalent).
fn compare_activate(name_a: &str, a: &ActivateSpec, name_b: &str, b: &ActivateSpec) -> Ordering {
    if a.before.iter().any(|n| *n == name_b) || b.after.iter().any(|n| *n == name_a) {
        return Ordering::Less;
    }
    if a.after.iter().any(|n| *n == name_b) || b.before.iter().any(|n| *n == name_a) {
        return Ordering::Greater;
    }
    a.order.cmp(&b.order).then_with(|| name_a.cmp(name_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(order: i32) -> ActivateSpec {
        ActivateSpec {
            order,
            ..Default::default()
        }
    }

    #[test]
    fn empty_call_returns_sorted_phase_a() {
        let url = Url::builder().build();
        let activates = vec![
            ("b".to_owned(), spec(2)),
            ("a".to_owned(), spec(1)),
        ];
        let names = get_activate_extension(&url, &[], "", &activates);
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn suppressed_name_is_excluded() {
        let url = Url::builder().build();
        let activates = vec![("a".to_owned(), spec(1)), ("b".to_owned(), spec(2))];
        let names = get_activate_extension(&url, &["-a"], "", &activates);
        assert_eq!(names, vec!["b".to_owned()]);
    }

    #[test]
    fn phase_a_still_runs_without_an_explicit_default_marker() {
        let url = Url::builder().build();
        let activates = vec![("auto".to_owned(), spec(1))];
        let names = get_activate_extension(&url, &["f3"], "", &activates);
        assert_eq!(names, vec!["auto".to_owned(), "f3".to_owned()]);
    }

    #[test]
    fn minus_default_suppresses_phase_a_entirely() {
        let url = Url::builder().build();
        let activates = vec![("auto".to_owned(), spec(1))];
        let names = get_activate_extension(&url, &["-default", "f3"], "", &activates);
        assert_eq!(names, vec!["f3".to_owned()]);
    }

    #[test]
    fn repeated_default_marker_does_not_duplicate_phase_a() {
        let url = Url::builder().build();
        let activates = vec![("auto".to_owned(), spec(1))];
        let names = get_activate_extension(&url, &["default", "default"], "", &activates);
        assert_eq!(names, vec!["auto".to_owned()]);
    }

    #[test]
    fn default_splice_inserts_phase_a_at_that_position() {
        let url = Url::builder().build();
        let activates = vec![("auto".to_owned(), spec(1))];
        let names = get_activate_extension(&url, &["first", "default", "last"], "", &activates);
        assert_eq!(
            names,
            vec!["first".to_owned(), "auto".to_owned(), "last".to_owned()]
        );
    }

    #[test]
    fn before_hint_overrides_order() {
        let url = Url::builder().build();
        let later = ActivateSpec {
            before: &["earlier"],
            ..spec(1)
        };
        let activates = vec![("later".to_owned(), later), ("earlier".to_owned(), spec(0))];
        let names = get_activate_extension(&url, &[], "", &activates);
        assert_eq!(names, vec!["later".to_owned(), "earlier".to_owned()]);
    }

    #[test]
    fn group_mismatch_excludes_from_phase_a() {
        let url = Url::builder().build();
        let only_provider = ActivateSpec {
            group: &["provider"],
            ..spec(0)
        };
        let activates = vec![("p".to_owned(), only_provider)];
        let names = get_activate_extension(&url, &[], "consumer", &activates);
        assert!(names.is_empty());
    }

    #[test]
    fn value_key_requires_matching_url_parameter() {
        let url = Url::builder().parameter("cache", "lru").build();
        let needs_cache = ActivateSpec {
            value: &["cache"],
            ..spec(0)
        };
        let activates = vec![("c".to_owned(), needs_cache)];
        let names = get_activate_extension(&url, &[], "", &activates);
        assert_eq!(names, vec!["c".to_owned()]);

        let empty_url = Url::builder().build();
        let names = get_activate_extension(&empty_url, &[], "", &activates);
        assert!(names.is_empty());
    }

    #[test]
    fn value_key_matches_a_group_prefixed_parameter_too() {
        let url = Url::builder().parameter("consumer.cache", "lru").build();
        let needs_cache = ActivateSpec {
            value: &["cache"],
            ..spec(0)
        };
        let activates = vec![("c".to_owned(), needs_cache)];
        let names = get_activate_extension(&url, &[], "", &activates);
        assert_eq!(names, vec!["c".to_owned()]);
    }
}
