use proptest::prelude::*;
use vigil::diff::{DiffClassification, HunkHeaders, LineState};
use vigil::models::{RulePriority, ScanError, Violation};
use vigil::report::Report;

fn priority() -> impl Strategy<Value = RulePriority> {
    prop::sample::select(RulePriority::ALL.to_vec())
}

prop_compose! {
    fn violation()(file in "[a-c]\\.rs", line in 1usize..50, sev in priority()) -> Violation {
        Violation {
            rule_name: format!("rule-{}", line % 3),
            severity: sev,
            file,
            line,
            message: String::new(),
            external_url: String::new(),
        }
    }
}

prop_compose! {
    fn report()(
        vs in prop::collection::vec(violation(), 0..6),
        es in prop::collection::vec("[a-z]{1,8}", 0..3),
    ) -> Report {
        let mut r = Report::new();
        vs.into_iter().for_each(|v| r.add_violation(v));
        es.into_iter().for_each(|e| r.add_error(ScanError::new(e)));
        r
    }
}

#[derive(Debug, Clone, Copy)]
enum Body {
    Added,
    Removed,
    Context,
}

fn body() -> impl Strategy<Value = Body> {
    prop_oneof![Just(Body::Added), Just(Body::Removed), Just(Body::Context)]
}

proptest! {
    #[test]
    fn join_is_associative(a in report(), b in report(), c in report()) {
        let left = a.clone().join(b.clone()).join(c.clone());
        let right = a.join(b.join(c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn empty_report_is_identity(a in report()) {
        prop_assert_eq!(a.clone().join(Report::default()), a.clone());
        prop_assert_eq!(Report::default().join(a.clone()), a);
    }

    #[test]
    fn join_never_deduplicates(a in report()) {
        let doubled = a.clone().join(a.clone());
        prop_assert_eq!(doubled.violations().len(), 2 * a.violations().len());
        prop_assert_eq!(doubled.errors().len(), 2 * a.errors().len());
    }

    #[test]
    fn hunk_lines_are_counted_skipping_removals(lines in prop::collection::vec(body(), 0..40)) {
        let mut text = String::from("--- a/f\n+++ b/f\n@@ -1 +1 @@\n");
        let mut expected = Vec::new();
        for l in &lines {
            match l {
                Body::Added => { text.push_str("+x\n"); expected.push(LineState::Modified); }
                Body::Removed => text.push_str("-x\n"),
                Body::Context => { text.push_str(" x\n"); expected.push(LineState::Existing); }
            }
        }
        for mode in [HunkHeaders::Skip, HunkHeaders::AsContent] {
            let d = DiffClassification::parse_with(&text, mode);
            prop_assert_eq!(d.has_diffs(), !expected.is_empty());
            for (i, state) in expected.iter().enumerate() {
                prop_assert_eq!(d.state(i + 1), Some(*state));
            }
            prop_assert_eq!(d.state(expected.len() + 1), None);
            prop_assert!(!d.is_line_changed(0) && !d.is_line_existing(0));
        }
    }

    #[test]
    fn priority_order_matches_numeric_value(a in priority(), b in priority()) {
        prop_assert_eq!(a.is_at_least(b), a.value() <= b.value());
        prop_assert_eq!(RulePriority::from_value(a.value()), Some(a));
    }
}
