//! Table-driven test helpers shared by the opgraph crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Run a list of test cases, collecting the ones that panic.
///
/// Shape inference tests typically check one rule against many input shapes.
/// Writing each as a separate `#[test]` is noisy, and a single loop with
/// `assert!`s stops at the first failure. `TestCases` runs every case, then
/// panics once with the debug representation of all failing cases.
///
/// ```
/// use opgraph_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     lhs: usize,
///     rhs: usize,
///     broadcast: usize,
/// }
///
/// let cases = [
///     Case { lhs: 1, rhs: 5, broadcast: 5 },
///     Case { lhs: 4, rhs: 1, broadcast: 4 },
///     Case { lhs: 3, rhs: 3, broadcast: 3 },
/// ];
///
/// cases.test_each(|case| {
///     assert_eq!(case.lhs.max(case.rhs), case.broadcast);
/// });
/// ```
///
/// Cases are passed by reference to [`test_each`](TestCases::test_each), so a
/// failing case can still be printed afterwards. Use
/// [`test_each_clone`](TestCases::test_each_clone) or
/// [`test_each_value`](TestCases::test_each_value) when the test needs an
/// owned case.
///
/// Cases and anything captured by the test closure must be unwind safe. Graph
/// handles that are not can be created inside the closure instead, or wrapped
/// in [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Call `test` with a clone of each case.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;

    /// Call `test` with each case by value.
    ///
    /// The case is formatted before the call so it can be reported if the
    /// test panics.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Clone + Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let owned = case.clone();
                std::panic::catch_unwind(move || test(owned)).is_err()
            })
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let mut failures = Vec::new();
        for case in self {
            let desc = format!("{:?}", case);
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(desc);
            }
        }
        report_failures(&failures);
    }
}
