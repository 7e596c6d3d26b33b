#[cfg(test)]
mod tests {
    use defer_action::{
        combine, race, BoxError, DeferAction, DeferActionBuilder, HasPromise, Outcome, Retry, Wait,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::{thread, time::Duration};

    #[test]
    fn delayed_supplier_completes_within_a_bounded_wait() {
        let pending = DeferAction::run(|| {
            thread::sleep(Duration::from_millis(10));
            Ok::<_, BoxError>(42)
        });
        let outcome = pending
            .get_result_within(Duration::from_secs(1))
            .expect("should settle well within a second");
        assert_eq!(outcome.value(), Some(&42));
    }

    #[test]
    fn retry_runs_the_supplier_exactly_its_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let outcome = DeferActionBuilder::new(move || -> Result<i32, BoxError> {
            counted.fetch_add(1, Ordering::SeqCst);
            Err("boom".into())
        })
        .retry(Retry::times(3).wait_for(Duration::from_millis(5)))
        .build()
        .get_result();

        assert!(!outcome.is_value());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn race_returns_the_first_value_and_aborts_the_rest() {
        let slow = |ms: u64, v: i32| {
            DeferAction::builder(move || {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, BoxError>(v)
            })
            .build()
        };
        let result = race(vec![slow(2_000, 1), slow(5, 2), slow(2_000, 3)]);
        assert_eq!(result.get_result().value(), Some(&2));

        thread::sleep(Duration::from_millis(200));
        assert!(result.branches()[0].peek().is_cancelled());
        assert!(result.branches()[2].peek().is_cancelled());
    }

    #[test]
    fn combine_merges_in_slot_order_across_real_threads() {
        let branch = |ms: u64, v: &'static str| {
            DeferAction::builder(move || {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, BoxError>(v)
            })
            .build()
        };
        // the slowest branch is slot 0, so completion order is 2, 1, 0
        let actions = vec![branch(60, "zero"), branch(30, "one"), branch(5, "two")];
        let promises = actions.iter().map(|a| a.promise().clone()).collect();
        let merged = combine(promises, |values| values.join("-"));
        for action in actions {
            action.start();
        }
        assert_eq!(
            merged.get_result().value().map(String::as_str),
            Some("zero-one-two")
        );
    }

    #[test]
    fn map_and_chain_compose_across_actions() {
        let pending = DeferAction::run(|| Ok::<_, BoxError>(6));
        let piped = pending
            .promise()
            .map(|v| v * 7)
            .chain(|v| DeferAction::run(move || Ok::<_, BoxError>(v.to_string())));
        assert_eq!(
            piped.get_result().value().map(String::as_str),
            Some("42")
        );
    }

    #[test]
    fn short_wait_subscription_resolves_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        let pending = DeferAction::run(|| {
            thread::sleep(Duration::from_millis(150));
            Ok::<_, BoxError>(1)
        });
        pending.promise().subscribe(
            Wait::at_most(Duration::from_millis(10)),
            move |outcome: Outcome<i32>| {
                assert!(outcome.is_cancelled());
                counted.fetch_add(1, Ordering::SeqCst);
            },
        );
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
