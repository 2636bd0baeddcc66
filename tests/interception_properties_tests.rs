//! Behavioral properties of interception: transparency, bypass, replace
//! precedence, timing monotonicity, lifecycle idempotency and restoration.

use interpose::{DispatchTable, InstrumentationRecord, InterceptError, MethodInterceptor};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn calculator() -> (Arc<DispatchTable>, Arc<AtomicUsize>) {
    let table = Arc::new(DispatchTable::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    table
        .define_instance("Calculator", "compute", move |inv| {
            counter.fetch_add(1, Ordering::SeqCst);
            let x = inv
                .argument_i64(0)
                .ok_or_else(|| anyhow::anyhow!("compute expects an integer"))?;
            Ok(json!(x + 1))
        })
        .unwrap();
    (table, calls)
}

fn compute(table: &DispatchTable, arg: Value) -> Result<Value, InterceptError> {
    table.call_instance("Calculator", "compute", json!({}), vec![arg])
}

fn recording_interceptor(
    table: &Arc<DispatchTable>,
) -> (MethodInterceptor, Arc<Mutex<Vec<InstrumentationRecord>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let interceptor = MethodInterceptor::for_instance_method(table.clone(), "Calculator", "compute");
    interceptor.set_after_hook(move |_, record| {
        sink.lock().unwrap().push(record);
        Ok(())
    });
    (interceptor, log)
}

#[test]
fn test_compute_doubling_scenario() {
    let (table, _) = calculator();
    let durations = Arc::new(Mutex::new(Vec::new()));
    let names = Arc::new(Mutex::new(Vec::new()));
    let (d, n) = (durations.clone(), names.clone());

    let interceptor = MethodInterceptor::for_instance_method(table.clone(), "Calculator", "compute");
    interceptor.set_before_hook(|inv| {
        let x = inv.argument_i64(0).unwrap_or(0);
        inv.set_argument(0, x * 2);
        Ok(())
    });
    interceptor.set_after_hook(move |_, record| {
        d.lock().unwrap().push(record.duration());
        n.lock().unwrap().push(record.operation_name().to_string());
        Ok(())
    });
    interceptor.install().unwrap();

    assert_eq!(compute(&table, json!(5)).unwrap(), json!(11));
    assert_eq!(durations.lock().unwrap().len(), 1);
    assert_eq!(*names.lock().unwrap(), vec!["compute".to_string()]);
}

#[test]
fn test_operation_error_is_not_masked() {
    let (table, _) = calculator();
    let (interceptor, log) = recording_interceptor(&table);
    interceptor.install().unwrap();

    let err = compute(&table, json!("not a number")).unwrap_err();
    match err {
        InterceptError::Operation(inner) => {
            assert_eq!(inner.to_string(), "compute expects an integer")
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_restoration_after_install_remove() {
    let (table, _) = calculator();
    let (interceptor, log) = recording_interceptor(&table);
    interceptor.set_replace_hook(|_| Ok(json!("replaced")));

    interceptor.install().unwrap();
    assert_eq!(compute(&table, json!(1)).unwrap(), json!("replaced"));
    assert_eq!(log.lock().unwrap().len(), 1);

    interceptor.remove();
    for x in 0..10 {
        assert_eq!(compute(&table, json!(x)).unwrap(), json!(x + 1));
    }
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_double_remove_is_noop() {
    let (table, _) = calculator();
    let (interceptor, _) = recording_interceptor(&table);
    interceptor.install().unwrap();

    assert!(interceptor.remove());
    let after_first = compute(&table, json!(3)).unwrap();
    assert!(!interceptor.remove());
    assert_eq!(compute(&table, json!(3)).unwrap(), after_first);
}

#[test]
fn test_exchange_cannot_bypass_installed_interceptor() {
    let table = Arc::new(DispatchTable::new());
    table.define_type("T", "op", |_| Ok(json!("v1"))).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let interceptor = MethodInterceptor::for_type_method(table.clone(), "T", "op");
    interceptor.set_after_hook(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    interceptor.install().unwrap();

    let key = interceptor.key().clone();
    let swapped = table.exchange(&key, interpose::dispatch::implementation(|_| Ok(json!("v2"))));
    assert!(matches!(
        swapped.err(),
        Some(InterceptError::TargetAlreadyIntercepted { .. })
    ));

    assert_eq!(table.call_type("T", "op", vec![]).unwrap(), json!("v1"));
    assert!(interceptor.is_installed());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(interceptor.remove());
    assert_eq!(table.call_type("T", "op", vec![]).unwrap(), json!("v1"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_before_hook_keeps_argument_count() {
    let table = Arc::new(DispatchTable::new());
    table
        .define_type("Shape", "arity", |inv| Ok(json!(inv.arguments().len())))
        .unwrap();

    let interceptor = MethodInterceptor::for_type_method(table.clone(), "Shape", "arity");
    interceptor.set_before_hook(|inv| {
        assert!(inv.set_argument(2, "extra").is_none());
        assert_eq!(inv.set_argument(0, "first"), Some(json!(1)));
        Ok(())
    });
    interceptor.install().unwrap();

    assert_eq!(
        table.call_type("Shape", "arity", vec![json!(1), json!(2)]).unwrap(),
        json!(2)
    );
}

#[test]
fn test_type_level_record_flag() {
    let table = Arc::new(DispatchTable::new());
    table.define_type("Clock", "now", |_| Ok(json!(0))).unwrap();
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();

    let interceptor = MethodInterceptor::for_type_method(table.clone(), "Clock", "now");
    interceptor.set_after_hook(move |_, record| {
        sink.lock().unwrap().push(record);
        Ok(())
    });
    interceptor.install().unwrap();
    table.call_type("Clock", "now", vec![]).unwrap();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_instance_level());
    assert_eq!(records[0].type_name(), "Clock");
}

#[test]
fn test_records_exclude_hook_time() {
    use std::thread;
    use std::time::Duration;

    let (table, _) = calculator();
    let (interceptor, log) = recording_interceptor(&table);
    interceptor.set_before_hook(|_| {
        thread::sleep(Duration::from_millis(30));
        Ok(())
    });
    interceptor.install().unwrap();

    compute(&table, json!(1)).unwrap();
    let log = log.lock().unwrap();
    assert!(log[0].duration() < 0.030);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_transparency_without_hooks(x in -1_000_000_000i64..1_000_000_000) {
        let (plain, _) = calculator();
        let expected = compute(&plain, json!(x)).unwrap();

        let (table, _) = calculator();
        let interceptor = MethodInterceptor::for_instance_method(table.clone(), "Calculator", "compute");
        interceptor.install().unwrap();

        prop_assert_eq!(compute(&table, json!(x)).unwrap(), expected);
    }

    #[test]
    fn prop_bypass_never_records(args in prop::collection::vec(-1000i64..1000, 1..20)) {
        let (table, _) = calculator();
        let hook_runs = Arc::new(AtomicUsize::new(0));
        let (b, r) = (hook_runs.clone(), hook_runs.clone());

        let (interceptor, log) = recording_interceptor(&table);
        interceptor.set_before_hook(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        interceptor.set_replace_hook(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        interceptor.set_enabled(false);
        interceptor.install().unwrap();

        for x in &args {
            prop_assert_eq!(compute(&table, json!(x)).unwrap(), json!(x + 1));
        }
        prop_assert!(log.lock().unwrap().is_empty());
        prop_assert_eq!(hook_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prop_replace_precedence(x in -1000i64..1000, replacement in "[a-z]{1,12}") {
        let (table, original_calls) = calculator();
        let (interceptor, log) = recording_interceptor(&table);
        interceptor.set_before_hook(|_| Ok(()));
        let value = replacement.clone();
        interceptor.set_replace_hook(move |_| Ok(json!(value.clone())));
        interceptor.install().unwrap();

        prop_assert_eq!(compute(&table, json!(x)).unwrap(), json!(replacement));
        prop_assert_eq!(original_calls.load(Ordering::SeqCst), 0);
        prop_assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn prop_timing_monotonic(calls in 1usize..30) {
        let (table, _) = calculator();
        let (interceptor, log) = recording_interceptor(&table);
        interceptor.install().unwrap();

        for i in 0..calls {
            compute(&table, json!(i)).unwrap();
        }

        let log = log.lock().unwrap();
        prop_assert_eq!(log.len(), calls);
        for record in log.iter() {
            prop_assert!(record.end_time() >= record.start_time());
            prop_assert!(record.duration() >= 0.0);
            let derived = record
                .end_time()
                .duration_since(record.start_time())
                .unwrap()
                .as_secs_f64();
            prop_assert!((record.duration() - derived).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_install_twice_leaves_routing_unchanged(x in -1000i64..1000) {
        let (table, _) = calculator();
        let interceptor = MethodInterceptor::for_instance_method(table.clone(), "Calculator", "compute");
        interceptor.set_replace_hook(|inv| Ok(json!(inv.argument_i64(0).unwrap_or(0) * 3)));
        interceptor.install().unwrap();

        let before = compute(&table, json!(x)).unwrap();
        let is_already_installed = matches!(
            interceptor.install(),
            Err(InterceptError::AlreadyInstalled { .. })
        );
        prop_assert!(is_already_installed);
        prop_assert_eq!(compute(&table, json!(x)).unwrap(), before);
    }
}
