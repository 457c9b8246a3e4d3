use std::path::Path;
use std::sync::{Arc, Mutex};

use gdal_frmts::errors::{CplErrType, CplErrorNum};
use gdal_frmts::{config, Dataset};

#[test]
fn test_error_handler() {
    // The error handler is process wide, so the scenarios run sequentially.

    use_error_handler();

    driver_errors_reach_handler();

    error_handler_interleaved();
}

fn use_error_handler() {
    let errors: Arc<Mutex<Vec<(CplErrType, CplErrorNum, String)>>> =
        Arc::new(Mutex::new(Vec::new()));

    let errors_clone = errors.clone();

    config::set_error_handler(move |a, b, c| {
        errors_clone.lock().unwrap().push((a, b, c.to_string()));
    });

    config::emit(CplErrType::Failure, CplErrorNum::AppDefined, "foo");
    config::emit(CplErrType::Warning, CplErrorNum::FileIO, "bar");

    config::remove_error_handler();

    config::emit(CplErrType::Failure, CplErrorNum::AppDefined, "to the log");

    let result = errors.lock().unwrap().clone();
    assert_eq!(
        result,
        vec![
            (CplErrType::Failure, CplErrorNum::AppDefined, "foo".to_string()),
            (CplErrType::Warning, CplErrorNum::FileIO, "bar".to_string())
        ]
    );
}

fn driver_errors_reach_handler() {
    let errors: Arc<Mutex<Vec<(CplErrType, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    config::set_error_handler(move |class, _, msg| {
        errors_clone.lock().unwrap().push((class, msg.to_string()));
    });

    let header = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/envi_missing.hdr");
    assert!(Dataset::open(header).is_err());

    config::remove_error_handler();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, CplErrType::Failure);
    assert!(errors[0].1.contains("envi_missing.raw"), "{}", errors[0].1);
}

fn error_handler_interleaved() {
    use std::thread;
    // Two racing threads trying to set error handlers
    // First one
    thread::spawn(move || loop {
        config::set_error_handler(move |_a, _b, _c| {});
    });

    // Second one
    thread::spawn(move || loop {
        config::set_error_handler(move |_a, _b, _c| {});
    });

    // A thread that provokes potential race conditions
    let join_handle = thread::spawn(move || {
        for _ in 0..100 {
            config::emit(CplErrType::Failure, CplErrorNum::AppDefined, "foo");
            config::emit(CplErrType::Warning, CplErrorNum::AppDefined, "bar");
        }
    });

    join_handle.join().unwrap();
}
