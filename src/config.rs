//! Configuration and error reporting
//!
//! The drivers can be configured at runtime using environment variables or
//! by using functions in this module. Options set by calling functions in this
//! module override options set in environment variables, and thread-local
//! options override process-wide ones.
//!
//! ```
//! use gdal_frmts::config::*;
//!
//! // Cap the buffer used for interlaced PNG images at 64Mb
//! set_config_option("GDAL_PNG_MAX_FULL_IMAGE_BYTES", "67108864").unwrap();
//!
//! assert_eq!(
//!     get_config_option("GDAL_PNG_MAX_FULL_IMAGE_BYTES", "").unwrap(),
//!     "67108864"
//! );
//!
//! // Set the option back to default
//! clear_config_option("GDAL_PNG_MAX_FULL_IMAGE_BYTES").unwrap();
//!
//! // Check the option has been cleared
//! assert_eq!(
//!     get_config_option("GDAL_PNG_MAX_FULL_IMAGE_BYTES", "XXX").unwrap(),
//!     "XXX"
//! );
//! ```
//!
//! Messages produced by the drivers (warnings, debug traces and failures) go to
//! the error handler installed with [`set_error_handler`]. Without a handler they
//! are forwarded to the [`log`] facade.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::errors::{CplErrType, CplErrorNum, GdalError, Result};

static CONFIG_OPTIONS: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(Default::default);

thread_local! {
    static THREAD_LOCAL_OPTIONS: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
    static QUIET_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn check_key_value(key: &str, value: Option<&str>) -> Result<()> {
    if key.is_empty() || key.contains('\0') {
        return Err(GdalError::BadArgument(format!(
            "Invalid configuration key: '{}'",
            key.escape_debug()
        )));
    }
    if let Some(value) = value {
        if value.contains('\0') {
            return Err(GdalError::BadArgument(format!(
                "Invalid configuration value for '{key}'"
            )));
        }
    }
    Ok(())
}

fn global_options() -> std::sync::MutexGuard<'static, HashMap<String, String>> {
    // A panic while holding the lock cannot leave the map half-updated.
    CONFIG_OPTIONS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Set a library configuration option
pub fn set_config_option(key: &str, value: &str) -> Result<()> {
    check_key_value(key, Some(value))?;
    global_options().insert(key.to_string(), value.to_string());
    Ok(())
}

/// Get the value of a library configuration option
///
/// Lookup order is: thread-local option, process-wide option, environment
/// variable. If none is found, `default` is returned.
pub fn get_config_option(key: &str, default: &str) -> Result<String> {
    check_key_value(key, None)?;
    if let Some(value) = THREAD_LOCAL_OPTIONS.with(|opts| opts.borrow().get(key).cloned()) {
        return Ok(value);
    }
    if let Some(value) = global_options().get(key).cloned() {
        return Ok(value);
    }
    Ok(std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

/// Clear the value of a library configuration option
pub fn clear_config_option(key: &str) -> Result<()> {
    check_key_value(key, None)?;
    global_options().remove(key);
    Ok(())
}

/// Set a library configuration option with **thread local** scope
pub fn set_thread_local_config_option(key: &str, value: &str) -> Result<()> {
    check_key_value(key, Some(value))?;
    THREAD_LOCAL_OPTIONS.with(|opts| {
        opts.borrow_mut().insert(key.to_string(), value.to_string());
    });
    Ok(())
}

/// Get the value of a library configuration option with **thread local** scope
///
/// Only the thread-local table is consulted.
pub fn get_thread_local_config_option(key: &str, default: &str) -> Result<String> {
    check_key_value(key, None)?;
    Ok(THREAD_LOCAL_OPTIONS.with(|opts| {
        opts.borrow()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }))
}

/// Clear the value of a library configuration option with **thread local** scope
pub fn clear_thread_local_config_option(key: &str) -> Result<()> {
    check_key_value(key, None)?;
    THREAD_LOCAL_OPTIONS.with(|opts| {
        opts.borrow_mut().remove(key);
    });
    Ok(())
}

type ErrorCallbackType = dyn FnMut(CplErrType, CplErrorNum, &str) + 'static + Send;

/// Static variable that holds the current error callback function
static ERROR_CALLBACK: Lazy<Mutex<Option<Box<ErrorCallbackType>>>> = Lazy::new(Default::default);

/// Set a custom error handler.
///
/// The handler receives every message emitted by the drivers as
/// `(severity, category, message)`. It replaces any previously installed handler.
///
/// The function must be `Send` since it is potentially called from multiple threads.
/// It must not emit messages itself.
pub fn set_error_handler<F>(callback: F)
where
    F: FnMut(CplErrType, CplErrorNum, &str) + 'static + Send,
{
    let mut callback_lock = ERROR_CALLBACK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    callback_lock.replace(Box::new(callback));
}

/// Remove a custom error handler. Messages go back to the `log` facade.
pub fn remove_error_handler() {
    let mut callback_lock = ERROR_CALLBACK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    callback_lock.take();
}

/// Silences the error sink on the current thread until the matching [`pop_quiet`].
pub(crate) fn push_quiet() {
    QUIET_DEPTH.with(|depth| depth.set(depth.get() + 1));
}

pub(crate) fn pop_quiet() {
    QUIET_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
}

/// Emit a message to the error sink.
///
/// Dropped while the current thread is quiet.
pub fn emit(class: CplErrType, number: CplErrorNum, msg: &str) {
    if QUIET_DEPTH.with(Cell::get) > 0 {
        return;
    }
    let mut callback_lock = ERROR_CALLBACK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(callback) = callback_lock.as_mut() {
        callback(class, number, msg);
        return;
    }
    drop(callback_lock);

    match class {
        CplErrType::Failure | CplErrType::Fatal => log::error!("{msg}"),
        CplErrType::Warning => log::warn!("{msg}"),
        CplErrType::Debug => log::debug!("{msg}"),
        CplErrType::None => log::trace!("{msg}"),
    }
}

/// Emit a warning to the error sink.
pub(crate) fn warn(number: CplErrorNum, msg: &str) {
    emit(CplErrType::Warning, number, msg);
}

/// Emit a debug trace for `category` (typically a driver short name).
///
/// Traces are only emitted when the `CPL_DEBUG` option is `ON`, or when it
/// names `category` explicitly (`CPL_DEBUG=PNG`).
pub fn cpl_debug(category: &str, msg: &str) {
    let setting = get_config_option("CPL_DEBUG", "OFF").unwrap_or_default();
    let enabled = setting.eq_ignore_ascii_case(category)
        || ["ON", "YES", "TRUE", "1"]
            .iter()
            .any(|on| setting.eq_ignore_ascii_case(on));
    if enabled {
        emit(
            CplErrType::Debug,
            CplErrorNum::None,
            &format!("{category}: {msg}"),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_config_options() {
        // We cannot test different global config scenarios in parallel since we modify a
        // global config state. Therefore, we test the config option behavior sequentially
        // to avoid data races.

        test_set_get_option();

        test_set_option_with_embedded_nul();

        test_clear_option();

        test_set_get_option_thread_local();

        test_clear_option_thread_local();

        test_debug_gating();
    }

    fn test_set_get_option() {
        assert!(set_config_option("GDAL_CACHEMAX", "128").is_ok());
        assert_eq!(
            get_config_option("GDAL_CACHEMAX", "").unwrap_or_else(|_| "".to_string()),
            "128"
        );
        assert_eq!(
            get_config_option("NON_EXISTANT_OPTION", "DEFAULT_VALUE")
                .unwrap_or_else(|_| "".to_string()),
            "DEFAULT_VALUE"
        );
    }

    fn test_set_option_with_embedded_nul() {
        assert!(set_config_option("f\0oo", "valid").is_err());
        assert!(set_config_option("foo", "in\0valid").is_err());
        assert!(set_config_option("xxxf\0oo", "in\0valid").is_err());
    }

    fn test_clear_option() {
        assert!(set_config_option("TEST_OPTION", "256").is_ok());
        assert_eq!(
            get_config_option("TEST_OPTION", "DEFAULT").unwrap_or_else(|_| "".to_string()),
            "256"
        );
        assert!(clear_config_option("TEST_OPTION").is_ok());
        assert_eq!(
            get_config_option("TEST_OPTION", "DEFAULT").unwrap_or_else(|_| "".to_string()),
            "DEFAULT"
        );
    }

    fn test_set_get_option_thread_local() {
        assert!(set_thread_local_config_option("GDAL_CACHEMAX", "256").is_ok());

        assert_eq!(
            get_thread_local_config_option("GDAL_CACHEMAX", "").unwrap_or_else(|_| "".to_string()),
            "256"
        );
        // test override for global getter
        assert_eq!(
            get_config_option("GDAL_CACHEMAX", "").unwrap_or_else(|_| "".to_string()),
            "256"
        );

        assert_eq!(
            get_thread_local_config_option("NON_EXISTANT_OPTION", "DEFAULT_VALUE")
                .unwrap_or_else(|_| "".to_string()),
            "DEFAULT_VALUE"
        );
    }

    fn test_clear_option_thread_local() {
        assert!(set_thread_local_config_option("TEST_OPTION", "256").is_ok());
        assert!(clear_thread_local_config_option("TEST_OPTION").is_ok());

        assert_eq!(
            get_thread_local_config_option("TEST_OPTION", "DEFAULT")
                .unwrap_or_else(|_| "".to_string()),
            "DEFAULT"
        );
        assert_eq!(
            get_config_option("TEST_OPTION", "DEFAULT").unwrap_or_else(|_| "".to_string()),
            "DEFAULT"
        );
    }

    fn test_debug_gating() {
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        set_error_handler(move |class, _, msg| {
            if class == CplErrType::Debug {
                sink.lock().unwrap().push(msg.to_string());
            }
        });

        set_thread_local_config_option("CPL_DEBUG", "OFF").unwrap();
        cpl_debug("PNG", "hidden");
        set_thread_local_config_option("CPL_DEBUG", "PNG").unwrap();
        cpl_debug("PNG", "shown");
        cpl_debug("ENVI", "hidden too");
        set_thread_local_config_option("CPL_DEBUG", "ON").unwrap();
        cpl_debug("ENVI", "all shown");
        clear_thread_local_config_option("CPL_DEBUG").unwrap();

        remove_error_handler();

        assert_eq!(
            *messages.lock().unwrap(),
            vec!["PNG: shown".to_string(), "ENVI: all shown".to_string()]
        );
    }
}
