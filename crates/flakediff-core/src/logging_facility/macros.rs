//! Lifecycle logging macros
//!
//! Each boundary operation emits exactly one `start` and one `end` or
//! `end_error` event carrying `component`, `op` and `event`. Callers must
//! depend on `flakediff-core-types` for the event names.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use flakediff_core::log_op_start;
/// log_op_start!("pipeline_run");
/// log_op_start!("checkout_acquire", base_ref = "main");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = flakediff_core_types::schema::EVENT_START
            $(, $($field)+)?
        );
    };
}

/// Log the successful end of an operation; `duration_ms` is mandatory
///
/// # Example
///
/// ```
/// # use flakediff_core::log_op_end;
/// log_op_end!("pipeline_run", duration_ms = 42);
/// log_op_end!("pipeline_run", duration_ms = 42, target_count = 3u64);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = flakediff_core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)+)?
        );
    };
}

/// Log a failed operation with the stable kind, code and reference of the
/// error
///
/// # Example
///
/// ```
/// # use flakediff_core::{log_op_error, errors::FlakeDiffError};
/// let err = FlakeDiffError::Build {
///     reference: ".#hosts.a".to_string(),
///     message: "exit 1".to_string(),
/// };
/// log_op_error!("pipeline_run", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = flakediff_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_reference = ex_err.reference(),
            error = %ex_err
            $(, $($field)+)?
        );
    }};
}
