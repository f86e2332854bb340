//! C-ABI wrapper around `fetch-core`.
//!
//! # Overview
//! Exposes `fetch_json` / `fetch_data` through `extern "C"` functions with a
//! completion callback `(user_data, error, status, headers, headers_len, data,
//! data_len)`, so any language with a C FFI can issue requests without
//! touching Rust's async runtime or serde.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Each `FfiRequestInstance` owns a multi-threaded tokio runtime. Fetches
//!   return immediately and the callback fires exactly once on a runtime
//!   thread.
//! - Params and options arrive as JSON text, options in the loose
//!   `OptionsBag` shape. Any argument that cannot be read is reported through
//!   the callback as the configured unknown error.
//! - Freeing an instance shuts its runtime down; callbacks still pending at
//!   that point never fire.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use fetch_core::{FetchError, FetchOptions, HttpConfig, HttpMethod, OptionsBag, Params, RequestInstance};
use tracing::error;

use types::*;

// ---------------------------------------------------------------------------
// Instance lifecycle
// ---------------------------------------------------------------------------

/// Create a new request instance.
///
/// `config_json` may be null for defaults; otherwise it is a JSON object whose
/// keys override the defaults. Returns null if the config cannot be parsed,
/// the runtime cannot start, or an internal panic occurs. The caller must
/// free the returned pointer with `fetch_instance_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_instance_new(config_json: *const c_char) -> *mut FfiRequestInstance {
    catch_unwind(|| {
        let config = if config_json.is_null() {
            HttpConfig::default()
        } else {
            let raw = unsafe { CStr::from_ptr(config_json) }.to_str().unwrap_or("");
            match HttpConfig::from_json(raw) {
                Ok(config) => config,
                Err(e) => {
                    error!(error = %e, "invalid request instance config");
                    return std::ptr::null_mut();
                }
            }
        };
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("fetch-ffi")
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "failed to start runtime");
                return std::ptr::null_mut();
            }
        };
        let inner = Arc::new(RequestInstance::new(Arc::new(config)));
        Box::into_raw(Box::new(FfiRequestInstance { runtime, inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free an instance created by `fetch_instance_new`. Safe to call with null.
///
/// In-flight requests are abandoned and their callbacks never fire.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_instance_free(instance: *mut FfiRequestInstance) {
    if instance.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let instance = unsafe { Box::from_raw(instance) };
        instance.runtime.shutdown_background();
    }));
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Issue a request and deliver the body in the response type named by
/// `options_json` (JSON by default).
///
/// `params_json` and `options_json` may be null. `method` is case-insensitive.
/// Returns `NullArg` without calling back if `instance` or `callback` is null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_json(
    instance: *const FfiRequestInstance,
    callback: FfiFetchCallback,
    user_data: *mut c_void,
    url: *const c_char,
    method: *const c_char,
    params_json: *const c_char,
    options_json: *const c_char,
) -> FfiDispatchCode {
    catch_unwind(AssertUnwindSafe(|| {
        dispatch(
            instance,
            callback,
            user_data,
            url,
            method,
            params_json,
            options_json,
            Delivery::AsRequested,
        )
    }))
    .unwrap_or(FfiDispatchCode::Panic)
}

/// `fetch_json` with the body always delivered as raw bytes.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_data(
    instance: *const FfiRequestInstance,
    callback: FfiFetchCallback,
    user_data: *mut c_void,
    url: *const c_char,
    method: *const c_char,
    params_json: *const c_char,
    options_json: *const c_char,
) -> FfiDispatchCode {
    catch_unwind(AssertUnwindSafe(|| {
        dispatch(
            instance,
            callback,
            user_data,
            url,
            method,
            params_json,
            options_json,
            Delivery::Bytes,
        )
    }))
    .unwrap_or(FfiDispatchCode::Panic)
}

#[derive(Clone, Copy)]
enum Delivery {
    AsRequested,
    Bytes,
}

struct FetchArgs {
    url: String,
    method: HttpMethod,
    params: Option<Params>,
    options: FetchOptions,
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    instance: *const FfiRequestInstance,
    callback: FfiFetchCallback,
    user_data: *mut c_void,
    url: *const c_char,
    method: *const c_char,
    params_json: *const c_char,
    options_json: *const c_char,
    delivery: Delivery,
) -> FfiDispatchCode {
    let Some(callback) = callback else {
        return FfiDispatchCode::NullArg;
    };
    if instance.is_null() {
        return FfiDispatchCode::NullArg;
    }
    let instance = unsafe { &*instance };
    let sink = CallbackSink::new(callback, user_data);
    let inner = Arc::clone(&instance.inner);

    let args = match read_args(url, method, params_json, options_json) {
        Ok(args) => args,
        Err(reason) => {
            error!(%reason, "fetch arguments rejected");
            let unknown = FetchError::Unknown(inner.config().unknown_error.clone());
            instance.runtime.spawn(async move { sink.deliver(Err(unknown)) });
            return FfiDispatchCode::Ok;
        }
    };

    instance.runtime.spawn(async move {
        let FetchArgs {
            url,
            method,
            params,
            options,
        } = args;
        let outcome = match delivery {
            Delivery::AsRequested => inner.fetch_json(&url, method, params, options).await,
            Delivery::Bytes => inner.fetch_data(&url, method, params, options).await,
        };
        sink.deliver(outcome);
    });
    FfiDispatchCode::Ok
}

fn read_args(
    url: *const c_char,
    method: *const c_char,
    params_json: *const c_char,
    options_json: *const c_char,
) -> Result<FetchArgs, String> {
    let url = read_str(url, "url")?.ok_or("null argument: url")?;
    let method = read_str(method, "method")?
        .ok_or("null argument: method")?
        .parse::<HttpMethod>()
        .map_err(|e| e.to_string())?;

    let params = match read_str(params_json, "params")? {
        None => None,
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Null) => None,
            Ok(value) => Some(Params::Fields(value)),
            Err(e) => return Err(format!("invalid params: {e}")),
        },
    };
    let options = match read_str(options_json, "options")? {
        None => FetchOptions::default(),
        Some(raw) => OptionsBag::from_json(raw)
            .map_err(|e| format!("invalid options: {e}"))?
            .into(),
    };

    Ok(FetchArgs {
        url: url.to_string(),
        method,
        params,
        options,
    })
}

/// Null pointers read as `None`; non-UTF-8 input is an error.
fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<Option<&'a str>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(Some)
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
