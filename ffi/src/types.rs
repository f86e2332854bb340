//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Everything handed to the callback is borrowed: the Rust side owns the
//! C strings and byte buffers, passes pointers for the duration of the call,
//! and frees them once the callback returns. The C caller never frees
//! anything it receives through a callback.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use fetch_core::{FetchError, HttpResponse, RequestInstance, ResponseData};

/// Opaque handle to a `RequestInstance` plus the runtime that drives it.
/// C callers receive a pointer to this and pass it back into every call.
pub struct FfiRequestInstance {
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) inner: Arc<RequestInstance>,
}

/// A single response header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Error passed to the callback when no usable response exists.
#[repr(C)]
pub struct FfiFetchError {
    pub code: *const c_char,
    pub message: *const c_char,
}

/// Return code of `fetch_json` / `fetch_data`.
///
/// Only `Ok` means the callback will fire.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDispatchCode {
    Ok = 0,
    NullArg = 1,
    Panic = 2,
}

/// `(user_data, error, status, headers, headers_len, data, data_len)`.
///
/// `error` non-null means `status` is 0, `headers` and `data` are null.
/// Otherwise `data` is null when the response carried no usable body;
/// JSON bodies arrive as JSON text.
pub type FfiFetchCallback = Option<
    extern "C" fn(
        user_data: *mut c_void,
        error: *const FfiFetchError,
        status: u16,
        headers: *const FfiHeader,
        headers_len: u32,
        data: *const u8,
        data_len: usize,
    ),
>;

type CallbackFn = extern "C" fn(*mut c_void, *const FfiFetchError, u16, *const FfiHeader, u32, *const u8, usize);

struct UserData(*mut c_void);

// The pointer is opaque to us and only handed back to the caller's callback.
unsafe impl Send for UserData {}

/// One pending callback. `deliver` consumes it, so it fires at most once.
pub(crate) struct CallbackSink {
    callback: CallbackFn,
    user_data: UserData,
}

impl CallbackSink {
    pub(crate) fn new(callback: CallbackFn, user_data: *mut c_void) -> Self {
        Self {
            callback,
            user_data: UserData(user_data),
        }
    }

    pub(crate) fn deliver(self, outcome: Result<HttpResponse, FetchError>) {
        match outcome {
            Ok(response) => self.deliver_response(response),
            Err(error) => self.deliver_error(&error),
        }
    }

    fn deliver_error(self, error: &FetchError) {
        let code = c_string(error.code());
        let message = c_string(error.message());
        let ffi_error = FfiFetchError {
            code: code.as_ptr(),
            message: message.as_ptr(),
        };
        (self.callback)(
            self.user_data.0,
            &ffi_error,
            0,
            std::ptr::null(),
            0,
            std::ptr::null(),
            0,
        );
    }

    fn deliver_response(self, response: HttpResponse) {
        let owned: Vec<(CString, CString)> = response
            .headers
            .iter()
            .map(|(k, v)| (c_string(k), c_string(v)))
            .collect();
        let headers: Vec<FfiHeader> = owned
            .iter()
            .map(|(k, v)| FfiHeader {
                key: k.as_ptr(),
                value: v.as_ptr(),
            })
            .collect();
        let data = response.data.as_ref().map(data_bytes);
        let (data_ptr, data_len) = match &data {
            Some(bytes) => (bytes.as_ptr(), bytes.len()),
            None => (std::ptr::null(), 0),
        };
        let headers_ptr = if headers.is_empty() {
            std::ptr::null()
        } else {
            headers.as_ptr()
        };

        (self.callback)(
            self.user_data.0,
            std::ptr::null(),
            response.status,
            headers_ptr,
            headers.len() as u32,
            data_ptr,
            data_len,
        );
    }
}

fn data_bytes(data: &ResponseData) -> Vec<u8> {
    match data {
        ResponseData::Json(value) => value.to_string().into_bytes(),
        ResponseData::Text(text) => text.as_bytes().to_vec(),
        ResponseData::Bytes(bytes) => bytes.to_vec(),
    }
}

/// Interior NULs cannot cross as C strings; such values become empty.
fn c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}
