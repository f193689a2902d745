use super::logger;
use crate::roc::MetaPoolCb;
use std::os::raw::{c_char, c_int};
use std::sync::{Arc, Mutex, RwLock};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGER: Mutex<Option<Option<tracing_chrome::FlushGuard>>> = Mutex::new(None);

static META_POOL_CB: RwLock<Option<Arc<dyn MetaPoolCb>>> = RwLock::new(None);

#[unsafe(no_mangle)]
unsafe extern "C" fn oct_logger_en(statics_lvl: u32) {
    let mut logger_guard = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    if logger_guard.is_some() {
        return;
    }
    let logger = tracing_subscriber::registry().with(logger::default());
    if statics_lvl & 0x1 != 0 {
        let (statics, guard) = logger::statics("oct_inl_ipsec");
        if logger
            .with(statics.with_filter(logger::statics_filter()))
            .try_init()
            .is_ok()
        {
            *logger_guard = Some(Some(guard));
        }
    } else if logger.try_init().is_ok() {
        *logger_guard = Some(None)
    }
}

#[unsafe(no_mangle)]
unsafe extern "C" fn oct_logger_dis() {
    LOGGER.lock().unwrap_or_else(|e| e.into_inner()).take();
}

/// Allocator served through [`oct_pool_inl_meta_pool_cb`].
pub fn install_meta_pool_cb(cb: Arc<dyn MetaPoolCb>) {
    *META_POOL_CB.write().unwrap_or_else(|e| e.into_inner()) = Some(cb);
}

pub fn uninstall_meta_pool_cb() {
    META_POOL_CB.write().unwrap_or_else(|e| e.into_inner()).take();
}

/// Meta buffer pool callback registered with the native inline device.
///
/// # Safety
/// `aura_handle` and `mpool` must be valid for writes, `name` is null or a
/// NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oct_pool_inl_meta_pool_cb(
    aura_handle: *mut u64,
    mpool: *mut usize,
    buf_sz: u32,
    nb_bufs: u32,
    destroy: bool,
    name: *const c_char,
) -> c_int {
    let name = if name.is_null() {
        None
    } else {
        unsafe { std::ffi::CStr::from_ptr(name) }.to_str().ok()
    };
    let cb = META_POOL_CB.read().unwrap_or_else(|e| e.into_inner()).clone();
    let Some(cb) = cb else {
        tracing::warn!(target: logger::INIT_TAR, "meta pool requested before inline device init");
        return -1;
    };
    match cb.call(buf_sz, nb_bufs, destroy, name) {
        Ok(Some(pool)) => {
            unsafe {
                *aura_handle = pool.aura_handle;
                *mpool = pool.base as usize;
            }
            0
        }
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!(target: logger::INIT_TAR, "meta pool {}: {}", name.unwrap_or_default(), e);
            -1
        }
    }
}
