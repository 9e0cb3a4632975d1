#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

//! C ABI exported to modules, plus the host-side drain functions.
//!
//! printf-style entry points are variadic in C. Stable Rust cannot read C
//! varargs, so `BeaconPrintf` and `BeaconFormatPrintf` render the template
//! with an empty argument list; templates that need arguments are refused
//! and logged.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_short, c_void, CStr};
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, OnceLock};

use bofrt_contracts::BOFRT_ABI_VERSION;
use bofrt_core::{
    printf, store, wide, BufferCursor, DecodeError, FormatBuilder, OutputBuffer, OutputCategory,
    OutputChannel, OpaqueAddr, PlatformPrincipal, RuntimeConfig, SecurityContext,
};

pub const TRUE: c_int = 1;
pub const FALSE: c_int = 0;

#[repr(C)]
#[derive(Debug)]
pub struct datap {
    pub original: *mut c_char,
    pub buffer: *mut c_char,
    pub length: c_int,
    pub size: c_int,
}

/// `original` points at runtime-owned state; `buffer`, `length` and `size`
/// mirror the encoded bytes, their count and the reserved capacity.
#[repr(C)]
#[derive(Debug)]
pub struct formatp {
    pub original: *mut c_char,
    pub buffer: *mut c_char,
    pub length: c_int,
    pub size: c_int,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct bofrt_bytes {
    pub ptr: *mut u8,
    pub len: u32,
}

fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    std::panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("panic caught at the module ABI boundary");
        fallback
    })
}

fn clamp_c_int(n: usize) -> c_int {
    c_int::try_from(n).unwrap_or(c_int::MAX)
}

unsafe fn bytes_as_slice<'a>(ptr: *const c_char, len: c_int) -> &'a [u8] {
    if ptr.is_null() || len <= 0 {
        return &[];
    }
    std::slice::from_raw_parts(ptr as *const u8, len as usize)
}

unsafe fn cstr_bytes<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_bytes())
}

// -------------------------
// Data parser
// -------------------------

/// Runs one decode step against the parser and writes the new position back.
/// On error the parser is left drained, so later reads fail too.
unsafe fn with_cursor<T>(
    parser: *mut datap,
    op: impl FnOnce(&mut BufferCursor<'_>) -> Result<T, DecodeError>,
) -> Option<T> {
    let p = parser.as_mut()?;
    let buf = bytes_as_slice(p.buffer, p.length);
    let mut cursor = BufferCursor::parse(buf);
    let result = op(&mut cursor);
    if !p.buffer.is_null() {
        p.buffer = p.buffer.add(cursor.consumed());
    }
    p.length = clamp_c_int(cursor.remaining_length());
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("BeaconData*: {e}");
            None
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn BeaconDataParse(parser: *mut datap, buffer: *mut c_char, size: c_int) {
    guarded((), || {
        let Some(p) = parser.as_mut() else {
            return;
        };
        let size = if buffer.is_null() { 0 } else { size.max(0) };
        p.original = buffer;
        p.buffer = buffer;
        p.length = size;
        p.size = size;
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconDataInt(parser: *mut datap) -> c_int {
    guarded(0, || with_cursor(parser, |c| c.read_int()).unwrap_or(0))
}

#[no_mangle]
pub unsafe extern "C" fn BeaconDataShort(parser: *mut datap) -> c_short {
    guarded(0, || with_cursor(parser, |c| c.read_short()).unwrap_or(0))
}

#[no_mangle]
pub unsafe extern "C" fn BeaconDataLength(parser: *mut datap) -> c_int {
    guarded(0, || parser.as_ref().map(|p| p.length.max(0)).unwrap_or(0))
}

/// Returns a pointer into the argument buffer, or NULL when the blob does
/// not fit. `size` (if non-null) receives the blob length, 0 on failure.
#[no_mangle]
pub unsafe extern "C" fn BeaconDataExtract(parser: *mut datap, size: *mut c_int) -> *mut c_char {
    guarded(std::ptr::null_mut(), || {
        let blob = with_cursor(parser, |c| {
            c.extract_blob()
                .map(|b| (b.as_ptr() as *mut c_char, b.len()))
        });
        let (ptr, len) = blob.unwrap_or((std::ptr::null_mut(), 0));
        if let Some(size) = size.as_mut() {
            *size = clamp_c_int(len);
        }
        ptr
    })
}

// -------------------------
// Format buffers
// -------------------------

struct FormatSlot {
    builder: FormatBuilder,
    // NUL-terminated copy handed out by BeaconFormatToString.
    snapshot: Option<Box<[u8]>>,
}

unsafe fn format_slot<'a>(obj: *mut formatp) -> Option<&'a mut FormatSlot> {
    let obj = obj.as_ref()?;
    let slot = (obj.original as *mut FormatSlot).as_mut();
    if slot.is_none() {
        log::warn!("format buffer used before alloc or after free");
    }
    slot
}

unsafe fn sync_format(obj: *mut formatp) {
    let Some(slot) = format_slot(obj) else {
        return;
    };
    let Some(obj) = obj.as_mut() else {
        return;
    };
    obj.buffer = slot.builder.as_bytes().as_ptr() as *mut c_char;
    obj.length = clamp_c_int(slot.builder.len());
    obj.size = clamp_c_int(slot.builder.capacity());
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatAlloc(obj: *mut formatp, maxsz: c_int) {
    guarded((), || {
        let Some(o) = obj.as_mut() else {
            return;
        };
        let hint = RuntimeConfig::global().clamp_hint(maxsz.max(0) as usize);
        let slot = Box::new(FormatSlot {
            builder: FormatBuilder::allocate(hint),
            snapshot: None,
        });
        o.original = Box::into_raw(slot) as *mut c_char;
        sync_format(obj);
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatAppend(obj: *mut formatp, data: *const c_char, len: c_int) {
    guarded((), || {
        let Some(slot) = format_slot(obj) else {
            return;
        };
        slot.builder.append_raw(bytes_as_slice(data, len));
        sync_format(obj);
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatInt(obj: *mut formatp, val: c_int) {
    guarded((), || {
        let Some(slot) = format_slot(obj) else {
            return;
        };
        slot.builder.append_int(val);
        sync_format(obj);
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatPrintf(obj: *mut formatp, fmt: *const c_char) {
    guarded((), || {
        let Some(slot) = format_slot(obj) else {
            return;
        };
        let Some(template) = cstr_bytes(fmt) else {
            return;
        };
        let template = String::from_utf8_lossy(template);
        if let Err(e) = slot.builder.append_printf(&template, &[]) {
            log::warn!("BeaconFormatPrintf refused {template:?}: {e}");
        }
        sync_format(obj);
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatReset(obj: *mut formatp) {
    guarded((), || {
        let Some(slot) = format_slot(obj) else {
            return;
        };
        slot.builder.reset();
        sync_format(obj);
    })
}

/// Returns the bytes appended so far. The pointer stays valid until the next
/// `BeaconFormatToString` or `BeaconFormatFree` on the same buffer.
#[no_mangle]
pub unsafe extern "C" fn BeaconFormatToString(obj: *mut formatp, size: *mut c_int) -> *mut c_char {
    guarded(std::ptr::null_mut(), || {
        let Some(slot) = format_slot(obj) else {
            if let Some(size) = size.as_mut() {
                *size = 0;
            }
            return std::ptr::null_mut();
        };
        let mut snap = slot.builder.finalize();
        let len = snap.len();
        snap.push(0);
        let snap = slot.snapshot.insert(snap.into_boxed_slice());
        if let Some(size) = size.as_mut() {
            *size = clamp_c_int(len);
        }
        snap.as_mut_ptr() as *mut c_char
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconFormatFree(obj: *mut formatp) {
    guarded((), || {
        let Some(o) = obj.as_mut() else {
            return;
        };
        if o.original.is_null() {
            log::error!("format buffer released twice or never allocated");
            return;
        }
        let slot = Box::from_raw(o.original as *mut FormatSlot);
        slot.builder.release();
        o.original = std::ptr::null_mut();
        o.buffer = std::ptr::null_mut();
        o.length = 0;
        o.size = 0;
    })
}

// -------------------------
// Output
// -------------------------

static OUTPUT: OnceLock<Mutex<OutputBuffer>> = OnceLock::new();

fn output() -> &'static Mutex<OutputBuffer> {
    OUTPUT.get_or_init(|| {
        Mutex::new(OutputBuffer::new(
            RuntimeConfig::global().output_max_bytes as usize,
        ))
    })
}

fn emit(kind: c_int, data: &[u8]) {
    let Some(category) = OutputCategory::from_raw(kind) else {
        log::warn!("output with unknown callback type {kind:#x} dropped");
        return;
    };
    let Ok(mut out) = output().lock() else {
        log::error!("output buffer lock poisoned");
        return;
    };
    out.output(category, data);
}

#[no_mangle]
pub unsafe extern "C" fn BeaconOutput(kind: c_int, data: *const c_char, len: c_int) {
    guarded((), || emit(kind, bytes_as_slice(data, len)))
}

#[no_mangle]
pub unsafe extern "C" fn BeaconPrintf(kind: c_int, fmt: *const c_char) {
    guarded((), || {
        let Some(template) = cstr_bytes(fmt) else {
            return;
        };
        let template = String::from_utf8_lossy(template);
        match printf::render(&template, &[]) {
            Ok(text) => emit(kind, text.as_bytes()),
            Err(e) => log::warn!("BeaconPrintf refused {template:?}: {e}"),
        }
    })
}

/// Hands the host every record buffered since the last call, encoded as
/// `int category, blob data` pairs. Free with [`bofrt_bytes_free`].
#[no_mangle]
pub unsafe extern "C" fn bofrt_output_take(out: *mut bofrt_bytes) -> c_int {
    guarded(FALSE, || {
        let Some(out) = out.as_mut() else {
            return FALSE;
        };
        let Ok(mut buffered) = output().lock() else {
            log::error!("output buffer lock poisoned");
            return FALSE;
        };
        let stream = buffered.drain_encoded();
        let Ok(len) = u32::try_from(stream.len()) else {
            log::error!("output stream of {} bytes too large", stream.len());
            return FALSE;
        };
        out.ptr = Box::into_raw(stream.into_boxed_slice()) as *mut u8;
        out.len = len;
        TRUE
    })
}

#[no_mangle]
pub unsafe extern "C" fn bofrt_bytes_free(bytes: bofrt_bytes) {
    guarded((), || {
        if bytes.ptr.is_null() {
            return;
        }
        let raw = std::ptr::slice_from_raw_parts_mut(bytes.ptr, bytes.len as usize);
        drop(Box::from_raw(raw));
    })
}

#[no_mangle]
pub extern "C" fn bofrt_abi_version() -> u32 {
    BOFRT_ABI_VERSION
}

// -------------------------
// Security context
// -------------------------

thread_local! {
    static SECURITY: RefCell<SecurityContext<PlatformPrincipal>> =
        RefCell::new(SecurityContext::new(PlatformPrincipal::default()));
}

/// `token` points at a 32-bit principal id (a uid on Linux). NULL is an
/// invalid handle and leaves the thread's principal unchanged.
#[no_mangle]
pub unsafe extern "C" fn BeaconUseToken(token: *mut c_void) -> c_int {
    guarded(FALSE, || {
        if !RuntimeConfig::global().allow_token_swap {
            log::warn!("token swap disabled by configuration");
            return FALSE;
        }
        if token.is_null() {
            log::warn!("BeaconUseToken: NULL token handle rejected");
            return FALSE;
        }
        let principal = (token as *const u32).read_unaligned();
        SECURITY.with(|ctx| {
            let Ok(mut ctx) = ctx.try_borrow_mut() else {
                return FALSE;
            };
            match ctx.activate(principal as usize) {
                Ok(()) => TRUE,
                Err(e) => {
                    log::debug!("BeaconUseToken: {e}");
                    FALSE
                }
            }
        })
    })
}

#[no_mangle]
pub extern "C" fn BeaconRevertToken() {
    guarded((), || {
        SECURITY.with(|ctx| {
            if let Ok(mut ctx) = ctx.try_borrow_mut() {
                ctx.revert();
            }
        })
    })
}

#[no_mangle]
pub extern "C" fn BeaconIsAdmin() -> c_int {
    guarded(FALSE, || {
        SECURITY.with(|ctx| match ctx.try_borrow() {
            Ok(ctx) if ctx.is_elevated() => TRUE,
            _ => FALSE,
        })
    })
}

// -------------------------
// Strings and values
// -------------------------

/// `max` is the destination size in bytes.
#[no_mangle]
pub unsafe extern "C" fn toWideChar(src: *const c_char, dst: *mut u16, max: c_int) -> c_int {
    guarded(FALSE, || {
        let Some(src) = cstr_bytes(src) else {
            return FALSE;
        };
        if dst.is_null() || max <= 0 {
            return FALSE;
        }
        let dst = std::slice::from_raw_parts_mut(dst, max as usize / 2);
        match wide::to_wide(src, dst) {
            Ok(_) => TRUE,
            Err(e) => {
                log::debug!("toWideChar: {e}");
                FALSE
            }
        }
    })
}

unsafe fn value_key<'a>(key: *const c_char) -> Option<&'a str> {
    let bytes = cstr_bytes(key)?;
    match std::str::from_utf8(bytes) {
        Ok(key) => Some(key),
        Err(_) => {
            log::warn!("context store key is not UTF-8");
            None
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn BeaconAddValue(key: *const c_char, ptr: *mut c_void) -> c_int {
    guarded(FALSE, || {
        let Some(key) = value_key(key) else {
            return FALSE;
        };
        if store::global().put(key, OpaqueAddr::from_ptr(ptr)) {
            TRUE
        } else {
            FALSE
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconGetValue(key: *const c_char) -> *mut c_void {
    guarded(std::ptr::null_mut(), || {
        value_key(key)
            .and_then(|key| store::global().get(key))
            .map(|addr| addr.as_ptr())
            .unwrap_or(std::ptr::null_mut())
    })
}

#[no_mangle]
pub unsafe extern "C" fn BeaconRemoveValue(key: *const c_char) -> c_int {
    guarded(FALSE, || {
        let Some(key) = value_key(key) else {
            return FALSE;
        };
        if store::global().remove(key) {
            TRUE
        } else {
            FALSE
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bofrt_core::output::decode_records;
    use bofrt_core::{PackValue, Schema};

    static OUTPUT_LOCK: Mutex<()> = Mutex::new(());

    fn empty_datap() -> datap {
        datap {
            original: std::ptr::null_mut(),
            buffer: std::ptr::null_mut(),
            length: 0,
            size: 0,
        }
    }

    fn empty_formatp() -> formatp {
        formatp {
            original: std::ptr::null_mut(),
            buffer: std::ptr::null_mut(),
            length: 0,
            size: 0,
        }
    }

    fn take_output() -> Vec<(i32, Vec<u8>)> {
        let mut out = bofrt_bytes {
            ptr: std::ptr::null_mut(),
            len: 0,
        };
        assert_eq!(unsafe { bofrt_output_take(&mut out) }, TRUE);
        let stream = unsafe { std::slice::from_raw_parts(out.ptr, out.len as usize) }.to_vec();
        unsafe { bofrt_bytes_free(out) };
        decode_records(&stream)
            .expect("decode output stream")
            .into_iter()
            .map(|(c, d)| (c, d.to_vec()))
            .collect()
    }

    #[test]
    fn data_parser_walks_packed_arguments() {
        let schema = Schema::parse("isz").unwrap();
        let mut args = schema
            .pack(&[
                PackValue::Int(1337),
                PackValue::Short(-3),
                PackValue::Str("lsass".into()),
            ])
            .unwrap();

        let mut p = empty_datap();
        unsafe {
            BeaconDataParse(&mut p, args.as_mut_ptr() as *mut c_char, args.len() as c_int);
            assert_eq!(BeaconDataLength(&mut p), args.len() as c_int);
            assert_eq!(BeaconDataInt(&mut p), 1337);
            assert_eq!(BeaconDataShort(&mut p), -3);

            let mut size = -1;
            let s = BeaconDataExtract(&mut p, &mut size);
            assert_eq!(size, 6);
            assert_eq!(CStr::from_ptr(s).to_bytes(), b"lsass");
            assert_eq!(BeaconDataLength(&mut p), 0);
        }
    }

    #[test]
    fn truncated_extract_returns_null_and_drains() {
        let mut args = vec![10u8, 0, 0, 0, b'a', b'b', 1, 0];
        let mut p = empty_datap();
        unsafe {
            BeaconDataParse(&mut p, args.as_mut_ptr() as *mut c_char, args.len() as c_int);
            let mut size = -1;
            assert!(BeaconDataExtract(&mut p, &mut size).is_null());
            assert_eq!(size, 0);
            assert_eq!(BeaconDataLength(&mut p), 0);
            assert_eq!(BeaconDataShort(&mut p), 0);
        }
    }

    #[test]
    fn data_parser_tolerates_null_and_negative_sizes() {
        let mut p = empty_datap();
        unsafe {
            BeaconDataParse(&mut p, std::ptr::null_mut(), 16);
            assert_eq!(BeaconDataLength(&mut p), 0);
            assert_eq!(BeaconDataInt(&mut p), 0);
            assert_eq!(BeaconDataInt(std::ptr::null_mut()), 0);
            let mut buf = [0u8; 4];
            BeaconDataParse(&mut p, buf.as_mut_ptr() as *mut c_char, -5);
            assert_eq!(BeaconDataLength(&mut p), 0);
        }
    }

    #[test]
    fn format_buffer_lifecycle() {
        let mut f = empty_formatp();
        unsafe {
            BeaconFormatAlloc(&mut f, 4);
            assert!(!f.original.is_null());
            assert!(f.size >= 4);

            BeaconFormatInt(&mut f, 42);
            let prefix = 2u32.to_le_bytes();
            BeaconFormatAppend(&mut f, prefix.as_ptr() as *const c_char, 4);
            BeaconFormatAppend(&mut f, b"AB".as_ptr() as *const c_char, 2);
            BeaconFormatPrintf(&mut f, b" 100%%\0".as_ptr() as *const c_char);
            assert_eq!(f.length, 15);

            let mut size = 0;
            let s = BeaconFormatToString(&mut f, &mut size);
            assert_eq!(size, 15);
            let bytes = std::slice::from_raw_parts(s as *const u8, size as usize);
            assert_eq!(*s.add(size as usize), 0);

            let mut c = BufferCursor::parse(bytes);
            assert_eq!(c.read_int().unwrap(), 42);
            assert_eq!(c.extract_blob().unwrap(), b"AB");
            assert_eq!(c.remaining(), b" 100%");

            BeaconFormatReset(&mut f);
            assert_eq!(f.length, 0);
            BeaconFormatPrintf(&mut f, b"%d\0".as_ptr() as *const c_char);
            assert_eq!(f.length, 0);

            BeaconFormatFree(&mut f);
            assert!(f.original.is_null());
            BeaconFormatFree(&mut f);
            BeaconFormatInt(&mut f, 1);
            assert!(BeaconFormatToString(&mut f, &mut size).is_null());
            assert_eq!(size, 0);
        }
    }

    #[test]
    fn format_grows_past_alloc_size() {
        let mut f = empty_formatp();
        unsafe {
            BeaconFormatAlloc(&mut f, 1);
            let data = [9u8; 300];
            BeaconFormatAppend(&mut f, data.as_ptr() as *const c_char, 300);
            assert_eq!(f.length, 300);
            assert!(f.size >= 300);
            BeaconFormatFree(&mut f);
        }
    }

    #[test]
    fn output_and_printf_reach_the_host() {
        let _lock = OUTPUT_LOCK.lock().unwrap();
        let _ = take_output();
        unsafe {
            BeaconOutput(0x00, b"raw".as_ptr() as *const c_char, 3);
            BeaconPrintf(0x0d, b"denied 100%%\0".as_ptr() as *const c_char);
            BeaconPrintf(0x0d, b"needs %s\0".as_ptr() as *const c_char);
            BeaconOutput(0x55, b"bad".as_ptr() as *const c_char, 3);
            BeaconOutput(0x1e, b"\x82".as_ptr() as *const c_char, 1);
        }
        assert_eq!(
            take_output(),
            vec![
                (0x00, b"raw".to_vec()),
                (0x0d, b"denied 100%".to_vec()),
                (0x1e, b"\x82".to_vec()),
            ]
        );
        assert!(take_output().is_empty());
    }

    #[test]
    fn values_are_stored_without_ownership() {
        let mut state = 7u64;
        let ptr = &mut state as *mut u64 as *mut c_void;
        let key = b"bofrt-native-test-key\0".as_ptr() as *const c_char;
        unsafe {
            assert!(BeaconGetValue(key).is_null());
            assert_eq!(BeaconAddValue(key, ptr), TRUE);
            assert_eq!(BeaconGetValue(key), ptr);
            assert_eq!(BeaconRemoveValue(key), TRUE);
            assert!(BeaconGetValue(key).is_null());
            assert_eq!(BeaconRemoveValue(key), FALSE);
            assert_eq!(BeaconAddValue(std::ptr::null(), ptr), FALSE);
            assert_eq!(BeaconAddValue(b"\xff\0".as_ptr() as *const c_char, ptr), FALSE);
        }
        assert_eq!(state, 7);
    }

    #[test]
    fn wide_conversion_respects_byte_capacity() {
        let mut dst = [0u16; 4];
        unsafe {
            assert_eq!(
                toWideChar(b"abc\0".as_ptr() as *const c_char, dst.as_mut_ptr(), 8),
                TRUE
            );
            assert_eq!(dst, [97, 98, 99, 0]);
            assert_eq!(
                toWideChar(b"abcd\0".as_ptr() as *const c_char, dst.as_mut_ptr(), 8),
                FALSE
            );
        }
    }

    #[test]
    fn abi_version_matches_contract() {
        assert_eq!(bofrt_abi_version(), BOFRT_ABI_VERSION);
    }

    fn token_handle(uid: &u32) -> *mut c_void {
        uid as *const u32 as *mut c_void
    }

    #[test]
    fn null_token_handle_is_rejected() {
        std::thread::spawn(|| unsafe {
            let before = BeaconIsAdmin();
            assert_eq!(BeaconUseToken(std::ptr::null_mut()), FALSE);
            assert_eq!(BeaconIsAdmin(), before);
            // Nothing was activated, so a real handle still goes through.
            #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
            {
                let own = libc::geteuid();
                assert_eq!(BeaconUseToken(token_handle(&own)), TRUE);
                BeaconRevertToken();
            }
        })
        .join()
        .unwrap();
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn token_swap_is_not_nested() {
        std::thread::spawn(|| unsafe {
            let own = libc::geteuid();
            let before = BeaconIsAdmin();
            assert_eq!(BeaconUseToken(token_handle(&own)), TRUE);
            assert_eq!(BeaconUseToken(token_handle(&own)), FALSE);
            assert_eq!(BeaconIsAdmin(), before);
            BeaconRevertToken();
            BeaconRevertToken();
            assert_eq!(BeaconIsAdmin(), before);
            assert_eq!(BeaconUseToken(token_handle(&u32::MAX)), FALSE);
            assert_eq!(BeaconIsAdmin(), before);
        })
        .join()
        .unwrap();
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn token_swap_stays_on_its_thread() {
        use std::sync::mpsc;

        let own = unsafe { libc::geteuid() };
        let (a_active_tx, a_active_rx) = mpsc::channel();
        let (b_done_tx, b_done_rx) = mpsc::channel();
        let (a_reverted_tx, a_reverted_rx) = mpsc::channel();
        let (b_checked_tx, b_checked_rx) = mpsc::channel();

        let a = std::thread::spawn(move || unsafe {
            assert_eq!(BeaconUseToken(token_handle(&own)), TRUE);
            a_active_tx.send(()).unwrap();
            b_done_rx.recv().unwrap();
            // B's activation must not have made A's second swap legal.
            assert_eq!(BeaconUseToken(token_handle(&own)), FALSE);
            BeaconRevertToken();
            a_reverted_tx.send(()).unwrap();
            b_checked_rx.recv().unwrap();
        });

        let b = std::thread::spawn(move || unsafe {
            a_active_rx.recv().unwrap();
            // A's active override is invisible here.
            assert_eq!(libc::geteuid(), own);
            assert_eq!(BeaconUseToken(token_handle(&own)), TRUE);
            b_done_tx.send(()).unwrap();
            a_reverted_rx.recv().unwrap();
            // A's revert left B's override in place.
            assert_eq!(BeaconUseToken(token_handle(&own)), FALSE);
            assert_eq!(libc::geteuid(), own);
            BeaconRevertToken();
            assert_eq!(BeaconUseToken(token_handle(&own)), TRUE);
            BeaconRevertToken();
            b_checked_tx.send(()).unwrap();
        });

        a.join().unwrap();
        b.join().unwrap();
    }
}
