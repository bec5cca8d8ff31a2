// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::float_cmp)] // Exact test constants

//! C API session tests
//!
//! The native runtime is supplied as an `ArdkNativeRuntime` function table
//! implemented in Rust, the way a host engine would. Callbacks are fired
//! through the function pointers the bridge registers via `set_callback`.

use std::collections::HashMap;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use ardk::native::{FailureCallback, HandleArrayCallback, HandleCallback, NativeHandle};
use ardk_c::*;

const SESSION_HANDLE: u64 = 1000;

// =============================================================================
// Fake native runtime
// =============================================================================

#[derive(Default)]
struct FakeNative {
    next: AtomicU64,
    run_calls: AtomicUsize,
    removed: Mutex<Vec<u64>>,
    released_session: AtomicUsize,
    /// kind -> (context, callback)
    callbacks: Mutex<HashMap<u32, (usize, usize)>>,
    /// handle -> outstanding references
    outstanding: Mutex<HashMap<u64, i64>>,
    no_depth: bool,
}

impl FakeNative {
    fn new() -> Box<Self> {
        Box::new(Self {
            next: AtomicU64::new(1),
            ..Self::default()
        })
    }

    fn hand_out(&self) -> u64 {
        let handle = self.next.fetch_add(1, Ordering::SeqCst);
        self.hand_out_again(handle);
        handle
    }

    fn hand_out_again(&self, handle: u64) {
        *self.outstanding.lock().unwrap().entry(handle).or_insert(0) += 1;
    }

    fn outstanding_total(&self) -> i64 {
        self.outstanding.lock().unwrap().values().sum()
    }

    fn registered(&self, kind: ArdkCallbackKind) -> Option<(usize, usize)> {
        self.callbacks.lock().unwrap().get(&(kind as u32)).copied()
    }

    fn fire_frame(&self) -> u64 {
        let frame = self.hand_out();
        let (ctx, cb) = self
            .registered(ArdkCallbackKind::ArdkCallbackFrameUpdated)
            .expect("frame callback registered");
        unsafe {
            let cb: HandleCallback = std::mem::transmute(cb as *const c_void);
            cb(ctx as *mut c_void, NativeHandle::from_raw(frame));
        }
        frame
    }

    fn fire_batch(&self, kind: ArdkCallbackKind, handles: &[u64]) {
        for h in handles {
            self.hand_out_again(*h);
        }
        let (ctx, cb) = self.registered(kind).expect("batch callback registered");
        let handles: Vec<NativeHandle> = handles.iter().map(|h| NativeHandle::from_raw(*h)).collect();
        unsafe {
            let cb: HandleArrayCallback = std::mem::transmute(cb as *const c_void);
            cb(ctx as *mut c_void, handles.as_ptr(), handles.len() as u64);
        }
    }

    fn fire_failed(&self, code: u64) {
        let (ctx, cb) = self
            .registered(ArdkCallbackKind::ArdkCallbackFailed)
            .expect("failure callback registered");
        unsafe {
            let cb: FailureCallback = std::mem::transmute(cb as *const c_void);
            cb(ctx as *mut c_void, code);
        }
    }
}

unsafe fn native<'a>(ud: *mut c_void) -> &'a FakeNative {
    &*ud.cast::<FakeNative>()
}

fn anchor_uuid(handle: u64) -> ArdkUuid {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&handle.to_le_bytes());
    bytes[8] = 0xA0;
    ArdkUuid { bytes }
}

unsafe extern "C" fn init_session(_stage: *const ArdkUuid, _playback: bool, _ud: *mut c_void) -> u64 {
    SESSION_HANDLE
}

unsafe extern "C" fn release_session(_session: u64, ud: *mut c_void) {
    native(ud).released_session.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn run(_s: u64, _c: *const ArdkConfiguration, _o: u64, ud: *mut c_void) {
    native(ud).run_calls.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn pause(_s: u64, _ud: *mut c_void) {}

unsafe extern "C" fn set_callback(
    _session: u64,
    kind: u32,
    context: *mut c_void,
    callback: *const c_void,
    ud: *mut c_void,
) {
    native(ud)
        .callbacks
        .lock()
        .unwrap()
        .insert(kind, (context as usize, callback as usize));
}

unsafe extern "C" fn create_anchor(_t: *const ArdkTransform, ud: *mut c_void) -> u64 {
    native(ud).hand_out()
}

unsafe extern "C" fn add_anchor(_s: u64, _a: u64, _ud: *mut c_void) {}

unsafe extern "C" fn remove_anchor(_s: u64, anchor: u64, ud: *mut c_void) {
    native(ud).removed.lock().unwrap().push(anchor);
}

unsafe extern "C" fn release(_kind: u32, handle: u64, ud: *mut c_void) {
    *native(ud).outstanding.lock().unwrap().entry(handle).or_insert(0) -= 1;
}

unsafe extern "C" fn anchor_info(anchor: u64, out: *mut ArdkAnchorInfo, _ud: *mut c_void) -> bool {
    *out = ArdkAnchorInfo {
        identifier: anchor_uuid(anchor),
        ..ArdkAnchorInfo::default()
    };
    true
}

unsafe extern "C" fn frame_info(frame: u64, out: *mut ArdkFrameInfo, _ud: *mut c_void) -> bool {
    *out = ArdkFrameInfo {
        timestamp: frame as f64 * 0.5,
        ..ArdkFrameInfo::default()
    };
    true
}

unsafe extern "C" fn camera_info(_c: u64, out: *mut ArdkCameraInfo, _ud: *mut c_void) -> bool {
    *out = ArdkCameraInfo::default();
    true
}

unsafe extern "C" fn map_info(map: u64, out: *mut ArdkMapInfo, _ud: *mut c_void) -> bool {
    *out = ArdkMapInfo {
        identifier: anchor_uuid(map),
        ..ArdkMapInfo::default()
    };
    true
}

unsafe extern "C" fn mesh_blocks(_m: u64, _out: *mut ArdkMeshBlock, _cap: u32, _ud: *mut c_void) -> u32 {
    0
}

unsafe extern "C" fn capabilities(out: *mut ArdkCapabilities, ud: *mut c_void) -> bool {
    (*out).depth = !native(ud).no_depth;
    true
}

fn vtable(fake: &FakeNative) -> ArdkNativeRuntime {
    ArdkNativeRuntime {
        init_session: Some(init_session),
        release_session: Some(release_session),
        run: Some(run),
        pause: Some(pause),
        mark_frame_consumed: None,
        set_callback: Some(set_callback),
        create_anchor: Some(create_anchor),
        add_anchor: Some(add_anchor),
        remove_anchor: Some(remove_anchor),
        release: Some(release),
        anchor_info: Some(anchor_info),
        frame_info: Some(frame_info),
        camera_info: Some(camera_info),
        map_info: Some(map_info),
        mesh_blocks: Some(mesh_blocks),
        awareness_status: None,
        capabilities: Some(capabilities),
        user_data: (fake as *const FakeNative).cast_mut().cast::<c_void>(),
    }
}

// =============================================================================
// Listener side
// =============================================================================

#[derive(Default)]
struct Seen {
    ran: AtomicUsize,
    frames: Mutex<Vec<f64>>,
    removed: Mutex<Vec<ArdkUuid>>,
    failures: Mutex<Vec<u64>>,
}

unsafe fn seen<'a>(ud: *mut c_void) -> &'a Seen {
    &*ud.cast::<Seen>()
}

unsafe extern "C" fn on_ran(ud: *mut c_void) {
    seen(ud).ran.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn on_frame(timestamp: f64, _frame: u64, ud: *mut c_void) {
    seen(ud).frames.lock().unwrap().push(timestamp);
}

unsafe extern "C" fn on_removed(ids: *const ArdkUuid, count: usize, ud: *mut c_void) {
    let ids = std::slice::from_raw_parts(ids, count);
    seen(ud).removed.lock().unwrap().extend_from_slice(ids);
}

unsafe extern "C" fn on_failed(code: u64, ud: *mut c_void) {
    seen(ud).failures.lock().unwrap().push(code);
}

fn listener(seen: &Seen) -> ArdkSessionListener {
    ArdkSessionListener {
        on_ran: Some(on_ran),
        on_paused: None,
        on_failed: Some(on_failed),
        on_deinitialized: None,
        on_frame_updated: Some(on_frame),
        on_mesh_updated: None,
        on_anchors_added: None,
        on_anchors_updated: None,
        on_anchors_removed: Some(on_removed),
        on_anchors_merged: None,
        on_maps_added: None,
        on_maps_updated: None,
        on_tracking_state_changed: None,
        on_interrupted: None,
        on_interruption_ended: None,
        on_relocalization_query: None,
        user_data: (seen as *const Seen).cast_mut().cast::<c_void>(),
    }
}

struct Fixture {
    fake: Box<FakeNative>,
    seen: Box<Seen>,
    runtime: *mut ArdkRuntime,
    session: *mut ArdkSession,
}

impl Fixture {
    fn new(fake: Box<FakeNative>) -> Self {
        let seen = Box::<Seen>::default();
        unsafe {
            let table = vtable(&fake);
            let runtime = ardk_runtime_create(&table);
            assert!(!runtime.is_null());
            let session = ardk_session_create(runtime, ptr::null(), false);
            assert!(!session.is_null());
            let l = listener(&seen);
            assert_eq!(ardk_session_set_listener(session, &l), ArdkError::ArdkOk);
            Self {
                fake,
                seen,
                runtime,
                session,
            }
        }
    }

    fn run(&self, configuration: ArdkConfiguration) -> ArdkError {
        unsafe { ardk_session_run(self.session, &configuration, 0) }
    }

    fn drain(&self) -> usize {
        unsafe { ardk_session_drain_callbacks(self.session) }
    }

    fn state(&self) -> ArdkSessionState {
        unsafe { ardk_session_state(self.session) }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        unsafe {
            ardk_session_destroy(self.session);
            ardk_runtime_destroy(self.runtime);
        }
    }
}

fn world_tracking() -> ArdkConfiguration {
    ArdkConfiguration {
        world_tracking: true,
        ..ArdkConfiguration::default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_runtime_rejects_incomplete_table() {
    let fake = FakeNative::new();
    let mut table = vtable(&fake);
    table.release = None;
    let runtime = unsafe { ardk_runtime_create(&table) };
    assert!(runtime.is_null());
}

#[test]
fn test_run_frame_and_dispose() {
    let fx = Fixture::new(FakeNative::new());
    assert_eq!(fx.state(), ArdkSessionState::ArdkStateIdle);
    assert!(fx
        .fake
        .registered(ArdkCallbackKind::ArdkCallbackFailed)
        .is_some());

    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkOk);
    assert_eq!(fx.state(), ArdkSessionState::ArdkStateRunning);
    assert_eq!(fx.fake.run_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.seen.ran.load(Ordering::SeqCst), 1);

    let frame = fx.fake.fire_frame();
    assert!(fx.seen.frames.lock().unwrap().is_empty(), "delivered before drain");
    assert!(fx.drain() >= 1);
    assert_eq!(*fx.seen.frames.lock().unwrap(), vec![frame as f64 * 0.5]);

    unsafe {
        assert_eq!(ardk_session_dispose(fx.session), ArdkError::ArdkOk);
    }
    assert_eq!(fx.state(), ArdkSessionState::ArdkStateDisposed);
    assert_eq!(fx.fake.outstanding_total(), 0);
    assert_eq!(fx.fake.released_session.load(Ordering::SeqCst), 1);
    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkSessionDisposed);
}

#[test]
fn test_validation_failure_keeps_state() {
    let mut fake = FakeNative::new();
    fake.no_depth = true;
    let fx = Fixture::new(fake);

    let config = ArdkConfiguration {
        depth_enabled: true,
        ..world_tracking()
    };
    assert_eq!(fx.run(config), ArdkError::ArdkValidationFailed);
    assert_eq!(fx.state(), ArdkSessionState::ArdkStateIdle);
    assert_eq!(fx.fake.run_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_add_then_remove_anchor() {
    let fx = Fixture::new(FakeNative::new());
    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkOk);

    let mut id = ArdkUuid::default();
    let mut handle = 0u64;
    let transform = ArdkTransform::default();
    unsafe {
        assert_eq!(
            ardk_session_add_anchor(fx.session, &transform, &mut id, &mut handle),
            ArdkError::ArdkOk
        );
    }
    assert_eq!(id, anchor_uuid(handle));

    let mut ids: *mut ArdkUuid = ptr::null_mut();
    let mut count = 0usize;
    unsafe {
        assert_eq!(
            ardk_session_anchor_ids(fx.session, &mut ids, &mut count),
            ArdkError::ArdkOk
        );
        assert_eq!(count, 1);
        assert_eq!(*ids, id);
        ardk_free(ids.cast::<c_void>());
    }

    unsafe {
        assert_eq!(ardk_session_remove_anchor(fx.session, &id), ArdkError::ArdkOk);
    }
    assert_eq!(*fx.fake.removed.lock().unwrap(), vec![handle]);

    fx.fake
        .fire_batch(ArdkCallbackKind::ArdkCallbackAnchorsRemoved, &[handle]);
    fx.drain();
    assert_eq!(*fx.seen.removed.lock().unwrap(), vec![id]);

    unsafe {
        assert_eq!(
            ardk_session_anchor_ids(fx.session, &mut ids, &mut count),
            ArdkError::ArdkOk
        );
        assert_eq!(count, 0);
        assert!(ids.is_null());
        assert_eq!(
            ardk_session_remove_anchor(fx.session, &id),
            ArdkError::ArdkNotFound
        );
    }
    assert_eq!(fx.fake.outstanding_total(), 0);
}

#[test]
fn test_failure_is_terminal() {
    let fx = Fixture::new(FakeNative::new());
    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkOk);

    fx.fake.fire_failed(101);
    fx.drain();

    assert_eq!(fx.state(), ArdkSessionState::ArdkStateFailed);
    assert_eq!(*fx.seen.failures.lock().unwrap(), vec![101]);

    let mut code = 0u64;
    unsafe {
        assert_eq!(ardk_session_failure(fx.session, &mut code), ArdkError::ArdkOk);
    }
    assert_eq!(code, 101);
    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkSessionFailed);
}

#[test]
fn test_cleared_listener_stops_delivery() {
    let fx = Fixture::new(FakeNative::new());
    assert_eq!(fx.run(world_tracking()), ArdkError::ArdkOk);

    unsafe {
        assert_eq!(ardk_session_clear_listener(fx.session), ArdkError::ArdkOk);
    }
    fx.fake.fire_frame();
    fx.drain();
    assert!(fx.seen.frames.lock().unwrap().is_empty());
}

#[test]
fn test_stage_identifier_and_awareness() {
    let fx = Fixture::new(FakeNative::new());

    let mut stage = ArdkUuid::default();
    unsafe {
        assert_eq!(
            ardk_session_stage_identifier(fx.session, &mut stage),
            ArdkError::ArdkOk
        );
    }
    assert_ne!(stage, ArdkUuid::default());
    assert_eq!(
        unsafe { ardk_session_native_handle(fx.session) },
        SESSION_HANDLE
    );

    let mut status = 0u32;
    let mut error = 7u32;
    let mut message = [1 as std::os::raw::c_char; 8];
    unsafe {
        assert_eq!(
            ardk_session_awareness_status(
                fx.session,
                &mut status,
                &mut error,
                message.as_mut_ptr(),
                message.len(),
            ),
            ArdkError::ArdkOk
        );
    }
    // No awareness entry in the table: reported ready.
    assert_eq!(status, 3);
    assert_eq!(error, 0);
    assert_eq!(message[0], 0);
}

#[derive(Default)]
struct LocationLog {
    attached: Mutex<Vec<(ArdkUuid, u64)>>,
    detached: AtomicUsize,
}

unsafe extern "C" fn location_attach(stage: *const ArdkUuid, session: u64, user_data: *mut c_void) {
    let log = &*user_data.cast::<LocationLog>();
    log.attached.lock().unwrap().push((*stage, session));
}

unsafe extern "C" fn location_detach(user_data: *mut c_void) {
    let log = &*user_data.cast::<LocationLog>();
    log.detached.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_location_service_attaches_once() {
    let fx = Fixture::new(FakeNative::new());
    let log = Box::<LocationLog>::default();
    let service = ArdkLocationService {
        attach: Some(location_attach),
        detach: Some(location_detach),
        user_data: (&*log as *const LocationLog).cast_mut().cast::<c_void>(),
    };

    unsafe {
        assert!(!ardk_session_location_service_attached(fx.session));
        assert_eq!(
            ardk_session_setup_location_service(fx.session, &service),
            ArdkError::ArdkOk
        );
        assert_eq!(
            ardk_session_setup_location_service(fx.session, &service),
            ArdkError::ArdkLocationAlreadyAttached
        );
        assert!(ardk_session_location_service_attached(fx.session));
    }

    let mut stage = ArdkUuid::default();
    assert_eq!(
        unsafe { ardk_session_stage_identifier(fx.session, &mut stage) },
        ArdkError::ArdkOk
    );
    assert_eq!(*log.attached.lock().unwrap(), vec![(stage, SESSION_HANDLE)]);
    assert_eq!(log.detached.load(Ordering::SeqCst), 0);

    unsafe {
        assert_eq!(ardk_session_dispose(fx.session), ArdkError::ArdkOk);
        assert_eq!(
            ardk_session_setup_location_service(fx.session, &service),
            ArdkError::ArdkSessionDisposed
        );
    }
    assert_eq!(log.detached.load(Ordering::SeqCst), 1);
}

#[test]
fn test_location_service_requires_attach() {
    let fx = Fixture::new(FakeNative::new());
    let service = ArdkLocationService {
        attach: None,
        detach: None,
        user_data: ptr::null_mut(),
    };
    unsafe {
        assert_eq!(
            ardk_session_setup_location_service(fx.session, &service),
            ArdkError::ArdkInvalidArgument
        );
        assert!(!ardk_session_location_service_attached(fx.session));
    }
}
