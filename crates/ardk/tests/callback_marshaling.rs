// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::float_cmp)] // Exact test constants
#![allow(clippy::cast_precision_loss)] // Test timestamps

//! Native callback marshaling integration tests
//!
//! Native events are fired through the registered trampolines, exactly as a
//! runtime thread would, and observed after draining the session queue.

use ardk::native::recording::{RecordingRuntime, RuntimeCall};
use ardk::native::{
    CameraInfo, CameraIntrinsics, CallbackKind, DepthBuffer, FrameInfo, MeshBlock, TrackingState,
};
use ardk::{ArConfiguration, RunOptions, Session, SessionConfig, Transform};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

fn setup() -> (Arc<RecordingRuntime>, Session) {
    let runtime = Arc::new(RecordingRuntime::new());
    let session = Session::new(runtime.clone()).expect("session");
    (runtime, session)
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn cached_ids(session: &Session) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = session.anchors().iter().map(|a| a.identifier()).collect();
    ids.sort();
    ids
}

// =======================================================================
// Frames
// =======================================================================

#[test]
fn test_frames_coalesce_to_newest() {
    let (rt, session) = setup();
    let native = session.native_handle();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    session.on_frame_updated(move |args| s.lock().push(args.frame.timestamp()));

    let frames: Vec<_> = (1..=3).map(|i| rt.new_frame(i as f64)).collect();
    for frame in &frames {
        assert!(rt.fire_frame(native, *frame));
    }
    session.drain_callbacks();

    assert_eq!(*seen.lock(), vec![3.0]);
    assert_eq!(rt.release_count(frames[0]), 1);
    assert_eq!(rt.release_count(frames[1]), 1);
    assert_eq!(rt.outstanding(frames[2]), 1, "current frame still held");
    assert!(rt.calls().contains(&RuntimeCall::MarkFrameConsumed(frames[2])));
    assert_eq!(session.current_frame().unwrap().handle(), frames[2]);
}

#[test]
fn test_depth_point_cloud_generated_for_keyframes() {
    let (rt, session) = setup();
    let native = session.native_handle();
    session
        .run(
            ArConfiguration::world_tracking()
                .with_depth(true)
                .with_depth_point_cloud(true),
            RunOptions::NONE,
        )
        .unwrap();

    let depth = |is_keyframe| DepthBuffer {
        width: 2,
        height: 2,
        depths: vec![1.0, 1.0, 2.0, 0.0],
        intrinsics: CameraIntrinsics {
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
        },
        is_keyframe,
    };

    rt.fire_frame(
        native,
        rt.new_frame_with(FrameInfo {
            timestamp: 1.0,
            camera: CameraInfo::default(),
            depth: Some(depth(true)),
        }),
    );
    session.drain_callbacks();

    let cloud = session
        .current_frame()
        .and_then(|f| f.depth_point_cloud())
        .expect("point cloud");
    // Zero depth is skipped.
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.points[2], [0.0, 2.0, 2.0]);

    rt.fire_frame(
        native,
        rt.new_frame_with(FrameInfo {
            timestamp: 2.0,
            camera: CameraInfo::default(),
            depth: Some(depth(false)),
        }),
    );
    session.drain_callbacks();
    assert!(session.current_frame().unwrap().depth_point_cloud().is_none());
}

#[test]
fn test_no_point_cloud_without_configuration() {
    let (rt, session) = setup();
    let native = session.native_handle();
    session
        .run(ArConfiguration::world_tracking().with_depth(true), RunOptions::NONE)
        .unwrap();

    rt.fire_frame(
        native,
        rt.new_frame_with(FrameInfo {
            timestamp: 1.0,
            camera: CameraInfo::default(),
            depth: Some(DepthBuffer {
                width: 1,
                height: 1,
                depths: vec![1.0],
                intrinsics: CameraIntrinsics {
                    fx: 1.0,
                    fy: 1.0,
                    cx: 0.0,
                    cy: 0.0,
                },
                is_keyframe: true,
            }),
        }),
    );
    session.drain_callbacks();
    assert!(session.current_frame().unwrap().depth_point_cloud().is_none());
}

// =======================================================================
// Disposal With Pending Work
// =======================================================================

#[test]
fn test_dispose_with_queued_callbacks() {
    const N: usize = 16;
    let (rt, session) = setup();
    let native = session.native_handle();

    let notified = counter();
    let n = notified.clone();
    session.on_anchors_added(move |_| {
        n.fetch_add(1, Ordering::SeqCst);
    });
    let f = notified.clone();
    session.on_frame_updated(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    let anchors: Vec<_> = (0..N).map(|_| rt.new_anchor(Uuid::new_v4())).collect();
    for anchor in &anchors {
        rt.fire_batch(native, CallbackKind::AnchorsAdded, &[*anchor]);
    }
    let frame = rt.new_frame(1.0);
    rt.fire_frame(native, frame);
    assert_eq!(session.callback_queue().pending(), N + 1);

    session.dispose();
    session.drain_callbacks();

    assert_eq!(notified.load(Ordering::SeqCst), 0);
    for anchor in &anchors {
        assert_eq!(rt.release_count(*anchor), 1);
    }
    assert_eq!(rt.release_count(frame), 1);
    assert_eq!(rt.outstanding_total(), 0);
    assert!(rt.over_released().is_empty());
}

#[test]
fn test_callbacks_after_dispose_are_not_delivered() {
    let (rt, session) = setup();
    let native = session.native_handle();
    session.dispose();

    // Native side dropped every registration with the session.
    assert!(!rt.fire_frame(native, rt.new_frame(1.0)));
    assert!(!rt.fire_batch(native, CallbackKind::AnchorsAdded, &[rt.new_anchor(Uuid::new_v4())]));
    assert_eq!(rt.outstanding_total(), 0);
}

// =======================================================================
// Anchors
// =======================================================================

#[test]
fn test_anchor_batches_update_cache() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (ha, hb) = (rt.new_anchor(a), rt.new_anchor(b));

    let removed = Arc::new(Mutex::new(Vec::new()));
    let r = removed.clone();
    session.on_anchors_removed(move |args| {
        // Still usable inside the notification.
        for anchor in &args.anchors {
            assert!(!anchor.is_disposed());
            r.lock().push(anchor.identifier());
        }
    });

    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[ha, hb]);
    session.drain_callbacks();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(cached_ids(&session), expected);

    rt.fire_batch(native, CallbackKind::AnchorsRemoved, &[ha]);
    session.drain_callbacks();
    assert_eq!(cached_ids(&session), vec![b]);
    assert_eq!(*removed.lock(), vec![a]);
    assert_eq!(rt.outstanding(ha), 0);
    assert_eq!(rt.outstanding(hb), 1);
}

#[test]
fn test_update_for_unknown_anchor_inserts() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let id = Uuid::new_v4();

    let updated = counter();
    let u = updated.clone();
    session.on_anchors_updated(move |_| {
        u.fetch_add(1, Ordering::SeqCst);
    });

    rt.fire_batch(native, CallbackKind::AnchorsUpdated, &[rt.new_anchor(id)]);
    session.drain_callbacks();

    assert!(session.anchor(&id).is_some());
    assert_eq!(updated.load(Ordering::SeqCst), 1);
}

#[test]
fn test_duplicate_delivery_yields_same_wrapper() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let handle = rt.new_anchor(Uuid::new_v4());

    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[handle]);
    session.drain_callbacks();
    let first = session.anchors().pop().unwrap();

    let updated = Arc::new(Mutex::new(None));
    let u = updated.clone();
    session.on_anchors_updated(move |args| *u.lock() = args.anchors.first().cloned());
    rt.fire_batch(native, CallbackKind::AnchorsUpdated, &[handle]);
    session.drain_callbacks();

    let second = updated.lock().clone().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(rt.outstanding(handle), 1, "duplicate reference released");
}

#[test]
fn test_remove_then_add_before_drain() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let id = Uuid::new_v4();
    let handle = rt.new_anchor(id);

    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[handle]);
    session.drain_callbacks();

    let added = Arc::new(Mutex::new(Vec::new()));
    let a = added.clone();
    session.on_anchors_added(move |args| {
        a.lock()
            .extend(args.anchors.iter().map(|anchor| anchor.is_disposed()));
    });

    // Native re-creates the anchor before the consumer sees the removal.
    rt.fire_batch(native, CallbackKind::AnchorsRemoved, &[handle]);
    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[handle]);
    session.drain_callbacks();

    assert_eq!(*added.lock(), vec![false]);
    let cached = session.anchor(&id).expect("re-added anchor cached");
    assert!(!cached.is_disposed());
    assert_eq!(rt.outstanding(handle), 1);
    assert!(rt.over_released().is_empty());

    session.dispose();
    assert_eq!(rt.outstanding(handle), 0);
}

#[test]
fn test_merge_then_remove_same_anchor() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let (parent_id, child_id) = (Uuid::new_v4(), Uuid::new_v4());
    let parent = rt.new_anchor(parent_id);
    let child = rt.new_anchor(child_id);

    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[child]);
    session.drain_callbacks();

    let merges = counter();
    let m = merges.clone();
    session.on_anchors_merged(move |args| {
        assert_eq!(args.children.len(), 1);
        m.fetch_add(1, Ordering::SeqCst);
    });

    // Both arrive before the consumer drains.
    rt.fire_merge(native, &[(parent, vec![child])]);
    rt.fire_batch(native, CallbackKind::AnchorsRemoved, &[child]);
    session.drain_callbacks();

    assert_eq!(merges.load(Ordering::SeqCst), 1);
    assert_eq!(cached_ids(&session), vec![parent_id]);
    assert_eq!(rt.outstanding(child), 0);
    assert!(rt.over_released().is_empty());

    session.dispose();
    assert_eq!(rt.outstanding_total(), 0);
    assert!(rt.over_released().is_empty());
}

#[test]
fn test_add_anchor_then_native_added_callback() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let anchor = session.add_anchor(&Transform::IDENTITY).unwrap();

    // Native echoes the added anchor back.
    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[anchor.handle()]);
    session.drain_callbacks();

    assert_eq!(session.anchors().len(), 1);
    assert_eq!(rt.outstanding(anchor.handle()), 1);
}

// =======================================================================
// Maps, Mesh, Camera, Signals
// =======================================================================

#[test]
fn test_map_callbacks_registered_lazily() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let map = rt.new_map(Uuid::new_v4());

    assert!(!rt.fire_batch(native, CallbackKind::MapsAdded, &[map]));

    let maps = counter();
    let m = maps.clone();
    session.on_maps_added(move |args| {
        m.fetch_add(args.maps.len(), Ordering::SeqCst);
    });
    assert!(rt.fire_batch(native, CallbackKind::MapsAdded, &[map]));
    session.drain_callbacks();

    assert_eq!(maps.load(Ordering::SeqCst), 1);
    assert_eq!(rt.outstanding(map), 0, "maps are transient");
}

#[test]
fn test_mesh_update_parses_and_releases() {
    let (rt, session) = setup();
    let native = session.native_handle();

    let updates = Arc::new(Mutex::new(Vec::new()));
    let u = updates.clone();
    session.on_mesh_updated(move |args| u.lock().push(args.update.clone()));

    let block = MeshBlock {
        coordinates: [1, 0, -1],
        version: 1,
        vertex_count: 12,
        face_count: 4,
    };
    let mesh = rt.new_mesh(vec![block]);
    rt.fire_mesh(native, mesh);
    session.drain_callbacks();

    assert_eq!(rt.outstanding(mesh), 0);
    assert_eq!(session.with_mesh(|m| m.block_count()), 1);
    let updates = updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].changed, vec![block]);
}

#[test]
fn test_tracking_state_changed() {
    let (rt, session) = setup();
    let native = session.native_handle();

    let states = Arc::new(Mutex::new(Vec::new()));
    let s = states.clone();
    session.on_tracking_state_changed(move |args| s.lock().push(args.camera.tracking_state()));

    let camera = rt.new_camera(CameraInfo {
        tracking_state: TrackingState::Limited,
        ..CameraInfo::default()
    });
    assert!(rt.fire_camera(native, camera));
    session.drain_callbacks();

    assert_eq!(*states.lock(), vec![TrackingState::Limited]);
    assert_eq!(rt.outstanding(camera), 0);
}

#[test]
fn test_interruption_signals_in_order() {
    let (rt, session) = setup();
    let native = session.native_handle();
    let events = Arc::new(Mutex::new(Vec::new()));

    let e = events.clone();
    session.on_interrupted(move |_| e.lock().push("interrupted"));
    let e = events.clone();
    session.on_interruption_ended(move |_| e.lock().push("ended"));

    rt.fire_signal(native, CallbackKind::Interrupted);
    rt.fire_signal(native, CallbackKind::InterruptionEnded);
    assert!(events.lock().is_empty());

    session.drain_callbacks();
    assert_eq!(*events.lock(), vec!["interrupted", "ended"]);
}

#[test]
fn test_relocalization_first_yes_wins() {
    let (rt, session) = setup();
    let native = session.native_handle();
    assert_eq!(rt.fire_relocalization_query(native), None);

    let asked = counter();
    let a = asked.clone();
    session.on_relocalization_query(move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(rt.fire_relocalization_query(native), Some(false));

    session.on_relocalization_query(|q| q.should_attempt = true);
    let after = counter();
    let b = after.clone();
    session.on_relocalization_query(move |_| {
        b.fetch_add(1, Ordering::SeqCst);
    });

    // Answered synchronously, no drain.
    assert_eq!(rt.fire_relocalization_query(native), Some(true));
    assert_eq!(asked.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_panicking_subscriber_is_isolated() {
    let (rt, session) = setup();
    let native = session.native_handle();

    session.on_frame_updated(|_| panic!("subscriber bug"));
    let frames = counter();
    let f = frames.clone();
    session.on_frame_updated(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    rt.fire_frame(native, rt.new_frame(1.0));
    session.drain_callbacks();
    rt.fire_frame(native, rt.new_frame(2.0));
    session.drain_callbacks();

    assert_eq!(frames.load(Ordering::SeqCst), 2);
}

// =======================================================================
// Threads
// =======================================================================

#[test]
fn test_native_threads_and_dispatcher() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 25;

    let runtime = Arc::new(RecordingRuntime::new());
    let session = Session::builder(runtime.clone())
        .config(SessionConfig::default().dispatch_idle(Duration::from_millis(1)))
        .build()
        .unwrap();
    let native = session.native_handle();

    let added = counter();
    let a = added.clone();
    session.on_anchors_added(move |args| {
        a.fetch_add(args.anchors.len(), Ordering::SeqCst);
    });

    let dispatcher = session.spawn_dispatcher().unwrap();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let rt = runtime.clone();
            thread::spawn(move || {
                for _ in 0..PER_PRODUCER {
                    let anchor = rt.new_anchor(Uuid::new_v4());
                    rt.fire_batch(native, CallbackKind::AnchorsAdded, &[anchor]);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while added.load(Ordering::SeqCst) < PRODUCERS * PER_PRODUCER && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    dispatcher.stop().unwrap();

    assert_eq!(added.load(Ordering::SeqCst), PRODUCERS * PER_PRODUCER);
    assert_eq!(session.anchors().len(), PRODUCERS * PER_PRODUCER);

    session.dispose();
    assert_eq!(runtime.outstanding_total(), 0);
}
