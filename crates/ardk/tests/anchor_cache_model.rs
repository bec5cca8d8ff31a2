// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic

//! Randomized anchor cache test
//!
//! Random add/update/remove/merge sequences are fired through the native
//! callbacks. Several batches usually pile up before the consumer drains;
//! the model replays them in the same FIFO order at drain time and the
//! session cache is compared against it after every drain.

use ardk::native::recording::RecordingRuntime;
use ardk::native::{CallbackKind, NativeHandle};
use ardk::Session;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

const POOL: usize = 12;
const STEPS: usize = 400;

fn pick(rng: &mut fastrand::Rng, pool: &[(Uuid, NativeHandle)], max: usize) -> Vec<usize> {
    let count = rng.usize(1..=max);
    let mut picked = BTreeSet::new();
    while picked.len() < count {
        picked.insert(rng.usize(..pool.len()));
    }
    picked.into_iter().collect()
}

/// A fired batch the consumer has not applied yet.
enum Batch {
    Added(Vec<Uuid>),
    Updated(Vec<Uuid>),
    Removed(Vec<Uuid>),
    Merged(Uuid, Vec<Uuid>),
}

impl Batch {
    fn apply(self, model: &mut HashSet<Uuid>) {
        match self {
            Batch::Added(ids) | Batch::Updated(ids) => model.extend(ids),
            Batch::Removed(ids) => {
                for id in &ids {
                    model.remove(id);
                }
            }
            Batch::Merged(parent, children) => {
                for id in &children {
                    model.remove(id);
                }
                model.insert(parent);
            }
        }
    }
}

fn run_model(seed: u64) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let runtime = Arc::new(RecordingRuntime::new());
    let session = Session::new(runtime.clone()).expect("session");
    let native = session.native_handle();

    let pool: Vec<(Uuid, NativeHandle)> = (0..POOL)
        .map(|_| {
            let id = Uuid::new_v4();
            (id, runtime.new_anchor(id))
        })
        .collect();
    let mut model: HashSet<Uuid> = HashSet::new();
    let mut pending: VecDeque<Batch> = VecDeque::new();

    for step in 0..STEPS {
        let picked = pick(&mut rng, &pool, 4);
        let handles: Vec<NativeHandle> = picked.iter().map(|i| pool[*i].1).collect();
        let ids: Vec<Uuid> = picked.iter().map(|i| pool[*i].0).collect();

        match rng.u8(..4) {
            0 => {
                runtime.fire_batch(native, CallbackKind::AnchorsAdded, &handles);
                pending.push_back(Batch::Added(ids));
            }
            1 => {
                runtime.fire_batch(native, CallbackKind::AnchorsUpdated, &handles);
                pending.push_back(Batch::Updated(ids));
            }
            2 => {
                runtime.fire_batch(native, CallbackKind::AnchorsRemoved, &handles);
                pending.push_back(Batch::Removed(ids));
            }
            _ if picked.len() >= 2 => {
                let (parent, children) = handles.split_first().expect("non-empty");
                runtime.fire_merge(native, &[(*parent, children.to_vec())]);
                pending.push_back(Batch::Merged(ids[0], ids[1..].to_vec()));
            }
            _ => {}
        }

        if step + 1 < STEPS && rng.u8(..3) != 0 {
            continue;
        }

        session.drain_callbacks();
        while let Some(batch) = pending.pop_front() {
            batch.apply(&mut model);
        }

        let cached: HashSet<Uuid> = session.anchors().iter().map(|a| a.identifier()).collect();
        assert_eq!(cached, model, "seed {} step {}", seed, step);

        // One native reference per cached anchor, none for the rest.
        for (id, handle) in &pool {
            let expected = u32::from(model.contains(id));
            assert_eq!(
                runtime.outstanding(*handle),
                expected,
                "seed {} step {} anchor {}",
                seed,
                step,
                id
            );
        }
    }
    assert!(pending.is_empty());

    session.dispose();
    assert_eq!(runtime.outstanding_total(), 0, "seed {}", seed);
    assert!(runtime.over_released().is_empty(), "seed {}", seed);
}

#[test]
fn test_cache_matches_model() {
    for seed in 0..8 {
        run_model(seed);
    }
}

#[test]
fn test_cache_matches_model_random_seed() {
    let seed = fastrand::u64(..);
    run_model(seed);
}
