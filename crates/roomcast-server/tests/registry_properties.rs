//! Property-based tests for RoomRegistry
//!
//! These tests hammer one registry from many threads at once and verify that
//! membership ends up exactly where the operations say it should, using
//! deterministic simulation (SimEnv) for identity generation.

use std::{collections::BTreeMap, sync::Arc, thread};

use proptest::prelude::*;
use roomcast_core::{ConnectionId, RoomName};
use roomcast_harness::{InvariantRegistry, RegistrySnapshot, SimEnv, memory_connection};
use roomcast_server::{RegistryConfig, RoomRegistry};

/// One caller's plan: for each of its connections, the room to join and
/// whether it disconnects again afterwards.
type Plan = Vec<(u8, bool)>;

fn room(index: u8) -> RoomName {
    RoomName::new(format!("room-{index}")).unwrap()
}

fn plan_strategy() -> impl Strategy<Value = Plan> {
    prop::collection::vec((0u8..4, any::<bool>()), 1..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after concurrent callers finish, membership is exactly the
    /// set of connections that connected and did not disconnect again.
    #[test]
    fn prop_concurrent_membership_is_exact(
        seed in any::<u64>(),
        plans in prop::collection::vec(plan_strategy(), 2..8),
    ) {
        let env = SimEnv::with_seed(seed);
        let registry = Arc::new(RoomRegistry::new(env, RegistryConfig::default()));

        let survivors: Vec<Vec<(ConnectionId, RoomName)>> = thread::scope(|scope| {
            let handles: Vec<_> = plans
                .iter()
                .map(|plan| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || {
                        let mut kept = Vec::new();
                        for &(room_index, leaves) in plan {
                            let id = registry.next_connection_id();
                            let room = room(room_index);
                            let (outbound, _inbound, _peer) = memory_connection();

                            registry.connect(id, &room, Arc::new(outbound)).unwrap();
                            if leaves {
                                assert!(registry.disconnect(id, &room).is_some());
                                assert!(registry.disconnect(id, &room).is_none());
                            } else {
                                kept.push((id, room));
                            }
                        }
                        kept
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut expected: BTreeMap<RoomName, Vec<ConnectionId>> = BTreeMap::new();
        for (id, room) in survivors.into_iter().flatten() {
            expected.entry(room).or_default().push(id);
        }
        for members in expected.values_mut() {
            members.sort_unstable();
        }

        let actual: BTreeMap<RoomName, Vec<ConnectionId>> = registry
            .rooms()
            .into_iter()
            .map(|stats| {
                let members = registry.members(&stats.room);
                (stats.room, members)
            })
            .collect();

        prop_assert_eq!(actual, expected);
        InvariantRegistry::standard()
            .assert_all(&RegistrySnapshot::capture(&registry), "after concurrent callers");
    }

    /// Property: connection IDs handed out concurrently are never reused.
    #[test]
    fn prop_connection_ids_are_unique(threads in 2usize..8, per_thread in 1usize..200) {
        let registry = RoomRegistry::new(SimEnv::new(), RegistryConfig::default());

        let mut ids: Vec<ConnectionId> = thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        (0..per_thread).map(|_| registry.next_connection_id()).collect::<Vec<_>>()
                    })
                })
                .collect();

            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }

    /// Property: a room emptied and rejoined has only the new member.
    #[test]
    fn prop_rejoined_room_is_fresh(seed in any::<u64>(), first_wave in 1usize..20) {
        let registry = RoomRegistry::new(SimEnv::with_seed(seed), RegistryConfig::default());
        let lobby = room(0);

        let ids: Vec<ConnectionId> =
            (0..first_wave).map(|_| registry.next_connection_id()).collect();
        for &id in &ids {
            let (outbound, _inbound, _peer) = memory_connection();
            registry.connect(id, &lobby, Arc::new(outbound)).unwrap();
        }
        for &id in &ids {
            registry.disconnect(id, &lobby);
        }
        prop_assert!(!registry.has_room(&lobby));

        let newcomer = registry.next_connection_id();
        let (outbound, _inbound, _peer) = memory_connection();
        registry.connect(newcomer, &lobby, Arc::new(outbound)).unwrap();

        prop_assert_eq!(registry.members(&lobby), vec![newcomer]);
    }
}
