//! End-to-end behaviour of the tracker and the query harness.

use engine_component::{Column, Component, Entity, MultiColumn, Signature, signature};
use engine_world::{Exec, Packs, Read, Tracker, Write};

#[derive(Debug, Clone, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    type Store = Column<Self>;

    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

impl Component for Velocity {
    type Store = Column<Self>;

    fn type_name() -> &'static str {
        "Velocity"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Health(i32);

impl Component for Health {
    type Store = Column<Self>;

    fn type_name() -> &'static str {
        "Health"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Waypoint(u32);

impl Component for Waypoint {
    type Store = MultiColumn<Self>;

    fn type_name() -> &'static str {
        "Waypoint"
    }
}

fn tracker() -> Tracker {
    let tracker = Tracker::new();
    tracker.add_source::<Position>();
    tracker.add_source::<Velocity>();
    tracker.add_source::<Health>();
    tracker.add_source::<Waypoint>();
    tracker
}

fn query_ids<Q>(tracker: &Tracker) -> Vec<Entity>
where
    Q: engine_world::Pack + engine_world::Query<Batches = engine_world::Batch<Q>>,
{
    Exec::<Q>::run(tracker, |batch| batch.ids().to_vec())
}

/// Every entity sits in exactly one group, keyed by its own signature.
fn assert_one_group_each(tracker: &Tracker, ids: &[Entity]) {
    for &id in ids {
        let signature = tracker.signature_of(id).expect("entity is alive");
        let appearances = tracker
            .matching(&Signature::new())
            .iter()
            .filter(|e| **e == id)
            .count();
        assert_eq!(appearances, 1, "{id} should appear once");
        assert!(tracker.matching(&signature).contains(&id));
    }
    tracker.check_consistency().unwrap();
}

#[test]
fn test_every_entity_in_exactly_one_group() {
    let tracker = tracker();
    let first = tracker.create(&mut (), &signature![Position, Velocity], 3);
    let lone = tracker.create(&mut (), &signature![Health], 1);
    tracker.add_component(&mut (), first, Health(3));
    tracker.remove_component::<Velocity>(&mut (), first.offset(1));
    tracker.add_component(&mut (), lone, Waypoint(1));
    tracker.add_component(&mut (), lone, Waypoint(2));

    let ids = [first, first.offset(1), first.offset(2), lone];
    assert_one_group_each(&tracker, &ids);
    assert_eq!(tracker.group_count(), 4);
}

#[test]
fn test_query_idempotence() {
    let tracker = tracker();
    let first = tracker.create(&mut (), &signature![Position, Velocity, Waypoint], 5);
    for i in 0..5 {
        let id = first.offset(i);
        tracker.set::<Position>(id, Position { x: i as f32, y: 1.5 });
        tracker.add_component(&mut (), id, Waypoint(i as u32));
    }

    let snapshot = |tracker: &Tracker| {
        (0..5)
            .map(|i| {
                let id = first.offset(i);
                (
                    tracker.get::<Position>(id),
                    tracker.get::<Velocity>(id),
                    tracker.get::<Waypoint>(id),
                )
            })
            .collect::<Vec<_>>()
    };
    let before = snapshot(&tracker);
    let order = query_ids::<(Read<Position>, Read<Waypoint>)>(&tracker);

    for _ in 0..2 {
        Exec::<(Write<Position>, Write<Velocity>, Write<Waypoint>)>::run(&tracker, |_| {});
    }

    assert_eq!(snapshot(&tracker), before);
    assert_eq!(query_ids::<(Read<Position>, Read<Waypoint>)>(&tracker), order);
    tracker.check_consistency().unwrap();
}

#[test]
fn test_nursery_entities_hidden_until_graduation() {
    let tracker = tracker();
    tracker.create(&mut (), &signature![Position], 2);
    let newborn = tracker.create_with(&mut (), (Position { x: 5.0, y: 5.0 }, Velocity::default()));

    assert!(!query_ids::<(Read<Position>,)>(&tracker).contains(&newborn));

    tracker.graduate();

    let seen = query_ids::<(Read<Position>,)>(&tracker);
    assert_eq!(seen.iter().filter(|id| **id == newborn).count(), 1);
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_creation_inside_a_query_is_deferred() {
    let tracker = tracker();
    tracker.create(&mut (), &signature![Health], 2);

    let spawned = Exec::<(Read<Health>,)>::run(&tracker, |batch| {
        batch
            .ids()
            .iter()
            .map(|_| tracker.create_with(&mut (), (Health(1),)))
            .collect::<Vec<_>>()
    });

    assert_eq!(spawned.len(), 2);
    assert_eq!(tracker.entity_count(), 2);
    assert_eq!(tracker.nursery_count(), 2);
    tracker.graduate();
    assert_eq!(query_ids::<(Read<Health>,)>(&tracker).len(), 4);
}

#[test]
fn test_doomed_entities_queryable_until_finalize() {
    let tracker = tracker();
    let first = tracker.create(&mut (), &signature![Health, Waypoint], 3);

    Exec::<(Read<Health>,)>::run(&tracker, |batch| {
        for &id in batch.ids() {
            tracker.kill_entity(id);
        }
    });

    assert_eq!(query_ids::<(Read<Health>,)>(&tracker).len(), 3);
    assert!(tracker.alive(first));

    assert_eq!(tracker.finalize_kills(&mut ()), 3);
    for i in 0..3 {
        let id = first.offset(i);
        assert!(!tracker.alive(id));
        assert_eq!(tracker.get::<Health>(id), None);
        assert_eq!(tracker.get::<Waypoint>(id), None);
    }
    assert!(query_ids::<(Read<Health>,)>(&tracker).is_empty());
    tracker.check_consistency().unwrap();
}

#[test]
fn test_add_component_changes_query_membership() {
    let tracker = tracker();
    let id = tracker.create_with(
        &mut (),
        (Position { x: 1.0, y: 2.0 }, Velocity { dx: 0.5, dy: 0.0 }),
    );
    tracker.graduate();

    assert_eq!(query_ids::<(Read<Position>,)>(&tracker), vec![id]);
    assert!(query_ids::<(Read<Position>, Read<Health>)>(&tracker).is_empty());

    tracker.add_component(&mut (), id, Health(10));

    Exec::<(Read<Position>, Read<Health>)>::run(&tracker, |batch| {
        let (ids, (positions, health)) = batch.parts();
        assert_eq!(ids, &[id]);
        assert_eq!(positions[0], Position { x: 1.0, y: 2.0 });
        assert_eq!(health[0], Health(10));
    });
}

#[test]
fn test_disjoint_packs_partition_population() {
    let tracker = tracker();
    let still = tracker.create(&mut (), &signature![Position], 4);
    let moving = tracker.create(&mut (), &signature![Position, Velocity], 3);
    tracker.create(&mut (), &signature![Velocity], 2);
    for i in 0..4 {
        tracker.set::<Position>(still.offset(i), Position { x: i as f32, y: 0.0 });
    }
    for i in 0..3 {
        tracker.set::<Velocity>(moving.offset(i), Velocity { dx: 1.0 + i as f32, dy: -2.0 });
    }

    let everyone = query_ids::<(Read<Position>,)>(&tracker);

    let (only, both) = Exec::<Packs<((Write<Position>,), (Write<Position>, Read<Velocity>))>>::run(
        &tracker,
        |(only, moving)| {
            let (_, (positions, velocities)) = moving.parts();
            for (p, v) in positions.iter_mut().zip(velocities) {
                p.x += v.dx;
                p.y += v.dy;
            }
            (only.ids().to_vec(), moving.ids().to_vec())
        },
    );

    assert_eq!(only.len(), 4);
    assert_eq!(both.len(), 3);
    assert!(only.iter().all(|id| !both.contains(id)));
    let mut union: Vec<Entity> = only.iter().chain(&both).copied().collect();
    union.sort();
    let mut expected = everyone;
    expected.sort();
    assert_eq!(union, expected);

    for i in 0..3 {
        assert_eq!(
            tracker.get::<Position>(moving.offset(i)),
            Some(Position { x: 1.0 + i as f32, y: -2.0 })
        );
    }
    for i in 0..4 {
        assert_eq!(
            tracker.get::<Position>(still.offset(i)),
            Some(Position { x: i as f32, y: 0.0 })
        );
    }
}

#[test]
fn test_multi_remove_round_trip_through_tracker() {
    let tracker = tracker();
    let a = tracker.create_with(&mut (), (Waypoint(1), Waypoint(2), Waypoint(3)));
    let b = tracker.create_with(&mut (), (Waypoint(10), Waypoint(20)));
    tracker.graduate();

    tracker.remove_component::<Waypoint>(&mut (), a);

    assert_eq!(tracker.get::<Waypoint>(a), None);
    assert_eq!(tracker.get::<Waypoint>(b), Some(vec![Waypoint(10), Waypoint(20)]));
    tracker.check_consistency().unwrap();
}
