//! Category-bucketed broad-phase registry
//!
//! GEA 13.3.1: the broad phase identifies overlapping pairs cheaply —
//! here with sphere tests over per-category buckets, the bucket pairs to
//! visit chosen by the [`CollisionMatrix`]. Results are published on the
//! event bus; the registry never destroys anything itself.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, warn};

use crate::entity::{Category, EntityCell, EntityId};
use crate::events::{CollisionEvent, EventBus, GameEvent};
use crate::foundation::math::{is_finite, Vec3};

use super::matrix::CollisionMatrix;

/// Broad-phase detector over category-tagged entity buckets
///
/// Buckets may transiently hold entities already flagged dead (destruction
/// is deferred to the owning manager's next update); the scan skips them.
pub struct CollisionRegistry {
    matrix: CollisionMatrix,
    buckets: HashMap<Category, Vec<Rc<EntityCell>>>,
}

impl CollisionRegistry {
    /// Create a registry scanning the given matrix
    pub fn new(matrix: CollisionMatrix) -> Self {
        Self {
            matrix,
            buckets: HashMap::new(),
        }
    }

    /// The matrix this registry scans
    pub fn matrix(&self) -> &CollisionMatrix {
        &self.matrix
    }

    /// Add an entity to the bucket for `category`
    ///
    /// Idempotent: re-registering the same cell under the same category has
    /// no additional effect. Registration is rejected (logged, no-op,
    /// returns `false`) when the cell carries a non-finite position or a
    /// degenerate radius.
    pub fn register(&mut self, cell: &Rc<EntityCell>, category: Category) -> bool {
        let position = cell.position();
        let radius = cell.radius();
        if !is_finite(position) || !radius.is_finite() || radius <= 0.0 {
            warn!(
                "rejecting collider registration for entity {} ({category:?}): \
                 invalid position or radius {radius}",
                cell.id().raw()
            );
            return false;
        }

        let bucket = self.buckets.entry(category).or_default();
        if bucket.iter().any(|existing| Rc::ptr_eq(existing, cell)) {
            debug!(
                "entity {} already registered under {category:?}",
                cell.id().raw()
            );
            return true;
        }
        bucket.push(Rc::clone(cell));
        true
    }

    /// Remove an entity from the bucket for `category`; no-op if absent
    pub fn unregister(&mut self, cell: &Rc<EntityCell>, category: Category) {
        if let Some(bucket) = self.buckets.get_mut(&category) {
            if let Some(index) = bucket.iter().position(|existing| Rc::ptr_eq(existing, cell)) {
                bucket.swap_remove(index);
                return;
            }
        }
        debug!(
            "unregister of entity {} not present under {category:?} ignored",
            cell.id().raw()
        );
    }

    /// Number of entities registered under a category
    pub fn registered_count(&self, category: Category) -> usize {
        self.buckets.get(&category).map_or(0, Vec::len)
    }

    /// Drop every registered entity (session teardown)
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Scan every matrix pair and publish one event per overlapping pair
    ///
    /// The scan runs to completion over stable bucket snapshots before any
    /// event is dispatched, so handlers cannot mutate it mid-flight. Before
    /// each emission both members' liveness is re-checked: once an earlier
    /// consumer has marked an entity dead, its remaining pairs this tick
    /// are dropped (no multi-hit accumulation within a tick).
    pub fn update(&self, bus: &EventBus) {
        let hits = self.scan();

        let mut emitted: HashSet<(EntityId, EntityId)> = HashSet::new();
        for hit in hits {
            let (a, b) = (hit.first.id(), hit.second.id());
            let key = if a <= b { (a, b) } else { (b, a) };
            if !emitted.insert(key) {
                continue;
            }
            if !hit.first.is_alive() || !hit.second.is_alive() {
                continue;
            }
            bus.emit(&GameEvent::Collision(hit));
        }
    }

    /// Collect overlapping pairs for every unordered matrix pair
    fn scan(&self) -> Vec<CollisionEvent> {
        let mut hits = Vec::new();
        for (cat_a, cat_b) in self.matrix.unordered_pairs() {
            let Some(bucket_a) = self.buckets.get(&cat_a) else {
                continue;
            };
            // Snapshots: cheap Rc clones, immune to handler-driven
            // structural changes between scan and dispatch.
            let list_a: Vec<Rc<EntityCell>> = bucket_a.clone();
            let list_b: Vec<Rc<EntityCell>> = if cat_a == cat_b {
                list_a.clone()
            } else {
                match self.buckets.get(&cat_b) {
                    Some(bucket) => bucket.clone(),
                    None => continue,
                }
            };

            for (i, a) in list_a.iter().enumerate() {
                if !a.is_alive() {
                    continue;
                }
                // Same-category pairs only look forward so each unordered
                // entity pair is visited once.
                let start = if cat_a == cat_b { i + 1 } else { 0 };
                for b in &list_b[start..] {
                    if !b.is_alive() || a.id() == b.id() {
                        continue;
                    }
                    if let Some(contact) = sphere_overlap(a, b) {
                        hits.push(CollisionEvent {
                            first: Rc::clone(a),
                            second: Rc::clone(b),
                            contact,
                        });
                    }
                }
            }
        }
        hits
    }
}

/// Sphere-sphere overlap test; touching exactly does not count
///
/// Pairs with invalid geometry are skipped (logged at debug level) so one
/// bad entity never aborts the rest of the scan.
fn sphere_overlap(a: &EntityCell, b: &EntityCell) -> Option<Vec3> {
    let pa = a.position();
    let pb = b.position();
    let ra = a.radius();
    let rb = b.radius();
    if !is_finite(pa) || !is_finite(pb) || !ra.is_finite() || !rb.is_finite() {
        debug!(
            "skipping collider pair {}/{} with invalid geometry",
            a.id().raw(),
            b.id().raw()
        );
        return None;
    }

    let radius_sum = ra + rb;
    if (pb - pa).norm_squared() >= radius_sum * radius_sum {
        return None;
    }
    Some(contact_point(pa, pb, ra, rb))
}

/// Contact point for two overlapping spheres
///
/// Projects each sphere's surface point along the axis connecting the two
/// centers and averages the two; falls back to the midpoint of the centers
/// when either radius is degenerate or the centers coincide.
pub fn contact_point(pa: Vec3, pb: Vec3, ra: f32, rb: f32) -> Vec3 {
    let delta = pb - pa;
    let distance = delta.norm();
    if distance <= f32::EPSILON || ra <= 0.0 || rb <= 0.0 {
        return (pa + pb) * 0.5;
    }
    let axis = delta / distance;
    let surface_a = pa + axis * ra;
    let surface_b = pb - axis * rb;
    (surface_a + surface_b) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use approx::assert_relative_eq;

    use crate::entity::IdAllocator;
    use crate::events::EventKind;

    fn live_cell(ids: &IdAllocator, category: Category, position: Vec3, radius: f32) -> Rc<EntityCell> {
        let cell = EntityCell::new(category);
        cell.set_id(ids.allocate());
        cell.set_position(position);
        cell.set_radius(radius);
        cell.set_alive(true);
        Rc::new(cell)
    }

    fn collision_counter(bus: &EventBus) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let count_inner = Rc::clone(&count);
        bus.subscribe(EventKind::Collision, move |_| {
            count_inner.set(count_inner.get() + 1);
            Ok(())
        });
        count
    }

    #[test]
    fn test_symmetric_matrix_emits_one_event_per_pair() {
        // classic() lists bullet/asteroid from both directions.
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        let bullet = live_cell(&ids, Category::Bullet, Vec3::new(104.0, 0.0, 0.0), 5.0);
        let asteroid = live_cell(&ids, Category::Asteroid, Vec3::new(100.0, 0.0, 0.0), 20.0);
        registry.register(&bullet, Category::Bullet);
        registry.register(&asteroid, Category::Asteroid);

        let bus = EventBus::new();
        let count = collision_counter(&bus);
        registry.update(&bus);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_contact_point_lies_on_center_axis() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        let asteroid = live_cell(&ids, Category::Asteroid, Vec3::new(100.0, 0.0, 0.0), 20.0);
        let bullet = live_cell(&ids, Category::Bullet, Vec3::new(104.0, 0.0, 0.0), 5.0);
        registry.register(&asteroid, Category::Asteroid);
        registry.register(&bullet, Category::Bullet);

        let bus = EventBus::new();
        let contact = Rc::new(Cell::new(Vec3::zeros()));
        {
            let contact = Rc::clone(&contact);
            bus.subscribe(EventKind::Collision, move |event| {
                if let GameEvent::Collision(hit) = event {
                    contact.set(hit.contact);
                }
                Ok(())
            });
        }
        registry.update(&bus);

        // Surface points: 100 + 20 = 120 and 104 - 5 = 99, averaged.
        let contact = contact.get();
        assert_relative_eq!(contact.x, 109.5);
        assert_relative_eq!(contact.y, 0.0);
        assert_relative_eq!(contact.z, 0.0);
    }

    #[test]
    fn test_touching_spheres_do_not_collide() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        // Distance exactly equals the radius sum.
        let a = live_cell(&ids, Category::Bullet, Vec3::new(0.0, 0.0, 0.0), 5.0);
        let b = live_cell(&ids, Category::Asteroid, Vec3::new(25.0, 0.0, 0.0), 20.0);
        registry.register(&a, Category::Bullet);
        registry.register(&b, Category::Asteroid);

        let bus = EventBus::new();
        let count = collision_counter(&bus);
        registry.update(&bus);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_register_is_idempotent_and_unregister_completes() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        let cell = live_cell(&ids, Category::Asteroid, Vec3::zeros(), 10.0);

        assert!(registry.register(&cell, Category::Asteroid));
        assert!(registry.register(&cell, Category::Asteroid));
        assert_eq!(registry.registered_count(Category::Asteroid), 1);

        registry.unregister(&cell, Category::Asteroid);
        assert_eq!(registry.registered_count(Category::Asteroid), 0);

        // A second unregister is a guarded no-op.
        registry.unregister(&cell, Category::Asteroid);
        assert_eq!(registry.registered_count(Category::Asteroid), 0);
    }

    #[test]
    fn test_invalid_registration_is_rejected() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();

        let nan_position = live_cell(
            &ids,
            Category::Asteroid,
            Vec3::new(f32::NAN, 0.0, 0.0),
            10.0,
        );
        assert!(!registry.register(&nan_position, Category::Asteroid));

        let zero_radius = live_cell(&ids, Category::Asteroid, Vec3::zeros(), 0.0);
        assert!(!registry.register(&zero_radius, Category::Asteroid));

        assert_eq!(registry.registered_count(Category::Asteroid), 0);
    }

    #[test]
    fn test_dead_entities_are_skipped() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        let bullet = live_cell(&ids, Category::Bullet, Vec3::zeros(), 5.0);
        let asteroid = live_cell(&ids, Category::Asteroid, Vec3::new(1.0, 0.0, 0.0), 20.0);
        registry.register(&bullet, Category::Bullet);
        registry.register(&asteroid, Category::Asteroid);

        bullet.set_alive(false);

        let bus = EventBus::new();
        let count = collision_counter(&bus);
        registry.update(&bus);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_entity_killed_by_first_consumer_is_locked_out() {
        let mut registry = CollisionRegistry::new(CollisionMatrix::classic());
        let ids = IdAllocator::new();
        // One bullet overlapping two asteroids at once.
        let bullet = live_cell(&ids, Category::Bullet, Vec3::zeros(), 5.0);
        let near = live_cell(&ids, Category::Asteroid, Vec3::new(10.0, 0.0, 0.0), 20.0);
        let far = live_cell(&ids, Category::Asteroid, Vec3::new(-10.0, 0.0, 0.0), 20.0);
        registry.register(&bullet, Category::Bullet);
        registry.register(&near, Category::Asteroid);
        registry.register(&far, Category::Asteroid);

        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        {
            let count = Rc::clone(&count);
            bus.subscribe(EventKind::Collision, move |event| {
                count.set(count.get() + 1);
                if let GameEvent::Collision(hit) = event {
                    // First consumer kills the bullet on contact.
                    if let Some((bullet, _)) = hit.split(Category::Bullet) {
                        bullet.set_alive(false);
                    }
                }
                Ok(())
            });
        }

        registry.update(&bus);
        // The second geometric pair involved the now-dead bullet and was
        // dropped before emission.
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_contact_point_degenerate_fallback() {
        let midpoint = contact_point(Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0), 0.0, 5.0);
        assert_relative_eq!(midpoint.x, 3.0);

        let coincident = contact_point(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 1.0, 1.0), 2.0, 2.0);
        assert_relative_eq!(coincident.x, 1.0);
        assert_relative_eq!(coincident.y, 1.0);
    }
}
