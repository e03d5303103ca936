use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mentorship_allocator::{
    engine::{AllocationEngine, AllocationError, BulkOutcome, EngineConfig},
    model::{Allocation, AllocationFilter, AllocationStatus, Faculty, Student},
    store::{AllocationStore, MemoryAllocationStore, MemoryRoster, StoreError},
};
use mentorship_id::{AllocationId, FacultyId, StudentId};
use proptest::prelude::*;

fn engine_config(capacity: u32, attempts: u32) -> EngineConfig {
    EngineConfig {
        capacity_limit: NonZeroU32::new(capacity).unwrap(),
        max_attempts: NonZeroU32::new(attempts).unwrap(),
    }
}

struct Harness {
    store: Arc<MemoryAllocationStore>,
    roster: Arc<MemoryRoster>,
    engine: AllocationEngine,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryAllocationStore::new());
        let roster = Arc::new(MemoryRoster::new());
        let engine = AllocationEngine::new(store.clone(), roster.clone(), config);
        Self {
            store,
            roster,
            engine,
        }
    }

    async fn faculty(&self, n: usize) -> Vec<Faculty> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(
                self.roster
                    .add_faculty(format!("Faculty {i}"), format!("faculty{i}@example.edu"))
                    .await,
            );
        }
        out.sort_by_key(|f| f.id);
        out
    }

    async fn students(&self, n: usize) -> Vec<Student> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(
                self.roster
                    .add_student(format!("Student {i}"), format!("student{i}@example.edu"))
                    .await,
            );
        }
        out.sort_by_key(|s| s.id);
        out
    }

    /// Give `faculty` `n` fresh mentees through the manual path.
    async fn preload(&self, faculty: &Faculty, n: usize) {
        for student in self.students(n).await {
            self.engine.allocate(faculty.id, student.id).await.unwrap();
        }
    }

    async fn count(&self, faculty: &Faculty) -> i64 {
        self.store.count_active(faculty.id).await.unwrap()
    }

    async fn assert_invariants(&self) {
        let limit = self.engine.policy().limit();
        let all = self
            .store
            .list_allocations(AllocationFilter::default())
            .await
            .unwrap();

        let pairs: HashSet<_> = all.iter().map(|a| (a.faculty_id, a.student_id)).collect();
        assert_eq!(pairs.len(), all.len(), "duplicate (faculty, student) pair");

        let mut active_students = HashSet::new();
        let mut per_faculty: HashMap<FacultyId, i64> = HashMap::new();
        for a in all.iter().filter(|a| a.is_active()) {
            assert!(
                active_students.insert(a.student_id),
                "student {} has two active mentors",
                a.student_id
            );
            *per_faculty.entry(a.faculty_id).or_default() += 1;
        }
        for (faculty_id, count) in per_faculty {
            assert!(
                count <= limit,
                "faculty {faculty_id} holds {count} > {limit}"
            );
        }
    }
}

// =============================================================================
// Manual allocation
// =============================================================================

#[tokio::test]
async fn manual_allocation_into_empty_faculty() {
    let h = Harness::new();
    let faculty = h.faculty(1).await.remove(0);
    let student = h.students(1).await.remove(0);

    let allocation = h.engine.allocate(faculty.id, student.id).await.unwrap();

    assert_eq!(allocation.faculty_id, faculty.id);
    assert_eq!(allocation.student_id, student.id);
    assert_eq!(allocation.status, AllocationStatus::Active);
    assert_eq!(h.count(&faculty).await, 1);
    h.assert_invariants().await;
}

#[tokio::test]
async fn manual_allocation_rejects_full_faculty() {
    let h = Harness::new();
    let faculty = h.faculty(1).await.remove(0);
    h.preload(&faculty, 10).await;
    let eleventh = h.students(1).await.remove(0);

    let err = h
        .engine
        .allocate(faculty.id, eleventh.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AllocationError::FacultyAtCapacity {
            active: 10,
            limit: 10,
            ..
        }
    ));
    assert_eq!(h.count(&faculty).await, 10);
    h.assert_invariants().await;
}

#[tokio::test]
async fn manual_allocation_rejects_second_mentor() {
    let h = Harness::new();
    let faculty = h.faculty(2).await;
    let student = h.students(1).await.remove(0);

    h.engine.allocate(faculty[0].id, student.id).await.unwrap();
    let err = h
        .engine
        .allocate(faculty[1].id, student.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AllocationError::StudentAlreadyMentored { .. }
    ));
    assert_eq!(h.count(&faculty[1]).await, 0);
}

#[tokio::test]
async fn repeating_a_manual_allocation_is_rejected() {
    let h = Harness::new();
    let faculty = h.faculty(1).await.remove(0);
    let student = h.students(1).await.remove(0);

    h.engine.allocate(faculty.id, student.id).await.unwrap();
    let err = h.engine.allocate(faculty.id, student.id).await.unwrap_err();

    assert!(matches!(
        err,
        AllocationError::StudentAlreadyMentored { .. }
            | AllocationError::DuplicateAllocation { .. }
    ));
    assert_eq!(h.count(&faculty).await, 1);
}

#[tokio::test]
async fn manual_allocation_checks_roster_roles() {
    let h = Harness::new();
    let faculty = h.faculty(1).await.remove(0);
    let student = h.students(1).await.remove(0);

    let err = h
        .engine
        .allocate(FacultyId::new(), student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::FacultyNotFound(_)));

    let err = h
        .engine
        .allocate(faculty.id, StudentId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::StudentNotFound(_)));
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn completed_pair_cannot_be_reused() {
    let h = Harness::new();
    let faculty = h.faculty(2).await;
    let student = h.students(1).await.remove(0);

    let first = h.engine.allocate(faculty[0].id, student.id).await.unwrap();
    let completed = h.engine.complete_allocation(first.id).await.unwrap();
    assert_eq!(completed.status, AllocationStatus::Completed);

    let err = h
        .engine
        .allocate(faculty[0].id, student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::DuplicateAllocation { .. }));

    // A different mentor is fine once the first allocation is closed.
    h.engine.allocate(faculty[1].id, student.id).await.unwrap();
    h.assert_invariants().await;
}

#[tokio::test]
async fn completing_frees_capacity() {
    let h = Harness::with_config(engine_config(1, 3));
    let faculty = h.faculty(1).await.remove(0);
    let students = h.students(2).await;

    let first = h.engine.allocate(faculty.id, students[0].id).await.unwrap();
    assert!(h.engine.allocate(faculty.id, students[1].id).await.is_err());

    h.engine.complete_allocation(first.id).await.unwrap();
    h.engine.allocate(faculty.id, students[1].id).await.unwrap();

    let err = h.engine.complete_allocation(first.id).await.unwrap_err();
    assert!(matches!(err, AllocationError::AllocationNotActive(_)));
    let err = h
        .engine
        .complete_allocation(AllocationId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::AllocationNotFound(_)));
}

// =============================================================================
// Auto allocation
// =============================================================================

#[tokio::test]
async fn auto_allocation_prefers_least_loaded() {
    let h = Harness::new();
    let faculty = h.faculty(2).await;
    h.preload(&faculty[0], 9).await;
    let student = h.students(1).await.remove(0);

    let auto = h.engine.auto_allocate(student.id).await.unwrap();

    assert_eq!(auto.faculty_id, faculty[1].id);
    assert_eq!(auto.allocation.faculty_id, faculty[1].id);
    assert_eq!(h.count(&faculty[0]).await, 9);
    assert_eq!(h.count(&faculty[1]).await, 1);
}

#[tokio::test]
async fn auto_allocation_ties_go_to_smallest_faculty_id() {
    let h = Harness::new();
    let faculty = h.faculty(3).await;
    let student = h.students(1).await.remove(0);

    let auto = h.engine.auto_allocate(student.id).await.unwrap();
    assert_eq!(auto.faculty_id, faculty[0].id);
}

#[tokio::test]
async fn auto_allocation_fails_when_everyone_is_full() {
    let h = Harness::with_config(engine_config(2, 3));
    let faculty = h.faculty(2).await;
    for f in &faculty {
        h.preload(f, 2).await;
    }
    let student = h.students(1).await.remove(0);

    let err = h.engine.auto_allocate(student.id).await.unwrap_err();
    assert!(matches!(err, AllocationError::NoCapacityAvailable));
}

#[tokio::test]
async fn auto_allocation_with_no_faculty() {
    let h = Harness::new();
    let student = h.students(1).await.remove(0);

    let err = h.engine.auto_allocate(student.id).await.unwrap_err();
    assert!(matches!(err, AllocationError::NoCapacityAvailable));
}

#[tokio::test]
async fn auto_allocation_rejects_mentored_and_unknown_students() {
    let h = Harness::new();
    let faculty = h.faculty(1).await.remove(0);
    let student = h.students(1).await.remove(0);
    h.engine.allocate(faculty.id, student.id).await.unwrap();

    let err = h.engine.auto_allocate(student.id).await.unwrap_err();
    assert!(matches!(
        err,
        AllocationError::StudentAlreadyMentored { .. }
    ));

    let err = h.engine.auto_allocate(StudentId::new()).await.unwrap_err();
    assert!(matches!(err, AllocationError::StudentNotFound(_)));
}

#[tokio::test]
async fn auto_allocation_skips_previous_mentor() {
    let h = Harness::new();
    let faculty = h.faculty(2).await;
    h.preload(&faculty[1], 3).await;
    let student = h.students(1).await.remove(0);

    let first = h.engine.allocate(faculty[0].id, student.id).await.unwrap();
    h.engine.complete_allocation(first.id).await.unwrap();

    // faculty[0] is now the least loaded, but the pair is already used.
    let auto = h.engine.auto_allocate(student.id).await.unwrap();
    assert_eq!(auto.faculty_id, faculty[1].id);
}

// =============================================================================
// Bulk allocation
// =============================================================================

#[tokio::test]
async fn bulk_allocation_fills_least_loaded_first() {
    let h = Harness::new();
    let faculty = h.faculty(2).await;
    h.preload(&faculty[0], 8).await;
    let students = h.students(5).await;

    let summary = h.engine.bulk_allocate().await.unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.success_count, 5);
    assert_eq!(summary.failed_count, 0);
    let attempted: Vec<_> = summary.details.iter().map(|d| d.student_id).collect();
    assert_eq!(attempted, students.iter().map(|s| s.id).collect::<Vec<_>>());

    // faculty[1] stays below faculty[0]'s 8 throughout, so it takes all five.
    assert_eq!(h.count(&faculty[0]).await, 8);
    assert_eq!(h.count(&faculty[1]).await, 5);
    assert!(h.engine.unallocated_students().await.unwrap().is_empty());
    h.assert_invariants().await;
}

#[tokio::test]
async fn bulk_allocation_records_partial_failure() {
    let h = Harness::with_config(engine_config(2, 3));
    let faculty = h.faculty(2).await;
    h.preload(&faculty[0], 1).await;
    let students = h.students(5).await;

    let summary = h.engine.bulk_allocate().await.unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failed_count, 2);
    assert_eq!(
        summary.success_count + summary.failed_count,
        summary.attempted
    );

    // Earlier successes are kept; the tail fails with a typed reason.
    for item in &summary.details[..3] {
        assert!(matches!(item.outcome, BulkOutcome::Allocated { .. }));
    }
    for item in &summary.details[3..] {
        assert_eq!(
            item.outcome,
            BulkOutcome::Failed {
                code: "no_capacity_available".to_string(),
                message: "no faculty has capacity for another student".to_string(),
            }
        );
    }

    let remaining: Vec<_> = h
        .engine
        .unallocated_students()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec![students[3].id, students[4].id]);
    h.assert_invariants().await;
}

#[tokio::test]
async fn bulk_allocation_with_nothing_to_do() {
    let h = Harness::new();
    h.faculty(1).await;

    let summary = h.engine.bulk_allocate().await.unwrap();
    assert_eq!(summary.attempted, 0);
    assert!(summary.details.is_empty());
}

#[tokio::test]
async fn workloads_cover_idle_faculty() {
    let h = Harness::new();
    let faculty = h.faculty(3).await;
    h.preload(&faculty[2], 4).await;

    let workloads = h.engine.workloads().await.unwrap();

    assert_eq!(workloads.len(), 3);
    let counts: Vec<_> = workloads.iter().map(|w| w.student_count).collect();
    assert_eq!(counts, vec![0, 0, 4]);
    assert_eq!(workloads[2].utilization_percent, 40);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn bulk_allocation_balances_load(faculty_count in 1usize..5, fill in 0.0f64..=1.0) {
        let students = ((faculty_count * 10) as f64 * fill).floor() as usize;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (summary, counts) = rt.block_on(async {
            let h = Harness::new();
            let faculty = h.faculty(faculty_count).await;
            h.students(students).await;
            let summary = h.engine.bulk_allocate().await.unwrap();
            h.assert_invariants().await;
            let mut counts = Vec::new();
            for f in &faculty {
                counts.push(h.count(f).await);
            }
            (summary, counts)
        });

        prop_assert_eq!(summary.attempted, students);
        prop_assert_eq!(summary.success_count, students);
        let max = counts.iter().copied().max().unwrap_or(0);
        let min = counts.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1, "unbalanced counts {:?}", counts);
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_auto_allocations_respect_capacity() {
    const CAPACITY: u32 = 3;
    const REQUESTS: usize = 12;

    let h = Harness::with_config(engine_config(CAPACITY, 3));
    let faculty = h.faculty(1).await.remove(0);
    let students = h.students(REQUESTS).await;

    let handles: Vec<_> = students
        .iter()
        .map(|s| {
            let engine = h.engine.clone();
            let student_id = s.id;
            tokio::spawn(async move { engine.auto_allocate(student_id).await })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;

    let mut successes = 0;
    for result in results {
        match result.unwrap() {
            Ok(auto) => {
                assert_eq!(auto.faculty_id, faculty.id);
                successes += 1;
            }
            Err(AllocationError::NoCapacityAvailable) => {}
            Err(AllocationError::FacultyAtCapacity { .. }) => {}
            Err(e) => panic!("unexpected error {e:?}"),
        }
    }

    assert_eq!(successes, CAPACITY as usize);
    assert_eq!(h.count(&faculty).await, i64::from(CAPACITY));
    h.assert_invariants().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_manual_allocations_for_one_student() {
    let h = Harness::new();
    let faculty = h.faculty(6).await;
    let student = h.students(1).await.remove(0);

    let handles: Vec<_> = faculty
        .iter()
        .map(|f| {
            let engine = h.engine.clone();
            let faculty_id = f.id;
            let student_id = student.id;
            tokio::spawn(async move { engine.allocate(faculty_id, student_id).await })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;
    let successes = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(successes, 1);
    h.assert_invariants().await;
}

// =============================================================================
// Injected write failures
// =============================================================================

/// Memory store that reports a lost race on the first `conflicts` writes and
/// a query error on every write for `broken_student`.
struct FaultyStore {
    inner: MemoryAllocationStore,
    conflicts: AtomicU32,
    broken_student: Option<StudentId>,
    writes: AtomicU32,
}

impl FaultyStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryAllocationStore::new(),
            conflicts: AtomicU32::new(conflicts),
            broken_student: None,
            writes: AtomicU32::new(0),
        }
    }

    fn failing_writes_for(student_id: StudentId) -> Self {
        Self {
            broken_student: Some(student_id),
            ..Self::new(0)
        }
    }
}

#[async_trait]
impl AllocationStore for FaultyStore {
    async fn list_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError> {
        self.inner.list_allocations(filter).await
    }

    async fn create_allocation(
        &self,
        faculty_id: FacultyId,
        student_id: StudentId,
        capacity_limit: i64,
    ) -> Result<Allocation, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.broken_student == Some(student_id) {
            return Err(StoreError::Query(sqlx::Error::PoolTimedOut));
        }
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::ConcurrencyConflict);
        }
        self.inner
            .create_allocation(faculty_id, student_id, capacity_limit)
            .await
    }

    async fn count_active(&self, faculty_id: FacultyId) -> Result<i64, StoreError> {
        self.inner.count_active(faculty_id).await
    }

    async fn active_counts(&self) -> Result<HashMap<FacultyId, i64>, StoreError> {
        self.inner.active_counts().await
    }

    async fn active_allocation_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Option<Allocation>, StoreError> {
        self.inner.active_allocation_for_student(student_id).await
    }

    async fn complete_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, StoreError> {
        self.inner.complete_allocation(allocation_id).await
    }
}

async fn conflicting_engine(
    conflicts: u32,
    attempts: u32,
) -> (Arc<FaultyStore>, AllocationEngine, Faculty, Student) {
    let store = Arc::new(FaultyStore::new(conflicts));
    let roster = Arc::new(MemoryRoster::new());
    let faculty = roster.add_faculty("Grace", "grace@example.edu").await;
    let student = roster.add_student("Alan", "alan@example.edu").await;
    let engine = AllocationEngine::new(store.clone(), roster, engine_config(10, attempts));
    (store, engine, faculty, student)
}

#[tokio::test]
async fn auto_allocation_retries_lost_races() {
    let (store, engine, faculty, student) = conflicting_engine(2, 3).await;

    let auto = engine.auto_allocate(student.id).await.unwrap();

    assert_eq!(auto.faculty_id, faculty.id);
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn auto_allocation_gives_up_after_bounded_attempts() {
    let (store, engine, _faculty, student) = conflicting_engine(5, 3).await;

    let err = engine.auto_allocate(student.id).await.unwrap_err();

    assert!(matches!(err, AllocationError::ConcurrencyConflict));
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn manual_allocation_does_not_retry() {
    let (store, engine, faculty, student) = conflicting_engine(1, 3).await;

    let err = engine.allocate(faculty.id, student.id).await.unwrap_err();
    assert!(matches!(err, AllocationError::ConcurrencyConflict));
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);

    engine.allocate(faculty.id, student.id).await.unwrap();
}

#[tokio::test]
async fn bulk_allocation_isolates_storage_failures() {
    let roster = Arc::new(MemoryRoster::new());
    roster.add_faculty("Grace", "grace@example.edu").await;
    let mut students = Vec::new();
    for i in 0..3 {
        let student = roster
            .add_student(format!("Student {i}"), format!("student{i}@example.edu"))
            .await;
        students.push(student);
    }
    students.sort_by_key(|s| s.id);

    let broken = students[1].id;
    let store = Arc::new(FaultyStore::failing_writes_for(broken));
    let engine = AllocationEngine::new(store.clone(), roster, engine_config(10, 3));

    let summary = engine.bulk_allocate().await.unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 1);
    let recorded = summary.success_count + summary.failed_count;
    assert_eq!(recorded, summary.attempted);

    let failed = &summary.details[1];
    assert_eq!(failed.student_id, broken);
    match &failed.outcome {
        BulkOutcome::Failed { code, .. } => assert_eq!(code, "storage_failure"),
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(summary.details[2].student_id, students[2].id);
    assert!(matches!(
        summary.details[2].outcome,
        BulkOutcome::Allocated { .. }
    ));
    let later = store
        .active_allocation_for_student(students[2].id)
        .await
        .unwrap();
    assert!(later.is_some());
    let skipped = store.active_allocation_for_student(broken).await.unwrap();
    assert!(skipped.is_none());
}
