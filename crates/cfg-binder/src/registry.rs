use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use cfg_core::Problem;
use tracing::debug;

use crate::schema::{SchemaBuilder, SchemaDescriptor};
use crate::CfgNode;

type Entry = Arc<dyn Any + Send + Sync>;

static DESCRIPTORS: OnceLock<RwLock<HashMap<TypeId, Entry>>> = OnceLock::new();

thread_local! {
    static IN_PROGRESS: RefCell<HashSet<TypeId>> = RefCell::new(HashSet::new());
}

fn descriptors() -> &'static RwLock<HashMap<TypeId, Entry>> {
    DESCRIPTORS.get_or_init(Default::default)
}

/// Marks a type as being described on this thread until dropped.
struct DescribeGuard(TypeId);

impl DescribeGuard {
    fn enter(type_id: TypeId) -> Self {
        IN_PROGRESS.with(|in_progress| in_progress.borrow_mut().insert(type_id));
        Self(type_id)
    }
}

impl Drop for DescribeGuard {
    fn drop(&mut self) {
        IN_PROGRESS.with(|in_progress| in_progress.borrow_mut().remove(&self.0));
    }
}

/// Whether `T` is currently being described further up this thread's stack.
pub(crate) fn is_describing<T: 'static>() -> bool {
    IN_PROGRESS.with(|in_progress| in_progress.borrow().contains(&TypeId::of::<T>()))
}

/// Returns the process-wide descriptor for `T`, describing it on first use.
///
/// Concurrent first uses may each build a descriptor; the first one
/// published wins and every caller gets that instance.
pub fn describe<T: CfgNode>() -> Arc<SchemaDescriptor<T>> {
    let type_id = TypeId::of::<T>();
    let cached = {
        let descriptors = descriptors()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        descriptors.get(&type_id).cloned()
    };
    if let Some(entry) = cached {
        return downcast(entry);
    }

    let built = {
        let _guard = DescribeGuard::enter(type_id);
        SchemaBuilder::<T>::build()
    };

    let entry = {
        let mut descriptors = descriptors()
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        descriptors
            .entry(type_id)
            .or_insert_with(|| {
                debug!(
                    schema = built.type_name(),
                    fields = built.fields().len(),
                    problems = built.problems().len(),
                    "schema described"
                );
                Arc::new(built) as Entry
            })
            .clone()
    };
    downcast(entry)
}

fn downcast<T: CfgNode>(entry: Entry) -> Arc<SchemaDescriptor<T>> {
    entry
        .downcast::<SchemaDescriptor<T>>()
        .unwrap_or_else(|_| unreachable!("registry entries are keyed by their own type"))
}

/// Every problem found while describing `T` and the types it nests,
/// each type reported once.
pub fn schema_problems<T: CfgNode>() -> Vec<Problem> {
    let mut visited = HashSet::new();
    let mut problems = Vec::new();
    describe::<T>().collect_problems(&mut visited, &mut problems);
    problems
}
