use crate::emit::AssemblyProcedure;
use crate::key::ProcedureKey;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Emitted procedures keyed by method and generic instantiation.
///
/// Concurrent first use may build the same procedure more than once; the
/// first one stored wins and every caller sees it afterwards.
#[derive(Debug, Default)]
pub struct ProcedureCache {
    inner: RwLock<HashMap<ProcedureKey, Arc<AssemblyProcedure>>>,
}

impl ProcedureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ProcedureKey) -> Option<Arc<AssemblyProcedure>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn get_or_create(
        &self,
        key: &ProcedureKey,
        create: impl FnOnce() -> AssemblyProcedure,
    ) -> Arc<AssemblyProcedure> {
        if let Some(p) = self.get(key) {
            return p;
        }
        let built = Arc::new(create());
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.clone()).or_insert(built).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
