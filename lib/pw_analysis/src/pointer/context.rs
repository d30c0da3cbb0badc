//! k-limited call string contexts.

use crate::callgraph::FuncId;
use crate::errors::{AnalysisError, AnalysisResult};
use std::collections::HashMap;
use std::fmt;

/// Dense handle of a context.
pub type ContextId = usize;

/// The empty context, created first.
pub const DUMMY_CID: ContextId = 0;

/// Context of nodes living outside of any call (global object, storage
/// properties).
pub const GLOBAL_CID: ContextId = ContextId::MAX;

/// Call string, most recent procedure first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Context(Vec<FuncId>);

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let elems: Vec<String> = self.0.iter().map(|id| id.index().to_string()).collect();
        write!(f, "[{}]", elems.join("-"))
    }
}

impl Context {
    #[must_use]
    pub fn new(elems: Vec<FuncId>) -> Self {
        Self(elems)
    }

    /// Prepends `elem` to `old`, keeping at most `k` elements.
    #[must_use]
    pub fn new_k_limited(old: &Self, elem: FuncId, k: usize) -> Self {
        if k == 0 {
            return Self::default();
        }
        let mut elems = Vec::with_capacity(k);
        elems.push(elem);
        elems.extend(old.0.iter().take(k - 1).copied());
        Self(elems)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<FuncId> {
        self.0.get(index).copied()
    }
}

/// Contexts are stored behind stable ids, an id may be rebound to another
/// content (see [`KLimitedContextSensitive::get_or_new_context`]).
#[derive(Debug)]
pub struct ContextCache {
    contexts: Vec<Context>,
    ids: HashMap<Context, ContextId>,
}

impl Default for ContextCache {
    fn default() -> Self {
        let mut cache = Self {
            contexts: Vec::new(),
            ids: HashMap::new(),
        };
        cache.get_or_new_context_id(Context::default());
        cache
    }
}

impl ContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_new_context_id(&mut self, context: Context) -> ContextId {
        if let Some(id) = self.ids.get(&context) {
            return *id;
        }
        let id = self.contexts.len();
        self.ids.insert(context.clone(), id);
        self.contexts.push(context);
        id
    }

    /// Rebinds `id` to `context`.
    pub fn update_context(&mut self, id: ContextId, context: Context) -> AnalysisResult<()> {
        let slot = self
            .contexts
            .get_mut(id)
            .ok_or(AnalysisError::ContextNotFound(id))?;
        let old = std::mem::replace(slot, context.clone());
        if self.ids.get(&old) == Some(&id) {
            self.ids.remove(&old);
        }
        self.ids.insert(context, id);
        Ok(())
    }

    #[must_use]
    pub fn context_id(&self, context: &Context) -> Option<ContextId> {
        self.ids.get(context).copied()
    }

    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[derive(Debug)]
pub struct KLimitedContextSensitive {
    k: usize,
    cache: ContextCache,
}

impl KLimitedContextSensitive {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            cache: ContextCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    #[inline]
    #[must_use]
    pub const fn empty_context_id(&self) -> ContextId {
        DUMMY_CID
    }

    /// Context of a procedure entered from nowhere.
    pub fn new_context_id(&mut self, func: FuncId) -> ContextId {
        let context = Context::new_k_limited(&Context::default(), func, self.k);
        self.cache.get_or_new_context_id(context)
    }

    #[must_use]
    pub fn context_by_id(&self, id: ContextId) -> Option<&Context> {
        self.cache.context(id)
    }

    /// Context of `callee` called from context `caller_cid`.
    ///
    /// When `find_callee_as_top` is set and the callee already owns a top
    /// level context (as if called from the empty context), that context id
    /// is reused and rebound to the caller derived context.
    pub fn get_or_new_context(
        &mut self,
        caller_cid: ContextId,
        callee: FuncId,
        find_callee_as_top: bool,
    ) -> AnalysisResult<ContextId> {
        let caller_context = self
            .cache
            .context(caller_cid)
            .ok_or(AnalysisError::ContextNotFound(caller_cid))?;
        let callee_context = Context::new_k_limited(caller_context, callee, self.k);

        if find_callee_as_top {
            let top_context = Context::new_k_limited(&Context::default(), callee, self.k);
            match self.cache.context_id(&top_context) {
                Some(top_id) if top_id != DUMMY_CID => {
                    log::trace!(
                        "context {} of {} rebound to {}",
                        top_id,
                        callee.index(),
                        callee_context
                    );
                    self.cache.update_context(top_id, callee_context)?;
                    return Ok(top_id);
                }
                _ => (),
            }
        }
        Ok(self.cache.get_or_new_context_id(callee_context))
    }

    #[inline]
    #[must_use]
    pub fn nb_contexts(&self) -> usize {
        self.cache.len()
    }
}
