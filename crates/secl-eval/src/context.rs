use std::{
    cell::RefCell,
    collections::HashMap,
    ops::Deref,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{Event, Field, Value};

type Scratch = HashMap<Field, Value>;

/// Evaluation context: the event under evaluation and a cache of the field
/// values already resolved during the current call.
///
/// A context is owned by a single thread for the duration of one evaluation.
pub struct Context<'e> {
    event: &'e dyn Event,
    cache: RefCell<Scratch>,
}

impl<'e> Context<'e> {
    pub fn new(event: &'e dyn Event) -> Self {
        Self {
            event,
            cache: RefCell::new(Scratch::new()),
        }
    }

    /// Resolves `field` and applies `f` to its value.
    ///
    /// Returns `None` when the event can't provide the field. `f` must not
    /// resolve other fields on the same context.
    pub fn resolve<R>(&self, field: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        if let Some(value) = self.cache.borrow().get(field) {
            return Some(f(value));
        }

        match self.event.get_field_value(field) {
            Ok(value) => {
                let result = f(&value);
                self.cache.borrow_mut().insert(field.to_string(), value);
                Some(result)
            }
            Err(err) => {
                log::trace!("Unable to resolve `{field}`: {err}");
                None
            }
        }
    }

    /// Resolves `field` returning an owned copy of its value.
    pub fn value(&self, field: &str) -> Option<Value> {
        self.resolve(field, Value::clone)
    }
}

/// Pool of reusable evaluation scratch buffers.
///
/// [ContextPool::get] binds a buffer to an event; the buffer goes back to the
/// pool when the returned guard is dropped.
#[derive(Default)]
pub struct ContextPool {
    free: Mutex<Vec<Scratch>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<'p, 'e>(&'p self, event: &'e dyn Event) -> PooledContext<'p, 'e> {
        let cache = self.lock().pop().unwrap_or_default();
        PooledContext {
            pool: self,
            ctx: Context {
                event,
                cache: RefCell::new(cache),
            },
        }
    }

    /// Number of buffers waiting to be reused.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn put(&self, mut scratch: Scratch) {
        scratch.clear();
        self.lock().push(scratch);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Scratch>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [Context] checked out from a [ContextPool].
pub struct PooledContext<'p, 'e> {
    pool: &'p ContextPool,
    ctx: Context<'e>,
}

impl<'e> Deref for PooledContext<'_, 'e> {
    type Target = Context<'e>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl Drop for PooledContext<'_, '_> {
    fn drop(&mut self) {
        self.pool.put(self.ctx.cache.take());
    }
}
