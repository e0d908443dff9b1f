use std::sync::Arc;

pub type InitialHook<T> = Arc<dyn Fn() -> T + Send + Sync>;
pub type AddHook<T> = Arc<dyn Fn(&mut T) + Send + Sync>;
pub type AggregateHook<T> = Arc<dyn Fn(&mut T, Vec<T>) + Send + Sync>;

/// Optional callables wired into node lifecycle events.
///
/// `initial` produces the payload of a freshly created leaf or aggregate;
/// `add` runs when an existing node absorbs a hit; `aggregate` runs once
/// per collapse, receiving the new aggregate's payload and the payloads of
/// the leaves it swallowed. Absent hooks are no-ops and payloads fall back
/// to `T::default()`. Hooks only ever see payloads, so they cannot touch
/// the tree structure.
pub struct UserDataHooks<T> {
    pub(crate) initial: Option<InitialHook<T>>,
    pub(crate) add: Option<AddHook<T>>,
    pub(crate) aggregate: Option<AggregateHook<T>>,
}

impl<T> Default for UserDataHooks<T> {
    fn default() -> Self {
        Self {
            initial: None,
            add: None,
            aggregate: None,
        }
    }
}

impl<T> Clone for UserDataHooks<T> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            add: self.add.clone(),
            aggregate: self.aggregate.clone(),
        }
    }
}

impl<T> UserDataHooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initial(mut self, hook: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.initial = Some(Arc::new(hook));
        self
    }

    pub fn on_add(mut self, hook: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.add = Some(Arc::new(hook));
        self
    }

    pub fn on_aggregate(mut self, hook: impl Fn(&mut T, Vec<T>) + Send + Sync + 'static) -> Self {
        self.aggregate = Some(Arc::new(hook));
        self
    }
}
