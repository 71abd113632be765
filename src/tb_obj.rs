use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

// TbObj lets the user share test objects (such as a shadow model) between Tasks.
// Every access holds the lock, so a compound read-modify-write done inside
// `with_mut` is atomic even if tasks ever run on more than one thread.
pub struct TbObj<T>(Arc<Mutex<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}
