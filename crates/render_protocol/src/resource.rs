/// Owns a backend resource handle together with the operation that releases it.
///
/// The release runs exactly once: on drop, unless [`ResourceGuard::into_inner`] moved the
/// handle out first.
pub struct ResourceGuard<H, R: FnOnce(H)> {
    inner: Option<(H, R)>,
}

impl<H, R: FnOnce(H)> ResourceGuard<H, R> {
    pub fn new(handle: H, release: R) -> Self {
        Self {
            inner: Some((handle, release)),
        }
    }

    pub fn get(&self) -> &H {
        match &self.inner {
            Some((handle, _)) => handle,
            None => unreachable!("resource guard accessed after release"),
        }
    }

    pub fn get_mut(&mut self) -> &mut H {
        match &mut self.inner {
            Some((handle, _)) => handle,
            None => unreachable!("resource guard accessed after release"),
        }
    }

    /// Takes the handle without releasing it.
    pub fn into_inner(mut self) -> H {
        match self.inner.take() {
            Some((handle, _release)) => handle,
            None => unreachable!("resource guard released twice"),
        }
    }
}

impl<H, R: FnOnce(H)> Drop for ResourceGuard<H, R> {
    fn drop(&mut self) {
        if let Some((handle, release)) = self.inner.take() {
            release(handle);
        }
    }
}

impl<H: std::fmt::Debug, R: FnOnce(H)> std::fmt::Debug for ResourceGuard<H, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceGuard")
            .field(&self.inner.as_ref().map(|(handle, _)| handle))
            .finish()
    }
}

pub fn acquire<H, R: FnOnce(H)>(allocate: impl FnOnce() -> H, release: R) -> ResourceGuard<H, R> {
    ResourceGuard::new(allocate(), release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn releases_exactly_once_on_drop() {
        let released = RefCell::new(Vec::new());
        {
            let guard = acquire(|| 7_u32, |handle| released.borrow_mut().push(handle));
            assert_eq!(*guard.get(), 7);
            assert!(released.borrow().is_empty());
        }
        assert_eq!(*released.borrow(), vec![7]);
    }

    #[test]
    fn into_inner_skips_release() {
        let released = RefCell::new(Vec::new());
        let guard = acquire(|| 11_u32, |handle| released.borrow_mut().push(handle));
        assert_eq!(guard.into_inner(), 11);
        assert!(released.borrow().is_empty());
    }

    #[test]
    fn moving_the_guard_moves_ownership() {
        let released = RefCell::new(Vec::new());
        let log = &released;
        let guards: Vec<_> = (0..3_u32)
            .map(|id| acquire(move || id, move |handle| log.borrow_mut().push(handle)))
            .collect();
        drop(guards);
        assert_eq!(*released.borrow(), vec![0, 1, 2]);
    }
}
