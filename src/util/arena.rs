use std::{fmt, hash::Hash, marker::PhantomData, num::NonZeroU32};

/// A handle to some value of type `T` allocated in an [`Arena`]. To retrieve
/// a `&T`, use [`Arena::get`] or index the arena.
pub struct Id<T> {
    // Here we use a NonZeroU32 to leverage niche layout optimization.
    handle: NonZeroU32,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    const fn unchecked_new(handle: NonZeroU32) -> Self {
        Id {
            handle,
            _ty: PhantomData,
        }
    }

    fn index(self) -> usize {
        self.handle.get() as usize - 1
    }
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> Eq for Id<T> {}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.handle)
    }
}

/// A growable, append-only store. Nodes are never removed during a
/// compilation, so handles stay valid for the arena's lifetime.
pub struct Arena<T> {
    vec: Vec<T>,
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, value) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), value);
        }
        map.finish()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena::with_capacity(0)
    }
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Moves the provided value into the arena, returning a handle which can
    /// be used to retrieve it later.
    pub fn alloc(&mut self, value: T) -> Id<T> {
        let len = u32::try_from(self.vec.len()).expect("arena out of capacity");
        let handle = NonZeroU32::new(len + 1).expect("arena out of capacity");
        self.vec.push(value);
        Id::unchecked_new(handle)
    }

    /// Returns the value for the provided handle. Panics if the handle was
    /// produced by another arena with fewer elements.
    pub fn get(&self, id: Id<T>) -> &T {
        &self.vec[id.index()]
    }
}

impl<T> std::ops::Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena() {
        let mut a = Arena::<&str>::with_capacity(2);
        assert!(a.is_empty());

        let hello = a.alloc("hello");
        let world = a.alloc("world");
        let again = a.alloc("hello");

        assert_eq!(a.len(), 3);
        assert_eq!(a[hello], "hello");
        assert_eq!(*a.get(world), "world");
        assert_ne!(hello, again);
        assert_eq!(a[hello], a[again]);
    }
}
