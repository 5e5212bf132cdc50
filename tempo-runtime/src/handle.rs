use std::fmt;

/// Opaque identity of a bound owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub(crate) u64);

/// Handle of a pending one-shot or repeating invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvokeHandle(pub(crate) u64);

/// Handle of a started coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoroutineHandle(pub(crate) u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

impl fmt::Display for InvokeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invoke#{}", self.0)
    }
}

impl fmt::Display for CoroutineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coroutine#{}", self.0)
    }
}

/// Monotonic id source shared by owners, invocations and coroutines.
///
/// Invocations and coroutines draw from the same sequence, so comparing two
/// raw ids also compares registration order.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub(crate) fn next_raw(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub(crate) fn owner(&mut self) -> OwnerId {
        OwnerId(self.next_raw())
    }

    pub(crate) fn invoke(&mut self) -> InvokeHandle {
        InvokeHandle(self.next_raw())
    }

    pub(crate) fn coroutine(&mut self) -> CoroutineHandle {
        CoroutineHandle(self.next_raw())
    }
}
