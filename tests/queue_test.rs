//! A node-based FIFO queue wired to interchangeable node allocators.
//!
//! The queue only calls `allocate` with its fixed node size and releases the
//! addresses it received, so the slab allocator, the system allocator and a
//! counting stub can all back it unchanged.

use std::mem::size_of;
use std::ptr::NonNull;

use slab_node_allocator::{
    AllocError, AllocResult, LockedSlabAllocator, NodeAllocator, SlabAllocator,
    SystemNodeAllocator,
};

#[repr(C)]
struct QueueNode {
    next: Option<NonNull<QueueNode>>,
    value: u32,
}

const QUEUE_NODE_SIZE: usize = size_of::<QueueNode>();

struct NodeQueue<A: NodeAllocator> {
    head: Option<NonNull<QueueNode>>,
    tail: Option<NonNull<QueueNode>>,
    len: usize,
    allocator: A,
}

impl<A: NodeAllocator> NodeQueue<A> {
    fn new(allocator: A) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator,
        }
    }

    fn push(&mut self, value: u32) -> AllocResult {
        let node = self.allocator.allocate(QUEUE_NODE_SIZE)?.cast::<QueueNode>();
        unsafe { node.as_ptr().write(QueueNode { next: None, value }) };
        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<u32> {
        let head = self.head?;
        let QueueNode { next, value } = unsafe { head.as_ptr().read() };
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        unsafe { self.allocator.release(head.cast()).unwrap() };
        Some(value)
    }

    fn peek(&self) -> Option<u32> {
        self.head.map(|head| unsafe { (*head.as_ptr()).value })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn into_allocator(mut self) -> A {
        while self.pop().is_some() {}
        let this = std::mem::ManuallyDrop::new(self);
        unsafe { std::ptr::read(&this.allocator) }
    }
}

impl<A: NodeAllocator> Drop for NodeQueue<A> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Stub that counts calls and delegates to the system allocator.
#[derive(Default)]
struct CountingStub {
    inner: SystemNodeAllocator,
    allocs: usize,
    releases: usize,
}

impl NodeAllocator for CountingStub {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        assert_eq!(size, QUEUE_NODE_SIZE);
        self.allocs += 1;
        self.inner.allocate(size)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        self.releases += 1;
        unsafe { self.inner.release(ptr) }
    }
}

fn exercise<A: NodeAllocator>(queue: &mut NodeQueue<A>) {
    for v in 0..100 {
        queue.push(v).unwrap();
    }
    assert_eq!(queue.len(), 100);
    assert_eq!(queue.peek(), Some(0));
    for v in 0..50 {
        assert_eq!(queue.pop(), Some(v));
    }
    for v in 100..120 {
        queue.push(v).unwrap();
    }
    for v in 50..120 {
        assert_eq!(queue.pop(), Some(v));
    }
    assert_eq!(queue.pop(), None);
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_queue_on_slab_allocator() {
    assert_eq!(QUEUE_NODE_SIZE, 16);

    let mut queue = NodeQueue::new(SlabAllocator::new());
    exercise(&mut queue);

    let allocator = queue.into_allocator();
    assert_eq!(allocator.total_slabs(), 0);
    assert!(!allocator.is_initialized());
}

#[test]
fn test_queue_on_system_allocator() {
    let mut queue = NodeQueue::new(SystemNodeAllocator::new());
    exercise(&mut queue);
    assert_eq!(queue.into_allocator().live(), 0);
}

#[test]
fn test_queue_on_counting_stub() {
    let mut queue = NodeQueue::new(CountingStub::default());
    exercise(&mut queue);
    let stub = queue.into_allocator();
    assert_eq!(stub.allocs, 120);
    assert_eq!(stub.releases, 120);
    assert_eq!(stub.inner.live(), 0);
}

#[test]
fn test_queues_share_locked_allocator() {
    let shared = LockedSlabAllocator::new();
    let mut a = NodeQueue::new(&shared);
    let mut b = NodeQueue::new(&shared);

    for v in 0..10 {
        a.push(v).unwrap();
        b.push(v * 2).unwrap();
    }
    assert_eq!(shared.total_slabs(), 1);
    assert_eq!(shared.stats().size_classes[0].used_nodes, 20);

    for v in 0..10 {
        assert_eq!(a.pop(), Some(v));
        assert_eq!(b.pop(), Some(v * 2));
    }
    assert_eq!(shared.total_slabs(), 0);
}

#[test]
fn test_queue_reports_allocator_failure() {
    struct Refusing;

    impl NodeAllocator for Refusing {
        fn allocate(&mut self, _size: usize) -> AllocResult<NonNull<u8>> {
            Err(AllocError::NoMemory)
        }

        unsafe fn release(&mut self, _ptr: NonNull<u8>) -> AllocResult {
            Err(AllocError::UnknownPointer)
        }
    }

    let mut queue = NodeQueue::new(Refusing);
    assert_eq!(queue.push(1), Err(AllocError::NoMemory));
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.pop(), None);
}
