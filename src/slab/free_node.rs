//! Tagged nodes inside a slab pool.
//!
//! Every node starts with a [`NodeHeader`] that records its size class and
//! whether it is free or handed out. The payload follows immediately; while the
//! node is free its first word holds the link to the next free node.
//!
//! ```text
//! | class_index: u32 | state: u32 | payload (next free link while free) ... |
//! ^ node address                  ^ address returned to callers
//! ```

use core::mem::{align_of, size_of};

#[repr(C)]
struct NodeHeader {
    class_index: u32,
    state: u32,
}

/// Bytes of tag that precede every payload.
pub const NODE_HEADER_SIZE: usize = size_of::<NodeHeader>();

/// Alignment of node addresses and payloads.
pub const NODE_ALIGN: usize = align_of::<usize>();

const _: () = assert!(NODE_HEADER_SIZE % NODE_ALIGN == 0);

const NODE_FREE: u32 = 0x4652_4545;
const NODE_LIVE: u32 = 0x4c49_5645;

/// View over one node at a raw address inside a slab pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeNode {
    addr: usize,
}

impl FreeNode {
    pub const fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Recover the node from the address handed to a caller.
    pub fn from_payload(payload: usize) -> Option<Self> {
        let addr = payload.checked_sub(NODE_HEADER_SIZE)?;
        if addr == 0 || !crate::is_aligned(addr, NODE_ALIGN) {
            return None;
        }
        Some(Self { addr })
    }

    pub const fn addr(&self) -> usize {
        self.addr
    }

    pub const fn payload(&self) -> usize {
        self.addr + NODE_HEADER_SIZE
    }

    fn header(&self) -> &NodeHeader {
        unsafe { &*(self.addr as *const NodeHeader) }
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        unsafe { &mut *(self.addr as *mut NodeHeader) }
    }

    /// Write the size-class tag of a freshly carved node. The tag is never
    /// rewritten afterwards.
    pub fn init(&mut self, class_index: usize, next: Option<usize>) {
        let header = self.header_mut();
        header.class_index = class_index as u32;
        header.state = NODE_FREE;
        self.set_next_free(next);
    }

    /// Size-class tag, or `None` if the header does not look like a node tag.
    pub fn class_index(&self) -> Option<usize> {
        let header = self.header();
        match header.state {
            NODE_FREE | NODE_LIVE => Some(header.class_index as usize),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.header().state == NODE_LIVE
    }

    pub fn mark_live(&mut self) {
        self.header_mut().state = NODE_LIVE;
    }

    pub fn mark_free(&mut self) {
        self.header_mut().state = NODE_FREE;
    }

    /// Next node on the free list. Only meaningful while the node is free.
    pub fn next_free(&self) -> Option<usize> {
        let next = unsafe { *(self.payload() as *const usize) };
        if next == 0 {
            None
        } else {
            Some(next)
        }
    }

    pub fn set_next_free(&mut self, next: Option<usize>) {
        unsafe { *(self.payload() as *mut usize) = next.unwrap_or(0) };
    }
}
