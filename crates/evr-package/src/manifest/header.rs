//! Manifest header and section descriptors

use binrw::{BinRead, BinWrite};

/// Encoded size of the manifest header
pub const HEADER_SIZE: u64 = 192;

/// Descriptor of one variable-length manifest section
///
/// `count` and `element_count` are both element counts but can diverge in
/// shipped manifests. `element_count` is the one used as the array length;
/// `count` is carried along without interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Section {
    /// Total byte length of the section
    pub length: u64,
    pub reserved1: u64,
    pub reserved2: u64,
    /// Byte size of a single element
    pub element_size: u64,
    pub count: u64,
    /// Number of elements stored in the section
    pub element_count: u64,
}

impl Section {
    /// Empty section for elements of the given size
    pub const fn empty(element_size: u64) -> Self {
        Self {
            length: 0,
            reserved1: 0,
            reserved2: 0,
            element_size,
            count: 0,
            element_count: 0,
        }
    }

    /// Record `n` appended elements
    pub fn grow(&mut self, n: u64) {
        self.count += n;
        self.element_count += n;
        self.length += self.element_size * n;
    }

    /// Drop all elements, keeping the reserved fields
    pub fn clear(&mut self) {
        self.count = 0;
        self.element_count = 0;
        self.length = 0;
    }

    /// Bring the bookkeeping in line with an array of `len` elements.
    ///
    /// `count` moves by the same delta as `element_count` so any
    /// pre-existing divergence between the two survives.
    pub fn sync(&mut self, element_size: u64, len: u64) {
        if self.element_count != len {
            self.count = self
                .count
                .wrapping_add(len.wrapping_sub(self.element_count));
            self.element_count = len;
        }
        self.element_size = element_size;
        self.length = element_size * len;
    }

    /// Whether `length == element_size * element_count` holds
    pub fn is_consistent(&self) -> bool {
        self.element_size.checked_mul(self.element_count) == Some(self.length)
    }
}

/// Manifest header: package count plus the three section descriptors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Header {
    /// Number of physical package files
    pub package_count: u32,
    pub reserved1: u32,
    pub reserved2: u64,
    pub frame_contents: Section,
    pub padding1: [u8; 16],
    pub metadata: Section,
    pub padding2: [u8; 16],
    pub frames: Section,
}
