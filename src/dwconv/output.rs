use std::marker::PhantomData;

/// Output buffer shared by the workers of one call.
///
/// Workers only ever store to the pixels of their own work partition, and partitions of one
/// call are disjoint, so concurrent stores never overlap.
pub(crate) struct OutputView<'a> {
    ptr: *mut u8,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: see the type docs; stores from different workers target disjoint ranges.
unsafe impl Send for OutputView<'_> {}
unsafe impl Sync for OutputView<'_> {}

impl<'a> OutputView<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { ptr: buf.as_mut_ptr(), len: buf.len(), _marker: PhantomData }
    }

    #[inline]
    pub fn store(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len, "output store out of range");
        // SAFETY: bounds checked above; the buffer outlives 'a and ranges are disjoint.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), src.len()) }
    }
}
