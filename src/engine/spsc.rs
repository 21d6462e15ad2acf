use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wait-free bounded single-producer/single-consumer ring.
///
/// This is the handoff between the market-data thread and the strategy
/// thread. No mutex is involved: the producer owns `tail`, the consumer
/// owns `head`, and each publishes its index with a release store that
/// the other side observes with an acquire load. The indices live on
/// separate cache lines so the two cores do not invalidate each other's
/// line on every operation.
///
/// Capacity is rounded up to a power of two so the index wrap is a
/// bitmask. One slot is sacrificed to distinguish full from empty:
/// empty iff `head == tail`, full iff `(tail + 1) & mask == head`.
///
/// The producer/consumer discipline is enforced by the types: `ring`
/// returns one [`RingProducer`] and one [`RingConsumer`], neither of
/// which is `Clone`, and both `push` and `pop` take `&mut self`.
struct RingInner<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot to read. Written by the consumer, read by the producer.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write. Written by the producer, read by the consumer.
    tail: CachePadded<AtomicUsize>,
}

// The raw slots are only touched under the head/tail protocol: a slot is
// written by the producer strictly before the release store that makes
// it visible, and read by the consumer strictly before the release store
// that recycles it.
unsafe impl<T: Send> Send for RingInner<T> {}
unsafe impl<T: Send> Sync for RingInner<T> {}

impl<T> Drop for RingInner<T> {
    fn drop(&mut self) {
        // Both handles are gone; drain whatever is still in flight.
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe {
                (*self.buf[head].get()).assume_init_drop();
            }
            head = (head + 1) & self.mask;
        }
    }
}

/// Create a bounded SPSC ring holding at most `capacity - 1` items
/// (capacity is rounded up to the next power of two, minimum 2).
pub fn ring<T: Send>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let cap = capacity.max(2).next_power_of_two();
    let buf = (0..cap)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let inner = Arc::new(RingInner {
        buf,
        mask: cap - 1,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });
    (
        RingProducer {
            inner: Arc::clone(&inner),
        },
        RingConsumer { inner },
    )
}

/// Producer half. Exactly one exists per ring; it is `Send` but not
/// `Clone`, so only one thread can ever push.
pub struct RingProducer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T: Send> RingProducer<T> {
    /// Push one item. Returns the item back when the ring is full so the
    /// caller can drop it and count the overflow; there is no
    /// back-pressure by design (a newer tick obsoletes an older one).
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let inner = &*self.inner;
        // Only this thread writes tail, so a relaxed read is enough.
        let tail = inner.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & inner.mask;
        // Acquire pairs with the consumer's release on head: we must not
        // overwrite a slot the consumer has not finished reading.
        if next == inner.head.load(Ordering::Acquire) {
            return Err(item);
        }
        unsafe {
            (*inner.buf[tail].get()).write(item);
        }
        // Release publishes the slot write above to the consumer.
        inner.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Advisory emptiness test from the producer side.
    pub fn is_empty(&self) -> bool {
        self.inner.head.load(Ordering::Acquire) == self.inner.tail.load(Ordering::Acquire)
    }
}

/// Consumer half. Exactly one exists per ring.
pub struct RingConsumer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T: Send> RingConsumer<T> {
    /// Pop one item, or `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        // Acquire pairs with the producer's release on tail: after this
        // load, the slot write at `head` is visible.
        if head == inner.tail.load(Ordering::Acquire) {
            return None;
        }
        let item = unsafe { (*inner.buf[head].get()).assume_init_read() };
        // Release hands the slot back to the producer only after the
        // read above is complete.
        inner.head.store((head + 1) & inner.mask, Ordering::Release);
        Some(item)
    }

    /// Advisory emptiness test.
    pub fn is_empty(&self) -> bool {
        self.inner.head.load(Ordering::Acquire) == self.inner.tail.load(Ordering::Acquire)
    }

    /// Advisory count of items currently buffered.
    pub fn len(&self) -> usize {
        let head = self.inner.head.load(Ordering::Acquire);
        let tail = self.inner.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.inner.mask
    }
}
