use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use lock_api::RawMutex;

use crate::drivers::net::rtl83xx::KernelFunc;

/// Spinning raw mutex that keeps local interrupts off while held.
///
/// The interrupt handler and the poll/transmit paths share one device lock, so the
/// holder must not be preempted by the device interrupt on the same CPU.
pub struct SpinNoIrq<K> {
    lock: AtomicBool,
    saved_irq: UnsafeCell<usize>,
    _kernel: PhantomData<fn() -> K>,
}

unsafe impl<K> Sync for SpinNoIrq<K> {}
unsafe impl<K> Send for SpinNoIrq<K> {}

unsafe impl<K: KernelFunc> RawMutex for SpinNoIrq<K> {
    type GuardMarker = lock_api::GuardSend;
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        lock: AtomicBool::new(false),
        saved_irq: UnsafeCell::new(0),
        _kernel: PhantomData,
    };

    fn lock(&self) {
        let flags = K::local_irq_save();
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.lock.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
        unsafe { *self.saved_irq.get() = flags };
    }

    fn try_lock(&self) -> bool {
        let flags = K::local_irq_save();
        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            unsafe { *self.saved_irq.get() = flags };
            true
        } else {
            K::local_irq_restore(flags);
            false
        }
    }

    unsafe fn unlock(&self) {
        let flags = unsafe { *self.saved_irq.get() };
        self.lock.store(false, Ordering::Release);
        K::local_irq_restore(flags);
    }
}

pub type Mutex<K, T> = lock_api::Mutex<SpinNoIrq<K>, T>;
pub type MutexGuard<'a, K, T> = lock_api::MutexGuard<'a, SpinNoIrq<K>, T>;
