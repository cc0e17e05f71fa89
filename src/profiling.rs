#[cfg(feature = "record_timings")]
use std::sync::Mutex;

///
/// Accumulated timing of one call site of [`record_time!`].
///
pub trait TimeTracker {
    fn reset(&mut self);
    fn report(&self);
}

#[cfg(feature = "record_timings")]
pub static TIME_TRACKERS: Mutex<Vec<Box<dyn 'static + Send + TimeTracker>>> = Mutex::new(Vec::new());

///
/// Emits the total time spent in every recorded operation as `tracing` events.
/// Does nothing unless the feature `record_timings` is enabled.
///
#[cfg(feature = "record_timings")]
pub fn print_all_timings() {
    if let Ok(locked) = TIME_TRACKERS.lock() {
        for tracker in locked.iter() {
            tracker.report();
        }
    }
}

#[cfg(not(feature = "record_timings"))]
pub fn print_all_timings() {}

#[cfg(feature = "record_timings")]
pub fn clear_all_timings() {
    if let Ok(mut locked) = TIME_TRACKERS.lock() {
        locked.iter_mut().for_each(|tracker| tracker.reset());
    }
}

#[cfg(not(feature = "record_timings"))]
pub fn clear_all_timings() {}

macro_rules! record_time {
    ($name:literal, $fn:expr) => {
        {
            #[cfg(feature = "record_timings")] {
                use std::sync::atomic::{AtomicBool, Ordering, AtomicU64};
                use std::time::Instant;
                use $crate::profiling::*;

                static NANOS: AtomicU64 = AtomicU64::new(0);
                static CALLS: AtomicU64 = AtomicU64::new(0);
                static REGISTERED: AtomicBool = AtomicBool::new(false);

                struct LocalTimeTracker;

                impl TimeTracker for LocalTimeTracker {

                    fn reset(&mut self) {
                        NANOS.store(0, Ordering::SeqCst);
                        CALLS.store(0, Ordering::SeqCst);
                    }

                    fn report(&self) {
                        tracing::info!(operation = $name, calls = CALLS.load(Ordering::SeqCst), total_ms = NANOS.load(Ordering::SeqCst) / 1000000, "timing");
                    }
                }

                if !REGISTERED.swap(true, Ordering::SeqCst) {
                    if let Ok(mut locked) = TIME_TRACKERS.lock() {
                        locked.push(Box::new(LocalTimeTracker) as Box<dyn 'static + Send + TimeTracker>);
                    }
                }

                #[inline(never)]
                fn prevent_inline<T, F: FnOnce() -> T>(f: F) -> T {
                    f()
                }

                let start = Instant::now();
                let result = prevent_inline($fn);
                let end = Instant::now();
                NANOS.fetch_add((end - start).as_nanos() as u64, Ordering::SeqCst);
                CALLS.fetch_add(1, Ordering::SeqCst);
                result
            }
            #[cfg(not(feature = "record_timings"))] {
                ($fn)()
            }
        }
    };
}
