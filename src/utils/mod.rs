pub mod logging;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// 加锁，锁中毒时继续使用内部数据
///
/// 所有临界区都很短且不跨越 await，中毒只可能来自测试中的 panic
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
