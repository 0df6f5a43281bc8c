//! 参照カウント付きエンジンハンドル

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// エンジンオブジェクトへの所有ハンドル
///
/// 1つの `Ref` はちょうど1つの参照を保持し、ドロップ時に1つだけ解放します。
/// `Clone` は実装しません。別の参照が必要な場合は [`Ref::new_reference`] を使います。
pub struct Ref<T> {
    inner: Arc<T>,
}

impl<T> Ref<T> {
    /// 新しいエンジンオブジェクトを作成し、最初の参照を取得する
    pub fn new(object: T) -> Self {
        Self {
            inner: Arc::new(object),
        }
    }

    /// 同じオブジェクトへの参照をもう1つ取得する
    pub fn new_reference(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// 現在の参照数
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// 同じエンジンオブジェクトを指しているか
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// オブジェクトの同一性を表す値
    pub fn handle_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> AsRef<T> for Ref<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Ref::ptr_eq(self, other)
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle_id().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl<T: fmt::Display> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_counting() {
        let a = Ref::new(42u32);
        assert_eq!(a.reference_count(), 1);

        let b = a.new_reference();
        assert_eq!(a.reference_count(), 2);
        assert!(Ref::ptr_eq(&a, &b));

        drop(b);
        assert_eq!(a.reference_count(), 1);
    }

    #[test]
    fn test_identity_not_structure() {
        let a = Ref::new(String::from("x"));
        let b = Ref::new(String::from("x"));
        assert_ne!(a, b);
        assert_eq!(a, a.new_reference());
    }
}
