//! エンジンから貸し出される配列
//!
//! エンジンはコレクションを「フラットな配列と要素数」として貸し出し、
//! 呼び出し側は使い終わったら必ず返却します。返却は [`CoreArray`] の
//! `Drop` で行うため、早期リターンやエラー伝播、パニックでも漏れません。

use std::ops::Index;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// 貸し出し中の配列を数えるトラッカー
#[derive(Debug, Clone, Default)]
pub struct LeaseTracker {
    outstanding: Arc<AtomicUsize>,
}

impl LeaseTracker {
    /// 新しいトラッカーを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 要素を配列として貸し出す
    pub fn lease<T>(&self, items: Vec<T>) -> CoreArray<T> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        trace!(count = items.len(), "leased core array");
        CoreArray {
            items,
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// まだ返却されていない配列の数
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// 貸し出された配列
pub struct CoreArray<T> {
    items: Vec<T>,
    outstanding: Arc<AtomicUsize>,
}

impl<T> CoreArray<T> {
    /// 要素数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Clone> CoreArray<T> {
    /// 要素を複製して取り出す（配列自体はドロップ時に返却される）
    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}

impl<T> Index<usize> for CoreArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a CoreArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CoreArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> Drop for CoreArray<T> {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        trace!(count = self.items.len(), "released core array");
    }
}
