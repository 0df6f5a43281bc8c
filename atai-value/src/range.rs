//! ステップ付きの値の範囲

use crate::ValueError;
use std::fmt;

/// 値の範囲 `[start, end)`（`step` 刻み）
///
/// 符号付き範囲は `ValueRange<i64>`、符号なし範囲は `ValueRange<u64>` で表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRange<T> {
    start: T,
    end: T,
    step: u64,
}

impl<T: Copy + Into<i128>> ValueRange<T> {
    /// 範囲を作成する（`step` は正でなければならない）
    pub fn new(start: T, end: T, step: u64) -> Result<Self, ValueError> {
        if step == 0 {
            return Err(ValueError::InvalidStep);
        }
        Ok(Self { start, end, step })
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn end(&self) -> T {
        self.end
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn set_start(&mut self, start: T) {
        self.start = start;
    }

    pub fn set_end(&mut self, end: T) {
        self.end = end;
    }

    pub fn set_step(&mut self, step: u64) -> Result<(), ValueError> {
        if step == 0 {
            return Err(ValueError::InvalidStep);
        }
        self.step = step;
        Ok(())
    }

    /// 値が範囲に含まれるか
    pub fn contains<V: Into<i128>>(&self, value: V) -> bool {
        let value = value.into();
        let start = self.start.into();
        let end = self.end.into();
        value >= start && value < end && (value - start) % self.step as i128 == 0
    }
}

/// 符号付きの16進表記（`-0x5` など）
pub(crate) fn signed_hex(value: i128) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{:#x}", value)
    }
}

impl<T: Copy + Into<i128>> fmt::Display for ValueRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let start = signed_hex(self.start.into());
        let end = signed_hex(self.end.into());
        if self.step == 1 {
            write!(f, "<range: {} to {}>", start, end)
        } else {
            write!(f, "<range: {} to {}, step {:#x}>", start, end, self.step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepped_membership() {
        let range = ValueRange::new(0u64, 10, 3).unwrap();
        assert!(range.contains(0));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!(!range.contains(4));
        assert!(!range.contains(-3));
    }

    #[test]
    fn test_signed_membership() {
        let range = ValueRange::new(-5i64, -1, 1).unwrap();
        assert!(range.contains(-5));
        assert!(range.contains(-2));
        assert!(!range.contains(-1));
    }

    #[test]
    fn test_empty_when_start_after_end() {
        let range = ValueRange::new(10u64, 0, 1).unwrap();
        assert!(!range.contains(5));
    }

    #[test]
    fn test_zero_step_rejected() {
        assert_eq!(ValueRange::new(0i64, 1, 0), Err(ValueError::InvalidStep));
        let mut range = ValueRange::new(0i64, 1, 1).unwrap();
        assert_eq!(range.set_step(0), Err(ValueError::InvalidStep));
        assert_eq!(range.step(), 1);
    }

    #[test]
    fn test_display() {
        let range = ValueRange::new(-5i64, -1, 1).unwrap();
        assert_eq!(range.to_string(), "<range: -0x5 to -0x1>");
        let range = ValueRange::new(0u64, 0x10, 4).unwrap();
        assert_eq!(range.to_string(), "<range: 0x0 to 0x10, step 0x4>");
    }
}
