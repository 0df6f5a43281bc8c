//! 格子の値のフォーマット
//!
//! 取り得る値の集合やレジスタ値を人間が読みやすい形式でフォーマットします。
//! 範囲・集合・テーブルが大きい場合は設定に従って省略します。
//! `Display` は省略せずにすべての要素を出力します。

use crate::range::signed_hex;
use crate::{PossibleValueSet, RegisterValue};
use std::fmt;

/// フォーマット制御オプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// 範囲の最大表示数
    pub max_ranges: usize,
    /// 集合の最大表示要素数
    pub max_set_values: usize,
    /// ルックアップテーブルの最大表示エントリ数
    pub max_table_entries: usize,
    /// レジスタ値に信頼度を付けるか
    pub show_confidence: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_ranges: 8,
            max_set_values: 16,
            max_table_entries: 8,
            show_confidence: false,
        }
    }
}

impl FormatConfig {
    /// 省略しない設定
    pub fn unbounded() -> Self {
        Self {
            max_ranges: usize::MAX,
            max_set_values: usize::MAX,
            max_table_entries: usize::MAX,
            show_confidence: false,
        }
    }
}

/// 値フォーマッター
#[derive(Debug, Clone, Default)]
pub struct ValueFormatter {
    config: FormatConfig,
}

/// 要素を `limit` 個まで連結する
fn join_limited<I>(items: I, total: usize, limit: usize) -> String
where
    I: Iterator<Item = String>,
{
    let shown: Vec<String> = items.take(limit).collect();
    let mut result = shown.join(", ");
    if total > limit {
        result.push_str(", ...");
    }
    result
}

impl ValueFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// 取り得る値の集合をフォーマットする
    pub fn format_value_set(&self, set: &PossibleValueSet) -> String {
        match set {
            PossibleValueSet::Undetermined => "<undetermined>".to_string(),
            PossibleValueSet::EntryValue { reg } => format!("<entry {}>", reg),
            PossibleValueSet::ConstantValue { value } => {
                format!("<const {}>", signed_hex(*value as i128))
            }
            PossibleValueSet::ConstantPointerValue { value } => {
                format!("<const ptr {}>", signed_hex(*value as i128))
            }
            PossibleValueSet::StackFrameOffset { offset } => {
                format!("<stack frame offset {}>", signed_hex(*offset as i128))
            }
            PossibleValueSet::SignedRangeValue { ranges, .. } => format!(
                "<signed ranges: [{}]>",
                join_limited(
                    ranges.iter().map(|r| r.to_string()),
                    ranges.len(),
                    self.config.max_ranges
                )
            ),
            PossibleValueSet::UnsignedRangeValue { ranges, .. } => format!(
                "<unsigned ranges: [{}]>",
                join_limited(
                    ranges.iter().map(|r| r.to_string()),
                    ranges.len(),
                    self.config.max_ranges
                )
            ),
            PossibleValueSet::LookupTableValue { table } => format!(
                "<table: {}>",
                join_limited(
                    table.entries().iter().map(|e| e.to_string()),
                    table.len(),
                    self.config.max_table_entries
                )
            ),
            PossibleValueSet::InSetOfValues { values } => format!(
                "<in set([{}])>",
                join_limited(
                    values.iter().map(|v| signed_hex(*v as i128)),
                    values.len(),
                    self.config.max_set_values
                )
            ),
            PossibleValueSet::NotInSetOfValues { values } => format!(
                "<not in set([{}])>",
                join_limited(
                    values.iter().map(|v| signed_hex(*v as i128)),
                    values.len(),
                    self.config.max_set_values
                )
            ),
            PossibleValueSet::ReturnAddressValue => "<return address>".to_string(),
            PossibleValueSet::ImportedAddressValue { value } => {
                format!("<imported address from entry {}>", signed_hex(*value as i128))
            }
        }
    }

    /// レジスタ値をフォーマットする
    pub fn format_register_value(&self, value: &RegisterValue) -> String {
        if self.config.show_confidence {
            format!("{} (confidence {})", value, value.confidence())
        } else {
            value.to_string()
        }
    }
}

impl fmt::Display for PossibleValueSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&ValueFormatter::new(FormatConfig::unbounded()).format_value_set(self))
    }
}
