//! REPLコマンド

use crate::parse::{parse_integer, parse_operand, parse_range, parse_unsigned};
use crate::Result;
use atai_value::{LookupTableEntry, PossibleValueSet, Register, ValueError, ValueRange};

/// 作成する値の指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSpec {
    Undetermined,
    /// レジスタ名、または数値ならレジスタ番号
    Entry(Register),
    Const(i64),
    ConstPtr(i64),
    StackOffset(i64),
    ReturnAddress,
    Imported(i64),
    SignedRanges(Vec<(i64, i64, u64)>),
    UnsignedRanges(Vec<(u64, u64, u64)>),
    /// （入力値, 出力値）の並び
    Table(Vec<(Vec<i64>, i64)>),
    InSet(Vec<i64>),
    NotInSet(Vec<i64>),
}

impl ValueSpec {
    /// 取り得る値の集合を作る
    pub fn build(&self) -> Result<PossibleValueSet> {
        let set = match self {
            ValueSpec::Undetermined => PossibleValueSet::undetermined(),
            ValueSpec::Entry(reg) => PossibleValueSet::entry_value(reg.clone()),
            ValueSpec::Const(v) => PossibleValueSet::constant(*v),
            ValueSpec::ConstPtr(v) => PossibleValueSet::constant_ptr(*v),
            ValueSpec::StackOffset(offset) => PossibleValueSet::stack_frame_offset(*offset),
            ValueSpec::ReturnAddress => PossibleValueSet::return_address(),
            ValueSpec::Imported(v) => PossibleValueSet::imported_address(*v),
            ValueSpec::SignedRanges(ranges) => PossibleValueSet::signed_range_value(
                ranges
                    .iter()
                    .map(|&(start, end, step)| ValueRange::new(start, end, step))
                    .collect::<std::result::Result<Vec<_>, ValueError>>()?,
            )?,
            ValueSpec::UnsignedRanges(ranges) => PossibleValueSet::unsigned_range_value(
                ranges
                    .iter()
                    .map(|&(start, end, step)| ValueRange::new(start, end, step))
                    .collect::<std::result::Result<Vec<_>, ValueError>>()?,
            )?,
            ValueSpec::Table(entries) => PossibleValueSet::lookup_table_value(
                entries
                    .iter()
                    .map(|(from, to)| LookupTableEntry::new(from.clone(), *to))
                    .collect(),
            ),
            ValueSpec::InSet(values) => PossibleValueSet::in_set_of_values(values.iter().copied()),
            ValueSpec::NotInSet(values) => {
                PossibleValueSet::not_in_set_of_values(values.iter().copied())
            }
        };
        Ok(set)
    }
}

/// REPLコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 現在の値を置き換える
    Value(ValueSpec),
    /// 現在の値に含まれるか（符号なし64ビットの値もそのまま扱う）
    Contains(i128),
    /// 現在の値のエンコード結果を表示
    Raw,
    /// アーキテクチャを表示・変更
    Arch(Option<String>),
    /// 登録済みパーサ一覧
    Parsers,
    /// 指定した種類のビューを解析
    Parse(String),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

/// `1,2=5` 形式のテーブルエントリをパース
fn parse_table_entry(token: &str) -> Option<(Vec<i64>, i64)> {
    let (from, to) = token.split_once('=')?;
    let from = from
        .split(',')
        .map(parse_integer)
        .collect::<Result<Vec<_>>>()
        .ok()?;
    Some((from, parse_integer(to).ok()?))
}

/// 数値ならレジスタ番号、それ以外はレジスタ名
fn parse_register(token: &str) -> Register {
    match parse_unsigned(token).ok().and_then(|v| u32::try_from(v).ok()) {
        Some(index) => Register::Index(index),
        None => Register::Name(token.to_string()),
    }
}

fn parse_all<T>(tokens: &[&str], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    tokens.iter().map(|&t| parse(t)).collect()
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }
        let args = &parts[1..];
        let single = || match args {
            [arg] => parse_integer(arg).ok(),
            _ => None,
        };

        let spec = match parts[0] {
            "undetermined" | "undet" => ValueSpec::Undetermined,
            "entry" => match args {
                [reg] => ValueSpec::Entry(parse_register(reg)),
                _ => return None,
            },
            "const" => ValueSpec::Const(single()?),
            "ptr" => ValueSpec::ConstPtr(single()?),
            "stack" => ValueSpec::StackOffset(single()?),
            "retaddr" => ValueSpec::ReturnAddress,
            "import" => ValueSpec::Imported(single()?),
            "srange" if !args.is_empty() => ValueSpec::SignedRanges(parse_all(args, |t| {
                parse_range(t, parse_integer).ok()
            })?),
            "urange" if !args.is_empty() => ValueSpec::UnsignedRanges(parse_all(args, |t| {
                parse_range(t, parse_unsigned).ok()
            })?),
            "table" if !args.is_empty() => ValueSpec::Table(parse_all(args, parse_table_entry)?),
            "in" => ValueSpec::InSet(parse_all(args, |t| parse_integer(t).ok())?),
            "notin" => ValueSpec::NotInSet(parse_all(args, |t| parse_integer(t).ok())?),
            "contains" | "has" => {
                return match args {
                    [value] => parse_operand(value).ok().map(Command::Contains),
                    _ => None,
                }
            }
            "raw" => return Some(Command::Raw),
            "arch" => return Some(Command::Arch(args.first().map(|a| a.to_string()))),
            "parsers" => return Some(Command::Parsers),
            "parse" => {
                return match args {
                    [view_type] => Some(Command::Parse(view_type.to_string())),
                    _ => None,
                }
            }
            "help" | "h" | "?" => return Some(Command::Help),
            "quit" | "q" | "exit" => return Some(Command::Quit),
            _ => return None,
        };
        Some(Command::Value(spec))
    }
}
