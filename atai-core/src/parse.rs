//! パース関連のユーティリティ関数

use anyhow::Result;

/// 整数文字列をi64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポートし、先頭の `-` で負の値になります。
/// 16進数は64ビットのビット列として解釈するので、`0xffffffffffffffff` は `-1` です。
///
/// # Examples
/// ```
/// use atai_core::parse::parse_integer;
///
/// assert_eq!(parse_integer("0x10").unwrap(), 16);
/// assert_eq!(parse_integer("-0x10").unwrap(), -16);
/// assert_eq!(parse_integer("42").unwrap(), 42);
/// ```
pub fn parse_integer(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        let magnitude = parse_unsigned(rest)?;
        if magnitude > i64::MAX as u64 + 1 {
            anyhow::bail!("Integer '{}' is out of range", s);
        }
        return Ok((magnitude as i64).wrapping_neg());
    }
    if s.starts_with("0x") || s.starts_with("0X") {
        return parse_unsigned(s).map(|v| v as i64);
    }
    s.parse::<i64>()
        .map_err(|e| anyhow::anyhow!("Invalid integer '{}': {}", s, e))
}

/// 整数文字列をu64にパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
pub fn parse_unsigned(s: &str) -> Result<u64> {
    let s = s.trim();

    if s.starts_with("0x") || s.starts_with("0X") {
        // 16進数
        u64::from_str_radix(&s[2..], 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal integer '{}': {}", s, e))
    } else {
        s.parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid integer '{}': {}", s, e))
    }
}

/// 所属判定の値をi128にパース
///
/// 先頭に `-` があれば符号付き、それ以外はu64として読むので、
/// `0x8000000000000001` は負の値にならず2^63より大きい値のままです。
pub fn parse_operand(s: &str) -> Result<i128> {
    let s = s.trim();
    if s.starts_with('-') {
        parse_integer(s).map(i128::from)
    } else {
        parse_unsigned(s).map(i128::from)
    }
}

/// `start:end[:step]` 形式の範囲をパース（stepの既定値は1）
pub fn parse_range<T>(s: &str, parse: impl Fn(&str) -> Result<T>) -> Result<(T, T, u64)> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [start, end] => Ok((parse(*start)?, parse(*end)?, 1)),
        [start, end, step] => Ok((parse(*start)?, parse(*end)?, parse_unsigned(step)?)),
        _ => anyhow::bail!("Invalid range '{}', expected start:end[:step]", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_hex() {
        assert_eq!(parse_integer("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_integer("0X1234").unwrap(), 0x1234);
        assert_eq!(parse_integer("0xABCD").unwrap(), 0xabcd);
        assert_eq!(parse_integer("0xffffffffffffffff").unwrap(), -1);
    }

    #[test]
    fn test_parse_integer_negative() {
        assert_eq!(parse_integer("-5").unwrap(), -5);
        assert_eq!(parse_integer("-0x10").unwrap(), -0x10);
        assert_eq!(parse_integer("-0x8000000000000000").unwrap(), i64::MIN);
        assert!(parse_integer("-0x8000000000000001").is_err());
    }

    #[test]
    fn test_parse_integer_invalid() {
        assert!(parse_integer("xyz").is_err());
        assert!(parse_integer("0xghij").is_err());
        assert!(parse_integer("").is_err());
    }

    #[test]
    fn test_parse_operand() {
        assert_eq!(parse_operand("0x8000000000000001").unwrap(), 0x8000000000000001);
        assert_eq!(parse_operand("0xffffffffffffffff").unwrap(), u64::MAX as i128);
        assert_eq!(parse_operand("-0x10").unwrap(), -16);
        assert_eq!(parse_operand("7").unwrap(), 7);
        assert!(parse_operand("-0x8000000000000001").is_err());
        assert!(parse_operand("0x10000000000000000").is_err());
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("-5:-1", parse_integer).unwrap(), (-5, -1, 1));
        assert_eq!(parse_range("0:0x10:4", parse_unsigned).unwrap(), (0, 0x10, 4));
        assert!(parse_range("1", parse_integer).is_err());
        assert!(parse_range("1:2:3:4", parse_integer).is_err());
    }
}
