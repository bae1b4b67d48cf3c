//! 識別子の正規化
//!
//! - IMEI: 数字以外を除去して長さを制限
//! - シリアル番号: 英数字以外を除去、大文字化、長さを制限
//! - 全角英数字は半角に変換してから処理する
//!
//! どちらも失敗しない純粋関数で、冪等（正規化済みの値を再正規化しても変わらない）。

/// 端末登録フォームでの IMEI 最大長
pub const REGISTRATION_IMEI_MAX_LEN: usize = 15;

/// 照合（所有確認）フローでの IMEI 最大長
pub const RECONCILIATION_IMEI_MAX_LEN: usize = 20;

/// シリアル番号の最大長
pub const SERIAL_MAX_LEN: usize = 20;

/// 正規化オプション
///
/// 登録と照合で IMEI の最大長が異なるため、定数ではなく設定として持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub imei_max_len: usize,
    pub serial_max_len: usize,
}

impl NormalizeOptions {
    /// 端末登録フロー（IMEI 15桁）
    pub fn registration() -> Self {
        Self {
            imei_max_len: REGISTRATION_IMEI_MAX_LEN,
            serial_max_len: SERIAL_MAX_LEN,
        }
    }

    /// 照合フロー（IMEI 20桁まで許容）
    pub fn reconciliation() -> Self {
        Self {
            imei_max_len: RECONCILIATION_IMEI_MAX_LEN,
            serial_max_len: SERIAL_MAX_LEN,
        }
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::registration()
    }
}

/// IMEI を正規化する
///
/// # Examples
/// ```
/// use device_verify_common::normalize_imei;
///
/// assert_eq!(normalize_imei("35-209900 176148/1", 15), "352099001761481");
/// assert_eq!(normalize_imei("IMEI: n/a", 15), "");
/// ```
pub fn normalize_imei(raw: &str, max_len: usize) -> String {
    raw.chars()
        .map(to_half_width)
        .filter(|c| c.is_ascii_digit())
        .take(max_len)
        .collect()
}

/// シリアル番号を正規化する
///
/// # Examples
/// ```
/// use device_verify_common::normalize_serial;
///
/// assert_eq!(normalize_serial("r58m-12 ab", 20), "R58M12AB");
/// ```
pub fn normalize_serial(raw: &str, max_len: usize) -> String {
    raw.chars()
        .map(to_half_width)
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(max_len)
        .collect()
}

/// 全角英数字 → 半角
fn to_half_width(c: char) -> char {
    match c {
        '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
        'Ａ'..='Ｚ' => char::from(b'A' + (c as u32 - 'Ａ' as u32) as u8),
        'ａ'..='ｚ' => char::from(b'a' + (c as u32 - 'ａ' as u32) as u8),
        _ => c,
    }
}
