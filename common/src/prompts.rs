//! プロンプト生成モジュール
//!
//! 端末画面の写真から識別子を読み取らせるためのプロンプト:
//! - build_extraction_prompt: 抽出種別と入力済みの値（ヒント）から生成

use crate::types::{ExpectedKind, IdentifierSet};

/// 抽出用プロンプト生成
///
/// # Arguments
/// * `kind` - 写真に写っているはずの画面の種類
/// * `hint` - オペレーターが既に入力した値（読み取りの手掛かり。結果の正解ではない）
///
/// # Returns
/// 単一のJSONオブジェクトを返すよう指示したプロンプト文字列
pub fn build_extraction_prompt(kind: ExpectedKind, hint: Option<&IdentifierSet>) -> String {
    let focus = match kind {
        ExpectedKind::Imei => {
            "The photo shows a device screen listing IMEI numbers (for example the *#06# dialog). \
             Dual-SIM devices show two IMEIs; report them in the order they appear on screen."
        }
        ExpectedKind::Serial => {
            "The photo shows the device serial number (settings screen, box label or back cover). \
             IMEIs may also be visible; report them if they are."
        }
        ExpectedKind::Specs => {
            "The photo shows a device information / about-phone screen. \
             Report every IMEI and the serial number that are legible."
        }
    };

    let hint_block = hint
        .filter(|h| !h.is_empty())
        .map(|h| {
            format!(
                "\n## Operator entry (may be wrong, use only to disambiguate blurry characters)\n\
                 - imei1: {}\n- imei2: {}\n- serialNumber: {}\n",
                h.imei1().unwrap_or("-"),
                h.imei2().unwrap_or("-"),
                h.serial_number().unwrap_or("-"),
            )
        })
        .unwrap_or_default();

    format!(
        r#"You read device identifiers from photos of phone screens.

## Task
{focus}
{hint_block}
## Output format (a single JSON object, nothing else)
{{
  "imei1": "first IMEI, digits only, or empty string",
  "imei2": "second IMEI, digits only, or empty string",
  "serialNumber": "serial number, or empty string",
  "imeiCount": 0,
  "errors": ["anything that prevented a clean reading"]
}}

## Rules
- Never guess digits that are not legible; leave the field empty and add an entry to errors
- imeiCount is the number of distinct IMEIs visible (0, 1 or 2)
- Ignore IMEISV / software version lines
- Output JSON only. No explanation"#
    )
}
