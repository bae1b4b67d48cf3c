//! 照合エンジン
//!
//! 画像から抽出した識別子とオペレーターの入力値を比較し、
//! エラー（送信不可）・警告・提案の3系統で結果を返す。
//!
//! ## 判定順序
//! 1. 入力 IMEI が 0 件 → エラー1件のみ（以降の IMEI 判定なし）
//! 2. 入力1件 / 抽出2件 → どちらの IMEI と一致したかを警告、残りを提案
//! 3. 入力2件 / 抽出2件 → 位置ごとの比較 + 入れ替わり検出
//! 4. 入力1件 / 抽出1件 → 単純比較
//! 5. シリアル番号 → IMEI 判定とは独立に比較
//!
//! 照合は失敗しない。空の入力でも必ず ComparisonResult を返す。

use crate::types::{ComparisonResult, IdentifierSet};
use std::fmt;

/// IMEI の位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeiPosition {
    First,
    Second,
}

impl fmt::Display for ImeiPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImeiPosition::First => write!(f, "IMEI1"),
            ImeiPosition::Second => write!(f, "IMEI2"),
        }
    }
}

/// 送信をブロックするエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoIdentifier,
    UnmatchedImei { submitted: String },
    ImeiMismatch { position: Option<ImeiPosition>, submitted: String, extracted: String },
    SerialMismatch { submitted: String, extracted: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoIdentifier => write!(f, "At least one identifier must be supplied."),
            ValidationError::UnmatchedImei { submitted } => {
                write!(f, "Submitted IMEI {} matches neither extracted value.", submitted)
            }
            ValidationError::ImeiMismatch { position: Some(position), submitted, extracted } => write!(
                f,
                "{} mismatch: entered {} but the image shows {}.",
                position, submitted, extracted
            ),
            ValidationError::ImeiMismatch { position: None, submitted, extracted } => write!(
                f,
                "IMEI mismatch: entered {} but the image shows {}.",
                submitted, extracted
            ),
            ValidationError::SerialMismatch { submitted, extracted } => write!(
                f,
                "Serial number mismatch: entered {} but the image shows {}.",
                submitted, extracted
            ),
        }
    }
}

/// 送信は可能だが確認を促す警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    MatchedAs(ImeiPosition),
    Swapped,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::MatchedAs(position) => {
                write!(f, "Submitted IMEI matched as {} of the device.", position)
            }
            ValidationWarning::Swapped => {
                write!(f, "Identifiers appear swapped: IMEI1 and IMEI2 are in reverse order.")
            }
        }
    }
}

/// 警告とセットで出す修正の提案
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationSuggestion {
    AlsoEnter { position: ImeiPosition, value: String },
    VerifyOrder,
}

impl fmt::Display for ValidationSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationSuggestion::AlsoEnter { position, value } => {
                write!(f, "Also enter {} as {}.", value, position)
            }
            ValidationSuggestion::VerifyOrder => {
                write!(f, "Verify the IMEI order: IMEI1 first, IMEI2 second.")
            }
        }
    }
}

/// 照合オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// 入れ替わりを検出したとき位置ごとの不一致エラーを出さない
    ///
    /// 既定は false（不一致エラーと入れ替わり警告を両方出す）。
    pub suppress_positional_on_swap: bool,
}

#[derive(Default)]
struct Findings {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
    suggestions: Vec<ValidationSuggestion>,
}

impl Findings {
    fn into_result(self) -> ComparisonResult {
        ComparisonResult::from_parts(
            self.errors.iter().map(ToString::to_string).collect(),
            self.warnings.iter().map(ToString::to_string).collect(),
            self.suggestions.iter().map(ToString::to_string).collect(),
        )
    }
}

/// 既定オプションで照合する
pub fn compare(extracted: &IdentifierSet, user: &IdentifierSet) -> ComparisonResult {
    compare_with(extracted, user, &ReconcileOptions::default())
}

/// 抽出値と入力値を照合する
pub fn compare_with(
    extracted: &IdentifierSet,
    user: &IdentifierSet,
    options: &ReconcileOptions,
) -> ComparisonResult {
    let mut findings = Findings::default();

    check_imeis(extracted, user, options, &mut findings);
    check_serial(extracted, user, &mut findings);

    findings.into_result()
}

fn check_imeis(
    extracted: &IdentifierSet,
    user: &IdentifierSet,
    options: &ReconcileOptions,
    findings: &mut Findings,
) {
    let extracted_count = extracted.imei_count();
    let user_count = user.imei_count();

    if user_count == 0 {
        findings.errors.push(ValidationError::NoIdentifier);
        return;
    }

    match (user_count, extracted_count) {
        (1, 2) => check_single_against_pair(extracted, user, findings),
        (2, 2) => check_pair_against_pair(extracted, user, options, findings),
        (1, 1) => {
            let submitted = user.imeis().next().unwrap_or_default();
            let found = extracted.imeis().next().unwrap_or_default();
            if submitted != found {
                findings.errors.push(ValidationError::ImeiMismatch {
                    position: None,
                    submitted: submitted.to_string(),
                    extracted: found.to_string(),
                });
            }
        }
        // 抽出なし、または入力の方が多い場合は IMEI 判定を行わない
        _ => {}
    }
}

fn check_single_against_pair(extracted: &IdentifierSet, user: &IdentifierSet, findings: &mut Findings) {
    let submitted = user.imeis().next().unwrap_or_default();

    let matched = if Some(submitted) == extracted.imei1() {
        Some((ImeiPosition::First, ImeiPosition::Second, extracted.imei2()))
    } else if Some(submitted) == extracted.imei2() {
        Some((ImeiPosition::Second, ImeiPosition::First, extracted.imei1()))
    } else {
        None
    };

    match matched {
        Some((position, other_position, other_value)) => {
            findings.warnings.push(ValidationWarning::MatchedAs(position));
            if let Some(value) = other_value {
                findings.suggestions.push(ValidationSuggestion::AlsoEnter {
                    position: other_position,
                    value: value.to_string(),
                });
            }
        }
        None => findings.errors.push(ValidationError::UnmatchedImei {
            submitted: submitted.to_string(),
        }),
    }
}

fn check_pair_against_pair(
    extracted: &IdentifierSet,
    user: &IdentifierSet,
    options: &ReconcileOptions,
    findings: &mut Findings,
) {
    // 抽出値の2つが同一なら入れ替わりは判定できない
    let swapped = extracted.imei1() != extracted.imei2()
        && user.imei1() == extracted.imei2()
        && user.imei2() == extracted.imei1();

    if !(swapped && options.suppress_positional_on_swap) {
        let positions = [
            (ImeiPosition::First, user.imei1(), extracted.imei1()),
            (ImeiPosition::Second, user.imei2(), extracted.imei2()),
        ];
        for (position, submitted, found) in positions {
            if let (Some(submitted), Some(found)) = (submitted, found) {
                if submitted != found {
                    findings.errors.push(ValidationError::ImeiMismatch {
                        position: Some(position),
                        submitted: submitted.to_string(),
                        extracted: found.to_string(),
                    });
                }
            }
        }
    }

    if swapped {
        findings.warnings.push(ValidationWarning::Swapped);
        findings.suggestions.push(ValidationSuggestion::VerifyOrder);
    }
}

fn check_serial(extracted: &IdentifierSet, user: &IdentifierSet, findings: &mut Findings) {
    if let (Some(found), Some(submitted)) = (extracted.serial_number(), user.serial_number()) {
        if found != submitted {
            findings.errors.push(ValidationError::SerialMismatch {
                submitted: submitted.to_string(),
                extracted: found.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizeOptions;

    const A: &str = "490154203237518";
    const B: &str = "490154203237526";
    const C: &str = "356938035643809";

    fn ids(imei1: &str, imei2: &str, serial: &str) -> IdentifierSet {
        IdentifierSet::from_raw(imei1, imei2, serial, &NormalizeOptions::registration())
    }

    #[test]
    fn test_identical_pairs_are_clean() {
        let result = compare(&ids(A, B, "R58M12AB"), &ids(A, B, "r58m-12ab"));
        assert!(result.is_valid);
        assert!(result.is_clean());
    }

    #[test]
    fn test_identical_duplicate_pair_is_not_swapped() {
        let result = compare(&ids(A, A, ""), &ids(A, A, ""));
        assert!(result.is_clean());
    }

    #[test]
    fn test_no_user_imei_yields_single_error() {
        for extracted in [ids("", "", ""), ids(A, "", ""), ids(A, B, "")] {
            let result = compare(&extracted, &ids("", "", "R58M"));
            assert!(!result.is_valid);
            assert_eq!(result.errors.len(), 1);
            assert_eq!(result.errors[0], "At least one identifier must be supplied.");
            assert!(result.warnings.is_empty());
        }
    }

    #[test]
    fn test_no_user_imei_still_checks_serial() {
        let result = compare(&ids(A, "", "AAA"), &ids("", "", "BBB"));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_single_imei_matched_as_imei2() {
        let extracted = ids("111111111111111", "123456789012345", "");
        let user = ids("123456789012345", "", "");
        assert_eq!(extracted.imei_count(), 2);
        assert_eq!(user.imei_count(), 1);

        let result = compare(&extracted, &user);
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Submitted IMEI matched as IMEI2 of the device."]);
        assert_eq!(result.suggestions, vec!["Also enter 111111111111111 as IMEI1."]);
    }

    #[test]
    fn test_single_imei_matched_as_imei1() {
        let result = compare(&ids(A, B, ""), &ids(A, "", ""));
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec![ValidationWarning::MatchedAs(ImeiPosition::First).to_string()]);
        assert_eq!(
            result.suggestions,
            vec![ValidationSuggestion::AlsoEnter { position: ImeiPosition::Second, value: B.into() }.to_string()]
        );
    }

    #[test]
    fn test_single_imei_in_second_field_is_used() {
        let result = compare(&ids(A, B, ""), &ids("", B, ""));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("IMEI2"));
    }

    #[test]
    fn test_single_imei_matching_neither() {
        let result = compare(&ids(A, B, ""), &ids(C, "", ""));
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![ValidationError::UnmatchedImei { submitted: C.into() }.to_string()]
        );
        assert!(result.warnings.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_pair_positional_mismatch_names_both_values() {
        let result = compare(&ids(A, B, ""), &ids(A, C, ""));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("IMEI2 mismatch"));
        assert!(result.errors[0].contains(C));
        assert!(result.errors[0].contains(B));
    }

    #[test]
    fn test_swapped_pair_emits_errors_and_warning() {
        let result = compare(&ids(B, A, ""), &ids(A, B, ""));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings, vec![ValidationWarning::Swapped.to_string()]);
        assert_eq!(result.suggestions, vec![ValidationSuggestion::VerifyOrder.to_string()]);
    }

    #[test]
    fn test_swapped_pair_with_suppression() {
        let options = ReconcileOptions { suppress_positional_on_swap: true };
        let result = compare_with(&ids(B, A, ""), &ids(A, B, ""), &options);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.suggestions.len(), 1);
    }

    #[test]
    fn test_single_against_single() {
        assert!(compare(&ids(A, "", ""), &ids(A, "", "")).is_clean());

        let result = compare(&ids(A, "", ""), &ids("", C, ""));
        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("IMEI mismatch"));
    }

    #[test]
    fn test_no_imei_branch_when_nothing_extracted() {
        assert!(compare(&ids("", "", ""), &ids(A, B, "")).is_clean());
        assert!(compare(&ids(A, "", ""), &ids(A, B, "")).is_clean());
    }

    #[test]
    fn test_serial_mismatch_overrides_imei_match() {
        let result = compare(&ids(A, B, "R58M12AB"), &ids(A, B, "R58M12AC"));
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![ValidationError::SerialMismatch {
                submitted: "R58M12AC".into(),
                extracted: "R58M12AB".into(),
            }
            .to_string()]
        );
    }

    #[test]
    fn test_serial_absence_is_silent() {
        assert!(compare(&ids(A, "", ""), &ids(A, "", "R58M")).is_clean());
        assert!(compare(&ids(A, "", "R58M"), &ids(A, "", "")).is_clean());
    }
}
