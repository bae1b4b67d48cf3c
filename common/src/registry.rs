//! 登録台帳照会の型
//!
//! 抽出した識別子を台帳（正本）と突き合わせる「抽出データの確認」機能で使う。
//! 照合エンジンとは独立しており、1件の照会失敗が他の照会を止めることはない。

use crate::types::IdentifierSet;
use serde::{Deserialize, Serialize};

/// 台帳上の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistryStatus {
    /// 登録済み
    Registered,
    /// 台帳に存在しない
    NotRegistered,
    /// 盗難・紛失などの届出あり
    Reported,
    /// 台帳が状態を返さなかった、または未知の状態
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryStatus::Registered => write!(f, "registered"),
            RegistryStatus::NotRegistered => write!(f, "not registered"),
            RegistryStatus::Reported => write!(f, "reported"),
            RegistryStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// 照会対象のフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierField {
    Imei1,
    Imei2,
    SerialNumber,
}

/// 1件分の照会結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "camelCase")]
pub enum VerificationOutcome {
    Status(RegistryStatus),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryVerification {
    pub field: IdentifierField,
    pub identifier: String,
    pub outcome: VerificationOutcome,
}

/// 照会対象（存在する識別子のみ、IMEI1 → IMEI2 → シリアルの順）
pub fn verification_targets(identifiers: &IdentifierSet) -> Vec<(IdentifierField, String)> {
    [
        (IdentifierField::Imei1, identifiers.imei1()),
        (IdentifierField::Imei2, identifiers.imei2()),
        (IdentifierField::SerialNumber, identifiers.serial_number()),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|v| (field, v.to_string())))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizeOptions;

    #[test]
    fn test_targets_skip_absent_fields() {
        let ids = IdentifierSet::from_raw("", "356938035643809", "R58M", &NormalizeOptions::registration());
        let targets = verification_targets(&ids);
        assert_eq!(
            targets,
            vec![
                (IdentifierField::Imei2, "356938035643809".to_string()),
                (IdentifierField::SerialNumber, "R58M".to_string()),
            ]
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let v = RegistryVerification {
            field: IdentifierField::Imei1,
            identifier: "490154203237518".into(),
            outcome: VerificationOutcome::Status(RegistryStatus::NotRegistered),
        };
        let json = serde_json::to_string(&v).expect("シリアライズ失敗");
        assert!(json.contains("\"field\":\"imei1\""));
        assert!(json.contains("\"outcome\":\"status\""));
        assert!(json.contains("\"detail\":\"notRegistered\""));
    }
}
