//! エラーハンドリングシステム
//!
//! rireki 全体で使用される統一されたエラー型を定義
//! 方針：履歴の喪失は致命的ではないため、回復可能エラーとして扱う

use thiserror::Error;

/// クレート全体のエラー型
#[derive(Error, Debug, Clone)]
pub enum HistoryError {
    /// ナビゲーション操作エラー
    #[error("Navigation failed")]
    Navigation(#[from] NavigationError),

    /// 永続化ストレージエラー
    #[error("Storage operation failed")]
    Storage(#[from] StorageError),
}

/// ナビゲーション固有のエラー
///
/// ホスト側の `open_editor` 実装が生成する。スタックの位置情報は
/// エラー発生後もそのまま維持される（巻き戻しは行わない）。
#[derive(Error, Debug, Clone)]
pub enum NavigationError {
    #[error("Failed to open '{name}': {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Document is no longer available: {name}")]
    Unavailable { name: String },
}

/// 永続化固有のエラー
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {message}")]
    Serialize { message: String },
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_error_display() {
        let error = NavigationError::OpenFailed {
            name: "main.rs".to_string(),
            reason: "editor group gone".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to open 'main.rs': editor group gone");
    }

    #[test]
    fn test_error_conversion() {
        let error: HistoryError = StorageError::Serialize {
            message: "bad json".to_string(),
        }
        .into();
        assert!(matches!(error, HistoryError::Storage(_)));
    }
}
