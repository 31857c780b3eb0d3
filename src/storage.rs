//! ワークスペーススコープの永続化ストア
//!
//! コアが要求するのは文字列のキー・バリュー対のみ。参照実装として
//! メモリ上のストアと、アトミック書き込みを行うJSONファイルストアを
//! 提供する。

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

/// 永続キー・バリューストア
///
/// `store` は失敗を返さない契約。実装は失敗を自前で報告し、呼び出し側の
/// シャットダウン処理を妨げないこと。
pub trait WorkspaceStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str);
}

/// メモリ上のストア（テスト・組み込み用）
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

/// JSONファイルを背景に持つストア
///
/// ファイル全体を {キー: 値} のJSONオブジェクトとして保持する。
/// 書き込みは一時ファイル経由のアトミックなリネームで行う。
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: RefCell<HashMap<String, String>>,
}

impl JsonFileStorage {
    /// 既存ファイルを読み込んで開く。壊れたファイルは空として扱う
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|err| StorageError::Io {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
            match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(values) => values,
                Err(err) => {
                    log::warn!(
                        "discarding malformed storage file {}: {err}",
                        path.display()
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: RefCell::new(values),
        })
    }

    fn flush(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&*self.values.borrow())
            .map_err(|err| StorageError::Serialize {
                message: err.to_string(),
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|err| StorageError::Io {
                    path: parent.display().to_string(),
                    message: err.to_string(),
                })?;
            }
        }

        // 一時ファイルに書き込んでからアトミックに移動
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, serialized).map_err(|err| StorageError::Io {
            path: temp_path.display().to_string(),
            message: err.to_string(),
        })?;
        fs::rename(&temp_path, &self.path).map_err(|err| StorageError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })?;

        Ok(())
    }
}

impl WorkspaceStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        if let Err(err) = self.flush() {
            log::warn!("failed to persist storage: {err}");
        }
    }
}
