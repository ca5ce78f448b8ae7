use crate::error::{AppError, AppResult, ConfigError};
use crate::models::account::{Account, AccountsFile};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载账号列表
pub async fn load_accounts(path: &Path) -> AppResult<Vec<Account>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(ConfigError::AccountsFileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::read_failed(path.display().to_string(), e))?;

    let accounts = parse_accounts(&content, path)?;
    tracing::info!("成功加载 {} 个账号: {}", accounts.len(), path.display());
    Ok(accounts)
}

/// 解析账号文件内容
pub fn parse_accounts(content: &str, path: &Path) -> AppResult<Vec<Account>> {
    let file: AccountsFile = toml::from_str(content).map_err(|e| ConfigError::TomlParseFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(file.accounts)
}
