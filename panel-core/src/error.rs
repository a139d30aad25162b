use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

/// 错误分类，供 HTTP / CLI 层映射状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Security,
    Io,
    Internal,
}

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("配置序列化错误: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("DuckDB数据库错误: {0}")]
    DuckDb(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("ZIP 文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("路径错误: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("无效的 {field} 字段 '{value}': {reason}")]
    InvalidCronField {
        field: String,
        value: String,
        reason: String,
    },

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("归档条目越界: {0}")]
    PathTraversal(String),

    #[error("不支持的归档格式: {0}")]
    UnsupportedArchive(String),

    #[error("定时任务 {0} 已在调度器中")]
    AlreadyScheduled(i64),

    #[error("操作冲突: {0}")]
    Conflict(String),

    #[error("备份操作失败: {0}")]
    Backup(String),

    #[error("进程管理错误: {0}")]
    Supervisor(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

// 为DuckDB错误实现From trait
impl From<duckdb::Error> for PanelError {
    fn from(err: duckdb::Error) -> Self {
        PanelError::DuckDb(err.to_string())
    }
}

impl PanelError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    pub fn supervisor(msg: impl Into<String>) -> Self {
        Self::Supervisor(msg.into())
    }

    /// 错误所属分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidCronField { .. } | Self::UnsupportedArchive(_) => {
                ErrorKind::Validation
            }
            Self::Config(_) | Self::ConfigSerialize(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyScheduled(_) | Self::Conflict(_) => ErrorKind::Conflict,
            Self::PathTraversal(_) => ErrorKind::Security,
            Self::Io(_) | Self::WalkDir(_) | Self::Zip(_) => ErrorKind::Io,
            _ => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(PanelError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(PanelError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(PanelError::AlreadyScheduled(1).kind(), ErrorKind::Conflict);
        assert_eq!(
            PanelError::PathTraversal("../a".into()).kind(),
            ErrorKind::Security
        );
        assert_eq!(
            PanelError::from(std::io::Error::other("disk full")).kind(),
            ErrorKind::Io
        );
        assert_eq!(PanelError::custom("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_cron_field_message_names_field_and_value() {
        let err = PanelError::InvalidCronField {
            field: "minute".into(),
            value: "60".into(),
            reason: "超出范围 0-59".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("minute"));
        assert!(msg.contains("60"));
    }
}
