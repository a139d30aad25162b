// DuckDB数据库模块
//
// DuckDB连接只能由单个线程持有，这里通过Actor模式串行化所有访问，
// 对外提供异步、类型安全的API。
//
// 主要组件：
// - DuckDbManager: 高级API接口，供应用程序使用
// - DuckDbActor: 内部Actor，处理实际的数据库操作
// - DbMessage: Actor消息定义

mod actor;
mod manager;
mod messages;

// 公开核心接口
pub use manager::DuckDbManager;
