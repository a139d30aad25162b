use crate::config::SupervisorConfig;
use crate::constants::supervisor::SHELL_COMMAND_FLAG;
use crate::error::{PanelError, Result};
use crate::models::ServerRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 受管进程的状态查询与控制
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    async fn is_server_running(&self, server: &ServerRecord) -> bool;

    async fn start_server(&self, server: &ServerRecord) -> Result<()>;

    async fn stop_server(&self, server: &ServerRecord) -> Result<()>;

    async fn restart_server(&self, server: &ServerRecord) -> Result<()>;

    /// 向控制台写入一行命令
    async fn send_command(&self, server: &ServerRecord, command: &str) -> Result<()>;

    /// 停止全部受管进程（进程退出前调用）
    async fn stop_all(&self) {}
}

struct ManagedProcess {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stop_command: Option<String>,
}

/// 本机进程管理：通过 shell 启动服务器并持有其标准输入输出
pub struct LocalSupervisor {
    shell: String,
    stop_timeout: Duration,
    processes: Mutex<HashMap<i64, ManagedProcess>>,
}

impl LocalSupervisor {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
            processes: Mutex::new(HashMap::new()),
        }
    }

    /// 检查 shell 是否可用
    pub fn check_prerequisites(&self) -> Result<()> {
        which::which(&self.shell)
            .map(|_| ())
            .map_err(|_| PanelError::supervisor(format!("shell '{}' 未安装或不在 PATH 中", self.shell)))
    }

    /// 将子进程输出逐行转发到日志
    fn forward_output<R>(name: String, stream: R, is_stderr: bool)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if is_stderr {
                    warn!(server = %name, "{}", line);
                } else {
                    info!(server = %name, "{}", line);
                }
            }
        });
    }

    async fn shutdown(&self, mut process: ManagedProcess) -> Result<()> {
        if let (Some(stop_command), Some(stdin)) =
            (process.stop_command.as_deref(), process.stdin.as_mut())
        {
            let line = format!("{stop_command}\n");
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                warn!("发送停止命令失败 {}: {}", process.name, e);
            }
            let _ = stdin.flush().await;
        } else {
            // 没有停止命令时关闭标准输入后直接结束进程
            process.stdin.take();
            process.child.start_kill()?;
        }

        match tokio::time::timeout(self.stop_timeout, process.child.wait()).await {
            Ok(status) => {
                info!("服务器 {} 已退出: {}", process.name, status?);
            }
            Err(_) => {
                warn!(
                    "服务器 {} 在 {:?} 内未退出，强制结束",
                    process.name, self.stop_timeout
                );
                process.child.kill().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessSupervisor for LocalSupervisor {
    async fn is_server_running(&self, server: &ServerRecord) -> bool {
        let mut processes = self.processes.lock().await;
        let running = match processes.get_mut(&server.id) {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => return false,
        };
        if !running {
            processes.remove(&server.id);
        }
        running
    }

    async fn start_server(&self, server: &ServerRecord) -> Result<()> {
        // 检查与登记在同一把锁内完成，并发启动只会成功一次
        let mut processes = self.processes.lock().await;
        let running = processes
            .get_mut(&server.id)
            .is_some_and(|process| matches!(process.child.try_wait(), Ok(None)));
        if running {
            return Err(PanelError::conflict(format!("服务器 {} 已在运行", server.name)));
        }
        processes.remove(&server.id);

        let folder = server.folder();
        if !folder.is_dir() {
            return Err(PanelError::not_found(format!(
                "服务器目录不存在: {}",
                folder.display()
            )));
        }
        self.check_prerequisites()?;

        let mut child = Command::new(&self.shell)
            .arg(SHELL_COMMAND_FLAG)
            .arg(&server.start_command)
            .current_dir(&folder)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PanelError::supervisor(format!("启动服务器 {} 失败: {e}", server.name)))?;

        if let Some(stdout) = child.stdout.take() {
            Self::forward_output(server.name.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            Self::forward_output(server.name.clone(), stderr, true);
        }

        let stdin = child.stdin.take();
        info!("服务器 {} 已启动 (pid: {:?})", server.name, child.id());

        processes.insert(
            server.id,
            ManagedProcess {
                name: server.name.clone(),
                child,
                stdin,
                stop_command: server.stop_command.clone(),
            },
        );
        Ok(())
    }

    async fn stop_server(&self, server: &ServerRecord) -> Result<()> {
        let process = self.processes.lock().await.remove(&server.id);
        match process {
            Some(process) => self.shutdown(process).await,
            None => Err(PanelError::conflict(format!("服务器 {} 未运行", server.name))),
        }
    }

    async fn restart_server(&self, server: &ServerRecord) -> Result<()> {
        if self.is_server_running(server).await {
            self.stop_server(server).await?;
        }
        self.start_server(server).await
    }

    async fn send_command(&self, server: &ServerRecord, command: &str) -> Result<()> {
        let mut processes = self.processes.lock().await;
        let stdin = processes
            .get_mut(&server.id)
            .and_then(|p| p.stdin.as_mut())
            .ok_or_else(|| PanelError::conflict(format!("服务器 {} 未运行", server.name)))?;

        stdin.write_all(format!("{command}\n").as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn stop_all(&self) {
        let processes: Vec<ManagedProcess> =
            self.processes.lock().await.drain().map(|(_, p)| p).collect();
        for process in processes {
            let name = process.name.clone();
            if let Err(e) = self.shutdown(process).await {
                warn!("停止服务器 {} 失败: {}", name, e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn server(folder: &std::path::Path, start: &str, stop: Option<&str>) -> ServerRecord {
        ServerRecord {
            id: 1,
            name: "echo".into(),
            folder_path: folder.to_string_lossy().to_string(),
            start_command: start.into(),
            stop_command: stop.map(str::to_string),
            backup_path: None,
            max_backups: 3,
            created_at: Utc::now(),
        }
    }

    fn supervisor() -> LocalSupervisor {
        LocalSupervisor::new(&SupervisorConfig {
            stop_timeout_secs: 5,
            shell: "sh".into(),
        })
    }

    #[tokio::test]
    async fn test_start_command_stop() {
        let dir = tempdir().unwrap();
        let script = r#"while read line; do echo "$line" >> console.log; [ "$line" = "stop" ] && exit 0; done"#;
        let server = server(dir.path(), script, Some("stop"));
        let supervisor = supervisor();

        assert!(!supervisor.is_server_running(&server).await);
        supervisor.start_server(&server).await.unwrap();
        assert!(supervisor.is_server_running(&server).await);
        assert!(matches!(
            supervisor.start_server(&server).await,
            Err(PanelError::Conflict(_))
        ));

        supervisor.send_command(&server, "say hello").await.unwrap();
        supervisor.stop_server(&server).await.unwrap();
        assert!(!supervisor.is_server_running(&server).await);

        let log = std::fs::read_to_string(dir.path().join("console.log")).unwrap();
        assert!(log.contains("say hello"));
        assert!(log.contains("stop"));
    }

    #[tokio::test]
    async fn test_stop_without_stop_command_kills() {
        let dir = tempdir().unwrap();
        let server = server(dir.path(), "sleep 30", None);
        let supervisor = supervisor();

        supervisor.start_server(&server).await.unwrap();
        supervisor.stop_server(&server).await.unwrap();
        assert!(!supervisor.is_server_running(&server).await);
    }

    #[tokio::test]
    async fn test_not_running_errors() {
        let dir = tempdir().unwrap();
        let server = server(dir.path(), "true", None);
        let supervisor = supervisor();

        assert!(matches!(
            supervisor.stop_server(&server).await,
            Err(PanelError::Conflict(_))
        ));
        assert!(supervisor.send_command(&server, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_folder() {
        let dir = tempdir().unwrap();
        let server = server(&dir.path().join("missing"), "true", None);
        assert!(matches!(
            supervisor().start_server(&server).await,
            Err(PanelError::NotFound(_))
        ));
    }
}
