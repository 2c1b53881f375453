use crate::config::SupervisorConfig;
use crate::error::{HealthgateError, Result};
use crate::process::ChildProcess;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Everything needed to start the child
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, OsString>,
}

impl LaunchSpec {
    /// Build the launch spec for a configuration, including the environment
    /// overlay (search path and unbuffered output flag)
    pub fn from_config(config: &SupervisorConfig) -> Result<Self> {
        let mut env: HashMap<String, OsString> = config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), OsString::from(v)))
            .collect();

        if !config.search_path.is_empty() {
            let existing = env
                .get(&config.search_path_var)
                .cloned()
                .or_else(|| std::env::var_os(&config.search_path_var));
            let joined = extend_search_path(&config.search_path, existing)?;
            env.insert(config.search_path_var.clone(), joined);
        }

        if let Some(ref var) = config.unbuffered_var {
            env.insert(var.clone(), OsString::from("1"));
        }

        Ok(Self {
            program: config.command.clone(),
            args: config.rendered_args(),
            cwd: config.cwd.clone(),
            env,
        })
    }

    /// The program path the child is started from
    ///
    /// A relative path with a directory part (`./server.sh`,
    /// `venv/bin/uvicorn`) is taken relative to `cwd` when one is set.
    /// Bare names are left alone for the PATH lookup.
    pub fn resolved_program(&self) -> PathBuf {
        match self.cwd {
            Some(ref cwd)
                if self.program.is_relative() && self.program.components().count() > 1 =>
            {
                cwd.join(&self.program)
            }
            _ => self.program.clone(),
        }
    }
}

/// Prepend `entries` to an existing search path value, keeping what was there
fn extend_search_path(entries: &[PathBuf], existing: Option<OsString>) -> Result<OsString> {
    let mut paths: Vec<PathBuf> = entries.to_vec();
    if let Some(existing) = existing {
        paths.extend(std::env::split_paths(&existing));
    }

    std::env::join_paths(paths).map_err(|e| {
        HealthgateError::LaunchFailure(format!("Invalid search path entry: {}", e))
    })
}

/// Start the child without waiting for it
///
/// stdout and stderr are piped so they can be captured into the log file.
/// The child is killed if its handle is dropped, so a supervisor that bails
/// out early never leaves an orphan behind.
pub fn launch(spec: &LaunchSpec) -> Result<ChildProcess> {
    let program = spec.resolved_program();

    // A program given as a path must exist; bare names are resolved via PATH
    if program.components().count() > 1 && !program.exists() {
        return Err(HealthgateError::LaunchFailure(format!(
            "Executable does not exist: {}",
            program.display()
        )));
    }

    let mut command = Command::new(&program);
    command.args(&spec.args);

    if let Some(ref cwd) = spec.cwd {
        command.current_dir(cwd);
    }

    command.envs(&spec.env);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);
    // Own process group, so signals also reach the child's workers
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|e| {
        HealthgateError::LaunchFailure(format!(
            "Failed to spawn '{}': {}",
            spec.program.display(),
            e
        ))
    })?;

    let pid = child.id().ok_or_else(|| {
        HealthgateError::LaunchFailure(format!(
            "Failed to get PID for '{}'",
            spec.program.display()
        ))
    })?;

    tracing::info!(
        "Launched {} (PID: {}) with args {:?}",
        spec.program.display(),
        pid,
        spec.args
    );

    Ok(ChildProcess::group_leader(child, pid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessHandle;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn spec(program: &str, args: &[&str]) -> LaunchSpec {
        LaunchSpec {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    async fn read_stdout(process: &mut ChildProcess) -> String {
        let mut out = String::new();
        process
            .child_mut()
            .stdout
            .take()
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_launch_simple_process() {
        let mut process = launch(&spec("/bin/echo", &["hello"])).unwrap();
        assert!(process.pid() > 0);
        assert_eq!(read_stdout(&mut process).await.trim(), "hello");
        assert!(process.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_launch_with_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut launch_spec = spec("/bin/pwd", &[]);
        launch_spec.cwd = Some(temp_dir.path().to_path_buf());

        let mut process = launch(&launch_spec).unwrap();
        let out = read_stdout(&mut process).await;
        let expected = temp_dir.path().canonicalize().unwrap();
        assert_eq!(PathBuf::from(out.trim()).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_launch_nonexistent_executable() {
        let result = launch(&spec("/nonexistent/server", &[]));
        match result {
            Err(HealthgateError::LaunchFailure(msg)) => assert!(msg.contains("does not exist")),
            other => panic!("Expected LaunchFailure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_program_resolves_against_cwd() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("bin")).unwrap();
        std::os::unix::fs::symlink("/bin/echo", temp_dir.path().join("bin/server")).unwrap();
        std::os::unix::fs::symlink("/bin/echo", temp_dir.path().join("server")).unwrap();

        for program in ["./server", "bin/server"] {
            let mut launch_spec = spec(program, &["started"]);
            launch_spec.cwd = Some(temp_dir.path().to_path_buf());
            assert_eq!(
                launch_spec.resolved_program(),
                temp_dir.path().join(program)
            );

            let mut process = launch(&launch_spec).unwrap();
            assert_eq!(read_stdout(&mut process).await.trim(), "started");
            assert!(process.wait().await.unwrap().success());
        }
    }

    #[test]
    fn test_bare_and_absolute_programs_are_not_rebased() {
        let mut launch_spec = spec("uvicorn", &[]);
        launch_spec.cwd = Some(PathBuf::from("/app"));
        assert_eq!(launch_spec.resolved_program(), PathBuf::from("uvicorn"));

        launch_spec.program = PathBuf::from("/usr/bin/env");
        assert_eq!(launch_spec.resolved_program(), PathBuf::from("/usr/bin/env"));
    }

    #[tokio::test]
    async fn test_launch_unknown_command_on_path() {
        let result = launch(&spec("healthgate-no-such-binary", &[]));
        assert!(matches!(result, Err(HealthgateError::LaunchFailure(_))));
    }

    #[tokio::test]
    async fn test_environment_overlay() {
        let mut config = SupervisorConfig::new("env-test", "/bin/sh");
        config.args = vec![
            "-c".to_string(),
            "echo \"$HG_SEARCH|$HG_UNBUFFERED|$HG_EXTRA\"".to_string(),
        ];
        config.search_path_var = "HG_SEARCH".to_string();
        config.search_path = vec![PathBuf::from("/app"), PathBuf::from("/lib")];
        config.unbuffered_var = Some("HG_UNBUFFERED".to_string());
        config.env.insert("HG_EXTRA".to_string(), "x".to_string());
        config
            .env
            .insert("HG_SEARCH".to_string(), "/existing".to_string());

        let launch_spec = LaunchSpec::from_config(&config).unwrap();
        let mut process = launch(&launch_spec).unwrap();
        let out = read_stdout(&mut process).await;

        assert_eq!(out.trim(), "/app:/lib:/existing|1|x");
    }

    #[test]
    fn test_search_path_without_existing_value() {
        let joined = extend_search_path(&[PathBuf::from("/app")], None).unwrap();
        assert_eq!(joined, OsString::from("/app"));
    }
}
