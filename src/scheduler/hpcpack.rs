//! HPC Pack adapter built on the `job` and `cluscfg` command-line tools

use super::api::{
    ApiError, ApiResult, Credentials, JobProperties, RemoteJobId, SchedulerApi, ServerVersion,
};
use crate::graph::Task;
use crate::job::UnitType;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Port the HPC Pack scheduler service listens on
pub const DEFAULT_SCHEDULER_PORT: u16 = 5800;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Talks to an HPC Pack head node through its command-line client
///
/// `connect` only probes the scheduler port; every later call runs one
/// command against `/scheduler:<host>`. Node preparation and release tasks
/// are ordered by their task type, so no explicit dependency is passed.
#[derive(Debug, Clone)]
pub struct HpcPackCli {
    job_program: String,
    cluscfg_program: String,
    port: u16,
    host: Option<String>,
}

impl HpcPackCli {
    /// Adapter using `job` and `cluscfg` from `PATH`
    pub fn new() -> Self {
        Self {
            job_program: "job".to_string(),
            cluscfg_program: "cluscfg".to_string(),
            port: DEFAULT_SCHEDULER_PORT,
            host: None,
        }
    }

    /// Override the scheduler port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the tool paths
    pub fn with_programs(mut self, job: impl Into<String>, cluscfg: impl Into<String>) -> Self {
        self.job_program = job.into();
        self.cluscfg_program = cluscfg.into();
        self
    }

    fn host(&self) -> ApiResult<&str> {
        self.host.as_deref().ok_or_else(|| ApiError::new("not connected"))
    }

    fn run(&self, program: &str, args: &[String]) -> ApiResult<String> {
        tracing::debug!("Running {} {}", program, redact(args).join(" "));
        let output = Command::new(program).args(args).output()?;
        check_output(program, output)
    }
}

impl Default for HpcPackCli {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerApi for HpcPackCli {
    fn connect(&mut self, host: &str, timeout: Duration) -> ApiResult<()> {
        let addrs: Vec<_> = (host, self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(ApiError::new(format!("{} did not resolve", host)));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => {
                    tracing::debug!("Scheduler port open at {}", addr);
                    self.host = Some(host.to_string());
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .map(ApiError::from)
            .unwrap_or_else(|| ApiError::new("no address reachable")))
    }

    fn server_version(&mut self) -> ApiResult<ServerVersion> {
        let args = vec!["view".to_string(), format!("/scheduler:{}", self.host()?)];
        let stdout = self.run(&self.cluscfg_program, &args)?;
        parse_server_version(&stdout)
            .ok_or_else(|| ApiError::new("no scheduler version in cluscfg output"))
    }

    fn create_job(&mut self, properties: &JobProperties) -> ApiResult<RemoteJobId> {
        let args = job_new_args(self.host()?, properties);
        let stdout = self.run(&self.job_program, &args)?;
        parse_created_job(&stdout)
            .map(RemoteJobId)
            .ok_or_else(|| ApiError::new(format!("unexpected job new output: {}", stdout.trim())))
    }

    fn create_task(&mut self, job: RemoteJobId, task: &Task) -> ApiResult<()> {
        let args = job_add_args(self.host()?, job, task);
        self.run(&self.job_program, &args).map(|_| ())
    }

    fn submit_job(&mut self, job: RemoteJobId, credentials: &Credentials, timeout: Duration) -> ApiResult<u64> {
        let args = job_submit_args(self.host()?, job, credentials);
        tracing::debug!("Running {} {}", self.job_program, redact(&args).join(" "));

        let mut child = Command::new(&self.job_program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ApiError::new(format!(
                    "job submit timed out after {}",
                    humantime::format_duration(timeout)
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        check_output(&self.job_program, output)?;
        Ok(job.0)
    }

    fn close(&mut self) {
        self.host = None;
    }
}

/// Read a child pipe to the end on its own thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn check_output(program: &str, output: Output) -> ApiResult<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return Ok(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
    Err(ApiError::new(format!("{} exited with {}: {}", program, output.status, detail)))
}

fn redact(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| {
            if a.to_ascii_lowercase().starts_with("/password:") {
                "/password:***".to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}

fn job_new_args(host: &str, properties: &JobProperties) -> Vec<String> {
    let units = match properties.unit_type {
        UnitType::Node => "/numnodes:*-*",
        UnitType::Core => "/numcores:*-*",
    };
    vec![
        "new".to_string(),
        format!("/scheduler:{}", host),
        format!("/jobname:{}", properties.name),
        format!("/exclusive:{}", properties.exclusive),
        units.to_string(),
    ]
}

fn job_add_args(host: &str, job: RemoteJobId, task: &Task) -> Vec<String> {
    let mut args = vec![
        "add".to_string(),
        job.to_string(),
        format!("/scheduler:{}", host),
        format!("/name:{}", task.name),
        format!("/type:{}", task.kind),
    ];
    for (key, value) in &task.environment {
        args.push(format!("/env:{}={}", key, value));
    }
    if let Some(io) = &task.io_redirect {
        args.push(format!("/stdout:{}", io.stdout));
        args.push(format!("/stderr:{}", io.stderr));
    }
    if let Some(range) = task.sweep_range {
        args.push(format!("/parametric:{}-{}:{}", range.start, range.end, range.step));
    }
    if let Some(bounds) = task.resource_bounds {
        args.push(format!("/numcores:{}-{}", bounds.min_cores, bounds.max_cores));
    }
    args.extend(task.command_line.split_whitespace().map(String::from));
    args
}

fn job_submit_args(host: &str, job: RemoteJobId, credentials: &Credentials) -> Vec<String> {
    let mut args = vec![
        "submit".to_string(),
        format!("/id:{}", job),
        format!("/scheduler:{}", host),
    ];
    if let Some(user) = &credentials.user {
        args.push(format!("/user:{}", user));
    }
    if let Some(password) = &credentials.password {
        args.push(format!("/password:{}", password));
    }
    args
}

/// Extract the id from `job new` output such as `Created job, ID: 42`
pub fn parse_created_job(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let (_, id) = line.split_once("ID:")?;
        id.trim().trim_end_matches('.').parse().ok()
    })
}

/// Find the first `major.minor.build.revision` token in `cluscfg` output
pub fn parse_server_version(output: &str) -> Option<ServerVersion> {
    output
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .find_map(|token| token.trim_matches(|c: char| !c.is_ascii_digit()).parse().ok())
}
