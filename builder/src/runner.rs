use std::process::Stdio;

use futures_util::future::try_join;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::util::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Pass {
    First,
    /// Rebuild after the partition table was resized.
    Second,
}

impl Pass {
    /// Make variable telling the port which pass this is.
    pub fn arg(&self) -> &'static str {
        match self {
            Pass::First => "SECOND_BUILD=0",
            Pass::Second => "SECOND_BUILD=1",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BuildOutput {
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: String,
}

/// Runs the external firmware build once and waits for it to finish.
pub trait BuildRunner {
    async fn run(&mut self, pass: Pass) -> Result<BuildOutput, Error>;
}

pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(command: &[String]) -> Result<Self, Error> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Other("empty build command".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl BuildRunner for CommandRunner {
    async fn run(&mut self, pass: Pass) -> Result<BuildOutput, Error> {
        log::info!("running {} {} {}", self.program, self.args.join(" "), pass.arg());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(pass.arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("build stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("build stderr not captured".to_string()))?;

        let (mut output, errors) = try_join(capture(stdout), capture(stderr)).await?;
        output.push_str(&errors);

        let status = child.wait().await?;
        // killed by a signal
        let exit_code = status.code().unwrap_or(-1);
        log::debug!("build exited with {}", exit_code);

        Ok(BuildOutput { exit_code, output })
    }
}

async fn capture<R: AsyncRead + Unpin>(stream: R) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut text = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(text);
        }
        let decoded = String::from_utf8_lossy(&line);
        log::debug!(target: "build", "{}", decoded.trim_end());
        text.push_str(&decoded);
    }
}
