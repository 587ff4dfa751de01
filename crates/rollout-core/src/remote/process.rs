//! Child process driver shared by the session implementations.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use super::{SessionError, SessionOutput};

/// Spawn `command`, feed `script` on stdin and collect its output.
///
/// Output lines are logged as they arrive. With a timeout, the child is
/// killed when the limit is reached.
pub(crate) fn run_script(
    mut command: Command,
    program: &str,
    script: &str,
    timeout: Option<Duration>,
) -> Result<SessionOutput, SessionError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SessionError::Spawn {
            program: program.to_string(),
            source,
        })?;
        tracing::debug!(program, pid = child.id(), "session process started");

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, drive(&mut child, script))
                .await
                .ok(),
            None => Some(drive(&mut child, script).await),
        };

        match outcome {
            Some(result) => result,
            None => {
                let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
                tracing::warn!(program, secs, "session timed out, killing process");
                let _ = child.kill().await;
                Err(SessionError::TimedOut { secs })
            }
        }
    })
}

async fn drive(child: &mut Child, script: &str) -> Result<SessionOutput, SessionError> {
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(script.as_bytes()).await {
            Ok(()) => {}
            // the process exited before reading everything; its status tells why
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(err) => return Err(err.into()),
        }
        drop(stdin);
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr, status) = tokio::join!(
        collect_lines(stdout, "stdout"),
        collect_lines(stderr, "stderr"),
        child.wait()
    );

    Ok(SessionOutput {
        exit_code: status?.code(),
        stdout: stdout?,
        stderr: stderr?,
    })
}

async fn collect_lines<R>(reader: Option<R>, stream: &'static str) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        tracing::info!(target: "rollout::remote", stream, "{}", line);
        collected.push_str(line);
        collected.push('\n');
    }
    Ok(collected)
}
