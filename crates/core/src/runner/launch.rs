//! Turning a command line into a spawned child process.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};

use super::error::LaunchError;

/// How a command line becomes a program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Launcher {
    /// Split shell-style and execute the first word directly.
    #[default]
    Direct,

    /// Run `program args... <command line>`, e.g. `bash -c <line>`.
    Shell { program: String, args: Vec<String> },
}

impl Launcher {
    /// Build a launcher from the `runner.shell` setting.
    ///
    /// `None` or an empty list selects direct execution.
    pub fn from_shell(shell: Option<&[String]>) -> Self {
        match shell {
            Some([program, args @ ..]) => Launcher::Shell {
                program: program.clone(),
                args: args.to_vec(),
            },
            _ => Launcher::Direct,
        }
    }

    /// Resolve `line` to a program and argument vector.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Empty`] for a blank line and
    /// [`LaunchError::Unparsable`] when direct mode cannot split it.
    pub fn argv(&self, line: &str) -> Result<(String, Vec<String>), LaunchError> {
        if line.trim().is_empty() {
            return Err(LaunchError::Empty);
        }
        match self {
            Launcher::Direct => {
                let mut words = shlex::split(line).ok_or(LaunchError::Unparsable)?;
                if words.is_empty() {
                    return Err(LaunchError::Empty);
                }
                let program = words.remove(0);
                Ok((program, words))
            }
            Launcher::Shell { program, args } => {
                let mut argv = args.clone();
                argv.push(line.to_string());
                Ok((program.clone(), argv))
            }
        }
    }

    /// Spawn `line` with stdin closed and both output streams piped.
    ///
    /// On unix the child leads a new process group, so [`kill_group`]
    /// reaches anything it forks. The child is killed if its handle is
    /// dropped before it exits.
    pub fn spawn(&self, line: &str) -> Result<Child, LaunchError> {
        let (program, args) = self.argv(line)?;
        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
            .spawn()
            .map_err(|source| LaunchError::Spawn { program, source })
    }
}

/// Send SIGKILL to the process group led by `child`.
///
/// Descendants holding the output pipes die with it, so the drains reach
/// end-of-stream. Must be called before the child is reaped.
#[cfg(unix)]
pub(crate) fn kill_group(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return child.start_kill();
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return child.start_kill();
    };
    // SAFETY: killpg only reads its arguments.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
