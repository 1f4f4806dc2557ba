// ── Processes ─────────────────────────────────────────────────────────────────
//
// `HPROCESS` wraps either the current-process pseudo-handle or an owned
// handle from `OpenProcess` / `CreateProcessW`.  `Command` is the builder
// for `CreateProcessW`; its command line and environment block are built by
// `marshal` and kept alive until the call returns.

#![allow(unsafe_code)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Serialize;
use tracing::debug;
use windows::{
    core::{PCWSTR, PWSTR},
    Win32::{
        Foundation::{BOOL, FILETIME, HANDLE},
        System::Threading::{
            CreateProcessW, GetCurrentProcess, GetCurrentProcessId, GetExitCodeProcess,
            GetPriorityClass, GetProcessId, GetProcessTimes, OpenProcess,
            QueryFullProcessImageNameW, SetPriorityClass, TerminateProcess,
            PROCESS_ACCESS_RIGHTS, PROCESS_CREATION_FLAGS, PROCESS_INFORMATION,
            PROCESS_NAME_WIN32, STARTF_USESHOWWINDOW, STARTUPINFOW,
        },
    },
};

use super::{
    flags::{CreationFlags, PriorityClass, ProcessAccess},
    system,
    thread::HTHREAD,
};
use crate::{
    error::{codes, Error, Result, ResultExt},
    handle::{KernelHandle, MaybeOwned, OwnedHandle, Timeout, WaitOutcome},
    marshal::{cmdline, env_block, WString, WideBuf},
    time::FileTime,
    user::flags::ShowWindow,
};

// ── HPROCESS ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HPROCESS(MaybeOwned);

impl KernelHandle for HPROCESS {
    fn raw(&self) -> HANDLE {
        self.0.raw()
    }
}

/// CPU accounting from `GetProcessTimes`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessTimes {
    pub created: FileTime,
    /// Zero while the process is running.
    pub exited: FileTime,
    pub kernel: Duration,
    pub user: Duration,
}

impl HPROCESS {
    /// The current process's pseudo-handle; never closed.
    pub fn current() -> Self {
        // SAFETY: no parameters; always returns the pseudo-handle.
        Self(MaybeOwned::Pseudo(unsafe { GetCurrentProcess() }))
    }

    /// `OpenProcess`
    pub fn open(pid: u32, access: ProcessAccess) -> Result<Self> {
        // SAFETY: plain value arguments.
        let h = unsafe { OpenProcess(PROCESS_ACCESS_RIGHTS(access.bits()), BOOL::from(false), pid) }
            .context("OpenProcess")?;
        Ok(Self(MaybeOwned::Owned(OwnedHandle::from_raw(h, "OpenProcess")?)))
    }

    pub(crate) fn from_owned(h: OwnedHandle) -> Self {
        Self(MaybeOwned::Owned(h))
    }

    pub fn id(&self) -> Result<u32> {
        // SAFETY: plain handle argument; 0 signals failure.
        match unsafe { GetProcessId(self.raw()) } {
            0 => Err(Error::last("GetProcessId")),
            pid => Ok(pid),
        }
    }

    /// `None` while the process is still running.
    ///
    /// A process that really exited with 259 (`STILL_ACTIVE`) is reported as
    /// running unless it is also signaled.
    pub fn exit_code(&self) -> Result<Option<u32>> {
        let mut code = 0u32;
        // SAFETY: `code` is a valid out-pointer.
        unsafe { GetExitCodeProcess(self.raw(), &mut code) }.context("GetExitCodeProcess")?;
        if code == codes::STILL_ACTIVE && self.wait(Timeout::Millis(0))? == WaitOutcome::TimedOut {
            return Ok(None);
        }
        Ok(Some(code))
    }

    pub fn is_running(&self) -> Result<bool> {
        Ok(self.wait(Timeout::Millis(0))? == WaitOutcome::TimedOut)
    }

    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        // SAFETY: plain value arguments.
        unsafe { TerminateProcess(self.raw(), exit_code) }.context("TerminateProcess")
    }

    /// Full Win32 path of the executable (`QueryFullProcessImageNameW`).
    pub fn image_path(&self) -> Result<PathBuf> {
        WideBuf::fill(260, |buf| {
            let mut size = buf.len() as u32;
            // SAFETY: `size` carries the buffer capacity in and the written
            // length (terminator excluded) out.
            let r = unsafe {
                QueryFullProcessImageNameW(self.raw(), PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size)
            };
            match r.context("QueryFullProcessImageNameW") {
                Ok(()) => Ok(size),
                Err(e) if e.is_win32(codes::ERROR_INSUFFICIENT_BUFFER) => Ok(buf.len() as u32),
                Err(e) => Err(e),
            }
        })
        .map(PathBuf::from)
    }

    pub fn priority(&self) -> Result<PriorityClass> {
        // SAFETY: plain handle argument; 0 signals failure.
        let raw = unsafe { GetPriorityClass(self.raw()) };
        if raw == 0 {
            return Err(Error::last("GetPriorityClass"));
        }
        PriorityClass::from_raw(raw).ok_or(Error::Win32 {
            function: "GetPriorityClass",
            code: codes::ERROR_INVALID_PARAMETER,
        })
    }

    pub fn set_priority(&self, class: PriorityClass) -> Result<()> {
        // SAFETY: plain value arguments.
        unsafe { SetPriorityClass(self.raw(), PROCESS_CREATION_FLAGS(class as u32)) }
            .context("SetPriorityClass")
    }

    pub fn times(&self) -> Result<ProcessTimes> {
        let mut t = [FILETIME::default(); 4];
        let [c, e, k, u] = &mut t;
        // SAFETY: four distinct, valid out-pointers.
        unsafe { GetProcessTimes(self.raw(), c, e, k, u) }.context("GetProcessTimes")?;
        let [c, e, k, u] = t.map(FileTime::from);
        Ok(ProcessTimes {
            created: c,
            exited: e,
            kernel: k.as_duration(),
            user: u.as_duration(),
        })
    }
}

/// `GetCurrentProcessId`
pub fn current_id() -> u32 {
    // SAFETY: no parameters; cannot fail.
    unsafe { GetCurrentProcessId() }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A spawned process and its primary thread.
#[derive(Debug)]
pub struct Child {
    pub process: HPROCESS,
    pub thread: HTHREAD,
    pub pid: u32,
    pub tid: u32,
}

impl Child {
    pub fn wait(&self) -> Result<u32> {
        self.process.wait(Timeout::Infinite)?;
        self.process.exit_code()?.ok_or(Error::Win32 {
            function: "GetExitCodeProcess",
            code: codes::STILL_ACTIVE,
        })
    }
}

/// Builder for `CreateProcessW`.
///
/// Defaults: no arguments, inherited working directory and environment,
/// default show state, handles not inherited.
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, Option<String>)>,
    env_clear: bool,
    show: Option<ShowWindow>,
    flags: CreationFlags,
    inherit_handles: bool,
}

impl Command {
    /// `program` is resolved with the `CreateProcessW` search rules since it
    /// is passed only as the first command-line token.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            env_clear: false,
            show: None,
            flags: CreationFlags::empty(),
            inherit_handles: false,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((key.into(), Some(value.into())));
        self
    }

    pub fn env_remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.env.push((key.into(), None));
        self
    }

    /// Start the child from an empty environment.
    pub fn env_clear(&mut self) -> &mut Self {
        self.env_clear = true;
        self.env.clear();
        self
    }

    pub fn show(&mut self, show: ShowWindow) -> &mut Self {
        self.show = Some(show);
        self
    }

    /// `CREATE_NO_WINDOW`: console programs get no console window.
    pub fn no_window(&mut self) -> &mut Self {
        self.flags |= CreationFlags::CREATE_NO_WINDOW;
        self
    }

    /// `CREATE_SUSPENDED`: the primary thread waits for `resume()`.
    pub fn suspended(&mut self) -> &mut Self {
        self.flags |= CreationFlags::CREATE_SUSPENDED;
        self
    }

    pub fn creation_flags(&mut self, flags: CreationFlags) -> &mut Self {
        self.flags |= flags;
        self
    }

    pub fn inherit_handles(&mut self, inherit: bool) -> &mut Self {
        self.inherit_handles = inherit;
        self
    }

    /// The command line passed to `CreateProcessW`.
    pub fn command_line(&self) -> String {
        cmdline::join(&self.program, &self.args)
    }

    /// The environment block, or `None` to inherit the parent's unchanged.
    fn environment(&self) -> Result<Option<Vec<u16>>> {
        if !self.env_clear && self.env.is_empty() {
            return Ok(None);
        }
        let mut vars = if self.env_clear { Vec::new() } else { system::env_vars()? };
        for (key, value) in &self.env {
            let folded = env_block::fold_key(key);
            vars.retain(|(k, _)| env_block::fold_key(k) != folded);
            if let Some(v) = value {
                vars.push((key.clone(), v.clone()));
            }
        }
        env_block::build(vars).map(Some)
    }

    pub fn spawn(&self) -> Result<Child> {
        let line = self.command_line();
        let mut wline = WString::new(&line)?;
        let wdir = self.current_dir.as_deref().map(WString::from_path).transpose()?;
        let env = self.environment()?;

        let mut flags = self.flags;
        if env.is_some() {
            flags |= CreationFlags::CREATE_UNICODE_ENVIRONMENT;
        }

        let mut si = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        if let Some(show) = self.show {
            si.dwFlags = STARTF_USESHOWWINDOW;
            si.wShowWindow = show as i32 as u16;
        }
        let mut pi = PROCESS_INFORMATION::default();

        // SAFETY: the command line is a mutable NUL-terminated buffer that
        // outlives the call (CreateProcessW may write into it); the directory
        // is NUL-terminated or NULL; the environment block is double-NUL
        // terminated UTF-16 matching CREATE_UNICODE_ENVIRONMENT; si and pi
        // are valid for the call.
        unsafe {
            CreateProcessW(
                PCWSTR::null(),
                wline.as_pwstr(),
                None,
                None,
                BOOL::from(self.inherit_handles),
                PROCESS_CREATION_FLAGS(flags.bits()),
                env.as_ref().map(|b| b.as_ptr().cast()),
                WString::opt_pcwstr(wdir.as_ref()),
                &si,
                &mut pi,
            )
        }
        .context("CreateProcessW")?;

        // Take ownership of both handles before anything else can fail.
        let process = HPROCESS::from_owned(OwnedHandle::from_raw(pi.hProcess, "CreateProcessW")?);
        let thread = HTHREAD::from_owned(OwnedHandle::from_raw(pi.hThread, "CreateProcessW")?);
        debug!(pid = pi.dwProcessId, tid = pi.dwThreadId, command = %line, "spawned process");
        Ok(Child {
            process,
            thread,
            pid: pi.dwProcessId,
            tid: pi.dwThreadId,
        })
    }

    /// Spawn, wait for exit and return the exit code.
    pub fn run(&self) -> Result<u32> {
        self.spawn()?.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::flags::ProcessAccess;

    fn cmd_exe() -> Command {
        let mut c = Command::new("cmd.exe");
        c.no_window();
        c
    }

    #[test]
    fn current_process_is_running_with_our_pid() {
        let me = HPROCESS::current();
        assert_eq!(me.id().unwrap(), current_id());
        assert_eq!(me.id().unwrap(), std::process::id());
        assert_eq!(me.exit_code().unwrap(), None);
        assert!(me.is_running().unwrap());
    }

    #[test]
    fn image_path_points_at_the_test_binary() {
        let path = HPROCESS::current().image_path().unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.file_name(), std::env::current_exe().unwrap().file_name());
    }

    #[test]
    fn process_times_accumulate() {
        let t = HPROCESS::current().times().unwrap();
        assert!(t.created.0 > 0);
        assert_eq!(t.exited.0, 0);
    }

    #[test]
    fn run_returns_the_exit_code() {
        assert_eq!(cmd_exe().args(["/C", "exit 7"]).run().unwrap(), 7);
    }

    #[test]
    fn custom_environment_reaches_the_child() {
        let code = cmd_exe()
            .env("WINHANDLE_CHILD_VAR", "42")
            .args(["/C", "if \"%WINHANDLE_CHILD_VAR%\"==\"42\" (exit 0) else (exit 1)"])
            .run()
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn working_directory_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        cmd_exe()
            .current_dir(dir.path())
            .args(["/C", "echo x> here.txt"])
            .run()
            .unwrap();
        assert!(dir.path().join("here.txt").exists());
    }

    #[test]
    fn suspended_child_can_be_terminated() {
        let child = cmd_exe().args(["/C", "exit 0"]).suspended().spawn().unwrap();
        assert!(child.process.is_running().unwrap());
        assert_eq!(child.thread.resume().unwrap(), 1);
        assert_eq!(child.wait().unwrap(), 0);

        let child = cmd_exe().args(["/C", "exit 0"]).suspended().spawn().unwrap();
        child.process.terminate(99).unwrap();
        assert_eq!(child.wait().unwrap(), 99);
    }

    #[test]
    fn open_by_pid_sees_the_same_process() {
        let child = cmd_exe().args(["/C", "exit 3"]).suspended().spawn().unwrap();
        let opened = HPROCESS::open(
            child.pid,
            ProcessAccess::QUERY_LIMITED_INFORMATION | ProcessAccess::SYNCHRONIZE | ProcessAccess::TERMINATE,
        )
        .unwrap();
        assert_eq!(opened.id().unwrap(), child.pid);
        opened.terminate(3).unwrap();
        assert_eq!(opened.wait(Timeout::Infinite).unwrap(), WaitOutcome::Signaled);
        assert_eq!(opened.exit_code().unwrap(), Some(3));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let err = Command::new("winhandle-definitely-missing.exe").spawn().unwrap_err();
        assert!(err.is_win32(codes::ERROR_FILE_NOT_FOUND), "{err}");
    }

    #[test]
    fn priority_can_be_changed_and_restored() {
        let me = HPROCESS::current();
        let original = me.priority().unwrap();
        me.set_priority(PriorityClass::BelowNormal).unwrap();
        assert_eq!(me.priority().unwrap(), PriorityClass::BelowNormal);
        me.set_priority(original).unwrap();
    }

    #[test]
    fn env_overrides_fold_non_ascii_case() {
        let mut c = Command::new("x.exe");
        c.env_clear().env("ÄPFEL", "1").env("äpfel", "2").env("Ñame", "x").env_remove("ñAME");
        let block = c.environment().unwrap().unwrap();
        assert_eq!(crate::marshal::multi_sz::decode(&block), vec!["äpfel=2"]);
    }

    #[test]
    fn command_line_is_quoted() {
        let mut c = Command::new(r"C:\Program Files\tool.exe");
        c.arg("a b");
        assert_eq!(c.command_line(), r#""C:\Program Files\tool.exe" "a b""#);
    }
}
