use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};
use winhandle::{
    com::{ComInit, ShellLink},
    kernel::{
        flags::SnapshotFlags,
        snapshot::Snapshot,
        system::{self, MemoryStatus, SystemInfo},
    },
    shell::{self, FileInfoFlags, KnownFolder},
    user::{icon::HICON, monitor},
};

use crate::{
    report::{self, EnvReport, FolderReport, IconReport, OpenReport, Result, Size},
    Command,
};

#[derive(Debug, Serialize)]
struct SystemReport {
    computer_name: String,
    uptime_ms: u64,
    #[serde(flatten)]
    info: SystemInfo,
    memory: MemoryStatus,
}

pub(crate) fn run(command: &Command, compact: bool) -> Result<String> {
    debug!(?command, "running");
    match command {
        Command::Monitors => {
            let infos = monitor::monitors()?
                .into_iter()
                .map(|m| m.info())
                .collect::<winhandle::Result<Vec<_>>>()?;
            report::render(&infos, compact)
        }
        Command::Processes => report::render(&Snapshot::processes_now()?, compact),
        Command::Modules { pid } => {
            let snapshot = Snapshot::new(SnapshotFlags::MODULE | SnapshotFlags::MODULE32, *pid)?;
            let modules = snapshot.modules().collect::<winhandle::Result<Vec<_>>>()?;
            report::render(&modules, compact)
        }
        Command::Folders => {
            let folders: Vec<_> = KnownFolder::ALL
                .iter()
                .map(|&f| FolderReport::new(f.name(), shell::known_folder(f)))
                .collect();
            report::render(&folders, compact)
        }
        Command::Icon { file } => report::render(&icon_report(file)?, compact),
        Command::Open { target } => {
            shell::open(target)?;
            info!(%target, "opened");
            report::render(&OpenReport { opened: target.clone() }, compact)
        }
        Command::Shortcut {
            lnk,
            target,
            arguments,
        } => {
            let _com = ComInit::apartment()?;
            let mut link = ShellLink::new().target(target);
            if let Some(args) = arguments {
                link = link.arguments(args);
            }
            if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
                link = link.working_dir(dir);
            }
            link.save(lnk)?;
            report::render(&ShellLink::load(lnk)?, compact)
        }
        Command::Env { name } => {
            let value = system::env_var(name)?;
            report::render(
                &EnvReport {
                    name: name.clone(),
                    value,
                },
                compact,
            )
        }
        Command::System => {
            let r = SystemReport {
                computer_name: system::computer_name()?,
                uptime_ms: system::tick_count().as_millis() as u64,
                info: system::system_info(),
                memory: system::memory_status()?,
            };
            report::render(&r, compact)
        }
        Command::Config { .. } => Err(winhandle::Error::Unsupported("config is handled by main").into()),
    }
}

fn icon_report(file: &Path) -> Result<IconReport> {
    let count = HICON::count_in(file)?;
    let (large, small) = if count > 0 {
        HICON::extract(file, 0)?
    } else {
        (None, None)
    };
    let size = |icon: Option<HICON>| -> Result<Option<Size>> {
        Ok(match icon {
            Some(i) => Some(i.size()?.into()),
            None => None,
        })
    };
    let type_name = shell::file_info(file, FileInfoFlags::TYPE_NAME)?.type_name;
    Ok(IconReport {
        path: file.display().to_string(),
        count,
        type_name,
        large: size(large)?,
        small: size(small)?,
    })
}
