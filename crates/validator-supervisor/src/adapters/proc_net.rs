//! # Socket Ownership via /proc
//!
//! Finds which processes hold a listening TCP socket on a port:
//!
//! 1. Scan `/proc/net/tcp` and `/proc/net/tcp6` for LISTEN rows on the port
//! 2. Map each row's socket inode to PIDs via `/proc/<pid>/fd/*` links
//!
//! Processes whose `fd` directory is unreadable (other users, without
//! privilege) cannot be attributed; the caller sees `listening` without PIDs.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::errors::ProcessError;
use crate::ports::outbound::PortHolders;

/// TCP state code for LISTEN in /proc/net/tcp.
const TCP_LISTEN: &str = "0A";

const NET_TABLES: [&str; 2] = ["net/tcp", "net/tcp6"];

/// Listening socket inodes bound to `port` in one /proc/net/tcp table.
pub fn listening_inodes(table: &str, port: u16) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local = fields.get(1)?;
            let state = fields.get(3)?;
            let inode = fields.get(9)?;

            let (_, port_hex) = local.rsplit_once(':')?;
            let local_port = u16::from_str_radix(port_hex, 16).ok()?;
            if local_port != port || *state != TCP_LISTEN {
                return None;
            }
            inode.parse::<u64>().ok().filter(|i| *i != 0)
        })
        .collect()
}

/// Parse an fd link target of the form `socket:[12345]`.
pub fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Query listeners on `port` under a procfs root (normally `/proc`).
pub fn port_holders(proc_root: &Path, port: u16) -> Result<PortHolders, ProcessError> {
    let mut inodes = HashSet::new();
    for table in NET_TABLES {
        match fs::read_to_string(proc_root.join(table)) {
            Ok(contents) => inodes.extend(listening_inodes(&contents, port)),
            // tcp6 is absent when IPv6 is disabled
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ProcessError::Inspect(format!("{}: {}", table, e))),
        }
    }

    if inodes.is_empty() {
        return Ok(PortHolders::free());
    }

    let entries = fs::read_dir(proc_root)
        .map_err(|e| ProcessError::Inspect(format!("{}: {}", proc_root.display(), e)))?;

    let mut pids = Vec::new();
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        let owns = fds.flatten().any(|fd| {
            fs::read_link(fd.path())
                .ok()
                .and_then(|target| socket_inode(&target.to_string_lossy()))
                .is_some_and(|inode| inodes.contains(&inode))
        });
        if owns {
            pids.push(pid);
        }
    }
    pids.sort_unstable();

    Ok(PortHolders::held_by(pids))
}
