//! # Log Reader
//!
//! Tail and follow the validator's log file. The file is re-opened by path on
//! every poll, so a log that is wiped and recreated by a restart is picked up
//! from its beginning.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

const CHUNK: u64 = 8 * 1024;

/// Last `n` lines of the file at `path`, oldest first.
///
/// Reads backwards in chunks so large logs are not loaded whole.
pub async fn read_last_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();

    let mut tail: Vec<u8> = Vec::new();
    let mut pos = len;
    while pos > 0 {
        let step = CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&tail);
        tail = chunk;

        // n lines need n separators, plus one more unless we hit the start
        if tail.iter().filter(|b| **b == b'\n').count() > n {
            break;
        }
    }

    let text = String::from_utf8_lossy(&tail);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
}

/// Current length of the file, or 0 if it does not exist.
pub async fn file_len(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// Copy bytes appended to `path` after `offset` into `out` until `stop`
/// resolves. Returns the final read offset.
pub async fn follow<W, F>(
    path: &Path,
    mut offset: u64,
    out: &mut W,
    poll: Duration,
    stop: F,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    loop {
        offset = copy_new(path, offset, out).await?;
        tokio::select! {
            _ = &mut stop => return Ok(offset),
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

async fn copy_new<W>(path: &Path, mut offset: u64, out: &mut W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut file = match File::open(path).await {
        Ok(f) => f,
        // between a wipe and the next launch
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let len = file.metadata().await?.len();
    if len < offset {
        // truncated or replaced
        offset = 0;
    }
    if len == offset {
        return Ok(offset);
    }

    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::with_capacity((len - offset) as usize);
    (&mut file).take(len - offset).read_to_end(&mut buf).await?;
    out.write_all(&buf).await?;
    out.flush().await?;
    Ok(offset + buf.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.log");
        let contents: String = (1..=500).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(&path, contents).unwrap();

        let lines = read_last_lines(&path, 3).await.unwrap();
        assert_eq!(lines, vec!["line 498", "line 499", "line 500"]);

        let all = read_last_lines(&path, 1000).await.unwrap();
        assert_eq!(all.len(), 500);
        assert_eq!(all[0], "line 1");

        assert!(read_last_lines(&path, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_last_lines_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.log");
        std::fs::write(&path, "a\nb\nc").unwrap();
        assert_eq!(read_last_lines(&path, 2).await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_read_last_lines_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_last_lines(&dir.path().join("nope.log"), 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_follow_copies_appended_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.log");
        std::fs::write(&path, "old\n").unwrap();
        let start = file_len(&path).await;

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            std::io::Write::write_all(&mut f, b"new\n").unwrap();
        });

        let mut out: Vec<u8> = Vec::new();
        let end = follow(
            &path,
            start,
            &mut out,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "new\n");
        assert_eq!(end, 8);
    }

    #[tokio::test]
    async fn test_follow_restarts_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.log");
        std::fs::write(&path, "a much longer first generation\n").unwrap();
        let start = file_len(&path).await;

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            std::fs::write(&writer_path, "second\n").unwrap();
        });

        let mut out: Vec<u8> = Vec::new();
        follow(
            &path,
            start,
            &mut out,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "second\n");
    }
}
