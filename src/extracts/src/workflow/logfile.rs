use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Utc};
use flate2::read::GzDecoder;
use scout_common::{ScoutError, ScoutResult};
use tracing::{debug, info, warn};

use super::classifier::classify;
use super::LogLine;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// `staging01_server.log.gz` -> `staging01`
pub fn deployment_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Midnight (UTC) `days` days before `now`.
pub fn recent_cutoff(now: DateTime<Utc>, days: u64) -> DateTime<Utc> {
    let today = now.date_naive();
    today
        .checked_sub_days(Days::new(days))
        .unwrap_or(today)
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

fn open_log(path: &Path) -> ScoutResult<Box<dyn BufRead>> {
    let mut file = File::open(path).map_err(|e| ScoutError::persistence(path, e))?;

    let mut magic = [0u8; 2];
    let read = file
        .read(&mut magic)
        .map_err(|e| ScoutError::persistence(path, e))?;
    let file = File::open(path).map_err(|e| ScoutError::persistence(path, e))?;

    if read == magic.len() && magic == GZIP_MAGIC {
        debug!(path = %path.display(), "reading gzip log");
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads the relevant, timestamped lines of one gzip-or-plain log file.
///
/// Lines without a parseable timestamp are skipped; a file that can't be read at all
/// is an error.
pub fn read_log_lines(path: &Path, since: Option<DateTime<Utc>>) -> ScoutResult<Vec<LogLine>> {
    let mut reader = open_log(path)?;
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ScoutError::persistence(path, e))?;
        if n == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&buf);
        let triggers = classify(&text);
        if triggers.is_empty() {
            continue;
        }

        match LogLine::with_triggers(&text, triggers) {
            Ok(line) if since.is_some_and(|cutoff| line.timestamp < cutoff) => {}
            Ok(line) => lines.push(line),
            Err(e) => warn!(path = %path.display(), "skipping line: {e}"),
        }
    }

    Ok(lines)
}

/// Groups the relevant lines of every file by deployment; files of the same
/// deployment are merged.
pub fn read_deployment_logs(
    paths: &[PathBuf],
    since: Option<DateTime<Utc>>,
) -> ScoutResult<BTreeMap<String, Vec<LogLine>>> {
    let mut logs: BTreeMap<String, Vec<LogLine>> = BTreeMap::new();

    for path in paths {
        let deployment = deployment_name(path);
        let lines = read_log_lines(path, since)?;
        info!(
            path = %path.display(),
            deployment = %deployment,
            relevant_lines = lines.len(),
            "read log file"
        );
        logs.entry(deployment).or_default().extend(lines);
    }

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const LOG: &str = "\
2019-09-24 17:16:07,609 INFO Successfully started workflow with id wf.--.HighAvailabilityWorkflow__top, variables {WFSContext={}, vms={\"staging01-sso-1\":\"10.0.0.1\"}} and business key HA_staging01-sso-1_1569345367380
2019-09-24 17:17:00,000 INFO unrelated noise
2019-09-24 17:18:00,000 INFO Marking resource unhealthy for staging01-sso-1, resource abc
Marking inner stack unhealthy for staging01-sso-1
2019-09-26 08:00:00,000 INFO VM ( staging01-sso-1 ) successfully restored
";

    fn write_plain(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, LOG).unwrap();
        path
    }

    fn write_gzip(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(LOG.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn test_deployment_name_is_prefix_before_underscore() {
        assert_eq!(deployment_name(Path::new("/var/log/staging01_server.log.gz")), "staging01");
        assert_eq!(deployment_name(Path::new("plain.log")), "plain.log");
    }

    #[test]
    fn test_plain_and_gzip_read_the_same_lines() {
        let dir = TempDir::new().unwrap();
        let plain = read_log_lines(&write_plain(&dir, "a_server.log"), None).unwrap();
        let gzip = read_log_lines(&write_gzip(&dir, "a_server.log.gz"), None).unwrap();

        assert_eq!(plain.len(), 3);
        assert_eq!(plain, gzip);
    }

    #[test]
    fn test_recent_cutoff_filters_older_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(&dir, "a_server.log");
        let now = Utc.with_ymd_and_hms(2019, 9, 27, 13, 45, 0).unwrap();
        let cutoff = recent_cutoff(now, 1);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2019, 9, 26, 0, 0, 0).unwrap());

        let lines = read_log_lines(&path, Some(cutoff)).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.contains("successfully restored"));
    }

    #[test]
    fn test_files_of_one_deployment_are_merged() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_plain(&dir, "staging01_server.log"),
            write_gzip(&dir, "staging01_server.log.1.gz"),
            write_plain(&dir, "staging02_server.log"),
        ];

        let logs = read_deployment_logs(&paths, None).unwrap();

        assert_eq!(logs.keys().collect::<Vec<_>>(), vec!["staging01", "staging02"]);
        assert_eq!(logs["staging01"].len(), 6);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = read_deployment_logs(&[PathBuf::from("/nonexistent/x_server.log")], None)
            .unwrap_err();
        assert!(matches!(err, ScoutError::Persistence { .. }));
        assert!(err.is_fatal());
    }
}
