//! Board config fragment (`sdkconfig.board`) handed to the ESP-IDF build.

use std::path::Path;

use crate::config::{Session, FLASH_SIZES_MB};

const TABLE_FILENAME_KEYS: [&str; 2] = [
    "CONFIG_PARTITION_TABLE_CUSTOM_FILENAME",
    "CONFIG_PARTITION_TABLE_FILENAME",
];

const DEBUG_LOG_LEVELS: [&str; 4] = [
    "CONFIG_BOOTLOADER_LOG_LEVEL",
    "CONFIG_HAL_LOG_LEVEL",
    "CONFIG_LOG_MAXIMUM_LEVEL",
    "CONFIG_LOG_DEFAULT_LEVEL",
];

pub fn render(session: &Session, table_path: &Path) -> String {
    let mut lines = vec![
        "CONFIG_ESPTOOLPY_AFTER_NORESET=y".to_string(),
        "CONFIG_PARTITION_TABLE_CUSTOM=y".to_string(),
    ];
    // clear whatever the board defaults selected
    for size in FLASH_SIZES_MB {
        lines.push(format!("CONFIG_ESPTOOLPY_FLASHSIZE_{}MB=n", size));
    }
    lines.push("CONFIG_COMPILER_OPTIMIZATION_SIZE=n".to_string());
    lines.push("CONFIG_COMPILER_OPTIMIZATION_PERF=n".to_string());
    lines.push("CONFIG_COMPILER_OPTIMIZATION_CHECKS_SILENT=y".to_string());

    if session.debug {
        for key in DEBUG_LOG_LEVELS {
            for level in ["NONE", "ERROR", "WARN", "INFO", "DEBUG", "VERBOSE"] {
                // the maximum level has no NONE choice
                if key == "CONFIG_LOG_MAXIMUM_LEVEL" && level == "NONE" {
                    continue;
                }
                let on = if level == "DEBUG" { 'y' } else { 'n' };
                lines.push(format!("{}_{}={}", key, level, on));
            }
        }
        lines.push("CONFIG_LCD_ENABLE_DEBUG_LOG=y".to_string());
    }

    lines.push(String::new());
    lines.push(format!("CONFIG_ESPTOOLPY_FLASHSIZE_{}MB=y", session.flash_size_mb));
    lines.push(format!(
        "CONFIG_PARTITION_TABLE_CUSTOM_FILENAME=\"{}\"",
        table_path.display()
    ));
    lines.push(match session.optimize_size {
        true => "CONFIG_COMPILER_OPTIMIZATION_SIZE=y".to_string(),
        false => "CONFIG_COMPILER_OPTIMIZATION_PERF=y".to_string(),
    });

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Partition table file an sdkconfig points the build at.
pub fn table_filename(sdkconfig: &str) -> Option<&str> {
    sdkconfig.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        TABLE_FILENAME_KEYS
            .contains(&key)
            .then(|| value.trim_matches('"'))
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session() -> Session {
        Session::new("ESP32_GENERIC", 8, PathBuf::from("build"))
    }

    #[test]
    fn partition_lines() {
        let text = render(&session(), Path::new("/src/build/partitions.csv"));

        assert!(text.contains("CONFIG_PARTITION_TABLE_CUSTOM=y\n"));
        assert!(text.contains("CONFIG_ESPTOOLPY_FLASHSIZE_4MB=n\n"));
        assert!(text.contains("\nCONFIG_ESPTOOLPY_FLASHSIZE_8MB=y\n"));
        assert!(text.contains("CONFIG_PARTITION_TABLE_CUSTOM_FILENAME=\"/src/build/partitions.csv\"\n"));
        assert!(text.ends_with("CONFIG_COMPILER_OPTIMIZATION_PERF=y\n"));
        assert!(!text.contains("LOG_LEVEL"));
    }

    #[test]
    fn debug_and_size() {
        let mut session = session();
        session.debug = true;
        session.optimize_size = true;
        let text = render(&session, Path::new("partitions.csv"));

        assert!(text.contains("CONFIG_LOG_DEFAULT_LEVEL_DEBUG=y\n"));
        assert!(text.contains("CONFIG_LOG_DEFAULT_LEVEL_INFO=n\n"));
        assert!(text.contains("CONFIG_BOOTLOADER_LOG_LEVEL_NONE=n\n"));
        assert!(!text.contains("CONFIG_LOG_MAXIMUM_LEVEL_NONE"));
        assert!(text.ends_with("CONFIG_COMPILER_OPTIMIZATION_SIZE=y\n"));
    }

    #[test]
    fn find_table() {
        let text = render(&session(), Path::new("/src/build/partitions.csv"));
        assert_eq!(table_filename(&text), Some("/src/build/partitions.csv"));

        assert_eq!(
            table_filename("CONFIG_IDF_TARGET=\"esp32\"\nCONFIG_PARTITION_TABLE_FILENAME=\"partitions-4MiB.csv\"\n"),
            Some("partitions-4MiB.csv")
        );
        assert_eq!(table_filename("CONFIG_PARTITION_TABLE_CUSTOM=y\n"), None);
        assert_eq!(table_filename("CONFIG_PARTITION_TABLE_FILENAME=\"\"\n"), None);
    }
}
