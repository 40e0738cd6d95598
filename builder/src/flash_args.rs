//! The esptool command the build prints after `To flash, run`.

use std::path::PathBuf;

const FLASH_MARKER: &str = "To flash, run";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FlashImage {
    pub offset: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FlashCommand {
    pub chip: Option<String>,
    pub images: Vec<FlashImage>,
}

/// `None` when the build did not print flashing instructions.
pub fn parse(output: &str) -> Option<FlashCommand> {
    let (_, rest) = output.rsplit_once(FLASH_MARKER)?;
    let line = rest.lines().find(|l| l.contains("esptool"))?;

    let mut command = FlashCommand::default();
    let mut tokens = line.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token == "--chip" {
            command.chip = tokens.next().map(str::to_string);
            continue;
        }
        let Some(hex) = token.strip_prefix("0x") else {
            continue;
        };
        let (Ok(offset), Some(path)) = (u32::from_str_radix(hex, 16), tokens.peek()) else {
            continue;
        };
        command.images.push(FlashImage {
            offset,
            path: PathBuf::from(path.trim_matches('"')),
        });
        tokens.next();
    }

    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
micropython.bin binary size 0x1a2b30 bytes. Smallest app partition is 0x267000 bytes. 0xc44d0 bytes (32%) free.

Project build complete. To flash, run:
 idf.py flash
or
 idf.py -p (PORT) flash
or
 python -m esptool --chip esp32 -b 460800 --before default_reset --after no_reset write_flash --flash_mode dio --flash_size 4MB --flash_freq 40m 0x1000 build-ESP32_GENERIC/bootloader/bootloader.bin 0x8000 build-ESP32_GENERIC/partition_table/partition-table.bin 0x10000 build-ESP32_GENERIC/micropython.bin
or from the \"/src/lib/micropython/ports/esp32/build-ESP32_GENERIC\" directory
 python -m esptool --chip esp32 -b 460800 --before default_reset --after no_reset write_flash \"@flash_args\"
";

    #[test]
    fn images() {
        let command = parse(LOG).unwrap();

        assert_eq!(command.chip.as_deref(), Some("esp32"));
        assert_eq!(
            command.images,
            [
                FlashImage {
                    offset: 0x1000,
                    path: "build-ESP32_GENERIC/bootloader/bootloader.bin".into()
                },
                FlashImage {
                    offset: 0x8000,
                    path: "build-ESP32_GENERIC/partition_table/partition-table.bin".into()
                },
                FlashImage {
                    offset: 0x10000,
                    path: "build-ESP32_GENERIC/micropython.bin".into()
                },
            ]
        );
    }

    #[test]
    fn no_instructions() {
        assert_eq!(parse("micropython.bin binary size 0x10 bytes.\n"), None);
        assert_eq!(parse("To flash, run:\n idf.py flash\n"), None);
    }
}
