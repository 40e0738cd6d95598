use std::path::PathBuf;

use partition_common::layout::DEFAULT_APP_SIZE;
use partition_common::{Bank, ALIGNMENT};

use crate::util::Error;

pub const MIB: u32 = 1 << 20;

pub const FLASH_SIZES_MB: [u32; 7] = [2, 4, 8, 16, 32, 64, 128];

const UNSUPPORTED_BOARDS: [&str; 1] = ["ARDUINO_NANO_ESP32"];

pub fn parse_flash_size(s: &str) -> Result<u32, String> {
    let size = s.trim_end_matches("MB").parse::<u32>().map_err(|e| e.to_string())?;
    match FLASH_SIZES_MB.contains(&size) {
        true => Ok(size),
        false => Err(format!("flash size must be one of {:?}", FLASH_SIZES_MB)),
    }
}

/// Flash fitted to the board when `--flash-size` is not given, in MB.
pub fn default_flash_size(board: &str) -> Result<u32, Error> {
    if UNSUPPORTED_BOARDS.contains(&board) {
        return Err(Error::UnsupportedBoard(board.to_string()));
    }

    Ok(match board {
        "UM_NANOS3" | "ESP32_GENERIC_S3" | "UM_TINYS3" | "UM_TINYWATCHS3" => 8,
        "UM_FEATHERS2" | "SIL_WESP32" | "UM_PROS3" | "UM_FEATHERS3" => 16,
        _ => 4,
    })
}

#[derive(clap::Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Board name, selects the default flash size
    #[arg(long, default_value = "ESP32_GENERIC")]
    pub board: String,

    /// Flash size in MB
    #[arg(long, value_parser = parse_flash_size)]
    pub flash_size: Option<u32>,

    /// App partition size in bytes, -1 sizes it from the build
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub partition_size: i64,

    /// Two app partitions for OTA updates
    #[arg(long)]
    pub ota: bool,
}

impl LayoutArgs {
    pub fn flash_size_mb(&self) -> Result<u32, Error> {
        let default = default_flash_size(&self.board)?;
        Ok(self.flash_size.unwrap_or(default))
    }

    pub fn app_size(&self) -> Result<Option<u32>, Error> {
        match self.partition_size {
            -1 => Ok(None),
            size => u32::try_from(size)
                .ok()
                .filter(|v| *v > 0)
                .map(Some)
                .ok_or_else(|| Error::Other(format!("invalid partition size {}", size))),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Keep the first layout even if the app overflows or leaves space unused
    #[arg(long)]
    pub skip_partition_resize: bool,

    #[arg(long)]
    pub debug: bool,

    #[arg(long)]
    pub optimize_size: bool,

    /// Where the partition table and board config are written
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    /// Unused app space that triggers a shrinking rebuild, in bytes
    #[arg(long, default_value_t = ALIGNMENT)]
    pub shrink_threshold: u32,

    /// Build command, e.g. `make -C lib/micropython/ports/esp32 BOARD=ESP32_GENERIC`
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Everything one build session needs. Built once per run and passed down.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Session {
    pub board: String,
    pub flash_size_mb: u32,
    /// Pinned app partition size; `None` lets the controller resize it.
    pub app_size: Option<u32>,
    pub bank: Bank,
    pub skip_resize: bool,
    pub debug: bool,
    pub optimize_size: bool,
    pub shrink_threshold: u32,
    pub build_dir: PathBuf,
}

impl Session {
    pub fn new(board: &str, flash_size_mb: u32, build_dir: PathBuf) -> Self {
        Self {
            board: board.to_string(),
            flash_size_mb,
            app_size: None,
            bank: Bank::Single,
            skip_resize: false,
            debug: false,
            optimize_size: false,
            shrink_threshold: ALIGNMENT,
            build_dir,
        }
    }

    /// The build directory is made absolute here: ESP-IDF resolves a relative
    /// table path against the port directory, not ours.
    pub fn from_args(args: &BuildArgs) -> Result<Self, Error> {
        let layout = &args.layout;
        let build_dir = std::path::absolute(&args.build_dir)?;
        Ok(Self {
            app_size: layout.app_size()?,
            bank: Bank::from_ota(layout.ota),
            skip_resize: args.skip_partition_resize,
            debug: args.debug,
            optimize_size: args.optimize_size,
            shrink_threshold: args.shrink_threshold,
            ..Self::new(&layout.board, layout.flash_size_mb()?, build_dir)
        })
    }

    /// Flash size in bytes.
    pub fn capacity(&self) -> u32 {
        self.flash_size_mb * MIB
    }

    pub fn initial_app_size(&self) -> u32 {
        self.app_size.unwrap_or(DEFAULT_APP_SIZE)
    }

    /// The app partition may only follow the build when nothing pinned it.
    pub fn auto_resize(&self) -> bool {
        self.app_size.is_none() && !self.skip_resize
    }

    pub fn table_path(&self) -> PathBuf {
        self.build_dir.join("partitions.csv")
    }

    pub fn sdkconfig_path(&self) -> PathBuf {
        self.build_dir.join("sdkconfig.board")
    }
}
