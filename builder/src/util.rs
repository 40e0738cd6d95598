use partition_common::{ClassifyError, LayoutError};

/// Raised when the partition table cannot fit the flash (ENOSPC).
pub const EXIT_NO_SPACE: i32 = 28;
/// Build log or table contents could not be read (EX_DATAERR).
pub const EXIT_DATA: i32 = 65;
/// EX_IOERR
pub const EXIT_IO: i32 = 74;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("build failed with exit code {exit_code}")]
    Build { exit_code: i32 },
    #[error("board {0} is not currently supported")]
    UnsupportedBoard(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Status the process exits with. Build failures pass the tool's own code through.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Build { exit_code } => *exit_code,
            Error::Layout(LayoutError::Capacity { .. }) => EXIT_NO_SPACE,
            Error::Layout(_) | Error::Classify(_) => EXIT_DATA,
            Error::Io(_) => EXIT_IO,
            Error::UnsupportedBoard(_) | Error::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::Build { exit_code: 2 }.exit_code(), 2);
        assert_eq!(
            Error::from(LayoutError::Capacity {
                required: 0x277000,
                capacity: 0x200000
            })
            .exit_code(),
            EXIT_NO_SPACE
        );
        assert_eq!(Error::from(ClassifyError::BinarySize).exit_code(), EXIT_DATA);
        assert_eq!(Error::from(LayoutError::Syntax { line: 3 }).exit_code(), EXIT_DATA);
        assert_eq!(
            Error::from(std::io::Error::from(std::io::ErrorKind::NotFound)).exit_code(),
            EXIT_IO
        );
    }
}
