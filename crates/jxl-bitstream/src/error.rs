#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Io(std::io::Error),
    /// Container box size was invalid.
    InvalidBoxSize,
    /// `PadZeroToByte` read non-zero bits.
    NonZeroPadding,
    /// Parsed floating point value was Infinity or NaN.
    InvalidFloat,
    /// Parsed value couldn't be represented with the given enum.
    InvalidEnum {
        name: &'static str,
        value: u32,
    },
    /// The bitstream is invalid.
    ValidationFailed(&'static str),
    /// The codestream does not conform to the current decoder profile.
    ProfileConformance(&'static str),
    /// The name couldn't be parsed as UTF-8 string.
    NonUtf8Name,
    /// The bitstream couldn't be skipped to the given position, mainly due to the direction being
    /// backwards.
    CannotSkip,
    /// The bistream offsed was not aligned to read byte-aligned data.
    NotAligned,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => {
                write!(f, "I/O error: {}", e)
            },
            Self::InvalidBoxSize => write!(f, "invalid box size"),
            Self::NonZeroPadding => {
                write!(f, "PadZeroToByte() read non-zero bits")
            },
            Self::InvalidFloat => {
                write!(f, "F16() read NaN or Infinity")
            },
            Self::InvalidEnum { name, value } => {
                write!(f, "Enum({}) read invalid enum value of {}", name, value)
            },
            Self::ValidationFailed(msg) => {
                write!(f, "bitstream validation failed: {msg}")
            },
            Self::ProfileConformance(msg) => {
                write!(f, "not supported by current profile: {msg}")
            },
            Self::NonUtf8Name => {
                write!(f, "read non-UTF-8 name")
            },
            Self::CannotSkip => {
                write!(f, "target bookmark already passed")
            },
            Self::NotAligned => {
                write!(f, "bitstream is unaligned")
            },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl Error {
    /// True when the error means "not enough bytes were buffered to finish this parse unit" --
    /// the caller should refill its source and retry the same parse from the same offset.
    pub fn unexpected_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    /// Four-character error code, used in diagnostic logging.
    pub fn code(&self) -> [u8; 4] {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => *b"shrt",
            Self::Io(_) => *b"ioer",
            Self::InvalidBoxSize => *b"boxs",
            Self::NonZeroPadding => *b"zpad",
            Self::InvalidFloat => *b"flnn",
            Self::InvalidEnum { .. } => *b"enum",
            Self::ValidationFailed(_) => *b"vfld",
            Self::ProfileConformance(_) => *b"prof",
            Self::NonUtf8Name => *b"utf8",
            Self::CannotSkip => *b"skip",
            Self::NotAligned => *b"algn",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
pub type BitstreamResult<T> = std::result::Result<T, Error>;
