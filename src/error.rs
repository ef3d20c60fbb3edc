use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Custom(String),

    /// Missing or malformed settings; always fatal at startup.
    Config(String),

    // -- Externals
    #[from]
    Settings(config::ConfigError),
    #[from]
    Io(std::io::Error),
    #[from]
    Json(serde_json::Error),
    #[from]
    Http(reqwest::Error),
    #[from]
    Sqlite(rusqlite::Error),
    #[from]
    OpenAi(async_openai::error::OpenAIError),
}

impl Error {
    pub fn custom(val: impl std::fmt::Display) -> Self {
        Self::Custom(val.to_string())
    }

    pub fn config(val: impl std::fmt::Display) -> Self {
        Self::Config(val.to_string())
    }
}

impl From<&str> for Error {
    fn from(val: &str) -> Self {
        Self::Custom(val.to_string())
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Custom(msg) => write!(fmt, "{msg}"),
            Self::Config(msg) => write!(fmt, "configuration error: {msg}"),
            Self::Settings(e) => write!(fmt, "configuration error: {e}"),
            Self::Io(e) => write!(fmt, "io error: {e}"),
            Self::Json(e) => write!(fmt, "json error: {e}"),
            Self::Http(e) => write!(fmt, "http error: {e}"),
            Self::Sqlite(e) => write!(fmt, "database error: {e}"),
            Self::OpenAi(e) => write!(fmt, "openai error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
