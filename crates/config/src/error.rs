#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to serialize TOML: {0}")]
    SerializeTOML(#[from] toml_edit::ser::Error),

    #[error("Failed to deserialize TOML: {0}")]
    DeserializeTOML(#[from] toml_edit::de::Error),

    #[error("Failed to parse {}: {source}", path.display())]
    ParseFile {
        path: std::path::PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    #[error("Invalid address `{0}`: expected host:port")]
    InvalidAddress(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}
