#![forbid(unsafe_code)]

mod backend;
mod capture;
mod error;
mod introspection;
mod server;

pub use backend::Backend;
pub use capture::CaptureLimits;
pub use error::Error;
pub use introspection::Introspection;
pub use server::Server;

use serde::{Deserialize, Serialize};
use std::path::Path;
use toml_edit::{DocumentMut, Item, Table};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub server: Server,
    pub capture: CaptureLimits,
    pub introspection: Introspection,
}

impl Config {
    /// Load configuration from a TOML file. Missing fields are filled with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let toml = toml_edit::ser::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Layer several TOML files, skipping the ones that do not exist. A key
    /// set in a later file wins; sections merge key by key, so a drop-in only
    /// needs the keys it changes.
    pub fn load_multiple<P>(paths: impl IntoIterator<Item = P>) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let mut layered = DocumentMut::new();
        for path in paths {
            if let Some(layer) = read_layer(path.as_ref())? {
                overlay(layered.as_table_mut(), layer.as_table());
            }
        }
        Self::from_toml(&layered.to_string())
    }

    fn from_toml(text: &str) -> Result<Self, Error> {
        let mut config: Config = toml_edit::de::from_str(text)?;
        config.apply_defaults()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) -> Result<(), Error> {
        self.capture = self.capture.clamp();
        validate_address(&self.backend.address)?;
        validate_address(&self.server.listen)?;
        Ok(())
    }
}

fn read_layer(path: &Path) -> Result<Option<DocumentMut>, Error> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    text.parse::<DocumentMut>()
        .map(Some)
        .map_err(|source| Error::ParseFile {
            path: path.to_owned(),
            source,
        })
}

/// Sections present in both merge recursively; any other key from `layer`
/// replaces the one in `base`.
fn overlay(base: &mut Table, layer: &Table) {
    for (key, item) in layer.iter() {
        match (base.get_mut(key), item) {
            (Some(Item::Table(base_section)), Item::Table(layer_section)) => {
                overlay(base_section, layer_section);
            }
            _ => {
                base.insert(key, item.clone());
            }
        }
    }
}

/// Check that `address` looks like `host:port`.
pub fn validate_address(address: &str) -> Result<(), Error> {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(Error::InvalidAddress(address.to_owned())),
    }
}
