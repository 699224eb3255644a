//! Asset address forms
//!
//! An asset is addressable three ways: a database url
//! (`db://project/textures/a.png`), an identifier string
//! (`9be27dd0-...`), and an absolute source path. Virtual children append
//! `@<childId>` segments to the url and identifier forms. All three forms
//! resolve to the same asset; conversion is a pure function of the owning
//! database's roots and maps.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Scheme prefix of the url form.
pub const URL_SCHEME: &str = "db://";

/// Errors that can occur parsing an address.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,

    #[error("url '{0}' is missing a database name")]
    MissingDatabase(String),

    #[error("'{0}' is not a url, identifier, or absolute path")]
    Unrecognized(String),
}

pub type Result<T> = std::result::Result<T, AddressError>;

/// A parsed asset address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetAddr {
    /// `db://<database>/<relative/path>[@child]*`
    Url {
        db: String,
        rel_path: PathBuf,
        children: Vec<String>,
    },
    /// `<uuid>[@child]*`
    Uuid { uuid: Uuid, children: Vec<String> },
    /// Absolute filesystem path of the source file.
    Path(PathBuf),
}

impl AssetAddr {
    /// Parse any of the three address forms.
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(rest) = addr.strip_prefix(URL_SCHEME) {
            let (db, tail) = rest.split_once('/').unwrap_or((rest, ""));
            if db.is_empty() {
                return Err(AddressError::MissingDatabase(addr.to_string()));
            }
            let mut segments = tail.split('@');
            let rel_path = PathBuf::from(segments.next().unwrap_or(""));
            let children = segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(Self::Url {
                db: db.to_string(),
                rel_path,
                children,
            });
        }

        let mut segments = addr.split('@');
        let head = segments.next().unwrap_or("");
        if let Ok(uuid) = Uuid::parse_str(head) {
            let children = segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(Self::Uuid { uuid, children });
        }

        if Path::new(addr).is_absolute() {
            return Ok(Self::Path(PathBuf::from(addr)));
        }

        Err(AddressError::Unrecognized(addr.to_string()))
    }

    /// Child-id chain of the address (empty for root assets).
    pub fn children(&self) -> &[String] {
        match self {
            Self::Url { children, .. } | Self::Uuid { children, .. } => children,
            Self::Path(_) => &[],
        }
    }
}

impl fmt::Display for AssetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url {
                db,
                rel_path,
                children,
            } => {
                write!(
                    f,
                    "{}{}/{}",
                    URL_SCHEME,
                    db,
                    rel_path.to_string_lossy().replace('\\', "/")
                )?;
                for child in children {
                    write!(f, "@{}", child)?;
                }
                Ok(())
            }
            Self::Uuid { uuid, children } => {
                write!(f, "{}", uuid)?;
                for child in children {
                    write!(f, "@{}", child)?;
                }
                Ok(())
            }
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl std::str::FromStr for AssetAddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Build the url form for an asset of `db` at `rel_path`.
pub fn format_url(db: &str, rel_path: &Path, children: &[String]) -> String {
    AssetAddr::Url {
        db: db.to_string(),
        rel_path: rel_path.to_path_buf(),
        children: children.to_vec(),
    }
    .to_string()
}

/// Build the identifier form, appending the child-id chain.
pub fn format_uuid(uuid: &Uuid, children: &[String]) -> String {
    AssetAddr::Uuid {
        uuid: *uuid,
        children: children.to_vec(),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_url() {
        let addr = AssetAddr::parse("db://project/textures/a.png").unwrap();
        assert_eq!(
            addr,
            AssetAddr::Url {
                db: "project".to_string(),
                rel_path: PathBuf::from("textures/a.png"),
                children: vec![],
            }
        );
    }

    #[test]
    fn test_parse_url_with_children() {
        let addr = AssetAddr::parse("db://project/a.png@f00abc@deadbe").unwrap();
        assert_eq!(addr.children(), &["f00abc".to_string(), "deadbe".to_string()]);
    }

    #[test]
    fn test_parse_uuid_with_child() {
        let uuid = Uuid::new_v4();
        let addr = AssetAddr::parse(&format!("{}@abc123", uuid)).unwrap();
        assert_eq!(
            addr,
            AssetAddr::Uuid {
                uuid,
                children: vec!["abc123".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_absolute_path() {
        let addr = AssetAddr::parse("/projects/game/assets/a.png").unwrap();
        assert_eq!(addr, AssetAddr::Path(PathBuf::from("/projects/game/assets/a.png")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AssetAddr::parse("").is_err());
        assert!(AssetAddr::parse("not-a-uuid-or-path").is_err());
        assert!(AssetAddr::parse("db://").is_err());
    }

    #[test]
    fn test_round_trip_display() {
        for text in [
            "db://project/textures/a.png",
            "db://internal/shaders/lit.glsl@0a1b2c",
            "/abs/path/file.png",
        ] {
            let addr = AssetAddr::parse(text).unwrap();
            assert_eq!(addr.to_string(), text);
        }

        let uuid = Uuid::new_v4();
        let text = format!("{}@aa@bb", uuid);
        assert_eq!(AssetAddr::parse(&text).unwrap().to_string(), text);
    }

    #[test]
    fn test_format_helpers() {
        let uuid = Uuid::new_v4();
        assert_eq!(
            format_url("proj", Path::new("a/b.png"), &["cc".to_string()]),
            "db://proj/a/b.png@cc"
        );
        assert_eq!(format_uuid(&uuid, &[]), uuid.to_string());
    }
}
