use crate::{Error, Result};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

/// Source of the shared key webhook signatures are checked against
pub trait SecretProvider: Send + Sync {
    fn secret(&self) -> &[u8];
}

impl SecretProvider for Vec<u8> {
    fn secret(&self) -> &[u8] {
        self
    }
}

impl SecretProvider for String {
    fn secret(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Reads a secret from `path`, dropping trailing whitespace. An empty secret
/// is an error.
pub fn load_secret<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let secret = contents.trim_end();

    if secret.is_empty() {
        return Err(Error::Message(
            format!("secret file {} is empty", path.display()).into(),
        ));
    }

    Ok(secret.to_owned())
}

/// A secret read once from a file
pub struct FileSecret {
    path: PathBuf,
    value: String,
}

impl FileSecret {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let value = load_secret(&path)?;
        Ok(Self { path, value })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretProvider for FileSecret {
    fn secret(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

impl fmt::Debug for FileSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSecret")
            .field("path", &self.path)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{load_secret, FileSecret, SecretProvider};
    use std::fs;

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let path = std::env::temp_dir().join(format!("probot-secret-{}", std::process::id()));
        fs::write(&path, "s3cr3t\n").unwrap();

        let secret = FileSecret::load(&path).unwrap();
        assert_eq!(secret.secret(), b"s3cr3t");
        assert!(!format!("{:?}", secret).contains("s3cr3t"));

        fs::write(&path, " \n").unwrap();
        assert!(load_secret(&path).is_err());

        fs::remove_file(path).unwrap();
    }
}
