//! A token store backed by a local file

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::stores::TokenStore;
use crate::{AccessToken, AccessTokenRef, BoxError};

#[derive(Serialize)]
struct StoredTokenRef<'a> {
    token: &'a AccessTokenRef,
}

#[derive(Deserialize)]
struct StoredToken {
    token: AccessToken,
}

/// A token store that persists the token to a local file
///
/// The token survives restarts of the process. A missing file reads as no
/// token. On unix, the file is created readable only by its owner.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Constructs a new file token store
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_token(&self) -> Result<Option<AccessToken>, io::Error> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error),
        };
        let stored: StoredToken = serde_json::from_str(&data)?;
        Ok(Some(stored.token))
    }

    fn write_token(&self, token: &AccessTokenRef) -> Result<(), io::Error> {
        let mut file_opts = OpenOptions::new();

        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            file_opts.mode(0o600);
        }

        let mut file = file_opts.open(&self.path)?;
        let data = serde_json::to_string_pretty(&StoredTokenRef { token })?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>, BoxError> {
        Ok(self.read_token()?.map(|t| t.as_str().to_owned()))
    }

    fn set(&self, token: &AccessTokenRef) -> Result<(), BoxError> {
        Ok(self.write_token(token)?)
    }

    fn delete(&self) -> Result<(), BoxError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
