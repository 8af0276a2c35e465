//! Embedded pak file (lump 40)
//!
//! The lump is an uncompressed zip archive holding custom content
//! (materials, models, sounds, cubemap textures) shipped with the map.

use std::io::{Cursor, Read};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pakfile {
    data: Vec<u8>,
}

impl Pakfile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn archive(&self) -> Result<zip::ZipArchive<Cursor<&[u8]>>> {
        zip::ZipArchive::new(Cursor::new(self.data.as_slice()))
            .map_err(|e| Error::InvalidFormat(format!("pakfile: {}", e)))
    }

    /// Paths of every file in the archive
    pub fn file_names(&self) -> Result<Vec<String>> {
        let archive = self.archive()?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    /// Contents of one file, matched case-insensitively with either slash
    pub fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let wanted = normalize(name);
        let mut archive = self.archive()?;
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::InvalidFormat(format!("pakfile: {}", e)))?;
            if normalize(file.name()) == wanted {
                let mut data = Vec::new();
                file.read_to_end(&mut data)?;
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}
