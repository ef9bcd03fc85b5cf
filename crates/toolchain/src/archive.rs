//! Release archive extraction.

use crate::error::{Error, Result};
use std::fs;
use std::io::{Cursor, Read};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Extract `executable` from a zip archive into `dest` and make it executable.
pub fn extract_executable(data: &[u8], executable: &str, dest: &Path) -> Result<PathBuf> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let mut contents = None;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let is_match = !file.is_dir()
            && Path::new(file.name())
                .file_name()
                .is_some_and(|n| n == executable);
        if is_match {
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)
                .map_err(|e| Error::ExtractionFailed(e.to_string()))?;
            contents = Some(buffer);
            break;
        }
    }

    let contents = contents.ok_or_else(|| {
        Error::ExtractionFailed(format!("'{executable}' not found in archive"))
    })?;

    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let path = dest.join(executable);
    fs::write(&path, &contents).map_err(|e| Error::io(&path, e))?;

    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&path)
            .map_err(|e| Error::io(&path, e))?
            .permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(&path, perms).map_err(|e| Error::io(&path, e))?;
    }

    Ok(path)
}

#[cfg(test)]
pub(crate) fn zip_with(name: &str, contents: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let mut buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file(name, options).unwrap();
        zip.write_all(contents).unwrap();
        zip.finish().unwrap();
    }
    buffer
}
