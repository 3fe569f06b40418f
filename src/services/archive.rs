//! Package archiving and archive checksums.

use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::Path;

use sha2::{Digest, Sha512};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::errors::SwampError;

/// MD5 and SHA-512 of an archive, lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha512: String,
}

impl Checksums {
    pub fn of_bytes(data: &[u8]) -> Self {
        let md5 = format!("{:x}", md5::compute(data));

        let mut sha512_hasher = Sha512::new();
        sha512_hasher.update(data);
        let sha512 = hex::encode(sha512_hasher.finalize());

        Self { md5, sha512 }
    }

    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Ok(Self::of_bytes(&data))
    }
}

/// Zip `source` recursively into `dest`, returning the number of files stored.
///
/// Entry names are relative to `source` with `/` separators. `dest` itself is
/// skipped when it lies inside `source`. Symlinks are followed, except a link
/// to one of its own ancestor directories and a dangling link, which are skipped.
pub fn zip_directory(source: &Path, dest: &Path) -> Result<usize, SwampError> {
    if !source.is_dir() {
        return Err(SwampError::Config(format!(
            "package directory {} does not exist",
            source.display()
        )));
    }

    let mut writer = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let skip = dest.canonicalize().ok();

    // Each pending directory carries the canonical paths of its ancestors.
    let mut stored = 0usize;
    let mut pending = vec![(source.to_path_buf(), vec![source.canonicalize()?])];
    while let Some((dir, ancestors)) = pending.pop() {
        let mut entries = std::fs::read_dir(&dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(real) = path.canonicalize() else {
                tracing::warn!(path = %path.display(), "Skipping dangling symlink");
                continue;
            };
            if skip.as_ref() == Some(&real) {
                continue;
            }

            let name = entry_name(source, &path);
            if std::fs::metadata(&path)?.is_dir() {
                if ancestors.contains(&real) {
                    tracing::warn!(path = %path.display(), "Skipping symlink cycle");
                    continue;
                }
                writer.add_directory(format!("{name}/"), options)?;
                let mut chain = ancestors.clone();
                chain.push(real);
                pending.push((path, chain));
            } else {
                writer.start_file(name, options)?;
                io::copy(&mut File::open(&path)?, &mut writer)?;
                stored += 1;
            }
        }
    }

    writer.finish()?;
    Ok(stored)
}

fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
