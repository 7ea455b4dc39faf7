use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use crate::error::{Error, IoResultExt, Result};
use crate::registry::PackageFile;

/// tarball entries live under this prefix, the registry's package layout
const PACKAGE_PREFIX: &str = "package";

/// build a deterministic gzipped tarball of the given files
///
/// header metadata is zeroed so identical content always produces
/// identical bytes.
pub fn pack(files: &[PackageFile]) -> Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    for file in files {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_size(file.data.len() as u64);
        let path = format!("{}/{}", PACKAGE_PREFIX, file.path);
        builder
            .append_data(&mut header, &path, file.data.as_slice())
            .with_path(&path)?;
    }
    builder.finish().with_path("<tarball>")?;
    let tar_bytes = builder.into_inner().with_path("<tarball>")?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).with_path("<tarball>")?;
    encoder.finish().with_path("<tarball>")
}

/// read one file back out of a gzipped package tarball
pub fn unpack(tarball: &[u8], path: &str) -> Result<Vec<u8>> {
    let wanted = Path::new(PACKAGE_PREFIX).join(path);
    let mut archive = tar::Archive::new(GzDecoder::new(tarball));
    for entry in archive.entries().with_path("<tarball>")? {
        let mut entry = entry.with_path("<tarball>")?;
        let entry_path = entry.path().with_path("<tarball>")?.into_owned();
        if entry_path == wanted {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).with_path("<tarball>")?;
            return Ok(data);
        }
    }
    Err(Error::Registry(format!(
        "package tarball has no entry {}",
        wanted.display()
    )))
}
