//! Payload extraction from result archives
//!
//! Result archives start with structural entries (the product folder) followed
//! by the payload file. Only the payload is written out.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Skip `skip_entries` entries of the tar stream, then copy the next entry into
/// `dest_dir`, overwriting any file of the same name.
///
/// Returns the path of the written file.
pub(crate) fn unpack_payload<R: Read>(
    reader: R,
    dest_dir: &Path,
    skip_entries: usize,
    marker: &str,
) -> io::Result<PathBuf> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = archive.entries()?;

    for skipped in 0..skip_entries {
        match entries.next() {
            Some(entry) => {
                entry?;
            }
            None => {
                return Err(invalid(format!(
                    "archive ended after {skipped} entries, before the payload"
                )));
            }
        }
    }

    let mut entry = entries
        .next()
        .ok_or_else(|| invalid("archive has no payload entry"))??;
    let entry_path = entry.path()?.into_owned();
    let filename = output_name(&entry_path, marker)?;
    let output = dest_dir.join(filename);

    let mut file = File::create(&output)?;
    let written = io::copy(&mut entry, &mut file)?;
    file.sync_all()?;

    tracing::debug!(
        entry = %entry_path.display(),
        output = %output.display(),
        bytes = written,
        "Payload unpacked"
    );
    Ok(output)
}

/// File name of the payload: second component of the entry path with the
/// packaging marker collapsed to a single dot
///
/// `S2_EPA__l2a_3/S2A_MSIL2A_X.SAFE.zip` becomes `S2A_MSIL2A_X.zip`.
pub(crate) fn output_name(entry_path: &Path, marker: &str) -> io::Result<String> {
    let mut components = entry_path.components();
    let mut normal = || match components.next() {
        Some(Component::Normal(part)) => Ok(part),
        _ => Err(invalid(format!(
            "unexpected payload entry path '{}'",
            entry_path.display()
        ))),
    };
    normal()?;
    let name = normal()?
        .to_str()
        .ok_or_else(|| invalid("payload entry name is not valid UTF-8"))?;

    let name = if marker.is_empty() {
        name.to_string()
    } else {
        name.replace(marker, ".")
    };
    if name.is_empty() || name == "." {
        return Err(invalid(format!(
            "payload entry '{}' yields an empty file name",
            entry_path.display()
        )));
    }
    Ok(name)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn archive(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            match content {
                Some(data) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_size(data.len() as u64);
                    header.set_mode(0o644);
                    builder.append_data(&mut header, name, *data).unwrap();
                }
                None => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_size(0);
                    header.set_mode(0o755);
                    builder.append_data(&mut header, name, io::empty()).unwrap();
                }
            }
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn output_name_strips_packaging_marker() {
        let name = output_name(
            Path::new("S2_EPA__l2a_20180305_3/S2A_MSIL2A_20180305T101021.SAFE.zip"),
            ".SAFE.",
        )
        .unwrap();
        assert_eq!(name, "S2A_MSIL2A_20180305T101021.zip");
    }

    #[test]
    fn output_name_requires_nested_entry() {
        assert!(output_name(Path::new("flat.zip"), ".SAFE.").is_err());
        assert!(output_name(Path::new("../escape.zip"), ".SAFE.").is_err());
        assert!(output_name(Path::new("dir/../escape.zip"), ".SAFE.").is_err());
    }

    #[test]
    fn unpack_skips_folder_and_writes_payload() {
        let dest = tempdir().unwrap();
        let data = archive(&[
            ("PKG/", None),
            ("PKG/PRODUCT.SAFE.zip", Some(b"payload bytes")),
            ("PKG/trailer.xml", Some(b"<ignored/>")),
        ]);

        let output = unpack_payload(&data[..], dest.path(), 1, ".SAFE.").unwrap();

        assert_eq!(output, dest.path().join("PRODUCT.zip"));
        assert_eq!(std::fs::read(&output).unwrap(), b"payload bytes");
        assert!(!dest.path().join("trailer.xml").exists());
    }

    #[test]
    fn unpack_overwrites_existing_file() {
        let dest = tempdir().unwrap();
        std::fs::write(dest.path().join("PRODUCT.zip"), b"stale content that is longer").unwrap();
        let data = archive(&[("PKG/", None), ("PKG/PRODUCT.SAFE.zip", Some(b"fresh"))]);

        let output = unpack_payload(&data[..], dest.path(), 1, ".SAFE.").unwrap();
        assert_eq!(std::fs::read(output).unwrap(), b"fresh");
    }

    #[test]
    fn unpack_fails_without_payload() {
        let dest = tempdir().unwrap();
        let data = archive(&[("PKG/", None)]);

        let err = unpack_payload(&data[..], dest.path(), 1, ".SAFE.").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unpack_fails_on_truncated_stream() {
        let dest = tempdir().unwrap();
        let data = archive(&[("PKG/", None), ("PKG/PRODUCT.SAFE.zip", Some(&[7u8; 4096]))]);
        let truncated = &data[..1024];

        assert!(unpack_payload(truncated, dest.path(), 1, ".SAFE.").is_err());
    }
}
