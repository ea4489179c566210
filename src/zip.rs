use std::{fs::{self, File}, io, path::Path};
use zip::{result::ZipResult, ZipArchive};

// extraction loop adapted from the zip crate examples
// https://github.com/zip-rs/zip/tree/21a20584bc9e05dfa4f3c5b0bc420a1389fae2c3/examples

/// Extract an archive into `out_dir`, skipping entries whose path starts
/// with one of the `exclude` prefixes.
pub fn extract_zip(zip_file: File, out_dir: &Path, exclude: &[String]) -> ZipResult<()> {
    let mut archive = ZipArchive::new(zip_file)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;

        if exclude.iter().any(|prefix| file.name().starts_with(prefix.as_str())) {
            continue;
        }

        let outpath = match file.enclosed_name() {
            Some(path) => out_dir.join(path),
            None => continue,
        };

        if (*file.name()).ends_with('/') {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                if !p.exists() {
                    fs::create_dir_all(p)?;
                }
            }
            let mut outfile = fs::File::create(&outpath)?;
            io::copy(&mut file, &mut outfile)?;
        }
    }

    Ok(())
}
