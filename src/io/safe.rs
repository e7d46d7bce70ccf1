use crate::types::{BandFile, StackError, StackResult};
use regex::Regex;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directory under the product root holding the granule folders
pub const GRANULE_DIR: &str = "GRANULE";

/// Directory under a granule holding the per-resolution band folders
pub const IMG_DATA_DIR: &str = "IMG_DATA";

fn band_name_regex() -> &'static Regex {
    static BAND_NAME: OnceLock<Regex> = OnceLock::new();
    BAND_NAME.get_or_init(|| {
        Regex::new(r"(?i)(?:^|_)(B0[1-9]|B1[0-2]|B8A|AOT|WVP|SCL|TCI)(?:_|$)")
            .expect("band name pattern is valid")
    })
}

/// Sentinel-2 `.SAFE` product directory
#[derive(Debug, Clone)]
pub struct SafeLayout {
    root: PathBuf,
}

impl SafeLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Select the single non-hidden granule folder under `GRANULE`.
    ///
    /// A product normally carries exactly one granule; zero or several
    /// candidates are reported instead of picking one.
    pub fn select_granule(&self) -> StackResult<PathBuf> {
        let granule_root = self.root.join(GRANULE_DIR);
        log::debug!("Listing granules in: {}", granule_root.display());

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&granule_root)? {
            let entry = entry?;
            if is_hidden(&entry.file_name()) {
                continue;
            }
            // Follows symlinked granule folders
            let path = entry.path();
            if path.is_dir() {
                candidates.push(path);
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(StackError::GranuleLayout(format!(
                "no granule folder found in {}",
                granule_root.display()
            ))),
            1 => Ok(candidates.remove(0)),
            n => {
                let names: Vec<String> = candidates
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                Err(StackError::GranuleLayout(format!(
                    "expected one granule folder in {}, found {}: {}",
                    granule_root.display(),
                    n,
                    names.join(", ")
                )))
            }
        }
    }

    /// Folder holding the band files for `resolution` meters
    pub fn band_folder(&self, resolution: u32) -> StackResult<PathBuf> {
        let granule = self.select_granule()?;
        Ok(band_folder(&granule, resolution))
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// `<granule>/IMG_DATA/R{resolution}m`
pub fn band_folder(granule: &Path, resolution: u32) -> PathBuf {
    granule.join(IMG_DATA_DIR).join(format!("R{}m", resolution))
}

/// List the image files with `extension` in `folder`, sorted by file name.
///
/// Hidden files (`._B02.jp2` resource forks, staged outputs) are skipped. A
/// folder that does not exist holds no bands.
pub fn find_band_files(folder: &Path, extension: &str) -> StackResult<Vec<BandFile>> {
    if !folder.is_dir() {
        log::debug!("Band folder does not exist: {}", folder.display());
        return Ok(Vec::new());
    }

    let extension = extension.trim_start_matches('.');
    let mut paths = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let matches_ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches_ext && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths
        .into_iter()
        .map(|path| {
            let band_name = parse_band_name(&path);
            BandFile { path, band_name }
        })
        .collect())
}

/// Extract the Sentinel-2 band token from a file name.
///
/// Matches both bare names (`B02.jp2`) and product names
/// (`T33TTG_20230101T100031_B02_10m.jp2`).
pub fn parse_band_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    band_name_regex()
        .captures_iter(&stem)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}
