use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `contents` to `dir/name` and return the full path.
pub fn write_prompt_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}
