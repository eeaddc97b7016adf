use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory under the cache root holding mirrored resource bytes
pub const MIRROR_DIR: &str = "files";

/// Suffix of in-progress writes. Derived filenames never contain `.`.
const TEMP_SUFFIX: &str = ".tmp";

/// Derive the mirror filename for a URL.
///
/// Strips a leading `https` or `http` token, then replaces `:`, `/` and `.`
/// with `_`, so `https://a.com/x.js` becomes `___a_com_x_js`.
///
/// The mapping is not injective: `https://a.com/x.js` and
/// `https://a.com/x_js` derive the same name. The reconciler refuses to let
/// a second URL take over a name that another URL already owns.
pub fn derive_filename(url: &str) -> String {
    let rest = url
        .strip_prefix("https")
        .or_else(|| url.strip_prefix("http"))
        .unwrap_or(url);
    rest.chars()
        .map(|c| match c {
            ':' | '/' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Flat directory of mirrored resources.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    dir: PathBuf,
}

impl LocalMirror {
    /// Open the mirror under `cache_root`, creating the directory if needed.
    pub fn open(cache_root: &Path) -> io::Result<Self> {
        let dir = cache_root.join(MIRROR_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.path_for(filename).is_file()
    }

    /// Blocking read, used on the request path.
    pub fn read(&self, filename: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(filename))
    }

    /// Write (or overwrite) a mirror file via temp file + rename.
    pub async fn write(&self, filename: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(filename);
        let tmp = self.dir.join(format!("{}{}", filename, TEMP_SUFFIX));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(file = filename, bytes = bytes.len(), "Mirror file written");
        Ok(())
    }

    /// Names of every mirror file currently on disk.
    pub fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains('.') {
                // temp files from an interrupted write
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_filename() {
        assert_eq!(derive_filename("https://a.com/x.js"), "___a_com_x_js");
        assert_eq!(derive_filename("http://a.com/x.js"), "___a_com_x_js");
        assert_eq!(derive_filename("https://a.com:8080/a/b.css"), "___a_com_8080_a_b_css");
        assert_eq!(derive_filename("//cdn.a.com/f.woff2"), "__cdn_a_com_f_woff2");
    }

    #[test]
    fn test_derive_filename_keeps_query() {
        assert_eq!(derive_filename("https://a.com/x.js?v=1"), "___a_com_x_js?v=1");
    }

    #[test]
    fn test_derive_filename_is_not_injective() {
        assert_eq!(
            derive_filename("https://a.com/x.js"),
            derive_filename("https://a.com/x_js")
        );
    }

    #[test]
    fn test_open_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::open(root.path()).unwrap();
        assert!(mirror.dir().is_dir());
        assert!(mirror.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_read_and_list() {
        let root = tempfile::tempdir().unwrap();
        let mirror = LocalMirror::open(root.path()).unwrap();

        mirror.write("___a_com_x_js", b"one").await.unwrap();
        mirror.write("___a_com_x_js", b"two").await.unwrap();
        std::fs::write(mirror.dir().join("___a_com_y_js.tmp"), b"partial").unwrap();

        assert!(mirror.contains("___a_com_x_js"));
        assert!(!mirror.contains("___a_com_y_js"));
        assert_eq!(mirror.read("___a_com_x_js").unwrap(), b"two");
        assert_eq!(mirror.list().unwrap(), vec!["___a_com_x_js".to_string()]);
    }
}
