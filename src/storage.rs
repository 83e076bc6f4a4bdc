use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("album {0} not found")]
    NotFound(String),
    #[error("invalid name {0:?}")]
    InvalidName(String),
    #[error("IO {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Makes a client-supplied name safe to use as a single path component.
///
/// Separators and NUL are dropped, so the result never leaves its parent
/// directory; `.` and `..` are rejected outright.
pub fn sanitize_name(name: &str) -> Result<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => Err(Error::InvalidName(name.to_string())),
        _ => Ok(cleaned.to_string()),
    }
}

/// Albums are the directories directly under `root`; images are the files
/// inside them.
#[derive(Clone, Debug)]
pub struct AlbumStore {
    root: PathBuf,
}

impl AlbumStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`AlbumStore::new`], creating the upload root if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `album`. Entries returned by [`AlbumStore::list_images`]
    /// are joined onto it directly, not sanitized again.
    pub fn album_dir(&self, album: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize_name(album)?))
    }

    pub fn image_path(&self, album: &str, filename: &str) -> Result<PathBuf> {
        Ok(self.album_dir(album)?.join(sanitize_name(filename)?))
    }

    pub async fn list_albums(&self) -> Result<Vec<String>> {
        let mut albums = entries(&self.root, |file_type| file_type.is_dir()).await?;
        albums.sort();
        Ok(albums)
    }

    /// Creates the album directory if it is missing and returns the name it
    /// is stored under.
    pub async fn ensure_album(&self, album: &str) -> Result<String> {
        let name = sanitize_name(album)?;
        fs::create_dir_all(self.root.join(&name)).await?;
        Ok(name)
    }

    /// Writes `bytes` into the album, replacing any file of the same name.
    pub async fn save_image(&self, album: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.image_path(album, filename)?;
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "saved image");
        Ok(path)
    }

    pub async fn list_images(&self, album: &str) -> Result<Vec<String>> {
        let dir = self.album_dir(album)?;
        match fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(Error::NotFound(album.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(album.to_string()))
            }
            Err(err) => return Err(err.into()),
        }
        let mut images = entries(&dir, |file_type| file_type.is_file()).await?;
        images.sort();
        Ok(images)
    }
}

/// Names of the entries in `dir` whose type passes `keep`. Names that are
/// not valid UTF-8 are skipped.
async fn entries(
    dir: &Path,
    keep: impl Fn(&std::fs::FileType) -> bool,
) -> std::io::Result<Vec<String>> {
    let mut read_dir = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        if !keep(&entry.file_type().await?) {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_name("cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_name("../../etc/passwd").unwrap(), "....etcpasswd");
        assert_eq!(sanitize_name("C:\\temp\\dog.jpg").unwrap(), "C:tempdog.jpg");
        assert_eq!(sanitize_name("  summer 2023 ").unwrap(), "summer 2023");
    }

    #[test]
    fn sanitize_rejects_dot_names() {
        for name in ["", "   ", ".", "..", "/", "/../", "\\..\\"] {
            assert!(
                matches!(sanitize_name(name), Err(Error::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn upload_layout() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(root.path());

        let album = store.ensure_album("pets").await.unwrap();
        store.save_image(&album, "cat.png", b"cat").await.unwrap();
        store.save_image(&album, "dog.png", b"dog").await.unwrap();

        assert_eq!(store.list_albums().await.unwrap(), vec!["pets"]);
        assert_eq!(store.list_images("pets").await.unwrap(), vec!["cat.png", "dog.png"]);
        assert_eq!(std::fs::read(root.path().join("pets/cat.png")).unwrap(), b"cat");
    }

    #[tokio::test]
    async fn ensure_album_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(root.path());
        store.ensure_album("trips").await.unwrap();
        store.save_image("trips", "a.jpg", b"a").await.unwrap();
        store.ensure_album("trips").await.unwrap();
        assert_eq!(store.list_images("trips").await.unwrap(), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn save_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(root.path());
        store.ensure_album("pets").await.unwrap();
        store.save_image("pets", "cat.png", b"first").await.unwrap();
        let path = store.save_image("pets", "cat.png", b"second").await.unwrap();

        assert_eq!(store.list_images("pets").await.unwrap(), vec!["cat.png"]);
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn traversal_stays_inside_root() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(root.path().join("uploads"));
        let album = store.ensure_album("../escape").await.unwrap();
        let path = store.save_image(&album, "../../x.png", b"x").await.unwrap();

        assert!(path.starts_with(store.root()));
        assert!(!root.path().join("escape").exists());
        assert!(matches!(
            store.ensure_album("..").await,
            Err(Error::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn missing_album_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::open(root.path()).await.unwrap();
        assert!(matches!(
            store.list_images("nowhere").await,
            Err(Error::NotFound(name)) if name == "nowhere"
        ));
    }

    #[tokio::test]
    async fn listings_skip_the_other_kind() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::open(root.path()).await.unwrap();
        store.ensure_album("b").await.unwrap();
        store.ensure_album("a").await.unwrap();
        std::fs::write(root.path().join("stray.txt"), b"").unwrap();
        std::fs::create_dir(root.path().join("a/nested")).unwrap();
        store.save_image("a", "one.png", b"1").await.unwrap();

        assert_eq!(store.list_albums().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_images("a").await.unwrap(), vec!["one.png"]);
    }

    #[tokio::test]
    async fn missing_root_is_an_io_error() {
        let root = tempfile::tempdir().unwrap();
        let store = AlbumStore::new(root.path().join("absent"));
        assert!(matches!(store.list_albums().await, Err(Error::Io(_))));
    }
}
